use super::{Assignment, Shift, StreamId, UnscheduledStream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate counters over the final assignment set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleStatistics {
    /// Assignments per weekday
    pub by_day: BTreeMap<String, u32>,
    /// Assignments per shift ("first" / "second")
    pub by_shift: BTreeMap<String, u32>,
    /// Assignments per building address
    pub room_utilization: BTreeMap<String, u32>,
    /// Assignments contributed by each pipeline stage
    pub by_stage: BTreeMap<u8, u32>,
    /// Total weekly hours the input streams asked for
    pub expected_hours: u32,
    /// Hours actually placed (one per assignment)
    pub scheduled_hours: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_time_seconds: Option<f64>,
}

impl ScheduleStatistics {
    /// Fold an assignment into the day/shift/room counters
    pub fn record(&mut self, assignment: &Assignment, stage: u8) {
        *self
            .by_day
            .entry(assignment.day.name().to_string())
            .or_insert(0) += 1;
        *self
            .by_shift
            .entry(Shift::of_slot(assignment.slot).as_str().to_string())
            .or_insert(0) += 1;
        *self
            .room_utilization
            .entry(assignment.room_address.clone())
            .or_insert(0) += 1;
        *self.by_stage.entry(stage).or_insert(0) += 1;
        self.scheduled_hours += 1;
    }
}

/// The serialized schedule consumed by renderers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// ISO-8601 generation timestamp
    pub generation_date: String,
    /// Last pipeline stage that produced this result
    pub stage: u8,
    pub assignments: Vec<Assignment>,
    pub unscheduled_streams: Vec<UnscheduledStream>,
    /// Parallel to `unscheduled_streams`
    pub unscheduled_stream_ids: Vec<StreamId>,
    pub statistics: ScheduleStatistics,
}

impl ScheduleResult {
    pub fn new(stage: u8) -> Self {
        Self {
            generation_date: chrono::Utc::now().to_rfc3339(),
            stage,
            assignments: Vec::new(),
            unscheduled_streams: Vec::new(),
            unscheduled_stream_ids: Vec::new(),
            statistics: ScheduleStatistics::default(),
        }
    }

    /// Assignments a given base group participates in
    pub fn assignments_for_group(&self, base: &str) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.groups.iter().any(|g| super::base_group(g) == base))
            .collect()
    }

    /// Scheduling rate over distinct streams, for acceptance thresholds
    pub fn scheduling_rate(&self, total_streams: usize) -> f64 {
        if total_streams == 0 {
            return 1.0;
        }
        let unscheduled: std::collections::HashSet<_> =
            self.unscheduled_stream_ids.iter().collect();
        (total_streams - unscheduled.len()) as f64 / total_streams as f64
    }
}
