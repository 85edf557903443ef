mod complexity;
mod conflicts;
mod pairs;
mod rooms;
mod search;
mod stage1;
mod stage3;
mod stage4;
mod stage5;
mod stage6;
mod stage7;
mod subgroup;

pub use complexity::*;
pub use conflicts::*;
pub use pairs::*;
pub use rooms::*;
pub use search::*;

use crate::error::Result;
use crate::types::{
    base_group, Assignment, Day, ScheduleResult, ScheduleStatistics, SchedulerConfig,
    Shift, Slot, Stream, StreamId, StreamType, UnscheduledStream,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::info;

/// Mutable board state threaded through the stage pipeline.
///
/// Stages borrow it in turn; there is no sharing and no thread safety, by
/// design - the pipeline is strictly sequential.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub conflicts: ConflictTracker,
    pub rooms: RoomManager,
    /// First placed position of each subgroup stream, so the sibling can
    /// try the identical (day, slot)
    pub subgroup_positions: std::collections::HashMap<StreamId, (Day, Slot)>,
}

impl PipelineState {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            conflicts: ConflictTracker::new(config),
            rooms: RoomManager::new(config),
            subgroup_positions: std::collections::HashMap::new(),
        }
    }

    /// Materialize prior assignments into both reservation stores
    pub fn load_assignments(&mut self, assignments: &[Assignment]) {
        self.conflicts.load_assignments(assignments);
        self.rooms.load_assignments(assignments);
    }
}

/// What one stage hands back to the pipeline
#[derive(Debug, Default)]
pub struct StageOutcome {
    pub assignments: Vec<Assignment>,
    pub unscheduled: Vec<UnscheduledStream>,
}

/// Main entry point: the whole staged pipeline as a pure function of the
/// stream list and configuration. No filesystem access, no environment.
pub fn schedule(streams: &[Stream], config: &SchedulerConfig) -> Result<ScheduleResult> {
    schedule_with_progress(streams, config, &ProgressBar::hidden())
}

/// Pipeline entry with a progress bar for interactive callers
pub fn schedule_with_progress(
    streams: &[Stream],
    config: &SchedulerConfig,
    progress: &ProgressBar,
) -> Result<ScheduleResult> {
    let start = Instant::now();

    let streams = strip_dead_groups(streams, config);
    info!(total_streams = streams.len(), "starting schedule pipeline");

    let mut state = PipelineState::new(config);
    let mut assignments: Vec<Assignment> = Vec::new();
    let mut unscheduled: Vec<UnscheduledStream> = Vec::new();
    let mut by_stage: BTreeMap<u8, u32> = BTreeMap::new();
    let mut scheduled: HashSet<StreamId> = HashSet::new();

    let stages: [(u8, &str); 5] = [
        (1, "Multi-group lectures"),
        (3, "Independent practicals"),
        (4, "Single-group lectures"),
        (5, "Dependent practicals"),
        (6, "Labs"),
    ];

    for (i, (stage, label)) in stages.iter().enumerate() {
        progress.set_message(format!("Stage {stage}: {label}..."));
        progress.set_position((i as u64) * 15 + 10);

        let outcome = match *stage {
            1 => stage1::run(&mut state, config, &streams),
            3 => stage3::run(&mut state, config, &streams, &scheduled),
            4 => stage4::run(&mut state, config, &streams, &scheduled),
            5 => stage5::run(&mut state, config, &streams, &scheduled, &assignments),
            _ => stage6::run(&mut state, config, &streams, &scheduled, &assignments),
        };

        info!(
            stage = *stage,
            placed = outcome.assignments.len(),
            unscheduled = outcome.unscheduled.len(),
            "stage complete"
        );
        *by_stage.entry(*stage).or_insert(0) += outcome.assignments.len() as u32;
        for a in &outcome.assignments {
            scheduled.insert(a.stream_id.clone());
        }
        assignments.extend(outcome.assignments);
        unscheduled.extend(outcome.unscheduled);
    }

    // Stage 7: rebalance the board and retry the carried unscheduled list
    progress.set_message("Stage 7: Optimizing...");
    progress.set_position(85);
    let retried =
        stage7::run(&mut state, config, &streams, &mut assignments, &mut unscheduled);
    *by_stage.entry(7).or_insert(0) += retried;

    progress.set_message("Complete");
    progress.set_position(100);

    let mut result = ScheduleResult::new(7);
    result.statistics = compute_statistics(&assignments, &streams, by_stage);
    result.statistics.solver_time_seconds = Some(start.elapsed().as_secs_f64());
    result.unscheduled_stream_ids = unscheduled.iter().map(|u| u.stream_id.clone()).collect();
    result.assignments = assignments;
    result.unscheduled_streams = unscheduled;

    info!(
        assigned = result.assignments.len(),
        unscheduled = result.unscheduled_streams.len(),
        "pipeline finished"
    );
    Ok(result)
}

/// Progress bar the CLI attaches to the pipeline
pub fn pipeline_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .expect("valid progress template")
            .progress_chars("#>-"),
    );
    pb
}

/// Remove zero-student groups from streams; a stream whose groups are all
/// dead is dropped entirely and not reported as unscheduled
fn strip_dead_groups(streams: &[Stream], config: &SchedulerConfig) -> Vec<Stream> {
    if config.dead_groups.is_empty() {
        return streams.to_vec();
    }
    streams
        .iter()
        .filter_map(|stream| {
            let alive: Vec<String> = stream
                .groups
                .iter()
                .filter(|g| !config.dead_groups.contains(&base_group(g)))
                .cloned()
                .collect();
            if alive.is_empty() {
                return None;
            }
            let mut kept = stream.clone();
            kept.groups = alive;
            Some(kept)
        })
        .collect()
}

/// Expected weekly hours of one stream: labs place odd and even weeks
/// separately, everything else places once at the max of the two
fn expected_hours_of(stream: &Stream) -> u32 {
    match stream.stream_type {
        StreamType::Lab => stream.hours.odd as u32 + stream.hours.even as u32,
        _ => stream.max_hours() as u32,
    }
}

fn compute_statistics(
    assignments: &[Assignment],
    streams: &[Stream],
    by_stage: BTreeMap<u8, u32>,
) -> ScheduleStatistics {
    let mut stats = ScheduleStatistics {
        by_stage,
        expected_hours: streams.iter().map(expected_hours_of).sum(),
        ..ScheduleStatistics::default()
    };
    for a in assignments {
        *stats.by_day.entry(a.day.name().to_string()).or_insert(0) += 1;
        *stats
            .by_shift
            .entry(Shift::of_slot(a.slot).as_str().to_string())
            .or_insert(0) += 1;
        *stats
            .room_utilization
            .entry(a.room_address.clone())
            .or_insert(0) += 1;
    }
    stats.scheduled_hours = assignments.len() as u32;
    stats
}
