//! Stage 5: practicals whose subject has scheduled lectures.
//!
//! A practical wants to sit on a day *without* the subject's lecture, so
//! students meet the material before exercising it - a soft preference
//! that falls back to lecture days when nothing else fits. Subgroup
//! siblings pair the same way as in stage 3.

use super::complexity::{complexity_score, group_available_slots, ScoreInputs};
use super::pairs::build_subgroup_pairs;
use super::search::order_days_by_load;
use super::subgroup::{
    schedule_critical_pair, schedule_parallel_subgroup, schedule_standard,
};
use super::{PipelineState, StageOutcome};
use crate::types::{
    Assignment, Day, SchedulerConfig, Stream, StreamId, StreamType, UnscheduledStream,
    WeekType,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// subject -> days carrying at least one scheduled lecture
fn scheduled_lecture_days(assignments: &[Assignment]) -> HashMap<String, Vec<Day>> {
    let mut by_subject: HashMap<String, Vec<Day>> = HashMap::new();
    for a in assignments {
        if a.stream_type != StreamType::Lecture {
            continue;
        }
        let days = by_subject.entry(a.subject.clone()).or_default();
        if !days.contains(&a.day) {
            days.push(a.day);
        }
    }
    by_subject
}

/// Subjects that have a lecture stream in the input or a scheduled lecture
/// on the board
fn subjects_with_lectures(
    streams: &[Stream],
    lecture_days: &HashMap<String, Vec<Day>>,
) -> HashSet<String> {
    let mut subjects: HashSet<String> = streams
        .iter()
        .filter(|s| s.stream_type == StreamType::Lecture)
        .map(|s| s.subject.clone())
        .collect();
    subjects.extend(lecture_days.keys().cloned());
    subjects
}

pub(crate) fn run(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    scheduled: &HashSet<StreamId>,
    assignments: &[Assignment],
) -> StageOutcome {
    let lecture_days = scheduled_lecture_days(assignments);
    let with_lectures = subjects_with_lectures(streams, &lecture_days);

    let candidates: Vec<&Stream> = streams
        .iter()
        .filter(|s| {
            s.stream_type == StreamType::Practical
                && !s.groups.is_empty()
                && !scheduled.contains(&s.id)
                && with_lectures.contains(&s.subject)
        })
        .collect();
    debug!(candidates = candidates.len(), "stage 5 filter");

    let pairs = build_subgroup_pairs(&candidates);

    let mut instructor_streams: HashMap<String, u32> = HashMap::new();
    for stream in &candidates {
        *instructor_streams
            .entry(stream.instructor_id().as_str().to_string())
            .or_insert(0) += 1;
    }

    let mut scored: Vec<(f64, &Stream)> = candidates
        .iter()
        .map(|stream| {
            let shift = stream.shift(&config.second_shift_groups);
            let inputs = ScoreInputs {
                instructor_load: instructor_streams
                    .get(stream.instructor_id().as_str())
                    .copied()
                    .unwrap_or(1),
                group_available_slots: group_available_slots(
                    state,
                    &stream.groups[0],
                    &Day::ALL,
                    shift,
                ),
                has_room_constraint: config.subject_rooms.contains_key(&stream.subject),
                is_flexible: config.is_flexible_subject(&stream.subject),
            };
            (complexity_score(stream, &config.tuning.weights, inputs), *stream)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut outcome = StageOutcome::default();
    for (_, stream) in scored {
        let hours = stream.hours_for(WeekType::Both);
        if hours == 0 {
            continue;
        }
        let shift = stream.shift(&config.second_shift_groups);
        let flexible = config.is_flexible_subject(&stream.subject);
        let subject_lecture_days = lecture_days
            .get(&stream.subject)
            .cloned()
            .unwrap_or_default();

        // Days without the subject's lecture come first (soft preference),
        // each bucket ordered for consolidation
        let order = |st: &PipelineState| -> Vec<Day> {
            if flexible || subject_lecture_days.is_empty() {
                return order_days_by_load(st, &stream.groups, &Day::ALL);
            }
            let non_lecture: Vec<Day> = Day::ALL
                .iter()
                .copied()
                .filter(|d| !subject_lecture_days.contains(d))
                .collect();
            let lecture: Vec<Day> = Day::ALL
                .iter()
                .copied()
                .filter(|d| subject_lecture_days.contains(d))
                .collect();
            let mut days = order_days_by_load(st, &stream.groups, &non_lecture);
            days.extend(order_days_by_load(st, &stream.groups, &lecture));
            days
        };

        let pair = pairs.get(&stream.id);
        let result = match pair {
            Some(info) if info.critical => schedule_critical_pair(
                state,
                stream,
                shift,
                hours,
                WeekType::Both,
                Some(info),
                &order,
            ),
            Some(info) => schedule_parallel_subgroup(
                state,
                stream,
                shift,
                hours,
                WeekType::Both,
                Some(info),
                &order,
            ),
            None if stream.is_any_subgroup() => schedule_parallel_subgroup(
                state,
                stream,
                shift,
                hours,
                WeekType::Both,
                None,
                &order,
            ),
            None => schedule_standard(state, stream, shift, hours, WeekType::Both, &order),
        };

        match result {
            Ok(placed) => outcome.assignments.extend(placed),
            Err((reason, details)) => outcome
                .unscheduled
                .push(UnscheduledStream::from_stream(stream, reason, details)),
        }
    }
    outcome
}
