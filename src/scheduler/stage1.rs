//! Stage 1: multi-group lectures on primary days (Mon-Wed).
//!
//! Shared lectures are the hardest streams to move later, so they go
//! first, largest audience first, onto the least-loaded primary day at the
//! earliest slots of the shift. Stage 1 has no fallback days.

use super::complexity::{complexity_score, ScoreInputs};
use super::search::order_days_by_load;
use super::subgroup::schedule_standard;
use super::{PipelineState, StageOutcome};
use crate::types::{
    Day, SchedulerConfig, Stream, StreamType, UnscheduledStream, WeekType,
};
use tracing::debug;

pub(crate) fn run(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
) -> StageOutcome {
    let candidates: Vec<&Stream> = streams
        .iter()
        .filter(|s| s.stream_type == StreamType::Lecture && s.groups.len() >= 2)
        .collect();
    debug!(candidates = candidates.len(), "stage 1 filter");

    let mut scored: Vec<(f64, &Stream)> = candidates
        .iter()
        .map(|stream| {
            let inputs = ScoreInputs {
                instructor_load: state
                    .conflicts
                    .instructor_scheduled_hours(&stream.instructor_id()),
                group_available_slots: 0,
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

        // Flexible subjects have no day preference; everyone else stays on
        // the primary days
        let day_bucket: &[Day] = if config.is_flexible_subject(&stream.subject) {
            &Day::ALL
        } else {
            &Day::PRIMARY
        };
        let order = |st: &PipelineState| order_days_by_load(st, &stream.groups, day_bucket);

        match schedule_standard(state, stream, shift, hours, WeekType::Both, &order) {
            Ok(assignments) => outcome.assignments.extend(assignments),
            Err((reason, details)) => outcome
                .unscheduled
                .push(UnscheduledStream::from_stream(stream, reason, details)),
        }
    }
    outcome
}
