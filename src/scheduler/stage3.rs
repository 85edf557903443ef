//! Stage 3: practical streams without a lecture counterpart.
//!
//! Mostly language subjects taught straight from the workload sheet: no
//! lecture to coordinate with, so any weekday is eligible. This is also
//! where subgroup pairing first matters: siblings with different
//! instructors run in parallel at the same (day, slot); siblings sharing
//! an instructor form a *critical pair* placed at day boundaries.

use super::complexity::{complexity_score, group_available_slots, ScoreInputs};
use super::pairs::build_subgroup_pairs;
use super::search::order_days_by_load;
use super::subgroup::{
    schedule_critical_pair, schedule_parallel_subgroup, schedule_standard,
};
use super::{PipelineState, StageOutcome};
use crate::types::{
    base_group, Day, SchedulerConfig, Stream, StreamId, StreamType, UnscheduledStream,
    WeekType,
};
use std::collections::HashSet;
use tracing::debug;

/// Whether a lecture counterpart exists for the practical's subject and
/// any of its base groups
fn has_lecture_counterpart(practical: &Stream, streams: &[Stream]) -> bool {
    let bases: HashSet<String> = practical.groups.iter().map(|g| base_group(g)).collect();
    streams.iter().any(|s| {
        s.stream_type == StreamType::Lecture
            && s.subject == practical.subject
            && s.groups.iter().any(|g| bases.contains(&base_group(g)))
    })
}

pub(crate) fn run(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    scheduled: &HashSet<StreamId>,
) -> StageOutcome {
    let candidates: Vec<&Stream> = streams
        .iter()
        .filter(|s| {
            s.stream_type == StreamType::Practical
                && !s.groups.is_empty()
                && !scheduled.contains(&s.id)
                && !has_lecture_counterpart(s, streams)
        })
        .collect();
    debug!(candidates = candidates.len(), "stage 3 filter");

    let pairs = build_subgroup_pairs(&candidates);

    let mut scored: Vec<(f64, &Stream)> = candidates
        .iter()
        .map(|stream| {
            let shift = stream.shift(&config.second_shift_groups);
            let inputs = ScoreInputs {
                instructor_load: state
                    .conflicts
                    .instructor_scheduled_hours(&stream.instructor_id()),
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
        let order = |st: &PipelineState| order_days_by_load(st, &stream.groups, &Day::ALL);

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
            Ok(assignments) => outcome.assignments.extend(assignments),
            Err((reason, details)) => outcome
                .unscheduled
                .push(UnscheduledStream::from_stream(stream, reason, details)),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Room, StreamHours};

    fn practical(id: &str, group: &str, instructor: &str, subgroup: bool) -> Stream {
        Stream {
            id: StreamId(id.to_string()),
            subject: "Foreign Language".to_string(),
            stream_type: StreamType::Practical,
            instructor: instructor.to_string(),
            language: String::new(),
            groups: vec![group.to_string()],
            student_count: 12,
            hours: StreamHours { odd: 1, even: 1 },
            is_subgroup: subgroup,
            is_implicit_subgroup: false,
            paired_stream_id: None,
        }
    }

    fn config(room_count: usize) -> SchedulerConfig {
        SchedulerConfig::with_rooms(
            (0..room_count)
                .map(|i| Room {
                    name: format!("R{i}"),
                    capacity: 25,
                    address: "Addr1".to_string(),
                    is_special: false,
                })
                .collect(),
        )
    }

    #[test]
    fn test_parallel_subgroups_share_position() {
        let config = config(4);
        let mut state = PipelineState::new(&config);
        let streams = vec![
            practical("a", "СТР-21 О /1/", "I1", true),
            practical("b", "СТР-21 О /2/", "I2", true),
        ];
        let outcome = run(&mut state, &config, &streams, &HashSet::new());

        assert_eq!(outcome.assignments.len(), 2);
        let a = &outcome.assignments[0];
        let b = &outcome.assignments[1];
        assert_eq!((a.day, a.slot), (b.day, b.slot), "siblings run in parallel");
        assert_ne!(a.room, b.room, "siblings need distinct rooms");
        assert_eq!(a.week_type, WeekType::Both);
    }

    #[test]
    fn test_critical_pair_at_day_boundaries() {
        let config = config(4);
        let mut state = PipelineState::new(&config);
        let streams = vec![
            practical("a", "СТР-21 О /1/", "Same I.", true),
            practical("b", "СТР-21 О /2/", "Same I.", true),
        ];
        let outcome = run(&mut state, &config, &streams, &HashSet::new());

        assert_eq!(outcome.assignments.len(), 2);
        let a = &outcome.assignments[0];
        let b = &outcome.assignments[1];
        // Same instructor cannot teach both at once
        assert!((a.day, a.slot) != (b.day, b.slot));
        if a.day == b.day {
            // On a shared day the pair must sit at opposite boundaries
            let (first, second) = if a.slot < b.slot { (a, b) } else { (b, a) };
            assert!(second.slot - first.slot > 1, "boundary pair is never adjacent");
        }
    }

    #[test]
    fn test_practical_with_lecture_counterpart_is_skipped() {
        let config = config(2);
        let mut state = PipelineState::new(&config);
        let mut lecture = practical("lec", "СТР-21 О", "I1", false);
        lecture.stream_type = StreamType::Lecture;
        let streams = vec![lecture, practical("a", "СТР-21 О", "I2", false)];
        let outcome = run(&mut state, &config, &streams, &HashSet::new());
        assert!(outcome.assignments.is_empty());
    }

    #[test]
    fn test_split_scheduling_spreads_across_days() {
        // Only one room: a 4-hour practical cannot fit 4 consecutive
        // hours under the 2-hour subject cap, so it splits across days
        let config = config(1);
        let mut state = PipelineState::new(&config);
        let mut s = practical("a", "СТР-21 О", "I1", false);
        s.hours = StreamHours { odd: 4, even: 4 };
        let outcome = run(&mut state, &config, &[s], &HashSet::new());

        assert_eq!(outcome.assignments.len(), 4);
        let days: HashSet<Day> = outcome.assignments.iter().map(|a| a.day).collect();
        assert!(days.len() >= 2, "subject cap forces a split across days");
        assert!(outcome.unscheduled.is_empty());
    }
}
