//! Stage 4: single-group lectures.
//!
//! Same day policy as stage 1 (Mon-Wed primary) but with Thu-Fri as
//! fallback once the primary days are exhausted, and gap-filling inside
//! the group's existing schedule to keep windows down.

use super::complexity::{complexity_score, group_available_slots, ScoreInputs};
use super::search::order_days_by_load;
use super::subgroup::schedule_standard;
use super::{PipelineState, StageOutcome};
use crate::types::{
    Day, SchedulerConfig, Stream, StreamId, StreamType, UnscheduledStream, WeekType,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub(crate) fn run(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    scheduled: &HashSet<StreamId>,
) -> StageOutcome {
    let candidates: Vec<&Stream> = streams
        .iter()
        .filter(|s| {
            s.stream_type == StreamType::Lecture
                && s.groups.len() == 1
                && !scheduled.contains(&s.id)
        })
        .collect();
    debug!(candidates = candidates.len(), "stage 4 filter");

    let mut instructor_streams: HashMap<String, u32> = HashMap::new();
    for stream in &candidates {
        *instructor_streams
            .entry(stream.instructor_id().as_str().to_string())
            .or_insert(0) += 1;
    }

    let lecture_days: Vec<Day> = Day::PRIMARY
        .iter()
        .chain(Day::FALLBACK.iter())
        .copied()
        .collect();

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
                    &lecture_days,
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

        // Primary days ordered for consolidation, then the fixed fallback
        // tail; flexible subjects treat the whole week as one bucket
        let order = |st: &PipelineState| -> Vec<Day> {
            if flexible {
                order_days_by_load(st, &stream.groups, &Day::ALL)
            } else {
                let mut days = order_days_by_load(st, &stream.groups, &Day::PRIMARY);
                days.extend(Day::FALLBACK);
                days
            }
        };

        match schedule_standard(state, stream, shift, hours, WeekType::Both, &order) {
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
    use crate::types::{InstructorId, Room, StreamHours};

    fn lecture(id: &str, group: &str, instructor: &str) -> Stream {
        Stream {
            id: StreamId(id.to_string()),
            subject: format!("Subj-{id}"),
            stream_type: StreamType::Lecture,
            instructor: instructor.to_string(),
            language: String::new(),
            groups: vec![group.to_string()],
            student_count: 25,
            hours: StreamHours { odd: 1, even: 1 },
            is_subgroup: false,
            is_implicit_subgroup: false,
            paired_stream_id: None,
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig::with_rooms(vec![
            Room {
                name: "101".to_string(),
                capacity: 30,
                address: "Addr1".to_string(),
                is_special: false,
            },
            Room {
                name: "102".to_string(),
                capacity: 30,
                address: "Addr1".to_string(),
                is_special: false,
            },
        ])
    }

    #[test]
    fn test_places_single_group_lecture() {
        let config = config();
        let mut state = PipelineState::new(&config);
        let streams = vec![lecture("a", "СТР-21 О", "Ivanov")];
        let outcome = run(&mut state, &config, &streams, &HashSet::new());

        assert_eq!(outcome.assignments.len(), 1);
        assert!(Day::PRIMARY.contains(&outcome.assignments[0].day));
    }

    #[test]
    fn test_falls_back_to_thursday_when_primary_full() {
        let config = config();
        let mut state = PipelineState::new(&config);

        // Fill every second-shift slot of Mon-Wed for the group
        let instructor = InstructorId::normalize("Busy");
        let groups = vec!["СТР-21 О".to_string()];
        for day in Day::PRIMARY {
            for slot in [6, 7, 8, 9, 10, 11, 12, 13] {
                state.conflicts.reserve(
                    &instructor,
                    &groups,
                    day,
                    slot,
                    WeekType::Both,
                    "Addr1",
                );
            }
        }

        // Daily load of 8 already exceeds the cap on those days; the
        // lecture must land on a fallback day
        let streams = vec![lecture("a", "СТР-21 О", "Ivanov")];
        let outcome = run(&mut state, &config, &streams, &HashSet::new());

        assert_eq!(outcome.assignments.len(), 1);
        assert!(Day::FALLBACK.contains(&outcome.assignments[0].day));
    }

    #[test]
    fn test_skips_already_scheduled() {
        let config = config();
        let mut state = PipelineState::new(&config);
        let streams = vec![lecture("a", "СТР-21 О", "Ivanov")];
        let scheduled = HashSet::from([StreamId("a".to_string())]);
        let outcome = run(&mut state, &config, &streams, &scheduled);
        assert!(outcome.assignments.is_empty());
    }

    #[test]
    fn test_two_hour_lecture_contiguous() {
        let config = config();
        let mut state = PipelineState::new(&config);
        let mut s = lecture("a", "СТР-21 О", "Ivanov");
        s.hours = StreamHours { odd: 2, even: 2 };
        let outcome = run(&mut state, &config, &[s], &HashSet::new());

        assert_eq!(outcome.assignments.len(), 2);
        let (a, b) = (&outcome.assignments[0], &outcome.assignments[1]);
        assert_eq!(a.day, b.day);
        assert_eq!(a.room, b.room);
        assert_eq!(b.slot, a.slot + 1);
    }
}
