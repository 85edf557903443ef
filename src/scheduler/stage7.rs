//! Stage 7: post-hoc optimization of the finished board.
//!
//! Phase A walks every base group's weekday profile and moves single
//! assignments from overloaded days onto empty ones. Phase B re-tries the
//! carried unscheduled list against the rebalanced board, ordered by how
//! fixable the original failure reason is.
//!
//! Move validation is pure: a move always targets a day on which the
//! group has nothing scheduled, so every check runs against current state
//! without the release-probe-restore dance.

use super::rooms::RoomQuery;
use super::search::{place_with_split, PlacementFailure};
use super::PipelineState;
use crate::types::{
    base_group, shift_for_groups, Assignment, Day, InstructorId, RoomKey,
    SchedulerConfig, Slot, Stream, StreamId, UnscheduledReason, UnscheduledStream,
    WeekType,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

const MAX_PHASE_A_ITERATIONS: usize = 100;
const MAX_DAILY_LOAD: u32 = 6;

/// A validated move of one assignment to an empty group-day
#[derive(Debug, Clone)]
struct MovableAssignment {
    index: usize,
    target_day: Day,
    target_slot: Slot,
    target_room: crate::types::Room,
    score: f64,
}

/// Per-group weekday profile: occupied slot counts per day
fn analyze_group_days(assignments: &[Assignment]) -> BTreeMap<String, BTreeMap<Day, u32>> {
    let mut analysis: BTreeMap<String, BTreeMap<Day, u32>> = BTreeMap::new();
    for a in assignments {
        let mut bases: Vec<String> = a.groups.iter().map(|g| base_group(g)).collect();
        bases.sort();
        bases.dedup();
        for base in bases {
            *analysis
                .entry(base)
                .or_insert_with(|| Day::ALL.iter().map(|d| (*d, 0)).collect())
                .entry(a.day)
                .or_insert(0) += 1;
        }
    }
    analysis
}

fn subgroup_stream_ids(streams: &[Stream]) -> HashSet<StreamId> {
    streams
        .iter()
        .filter(|s| s.is_any_subgroup())
        .map(|s| s.id.clone())
        .collect()
}

/// Validate moving `assignment` onto `target_day`, scanning the shift's
/// slots in order. All checks are queries; nothing is mutated.
fn validate_move(
    state: &PipelineState,
    config: &SchedulerConfig,
    assignment: &Assignment,
    index: usize,
    target_day: Day,
) -> Option<MovableAssignment> {
    let instructor = InstructorId::normalize(&assignment.instructor);
    let groups = &assignment.groups;
    let week_type = assignment.week_type;
    let shift = shift_for_groups(groups, &config.second_shift_groups);

    for &target_slot in shift.slots() {
        if state
            .conflicts
            .check_slot_availability_reason(&instructor, groups, target_day, target_slot, week_type)
            .is_err()
        {
            continue;
        }
        if state
            .conflicts
            .would_exceed_daily_load(groups, target_day, 1)
            .is_some()
        {
            continue;
        }
        let (subject_ok, _) =
            state
                .conflicts
                .can_add_subject_hours(groups, target_day, &assignment.subject, 1);
        if !subject_ok {
            continue;
        }
        if state
            .conflicts
            .would_create_second_window(
                groups,
                target_day,
                target_slot,
                state.conflicts.max_windows(),
            )
            .is_some()
        {
            continue;
        }
        if state
            .conflicts
            .check_instructor_day_constraint(&instructor, target_day, groups)
            .is_err()
        {
            continue;
        }
        let query = RoomQuery::for_assignment(assignment);
        let Some(room) = state.rooms.find_room(&query, target_day, target_slot, week_type)
        else {
            continue;
        };
        if state
            .conflicts
            .check_building_gap_constraint(groups, target_day, target_slot, &room.address, week_type)
            .is_err()
        {
            continue;
        }

        // Moving off an overloaded day is worth more
        let mut score = 100.0;
        let source_load = state
            .conflicts
            .get_groups_total_daily_load(groups, assignment.day);
        if source_load >= MAX_DAILY_LOAD {
            score += 50.0;
        }

        return Some(MovableAssignment {
            index,
            target_day,
            target_slot,
            target_room: room.clone(),
            score,
        });
    }
    None
}

/// Apply a validated move: release the source reservation, reserve the
/// target and rewrite the assignment record
fn execute_move(
    state: &mut PipelineState,
    assignments: &mut [Assignment],
    movable: &MovableAssignment,
) {
    let assignment = &assignments[movable.index];
    let instructor = InstructorId::normalize(&assignment.instructor);
    let groups = assignment.groups.clone();
    let week_type = assignment.week_type;

    state.conflicts.release_slot(
        &instructor,
        &groups,
        assignment.day,
        assignment.slot,
        week_type,
        &assignment.room_address,
    );
    state
        .conflicts
        .release_subject_hours(&groups, assignment.day, &assignment.subject, 1);
    state.rooms.release(
        &RoomKey {
            name: assignment.room.clone(),
            address: assignment.room_address.clone(),
        },
        assignment.day,
        assignment.slot,
        week_type,
    );

    state.conflicts.reserve(
        &instructor,
        &groups,
        movable.target_day,
        movable.target_slot,
        week_type,
        &movable.target_room.address,
    );
    state.conflicts.reserve_subject_hours(
        &groups,
        movable.target_day,
        &assignments[movable.index].subject,
        1,
    );
    state.rooms.reserve(
        &movable.target_room,
        movable.target_day,
        movable.target_slot,
        week_type,
    );

    let assignment = &mut assignments[movable.index];
    assignment.day = movable.target_day;
    assignment.slot = movable.target_slot;
    assignment.room = movable.target_room.name.clone();
    assignment.room_address = movable.target_room.address.clone();
}

/// Phase A: iteratively fill empty group-days by moving single-group,
/// non-subgroup assignments, preferring sources on overloaded days
fn run_phase_a(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    assignments: &mut Vec<Assignment>,
) -> u32 {
    let subgroup_ids = subgroup_stream_ids(streams);
    let mut moves_applied = 0;

    for _ in 0..MAX_PHASE_A_ITERATIONS {
        let analysis = analyze_group_days(assignments);
        let mut moved = false;

        for (group, day_counts) in &analysis {
            let empty_days: Vec<Day> = day_counts
                .iter()
                .filter(|(_, count)| **count == 0)
                .map(|(day, _)| *day)
                .collect();
            if empty_days.is_empty() {
                continue;
            }
            let overloaded: Vec<Day> = day_counts
                .iter()
                .filter(|(_, count)| **count >= MAX_DAILY_LOAD)
                .map(|(day, _)| *day)
                .collect();
            let source_days: Vec<Day> = if overloaded.is_empty() {
                Day::ALL.to_vec()
            } else {
                overloaded
            };

            let mut candidates: Vec<MovableAssignment> = Vec::new();
            for (index, assignment) in assignments.iter().enumerate() {
                // Moves are restricted to single-group, non-subgroup,
                // non-multi-group assignments to preserve pairing
                if assignment.groups.len() != 1 {
                    continue;
                }
                if subgroup_ids.contains(&assignment.stream_id) {
                    continue;
                }
                if base_group(&assignment.groups[0]) != *group {
                    continue;
                }
                if !source_days.contains(&assignment.day) {
                    continue;
                }
                // Emptying the source day would just trade one hole for
                // another; such a move never improves the board
                if day_counts.get(&assignment.day).copied().unwrap_or(0) <= 1 {
                    continue;
                }
                for target_day in &empty_days {
                    if let Some(movable) =
                        validate_move(state, config, assignment, index, *target_day)
                    {
                        candidates.push(movable);
                    }
                }
            }

            // First among equals, so repeated ties keep draining the
            // overloaded day instead of re-moving the same assignment
            let mut best: Option<MovableAssignment> = None;
            for candidate in candidates {
                let better = best
                    .as_ref()
                    .map(|b| candidate.score > b.score)
                    .unwrap_or(true);
                if better {
                    best = Some(candidate);
                }
            }

            if let Some(best) = best {
                execute_move(state, assignments, &best);
                moves_applied += 1;
                moved = true;
                break;
            }
        }

        if !moved {
            break;
        }
    }

    moves_applied
}

/// Day scan order for a retry, keyed on why the stream failed originally.
/// Subject-daily-limit failures walk the week backwards to find the
/// subject's empty day.
fn retry_days(reason: UnscheduledReason) -> Vec<Day> {
    match reason {
        UnscheduledReason::SubjectDailyLimitExceeded => {
            let mut days = Day::ALL.to_vec();
            days.reverse();
            days
        }
        _ => Day::ALL.to_vec(),
    }
}

/// Phase B: retry the carried unscheduled list against the rebalanced
/// board. Returns the newly placed assignment count; `unscheduled` keeps
/// only the streams that still failed.
fn run_phase_b(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    assignments: &mut Vec<Assignment>,
    unscheduled: &mut Vec<UnscheduledStream>,
) -> u32 {
    let stream_lookup: HashMap<&StreamId, &Stream> =
        streams.iter().map(|s| (&s.id, s)).collect();
    let already_placed: HashSet<StreamId> =
        assignments.iter().map(|a| a.stream_id.clone()).collect();

    let mut queue: Vec<UnscheduledStream> = std::mem::take(unscheduled);
    queue.sort_by_key(|u| u.reason.retry_priority());

    let mut newly_scheduled: BTreeSet<StreamId> = BTreeSet::new();
    let mut placed_count = 0;

    for entry in &queue {
        let Some(stream) = stream_lookup.get(&entry.stream_id) else {
            continue;
        };

        // Streams that got a partial block earlier only top up one hour;
        // everything else retries its full weekly hours
        let hours = if already_placed.contains(&stream.id) {
            1
        } else {
            stream.max_hours()
        };
        if hours == 0 {
            continue;
        }

        let week_type = match (stream.hours.odd > 0, stream.hours.even > 0) {
            (true, true) => WeekType::Both,
            (true, false) => WeekType::Odd,
            (false, true) => WeekType::Even,
            (false, false) => continue,
        };
        let shift = stream.shift(&config.second_shift_groups);
        let days = retry_days(entry.reason);
        let order = move |_: &PipelineState| days.clone();

        let result: Result<Vec<Assignment>, PlacementFailure> = place_with_split(
            state,
            stream,
            shift,
            hours,
            week_type,
            &order,
            &mut Vec::new(),
        );
        if let Ok(placed) = result {
            if !placed.is_empty() {
                placed_count += placed.len() as u32;
                newly_scheduled.insert(stream.id.clone());
                assignments.extend(placed);
            }
        }
    }

    queue.retain(|u| !newly_scheduled.contains(&u.stream_id));
    *unscheduled = queue;

    debug!(
        retried = newly_scheduled.len(),
        remaining = unscheduled.len(),
        "phase B complete"
    );
    placed_count
}

/// Run both optimizer phases. Returns the number of assignments added by
/// phase B (moves in phase A change positions, not counts).
pub(crate) fn run(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    assignments: &mut Vec<Assignment>,
    unscheduled: &mut Vec<UnscheduledStream>,
) -> u32 {
    let moves = run_phase_a(state, config, streams, assignments);
    info!(moves, "optimizer phase A applied");

    let placed = run_phase_b(state, config, streams, assignments, unscheduled);
    info!(placed, remaining = unscheduled.len(), "optimizer phase B finished");
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Room, StreamHours, StreamType};

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

    fn assignment(id: &str, day: Day, slot: Slot) -> Assignment {
        Assignment {
            stream_id: StreamId(id.to_string()),
            subject: format!("Subj-{id}"),
            stream_type: StreamType::Practical,
            instructor: format!("I-{id}"),
            groups: vec!["СТР-21 О".to_string()],
            student_count: 20,
            day,
            slot,
            room: "101".to_string(),
            room_address: "Addr1".to_string(),
            week_type: WeekType::Both,
        }
    }

    fn stream(id: &str) -> Stream {
        Stream {
            id: StreamId(id.to_string()),
            subject: format!("Subj-{id}"),
            stream_type: StreamType::Practical,
            instructor: format!("I-{id}"),
            language: String::new(),
            groups: vec!["СТР-21 О".to_string()],
            student_count: 20,
            hours: StreamHours { odd: 1, even: 1 },
            is_subgroup: false,
            is_implicit_subgroup: false,
            paired_stream_id: None,
        }
    }

    #[test]
    fn test_phase_a_fills_empty_day() {
        let config = config();
        let mut state = PipelineState::new(&config);

        // Six classes on Monday (overloaded), nothing anywhere else
        let mut assignments: Vec<Assignment> =
            (6..12).map(|slot| assignment(&format!("s{slot}"), Day::Monday, slot)).collect();
        state.load_assignments(&assignments);
        let streams: Vec<Stream> = (6..12).map(|slot| stream(&format!("s{slot}"))).collect();

        let mut unscheduled = Vec::new();
        run(&mut state, &config, &streams, &mut assignments, &mut unscheduled);

        let monday_count = assignments.iter().filter(|a| a.day == Day::Monday).count();
        assert!(monday_count < 6, "overloaded Monday should shed assignments");
        let days: HashSet<Day> = assignments.iter().map(|a| a.day).collect();
        assert!(days.len() > 1, "moves must fill previously-empty days");
    }

    #[test]
    fn test_phase_a_preserves_invariants_after_move() {
        let config = config();
        let mut state = PipelineState::new(&config);
        let mut assignments: Vec<Assignment> =
            (6..12).map(|slot| assignment(&format!("s{slot}"), Day::Monday, slot)).collect();
        state.load_assignments(&assignments);
        let streams: Vec<Stream> = (6..12).map(|slot| stream(&format!("s{slot}"))).collect();

        let mut unscheduled = Vec::new();
        run(&mut state, &config, &streams, &mut assignments, &mut unscheduled);

        // No two assignments share (day, slot) for the shared group
        let mut seen = HashSet::new();
        for a in &assignments {
            assert!(
                seen.insert((a.day, a.slot)),
                "duplicate position after optimization: {:?} slot {}",
                a.day,
                a.slot
            );
        }
    }

    #[test]
    fn test_subgroup_assignments_never_move() {
        let config = config();
        let mut state = PipelineState::new(&config);
        let mut assignments: Vec<Assignment> = (6..12)
            .map(|slot| {
                let mut a = assignment(&format!("s{slot}"), Day::Monday, slot);
                a.groups = vec![format!("СТР-21 О /{}/", if slot % 2 == 0 { 1 } else { 2 })];
                a
            })
            .collect();
        state.load_assignments(&assignments);
        let streams: Vec<Stream> = (6..12)
            .map(|slot| {
                let mut s = stream(&format!("s{slot}"));
                s.is_subgroup = true;
                s
            })
            .collect();

        let before = assignments.clone();
        run_phase_a(&mut state, &config, &streams, &mut assignments);

        assert_eq!(
            before.iter().map(|a| (a.day, a.slot)).collect::<Vec<_>>(),
            assignments.iter().map(|a| (a.day, a.slot)).collect::<Vec<_>>(),
            "subgroup placements are pinned to preserve pairing"
        );
    }

    #[test]
    fn test_phase_b_retries_unscheduled() {
        let config = config();
        let mut state = PipelineState::new(&config);
        let mut assignments = Vec::new();
        let streams = vec![stream("retry")];
        let mut unscheduled = vec![UnscheduledStream::from_stream(
            &streams[0],
            UnscheduledReason::NoRoomAvailable,
            "everything was busy in stage 5",
        )];

        let placed = run(&mut state, &config, &streams, &mut assignments, &mut unscheduled);

        assert_eq!(placed, 1);
        assert_eq!(assignments.len(), 1);
        assert!(unscheduled.is_empty());
    }

    #[test]
    fn test_phase_b_retry_priority_order() {
        let a = UnscheduledStream::from_stream(
            &stream("a"),
            UnscheduledReason::InstructorUnavailable,
            "",
        );
        let b = UnscheduledStream::from_stream(
            &stream("b"),
            UnscheduledReason::BuildingGapRequired,
            "",
        );
        let mut queue = vec![a, b];
        queue.sort_by_key(|u| u.reason.retry_priority());
        assert_eq!(queue[0].reason, UnscheduledReason::BuildingGapRequired);
    }
}
