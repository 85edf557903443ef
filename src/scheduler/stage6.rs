//! Stage 6: lab streams.
//!
//! Labs differ from everything before them in two ways: they place odd
//! and even weeks independently (a lab wired for odd weeks leaves the
//! even-week slot free), and their subgroup pairs are usually taught by
//! one instructor, which forces day-boundary placement. The stage runs in
//! four passes: 6A multi-group labs, 6B implicit-subgroup labs with a
//! subject-room constraint, 6C implicit-subgroup labs without, 6D plain
//! single-group labs.

use super::complexity::{complexity_score, ScoreInputs};
use super::pairs::{build_subgroup_pairs, PairTable};
use super::search::{check_position, place, place_with_split};
use super::{PipelineState, StageOutcome};
use crate::types::{
    base_group, Assignment, Day, SchedulerConfig, Shift, Slot, Stream, StreamId,
    StreamType, UnscheduledStream, WeekType,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Day-boundary slots per shift: a critical pair parks one subgroup in
/// the first slots of the day and the other in the last, so the idle
/// subgroup can arrive late or leave early
fn boundary_slots(shift: Shift, at_start: bool) -> &'static [Slot] {
    match (shift, at_start) {
        (Shift::First, true) => &[1, 2],
        (Shift::First, false) => &[4, 5],
        (Shift::Second, true) => &[6, 7],
        (Shift::Second, false) => &[12, 13],
    }
}

/// Week types a lab must place, derived from its per-parity hours
fn week_types_of(stream: &Stream) -> Vec<(WeekType, u8)> {
    let mut out = Vec::new();
    if stream.hours.odd > 0 {
        out.push((WeekType::Odd, stream.hours.odd));
    }
    if stream.hours.even > 0 {
        out.push((WeekType::Even, stream.hours.even));
    }
    out
}

struct Stage6<'a> {
    state: &'a mut PipelineState,
    config: &'a SchedulerConfig,
    outcome: StageOutcome,
    lecture_days: HashMap<StreamId, Vec<Day>>,
    placed: HashSet<StreamId>,
}

impl<'a> Stage6<'a> {
    /// Weekdays ordered for this stream: days after the subject's lecture
    /// days first, lecture days themselves last
    fn day_order(&self, stream: &Stream) -> Vec<Day> {
        let lecture_days = self
            .lecture_days
            .get(&stream.id)
            .cloned()
            .unwrap_or_default();
        if lecture_days.is_empty() {
            return Day::ALL.to_vec();
        }
        let earliest = lecture_days.iter().min().copied();
        let mut preferred = Vec::new();
        let mut rest = Vec::new();
        for day in Day::ALL {
            let after_lecture = earliest.map(|e| day > e).unwrap_or(false);
            if after_lecture && !lecture_days.contains(&day) {
                preferred.push(day);
            } else {
                rest.push(day);
            }
        }
        preferred.extend(rest);
        preferred
    }

    /// Place the week type's hours as contiguous blocks through the
    /// shared engine, so a multi-hour lab keeps one room and consecutive
    /// slots per day
    fn place_units(&mut self, stream: &Stream, week_type: WeekType, hours: u8) {
        let shift = stream.shift(&self.config.second_shift_groups);
        let days = self.day_order(stream);
        let order = move |_: &PipelineState| days.clone();

        match place_with_split(
            self.state,
            stream,
            shift,
            hours,
            week_type,
            &order,
            &mut Vec::new(),
        ) {
            Ok(assignments) => {
                if !assignments.is_empty() {
                    self.placed.insert(stream.id.clone());
                }
                self.outcome.assignments.extend(assignments);
            }
            Err((reason, details)) => {
                self.outcome.unscheduled.push(UnscheduledStream::from_stream(
                    stream,
                    reason,
                    format!("{week_type} week: {details}"),
                ));
            }
        }
    }

    /// 6A/6D: independent placement per week type
    fn schedule_plain(&mut self, stream: &Stream) {
        for (week_type, hours) in week_types_of(stream) {
            self.place_units(stream, week_type, hours);
        }
    }

    /// Boundary placement of one unit pair: `first` at the day start,
    /// `second` at the day end of the same day. Returns false when no day
    /// admits both boundaries.
    fn place_pair_at_boundaries(
        &mut self,
        first: &Stream,
        second: &Stream,
        week_type: WeekType,
    ) -> bool {
        let shift = first.shift(&self.config.second_shift_groups);
        let lecture_days = self
            .lecture_days
            .get(&first.id)
            .cloned()
            .unwrap_or_default();

        for day in Day::ALL {
            if lecture_days.contains(&day) {
                continue;
            }
            let start = boundary_slots(shift, true)
                .iter()
                .find(|slot| {
                    check_position(self.state, first, day, **slot, 1, week_type).is_ok()
                })
                .copied();
            let Some(start_slot) = start else {
                continue;
            };

            let Ok(first_assignments) =
                place(self.state, first, day, start_slot, 1, week_type)
            else {
                continue;
            };

            // Re-probe the end boundary after the start reservation landed
            let end = boundary_slots(shift, false)
                .iter()
                .find(|slot| {
                    check_position(self.state, second, day, **slot, 1, week_type).is_ok()
                })
                .copied();
            if let Some(end_slot) = end {
                if let Ok(second_assignments) =
                    place(self.state, second, day, end_slot, 1, week_type)
                {
                    self.outcome.assignments.extend(first_assignments);
                    self.outcome.assignments.extend(second_assignments);
                    self.placed.insert(first.id.clone());
                    self.placed.insert(second.id.clone());
                    return true;
                }
            }

            // End boundary fell through: undo the start placement
            for a in &first_assignments {
                let instructor = crate::types::InstructorId::normalize(&a.instructor);
                self.state.conflicts.release_slot(
                    &instructor,
                    &a.groups,
                    a.day,
                    a.slot,
                    a.week_type,
                    &a.room_address,
                );
                self.state
                    .conflicts
                    .release_subject_hours(&a.groups, a.day, &a.subject, 1);
                self.state.rooms.release(
                    &crate::types::RoomKey {
                        name: a.room.clone(),
                        address: a.room_address.clone(),
                    },
                    a.day,
                    a.slot,
                    a.week_type,
                );
            }
            if self.state.subgroup_positions.get(&first.id) == Some(&(day, start_slot)) {
                self.state.subgroup_positions.remove(&first.id);
            }
        }
        false
    }

    /// 6B/6C: subgroup labs; critical pairs go to day boundaries
    fn schedule_subgroup(&mut self, stream: &Stream, pairs: &PairTable, streams: &[&Stream]) {
        let pair = pairs.get(&stream.id);

        if let Some(info) = pair.filter(|p| p.critical) {
            let partner = streams.iter().find(|s| s.id == info.partner).copied();
            if let Some(partner) = partner {
                if !self.placed.contains(&stream.id) && !self.placed.contains(&partner.id)
                {
                    let mut any_boundary = false;
                    let week_types: Vec<WeekType> = {
                        let mut wt = Vec::new();
                        if stream.hours.odd > 0 || partner.hours.odd > 0 {
                            wt.push(WeekType::Odd);
                        }
                        if stream.hours.even > 0 || partner.hours.even > 0 {
                            wt.push(WeekType::Even);
                        }
                        wt
                    };
                    for week_type in week_types {
                        let units = match week_type {
                            WeekType::Odd => stream.hours.odd.max(partner.hours.odd),
                            _ => stream.hours.even.max(partner.hours.even),
                        };
                        for _ in 0..units {
                            if self.place_pair_at_boundaries(stream, partner, week_type) {
                                any_boundary = true;
                            } else {
                                break;
                            }
                        }
                    }
                    if any_boundary {
                        return;
                    }
                    // No day admits both boundaries: fall back to
                    // independent placement for both halves
                    self.schedule_plain(stream);
                    self.schedule_plain(partner);
                    return;
                }
            }
        }

        // Different instructors, or the partner is already on the board
        self.schedule_plain(stream);
    }
}

pub(crate) fn run(
    state: &mut PipelineState,
    config: &SchedulerConfig,
    streams: &[Stream],
    scheduled: &HashSet<StreamId>,
    assignments: &[Assignment],
) -> StageOutcome {
    let candidates: Vec<&Stream> = streams
        .iter()
        .filter(|s| {
            s.stream_type == StreamType::Lab
                && !s.groups.is_empty()
                && !scheduled.contains(&s.id)
        })
        .collect();
    debug!(candidates = candidates.len(), "stage 6 filter");

    let pairs = build_subgroup_pairs(&candidates);

    // Lecture days per stream: days carrying a lecture of the same subject
    // for an overlapping group
    let mut lecture_days: HashMap<StreamId, Vec<Day>> = HashMap::new();
    for stream in &candidates {
        let bases: HashSet<String> = stream.groups.iter().map(|g| base_group(g)).collect();
        let mut days: Vec<Day> = assignments
            .iter()
            .filter(|a| {
                a.stream_type == StreamType::Lecture
                    && a.subject == stream.subject
                    && a.groups.iter().any(|g| bases.contains(&base_group(g)))
            })
            .map(|a| a.day)
            .collect();
        days.sort();
        days.dedup();
        lecture_days.insert(stream.id.clone(), days);
    }

    // Partition into the four passes
    let mut multi_group = Vec::new();
    let mut subgroup_constrained = Vec::new();
    let mut subgroup_free = Vec::new();
    let mut single_group = Vec::new();
    for stream in &candidates {
        let has_room_rule = config
            .subject_rooms
            .get(&stream.subject)
            .map(|rule| !rule.specs_for(StreamType::Lab).is_empty())
            .unwrap_or(false);
        if stream.groups.len() >= 2 {
            multi_group.push(*stream);
        } else if stream.is_any_subgroup() && has_room_rule {
            subgroup_constrained.push(*stream);
        } else if stream.is_any_subgroup() {
            subgroup_free.push(*stream);
        } else {
            single_group.push(*stream);
        }
    }

    let mut instructor_streams: HashMap<String, u32> = HashMap::new();
    for stream in &candidates {
        *instructor_streams
            .entry(stream.instructor_id().as_str().to_string())
            .or_insert(0) += 1;
    }
    let sort_pass = |pass: &mut Vec<&Stream>| {
        let mut scored: Vec<(f64, &Stream)> = pass
            .iter()
            .map(|stream| {
                let inputs = ScoreInputs {
                    instructor_load: instructor_streams
                        .get(stream.instructor_id().as_str())
                        .copied()
                        .unwrap_or(1),
                    group_available_slots: 35,
                    has_room_constraint: config.subject_rooms.contains_key(&stream.subject),
                    is_flexible: config.is_flexible_subject(&stream.subject),
                };
                (complexity_score(stream, &config.tuning.weights, inputs), *stream)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        *pass = scored.into_iter().map(|(_, s)| s).collect();
    };
    sort_pass(&mut multi_group);
    sort_pass(&mut subgroup_constrained);
    sort_pass(&mut subgroup_free);
    sort_pass(&mut single_group);

    debug!(
        multi_group = multi_group.len(),
        subgroup_constrained = subgroup_constrained.len(),
        subgroup_free = subgroup_free.len(),
        single_group = single_group.len(),
        "stage 6 passes"
    );

    let mut stage = Stage6 {
        state,
        config,
        outcome: StageOutcome::default(),
        lecture_days,
        placed: HashSet::new(),
    };

    for stream in &multi_group {
        if !stage.placed.contains(&stream.id) {
            stage.schedule_plain(stream);
        }
    }
    for stream in &subgroup_constrained {
        if !stage.placed.contains(&stream.id) {
            stage.schedule_subgroup(stream, &pairs, &candidates);
        }
    }
    for stream in &subgroup_free {
        if !stage.placed.contains(&stream.id) {
            stage.schedule_subgroup(stream, &pairs, &candidates);
        }
    }
    for stream in &single_group {
        if !stage.placed.contains(&stream.id) {
            stage.schedule_plain(stream);
        }
    }

    stage.outcome
}
