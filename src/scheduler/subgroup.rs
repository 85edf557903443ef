use super::search::{check_position, place, place_with_split, PlacementFailure};
use super::{PairInfo, PipelineState};
use crate::types::{Assignment, Day, Shift, Stream, UnscheduledReason, WeekType};

/// Schedule a subgroup stream in parallel with its pair.
///
/// With different instructors both subgroups can run at the same time, so
/// when the sibling is already on the board the exact same (day, slot) is
/// tried first; failing that the stream is placed independently.
pub(crate) fn schedule_parallel_subgroup(
    state: &mut PipelineState,
    stream: &Stream,
    shift: Shift,
    hours: u8,
    week_type: WeekType,
    pair: Option<&PairInfo>,
    day_order: &dyn Fn(&PipelineState) -> Vec<Day>,
) -> Result<Vec<Assignment>, PlacementFailure> {
    if hours == 0 {
        return Ok(Vec::new());
    }

    let mut excluded = Vec::new();
    if let Some(pair) = pair {
        if let Some(&(day, slot)) = state.subgroup_positions.get(&pair.partner) {
            if check_position(state, stream, day, slot, hours, week_type).is_ok() {
                return place(state, stream, day, slot, hours, week_type);
            }
            // The shared position is gone; keep off the sibling's day so
            // the groups never collide half-paired
            excluded.push(day);
        }
    }

    place_with_split(
        state,
        stream,
        shift,
        hours,
        week_type,
        day_order,
        &mut excluded,
    )
    .map_err(|(_, details)| {
        (
            UnscheduledReason::SubgroupPairingFailed,
            format!("Could not find parallel slot: {details}"),
        )
    })
}

/// Schedule one half of a critical pair (same instructor teaches both
/// subgroups) at a day boundary: anchored to the earliest or latest valid
/// slots of a day, so the idle subgroup can arrive late or leave early.
/// The sibling, placed later, finds the opposite boundary taken by the
/// shared instructor's reservation. Falls back to standard scheduling when
/// no boundary admits the stream.
pub(crate) fn schedule_critical_pair(
    state: &mut PipelineState,
    stream: &Stream,
    shift: Shift,
    hours: u8,
    week_type: WeekType,
    pair: Option<&PairInfo>,
    day_order: &dyn Fn(&PipelineState) -> Vec<Day>,
) -> Result<Vec<Assignment>, PlacementFailure> {
    if hours == 0 {
        return Ok(Vec::new());
    }

    let instructor = stream.instructor_id();
    let partner_day = pair
        .and_then(|p| state.subgroup_positions.get(&p.partner))
        .map(|(day, _)| *day);

    if let Some((day, slot)) = find_boundary_position(state, stream, &instructor, shift, hours, week_type, day_order)
    {
        return place(state, stream, day, slot, hours, week_type);
    }

    // Split: a smaller block at a boundary, remainder scheduled normally
    if hours > 1 {
        for partial in (1..hours).rev() {
            let Some((day, slot)) = find_boundary_position(
                state,
                stream,
                &instructor,
                shift,
                partial,
                week_type,
                day_order,
            ) else {
                continue;
            };
            let mut placed = place(state, stream, day, slot, partial, week_type)?;
            let mut excluded = vec![day];
            if let Ok(rest) = place_with_split(
                state,
                stream,
                shift,
                hours - partial,
                week_type,
                day_order,
                &mut excluded,
            ) {
                placed.extend(rest);
            }
            return Ok(placed);
        }
    }

    // No boundary anywhere: standard scheduling is better than nothing,
    // but never on the sibling's day where adjacency could sneak in
    let mut excluded: Vec<Day> = partner_day.into_iter().collect();
    place_with_split(
        state,
        stream,
        shift,
        hours,
        week_type,
        day_order,
        &mut excluded,
    )
}

fn find_boundary_position(
    state: &PipelineState,
    stream: &Stream,
    instructor: &crate::types::InstructorId,
    shift: Shift,
    hours: u8,
    week_type: WeekType,
    day_order: &dyn Fn(&PipelineState) -> Vec<Day>,
) -> Option<(Day, crate::types::Slot)> {
    for day in day_order(state) {
        let positions = state.conflicts.find_day_boundary_slots(
            instructor,
            &stream.groups,
            day,
            shift.slots(),
            hours,
            week_type,
        );
        for (slot, _anchor) in positions {
            if check_position(state, stream, day, slot, hours, week_type).is_ok() {
                return Some((day, slot));
            }
        }
    }
    None
}

/// Standard (non-subgroup) scheduling with split fallback, wrapped for the
/// stage modules
pub(crate) fn schedule_standard(
    state: &mut PipelineState,
    stream: &Stream,
    shift: Shift,
    hours: u8,
    week_type: WeekType,
    day_order: &dyn Fn(&PipelineState) -> Vec<Day>,
) -> Result<Vec<Assignment>, PlacementFailure> {
    if hours == 0 {
        return Ok(Vec::new());
    }
    place_with_split(
        state,
        stream,
        shift,
        hours,
        week_type,
        day_order,
        &mut Vec::new(),
    )
}
