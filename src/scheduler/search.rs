use super::PipelineState;
use crate::types::{Assignment, Day, Shift, Slot, Stream, UnscheduledReason, WeekType};
use crate::scheduler::rooms::RoomQuery;

/// A placement failure: the structured reason plus a detail string naming
/// the offending resource and position
pub type PlacementFailure = (UnscheduledReason, String);

/// Order candidate days for a stream: days on which its groups already
/// have classes come first (consolidation), ties broken by ascending total
/// load; empty days follow, also by ascending load. The underlying sort is
/// stable, so equal-load days keep their input order.
pub fn order_days_by_load(
    state: &PipelineState,
    groups: &[String],
    candidates: &[Day],
) -> Vec<Day> {
    let loads: Vec<(Day, u32)> = candidates
        .iter()
        .map(|day| (*day, state.conflicts.get_groups_total_daily_load(groups, *day)))
        .collect();

    let mut busy: Vec<(Day, u32)> = loads.iter().copied().filter(|(_, l)| *l > 0).collect();
    let mut empty: Vec<(Day, u32)> = loads.into_iter().filter(|(_, l)| *l == 0).collect();
    busy.sort_by_key(|(_, l)| *l);
    empty.sort_by_key(|(_, l)| *l);

    busy.into_iter().chain(empty).map(|(d, _)| d).collect()
}

/// Starting slots that would fill a window in the groups' existing day
/// schedule: slots strictly between two occupied slots that can host
/// `hours` consecutive classes without crossing the occupied boundary
pub fn gap_fill_slots(existing: &[Slot], valid: &[Slot], hours: u8) -> Vec<Slot> {
    if existing.len() < 2 {
        return Vec::new();
    }
    let mut sorted = existing.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Vec::new();
    for pair in sorted.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end - start <= 1 {
            continue;
        }
        for slot in (start + 1)..end {
            if !valid.contains(&slot) {
                continue;
            }
            let fits = (0..hours).all(|j| {
                let s = slot + j;
                valid.contains(&s) && s < end
            });
            if fits {
                out.push(slot);
            }
        }
    }
    out
}

/// The full constraint battery for a block of `hours` starting at `slot`,
/// failing on the first violation with a structured reason:
///
/// 1. subject daily cap (2-hour rule)
/// 2. group daily load cap (6)
/// 3. per slot: building-gap slot, windows cap, instructor/group
///    availability
/// 4. instructor day-of-year constraint
/// 5. room lookup for the whole block, then the building-gap constraint
///    against neighbors for the room found
pub fn check_position(
    state: &PipelineState,
    stream: &Stream,
    day: Day,
    slot: Slot,
    hours: u8,
    week_type: WeekType,
) -> Result<(), PlacementFailure> {
    let tracker = &state.conflicts;

    let (normal_ok, _) =
        tracker.can_add_subject_hours(&stream.groups, day, &stream.subject, hours as u32);
    if !normal_ok {
        return Err((
            UnscheduledReason::SubjectDailyLimitExceeded,
            format!(
                "Adding {hours} hour(s) would exceed the 2-hour limit for subject \
                 '{}' on {day}",
                stream.subject
            ),
        ));
    }

    if let Some(group) = tracker.would_exceed_daily_load(&stream.groups, day, hours as u32)
    {
        return Err((
            UnscheduledReason::DailyLoadExceeded,
            format!("Group '{group}' would exceed 6 lessons on {day}"),
        ));
    }

    let instructor = stream.instructor_id();
    for i in 0..hours {
        let current = slot + i;

        if let Some(group) = tracker.is_building_gap_slot(&stream.groups, day, current) {
            return Err((
                UnscheduledReason::BuildingGapRequired,
                format!("Slot {current} is a required travel gap for group '{group}'"),
            ));
        }

        if let Some(group) = tracker.would_create_second_window(
            &stream.groups,
            day,
            current,
            tracker.max_windows(),
        ) {
            return Err((
                UnscheduledReason::MaxWindowsExceeded,
                format!("Group '{group}' would have too many windows on {day}"),
            ));
        }

        tracker.check_slot_availability_reason(
            &instructor,
            &stream.groups,
            day,
            current,
            week_type,
        )?;
    }

    if let Err(details) =
        tracker.check_instructor_day_constraint(&instructor, day, &stream.groups)
    {
        return Err((UnscheduledReason::InstructorDayConstraint, details));
    }

    let slots: Vec<Slot> = (0..hours).map(|i| slot + i).collect();
    let query = RoomQuery::for_stream(stream);
    let Some(room) = state.rooms.find_room_for_block(&query, day, &slots, week_type)
    else {
        return Err((
            UnscheduledReason::NoRoomAvailable,
            format!(
                "No room with capacity >= {} on {day} slot {slot}",
                stream.student_count
            ),
        ));
    };

    for current in &slots {
        if let Err(details) = tracker.check_building_gap_constraint(
            &stream.groups,
            day,
            *current,
            &room.address,
            week_type,
        ) {
            return Err((UnscheduledReason::BuildingGapRequired, details));
        }
    }

    Ok(())
}

/// Search the ordered day x slot space for the first position that passes
/// the constraint battery. Gap-filling slots are tried before the shift's
/// slots in ascending order; the first-shift overflow bucket (slots 6-7)
/// is tried only after every standard position across all days failed.
pub fn find_position(
    state: &PipelineState,
    stream: &Stream,
    shift: Shift,
    hours: u8,
    week_type: WeekType,
    days: &[Day],
) -> Result<(Day, Slot), PlacementFailure> {
    let valid = shift.slots();
    let extended = shift.extended_slots();

    let mut last_failure: Option<PlacementFailure> = None;
    let mut tried = 0usize;

    let mut attempt = |state: &PipelineState,
                       day: Day,
                       slot: Slot,
                       tried: &mut usize,
                       last: &mut Option<PlacementFailure>|
     -> bool {
        *tried += 1;
        match check_position(state, stream, day, slot, hours, week_type) {
            Ok(()) => true,
            Err(failure) => {
                *last = Some(failure);
                false
            }
        }
    };

    for day in days {
        // Fill windows in the groups' existing schedule first
        let mut existing: Vec<Slot> = Vec::new();
        for group in &stream.groups {
            existing.extend(state.conflicts.group_slots_on_day(group, *day));
        }
        if !existing.is_empty() {
            for slot in gap_fill_slots(&existing, valid, hours) {
                if attempt(state, *day, slot, &mut tried, &mut last_failure) {
                    return Ok((*day, slot));
                }
            }
        }

        for &slot in valid {
            if hours > 1 && !(0..hours).all(|i| valid.contains(&(slot + i))) {
                continue;
            }
            if attempt(state, *day, slot, &mut tried, &mut last_failure) {
                return Ok((*day, slot));
            }
        }
    }

    // First-shift overflow: competes with second-shift reservations on
    // equal footing and fails if occupied
    for &slot in shift.overflow_slots() {
        for day in days {
            if hours > 1 && !(0..hours).all(|i| extended.contains(&(slot + i))) {
                continue;
            }
            if attempt(state, *day, slot, &mut tried, &mut last_failure) {
                return Ok((*day, slot));
            }
        }
    }

    if tried == 0 {
        return Err((
            UnscheduledReason::AllSlotsExhausted,
            "No valid slots available for this stream's shift".to_string(),
        ));
    }
    match last_failure {
        Some((reason, details)) => Err((reason, format!("Tried {tried} positions. {details}"))),
        None => Err((
            UnscheduledReason::AllSlotsExhausted,
            format!("All {tried} positions exhausted"),
        )),
    }
}

/// Commit a validated position: find one room for the whole block, reserve
/// every slot and emit one assignment per hour. The block shares (day,
/// room, week type) and occupies consecutive slots.
pub fn place(
    state: &mut PipelineState,
    stream: &Stream,
    day: Day,
    start_slot: Slot,
    hours: u8,
    week_type: WeekType,
) -> Result<Vec<Assignment>, PlacementFailure> {
    let slots: Vec<Slot> = (0..hours).map(|i| start_slot + i).collect();
    let query = RoomQuery::for_stream(stream);
    let room = state
        .rooms
        .find_room_for_block(&query, day, &slots, week_type)
        .ok_or_else(|| {
            (
                UnscheduledReason::NoRoomAvailable,
                format!(
                    "No room with capacity >= {} available on {day} slot {start_slot}",
                    stream.student_count
                ),
            )
        })?
        .clone();

    let instructor = stream.instructor_id();
    let mut assignments = Vec::with_capacity(hours as usize);
    for &slot in &slots {
        assignments.push(Assignment {
            stream_id: stream.id.clone(),
            subject: stream.subject.clone(),
            stream_type: stream.stream_type,
            instructor: stream.instructor.clone(),
            groups: stream.groups.clone(),
            student_count: stream.student_count,
            day,
            slot,
            room: room.name.clone(),
            room_address: room.address.clone(),
            week_type,
        });

        state
            .conflicts
            .reserve(&instructor, &stream.groups, day, slot, week_type, &room.address);
        state.rooms.reserve(&room, day, slot, week_type);
    }
    state
        .conflicts
        .reserve_subject_hours(&stream.groups, day, &stream.subject, hours as u32);

    if stream.is_any_subgroup() {
        state
            .subgroup_positions
            .entry(stream.id.clone())
            .or_insert((day, start_slot));
    }

    Ok(assignments)
}

/// Place `hours` consecutive hours, falling back to *split scheduling*:
/// progressively smaller contiguous blocks, with the remainder scheduled
/// recursively on other days. Partial success is preferred to total
/// failure, so a partly-placed stream returns its assignments even when
/// the remainder cannot be placed.
pub fn place_with_split(
    state: &mut PipelineState,
    stream: &Stream,
    shift: Shift,
    hours: u8,
    week_type: WeekType,
    day_order: &dyn Fn(&PipelineState) -> Vec<Day>,
    excluded_days: &mut Vec<Day>,
) -> Result<Vec<Assignment>, PlacementFailure> {
    if hours == 0 {
        return Ok(Vec::new());
    }

    let days: Vec<Day> = day_order(state)
        .into_iter()
        .filter(|d| !excluded_days.contains(d))
        .collect();

    match find_position(state, stream, shift, hours, week_type, &days) {
        Ok((day, slot)) => {
            let assignments = place(state, stream, day, slot, hours, week_type)?;
            excluded_days.push(day);
            Ok(assignments)
        }
        Err(failure) => {
            if hours > 1 {
                for partial in (1..hours).rev() {
                    let Ok((day, slot)) =
                        find_position(state, stream, shift, partial, week_type, &days)
                    else {
                        continue;
                    };
                    let mut placed = place(state, stream, day, slot, partial, week_type)?;
                    excluded_days.push(day);
                    if let Ok(rest) = place_with_split(
                        state,
                        stream,
                        shift,
                        hours - partial,
                        week_type,
                        day_order,
                        excluded_days,
                    ) {
                        placed.extend(rest);
                    }
                    return Ok(placed);
                }
            }
            Err(failure)
        }
    }
}
