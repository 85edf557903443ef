use super::{Severity, Violation};
use crate::scheduler::build_subgroup_pairs;
use crate::types::{
    base_group, parse_subgroup, specialties_of, Assignment, Day, InstructorId,
    ScheduleResult, SchedulerConfig, Slot, Stream, WeekType,
};
use std::collections::{BTreeMap, HashMap, HashSet};

fn error(constraint: &'static str, message: String) -> Violation {
    Violation {
        constraint,
        message,
        severity: Severity::Error,
    }
}

/// Whether two week types occupy overlapping academic weeks
fn weeks_overlap(a: WeekType, b: WeekType) -> bool {
    a == b || a == WeekType::Both || b == WeekType::Both
}

/// At most one assignment per (instructor, day, slot) with week type
/// `both`, or one `odd` plus one `even`, never `both` alongside either
pub fn check_instructor_conflicts(result: &ScheduleResult) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut seen: HashMap<(InstructorId, Day, Slot), Vec<WeekType>> = HashMap::new();

    for a in &result.assignments {
        let key = (InstructorId::normalize(&a.instructor), a.day, a.slot);
        let weeks = seen.entry(key.clone()).or_default();
        if weeks.iter().any(|w| weeks_overlap(*w, a.week_type)) {
            violations.push(error(
                "NoInstructorConflict",
                format!(
                    "Instructor '{}' double-booked on {} slot {} ({})",
                    key.0, a.day, a.slot, a.week_type
                ),
            ));
        }
        weeks.push(a.week_type);
    }
    violations
}

/// Same rule per base group, except subgroup siblings: two assignments may
/// share a position when both carry distinct subgroup markers
pub fn check_group_conflicts(result: &ScheduleResult) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut seen: HashMap<(String, Day, Slot), Vec<(WeekType, Option<u8>)>> =
        HashMap::new();

    for a in &result.assignments {
        let mut bases_here: HashSet<String> = HashSet::new();
        for group in &a.groups {
            let base = base_group(group);
            if !bases_here.insert(base.clone()) {
                continue;
            }
            let marker = parse_subgroup(group);
            let entries = seen.entry((base.clone(), a.day, a.slot)).or_default();
            for (week, other_marker) in entries.iter() {
                if !weeks_overlap(*week, a.week_type) {
                    continue;
                }
                let siblings = matches!(
                    (marker, other_marker),
                    (Some(m), Some(o)) if m != *o
                );
                if !siblings {
                    violations.push(error(
                        "NoGroupConflict",
                        format!(
                            "Group '{base}' double-booked on {} slot {} ({})",
                            a.day, a.slot, a.week_type
                        ),
                    ));
                }
            }
            entries.push((a.week_type, marker));
        }
    }
    violations
}

/// At most one class per (room, address, day, slot) under the week rule
pub fn check_room_conflicts(result: &ScheduleResult) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut seen: HashMap<(String, String, Day, Slot), Vec<WeekType>> = HashMap::new();

    for a in &result.assignments {
        let key = (a.room.clone(), a.room_address.clone(), a.day, a.slot);
        let weeks = seen.entry(key).or_default();
        if weeks.iter().any(|w| weeks_overlap(*w, a.week_type)) {
            violations.push(error(
                "NoRoomConflict",
                format!(
                    "Room '{}' at '{}' double-booked on {} slot {}",
                    a.room, a.room_address, a.day, a.slot
                ),
            ));
        }
        weeks.push(a.week_type);
    }
    violations
}

/// No assignment may sit on a weekly-unavailable (day, time) of its
/// instructor
pub fn check_instructor_availability(
    result: &ScheduleResult,
    config: &SchedulerConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for a in &result.assignments {
        let id = InstructorId::normalize(&a.instructor);
        let unavailable = config
            .weekly_unavailable
            .get(&id)
            .and_then(|days| days.get(&a.day))
            .map(|slots| slots.contains(&a.slot))
            .unwrap_or(false);
        if unavailable {
            violations.push(error(
                "InstructorAvailability",
                format!(
                    "Instructor '{id}' is unavailable on {} slot {}",
                    a.day, a.slot
                ),
            ));
        }
    }
    violations
}

/// Every assignment sits in its stream's shift, extended-first-shift
/// overflow permitted for first-shift streams
pub fn check_shifts(
    result: &ScheduleResult,
    streams: &[Stream],
    config: &SchedulerConfig,
) -> Vec<Violation> {
    let by_id: HashMap<_, _> = streams.iter().map(|s| (&s.id, s)).collect();
    let mut violations = Vec::new();

    for a in &result.assignments {
        let Some(stream) = by_id.get(&a.stream_id) else {
            continue;
        };
        let shift = stream.shift(&config.second_shift_groups);
        if !shift.extended_slots().contains(&a.slot) {
            violations.push(error(
                "ShiftRespected",
                format!(
                    "Stream '{}' placed at slot {} outside its {} shift",
                    a.stream_id,
                    a.slot,
                    shift.as_str()
                ),
            ));
        }
    }
    violations
}

/// Subject-declared required rooms are honored, per stream type
pub fn check_subject_rooms(
    result: &ScheduleResult,
    config: &SchedulerConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for a in &result.assignments {
        let Some(rule) = config.subject_rooms.get(&a.subject) else {
            continue;
        };
        let specs = rule.specs_for(a.stream_type);
        if specs.is_empty() {
            continue;
        }
        let allowed = specs.iter().any(|spec| {
            spec.address == a.room_address
                && spec.room.as_deref().map(|r| r == a.room).unwrap_or(true)
        });
        if !allowed {
            violations.push(error(
                "SubjectRoomRule",
                format!(
                    "Subject '{}' ({}) placed in '{}' at '{}', outside its \
                     required rooms",
                    a.subject, a.stream_type, a.room, a.room_address
                ),
            ));
        }
    }
    violations
}

/// Reserved buildings host only their designated specialties
pub fn check_reserved_buildings(
    result: &ScheduleResult,
    config: &SchedulerConfig,
) -> Vec<Violation> {
    let mut reserved: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (specialty, rule) in &config.group_buildings {
        for spec in &rule.addresses {
            reserved
                .entry(spec.address.as_str())
                .or_default()
                .insert(specialty.as_str());
        }
    }

    let mut violations = Vec::new();
    for a in &result.assignments {
        let Some(allowed) = reserved.get(a.room_address.as_str()) else {
            continue;
        };
        for specialty in specialties_of(&a.groups) {
            if !allowed.contains(specialty.as_str()) {
                violations.push(error(
                    "ReservedBuilding",
                    format!(
                        "Specialty '{specialty}' assigned into reserved building \
                         '{}'",
                        a.room_address
                    ),
                ));
            }
        }
    }
    violations
}

/// No base group exceeds 6 assignments on one day
pub fn check_daily_load(result: &ScheduleResult) -> Vec<Violation> {
    let mut counts: BTreeMap<(String, Day), u32> = BTreeMap::new();
    for a in &result.assignments {
        let mut bases: Vec<String> = a.groups.iter().map(|g| base_group(g)).collect();
        bases.sort();
        bases.dedup();
        for base in bases {
            *counts.entry((base, a.day)).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 6)
        .map(|((base, day), count)| {
            error(
                "DailyLoad",
                format!("Group '{base}' has {count} assignments on {day} (max 6)"),
            )
        })
        .collect()
}

/// No base group exceeds 2 hours of one subject on one day
pub fn check_subject_daily_cap(result: &ScheduleResult) -> Vec<Violation> {
    let mut counts: BTreeMap<(String, Day, String), u32> = BTreeMap::new();
    for a in &result.assignments {
        let mut bases: Vec<String> = a.groups.iter().map(|g| base_group(g)).collect();
        bases.sort();
        bases.dedup();
        for base in bases {
            *counts.entry((base, a.day, a.subject.clone())).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 2)
        .map(|((base, day, subject), count)| {
            error(
                "SubjectDailyCap",
                format!(
                    "Group '{base}' has {count} hours of '{subject}' on {day} (max 2)"
                ),
            )
        })
        .collect()
}

/// Consecutive classes of a base group sit in the same nearby-cluster;
/// building changes outside a cluster need an empty travel slot between
pub fn check_building_gaps(
    result: &ScheduleResult,
    config: &SchedulerConfig,
) -> Vec<Violation> {
    // (base, day) -> slot -> addresses
    let mut schedule: BTreeMap<(String, Day), BTreeMap<Slot, Vec<&str>>> = BTreeMap::new();
    for a in &result.assignments {
        let mut bases: Vec<String> = a.groups.iter().map(|g| base_group(g)).collect();
        bases.sort();
        bases.dedup();
        for base in bases {
            schedule
                .entry((base, a.day))
                .or_default()
                .entry(a.slot)
                .or_default()
                .push(&a.room_address);
        }
    }

    let mut violations = Vec::new();
    for ((base, day), slots) in &schedule {
        let entries: Vec<(&Slot, &Vec<&str>)> = slots.iter().collect();
        for pair in entries.windows(2) {
            let ((slot_a, addrs_a), (slot_b, addrs_b)) = (pair[0], pair[1]);
            if *slot_b - *slot_a != 1 {
                continue;
            }
            for addr_a in addrs_a {
                for addr_b in addrs_b {
                    if !config.are_buildings_nearby(addr_a, addr_b) {
                        violations.push(error(
                            "BuildingChangeGap",
                            format!(
                                "Group '{base}' moves from '{addr_a}' (slot {slot_a}) \
                                 to '{addr_b}' (slot {slot_b}) on {day} without a \
                                 travel gap"
                            ),
                        ));
                    }
                }
            }
        }
    }
    violations
}

/// The assignments of one stream on one (day, week type) form one
/// contiguous block in a single room
pub fn check_multi_hour_contiguity(result: &ScheduleResult) -> Vec<Violation> {
    let mut blocks: BTreeMap<(String, Day, WeekType), Vec<&Assignment>> = BTreeMap::new();
    for a in &result.assignments {
        blocks
            .entry((a.stream_id.0.clone(), a.day, a.week_type))
            .or_default()
            .push(a);
    }

    let mut violations = Vec::new();
    for ((stream_id, day, _week), mut block) in blocks {
        if block.len() < 2 {
            continue;
        }
        block.sort_by_key(|a| a.slot);
        for pair in block.windows(2) {
            if pair[1].slot != pair[0].slot + 1 {
                violations.push(error(
                    "MultiHourContiguity",
                    format!(
                        "Stream '{stream_id}' occupies non-consecutive slots {} and \
                         {} on {day}",
                        pair[0].slot, pair[1].slot
                    ),
                ));
            }
            if pair[1].room != pair[0].room || pair[1].room_address != pair[0].room_address
            {
                violations.push(error(
                    "MultiHourContiguity",
                    format!(
                        "Stream '{stream_id}' changes room mid-block on {day} \
                         ('{}' -> '{}')",
                        pair[0].room, pair[1].room
                    ),
                ));
            }
        }
    }
    violations
}

/// Subgroup siblings placed on the same day share their start slot when
/// taught by different instructors, or sit apart at the day's boundaries
/// (never adjacent) when taught by the same instructor
pub fn check_subgroup_pairing(result: &ScheduleResult, streams: &[Stream]) -> Vec<Violation> {
    let refs: Vec<&Stream> = streams.iter().collect();
    let pairs = build_subgroup_pairs(&refs);

    let mut by_stream: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for a in &result.assignments {
        by_stream.entry(a.stream_id.0.as_str()).or_default().push(a);
    }

    let mut violations = Vec::new();
    let mut checked: HashSet<(&str, &str)> = HashSet::new();

    for (id, info) in &pairs {
        let (first, second) = (id.0.as_str(), info.partner.0.as_str());
        if !checked.insert((first.min(second), first.max(second))) {
            continue;
        }
        let Some(a_list) = by_stream.get(first) else {
            continue;
        };
        let Some(b_list) = by_stream.get(second) else {
            continue;
        };

        for day in Day::ALL {
            let a_slots: Vec<Slot> = a_list
                .iter()
                .filter(|a| a.day == day)
                .map(|a| a.slot)
                .collect();
            let b_slots: Vec<Slot> = b_list
                .iter()
                .filter(|a| a.day == day)
                .map(|a| a.slot)
                .collect();
            if a_slots.is_empty() || b_slots.is_empty() {
                continue;
            }
            let a_start = *a_slots.iter().min().expect("non-empty");
            let b_start = *b_slots.iter().min().expect("non-empty");

            if info.critical {
                let a_end = *a_slots.iter().max().expect("non-empty");
                let b_end = *b_slots.iter().max().expect("non-empty");
                let gap_ok = if a_start < b_start {
                    b_start > a_end + 1
                } else {
                    a_start > b_end + 1
                };
                if !gap_ok {
                    violations.push(error(
                        "SubgroupPairing",
                        format!(
                            "Critical pair '{first}'/'{second}' sits adjacent on \
                             {day} instead of at day boundaries"
                        ),
                    ));
                }
            } else if a_start != b_start {
                violations.push(error(
                    "SubgroupPairing",
                    format!(
                        "Subgroup pair '{first}'/'{second}' diverges on {day} \
                         (slots {a_start} vs {b_start})"
                    ),
                ));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StreamId, StreamType};

    fn assignment(
        stream: &str,
        instructor: &str,
        group: &str,
        day: Day,
        slot: Slot,
        week: WeekType,
    ) -> Assignment {
        Assignment {
            stream_id: StreamId(stream.to_string()),
            subject: "Subj".to_string(),
            stream_type: StreamType::Practical,
            instructor: instructor.to_string(),
            groups: vec![group.to_string()],
            student_count: 20,
            day,
            slot,
            room: "101".to_string(),
            room_address: "Addr1".to_string(),
            week_type: week,
        }
    }

    fn result_with(assignments: Vec<Assignment>) -> ScheduleResult {
        let mut result = ScheduleResult::new(7);
        result.assignments = assignments;
        result
    }

    #[test]
    fn test_detects_instructor_conflict() {
        let result = result_with(vec![
            assignment("a", "Иванов И.И.", "Г-21", Day::Monday, 1, WeekType::Both),
            assignment("b", "а.о. Иванов И.И.", "Г-23", Day::Monday, 1, WeekType::Odd),
        ]);
        assert_eq!(check_instructor_conflicts(&result).len(), 1);
    }

    #[test]
    fn test_odd_even_instructor_pair_allowed() {
        let result = result_with(vec![
            assignment("a", "Иванов И.И.", "Г-21", Day::Monday, 1, WeekType::Odd),
            assignment("b", "Иванов И.И.", "Г-23", Day::Monday, 1, WeekType::Even),
        ]);
        assert!(check_instructor_conflicts(&result).is_empty());
    }

    #[test]
    fn test_detects_group_conflict() {
        let result = result_with(vec![
            assignment("a", "I1", "Г-21 О", Day::Monday, 1, WeekType::Both),
            assignment("b", "I2", "Г-21 О", Day::Monday, 1, WeekType::Both),
        ]);
        assert_eq!(check_group_conflicts(&result).len(), 1);
    }

    #[test]
    fn test_subgroup_siblings_allowed_to_share_slot() {
        let result = result_with(vec![
            assignment("a", "I1", "Г-21 О /1/", Day::Monday, 1, WeekType::Both),
            assignment("b", "I2", "Г-21 О /2/", Day::Monday, 1, WeekType::Both),
        ]);
        assert!(check_group_conflicts(&result).is_empty());
    }

    #[test]
    fn test_whole_group_conflicts_with_subgroup() {
        let result = result_with(vec![
            assignment("a", "I1", "Г-21 О /1/", Day::Monday, 1, WeekType::Both),
            assignment("b", "I2", "Г-21 О", Day::Monday, 1, WeekType::Both),
        ]);
        assert_eq!(check_group_conflicts(&result).len(), 1);
    }

    #[test]
    fn test_detects_room_conflict() {
        let result = result_with(vec![
            assignment("a", "I1", "Г-21", Day::Monday, 1, WeekType::Both),
            assignment("b", "I2", "Г-23", Day::Monday, 1, WeekType::Even),
        ]);
        assert_eq!(check_room_conflicts(&result).len(), 1);
    }

    #[test]
    fn test_room_reuse_across_addresses_allowed() {
        let mut a = assignment("a", "I1", "Г-21", Day::Monday, 1, WeekType::Both);
        let mut b = assignment("b", "I2", "Г-23", Day::Monday, 1, WeekType::Both);
        a.room_address = "AddrX".to_string();
        b.room_address = "AddrY".to_string();
        let result = result_with(vec![a, b]);
        assert!(check_room_conflicts(&result).is_empty());
    }

    #[test]
    fn test_daily_load_cap() {
        let assignments: Vec<Assignment> = (1..=7)
            .map(|slot| {
                assignment(
                    &format!("s{slot}"),
                    &format!("I{slot}"),
                    "Г-21 О",
                    Day::Monday,
                    slot,
                    WeekType::Both,
                )
            })
            .collect();
        let result = result_with(assignments);
        assert_eq!(check_daily_load(&result).len(), 1);
    }

    #[test]
    fn test_subject_daily_cap() {
        let assignments: Vec<Assignment> = (1..=3)
            .map(|slot| {
                assignment(
                    &format!("s{slot}"),
                    &format!("I{slot}"),
                    "Г-21 О",
                    Day::Monday,
                    slot,
                    WeekType::Both,
                )
            })
            .collect();
        let result = result_with(assignments);
        assert_eq!(check_subject_daily_cap(&result).len(), 1);
    }

    #[test]
    fn test_building_gap_violation() {
        let mut a = assignment("a", "I1", "Г-21 О", Day::Monday, 2, WeekType::Both);
        let mut b = assignment("b", "I2", "Г-21 О", Day::Monday, 3, WeekType::Both);
        a.room_address = "AddrA".to_string();
        b.room_address = "AddrB".to_string();
        let result = result_with(vec![a, b]);
        let config = SchedulerConfig::default();
        assert_eq!(check_building_gaps(&result, &config).len(), 1);
    }

    #[test]
    fn test_building_gap_ok_within_cluster() {
        let mut a = assignment("a", "I1", "Г-21 О", Day::Monday, 2, WeekType::Both);
        let mut b = assignment("b", "I2", "Г-21 О", Day::Monday, 3, WeekType::Both);
        a.room_address = "AddrA".to_string();
        b.room_address = "AddrB".to_string();
        let result = result_with(vec![a, b]);

        let mut config = SchedulerConfig::default();
        config.set_nearby_buildings(crate::types::NearbyBuildings {
            groups: vec![crate::types::NearbyCluster {
                addresses: vec!["AddrA".to_string(), "AddrB".to_string()],
            }],
        });
        assert!(check_building_gaps(&result, &config).is_empty());
    }

    #[test]
    fn test_contiguity_violation() {
        let result = result_with(vec![
            assignment("a", "I1", "Г-21 О", Day::Monday, 1, WeekType::Both),
            assignment("a", "I1", "Г-21 О", Day::Monday, 3, WeekType::Both),
        ]);
        assert_eq!(check_multi_hour_contiguity(&result).len(), 1);
    }

    #[test]
    fn test_contiguous_block_passes() {
        let result = result_with(vec![
            assignment("a", "I1", "Г-21 О", Day::Monday, 1, WeekType::Both),
            assignment("a", "I1", "Г-21 О", Day::Monday, 2, WeekType::Both),
        ]);
        assert!(check_multi_hour_contiguity(&result).is_empty());
    }
}
