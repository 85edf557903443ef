use crate::types::{
    base_group, parse_subgroup, parse_year, Assignment, Day, DayRule, InstructorId,
    SchedulerConfig, Slot, UnscheduledReason, WeekType, slot_to_time,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Where a day-boundary candidate anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryAnchor {
    DayStart,
    DayEnd,
}

/// The single source of truth for "is this (resource, day, slot, week-type)
/// free, and if not, why?".
///
/// Exclusion maps key instructors by normalized id and groups by base
/// group plus subgroup marker, so siblings ("АРХ-21 О /1/" vs "/2/") can
/// share a slot while a whole-group class still excludes both. The load,
/// subject and building counters key by *base* group: they track what the
/// students of a group experience per day.
///
/// Probes never mutate state. Mutating operations trust that the caller
/// validated the position first and repeat no checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictTracker {
    /// (day, slot, week_type) -> instructors teaching
    instructor_slots: HashMap<(Day, Slot, WeekType), HashSet<InstructorId>>,
    /// (day, slot, week_type) -> base group -> subgroup markers in class.
    /// `None` marks the whole group; a whole-group entry blocks every
    /// subgroup and vice versa, while sibling subgroups coexist.
    group_slots: HashMap<(Day, Slot, WeekType), HashMap<String, BTreeSet<Option<u8>>>>,
    /// (base group, day) -> total assignments
    group_daily_load: HashMap<(String, Day), u32>,
    /// (base group, day, subject) -> hours
    subject_hours: HashMap<(String, Day, String), u32>,
    /// (base group, day) -> slot -> reservation count
    base_slot_counts: HashMap<(String, Day), BTreeMap<Slot, u32>>,
    /// (base group, day, slot) -> building addresses, in reservation order
    group_buildings: HashMap<(String, Day, Slot), Vec<String>>,
    /// Total scheduled hours per instructor, for complexity scoring
    instructor_hours: HashMap<InstructorId, u32>,
    /// Total scheduled hours per base group, for complexity scoring
    group_hours: HashMap<String, u32>,
    /// instructor -> day -> reservation count, for one-day-per-week rules
    instructor_days: HashMap<InstructorId, BTreeMap<Day, u32>>,

    // Static configuration loaded at construction
    weekly_unavailable: HashMap<InstructorId, HashMap<Day, BTreeSet<Slot>>>,
    day_rules: HashMap<InstructorId, DayRule>,
    nearby: Vec<BTreeSet<String>>,
    max_windows: u8,
}

impl ConflictTracker {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            weekly_unavailable: config.weekly_unavailable.clone(),
            day_rules: config.day_rules.clone(),
            nearby: config.nearby.clone(),
            max_windows: config.tuning.max_windows,
            ..Self::default()
        }
    }

    /// Materialize prior assignments into the reservation state
    pub fn load_assignments(&mut self, assignments: &[Assignment]) {
        for a in assignments {
            let instructor = InstructorId::normalize(&a.instructor);
            self.reserve(
                &instructor,
                &a.groups,
                a.day,
                a.slot,
                a.week_type,
                &a.room_address,
            );
            self.reserve_subject_hours(&a.groups, a.day, &a.subject, 1);
        }
    }

    fn distinct_bases(groups: &[String]) -> Vec<String> {
        let mut bases: Vec<String> = groups.iter().map(|g| base_group(g)).collect();
        bases.sort();
        bases.dedup();
        bases
    }

    // ---- mutation -------------------------------------------------------

    /// Reserve a slot for an instructor and groups. Precondition: the
    /// caller validated availability; nothing is re-checked here.
    pub fn reserve(
        &mut self,
        instructor: &InstructorId,
        groups: &[String],
        day: Day,
        slot: Slot,
        week_type: WeekType,
        address: &str,
    ) {
        self.instructor_slots
            .entry((day, slot, week_type))
            .or_default()
            .insert(instructor.clone());
        *self.instructor_hours.entry(instructor.clone()).or_insert(0) += 1;
        *self
            .instructor_days
            .entry(instructor.clone())
            .or_default()
            .entry(day)
            .or_insert(0) += 1;

        let group_map = self.group_slots.entry((day, slot, week_type)).or_default();
        for group in groups {
            group_map
                .entry(base_group(group))
                .or_default()
                .insert(parse_subgroup(group));
        }

        for base in Self::distinct_bases(groups) {
            *self
                .group_daily_load
                .entry((base.clone(), day))
                .or_insert(0) += 1;
            *self
                .base_slot_counts
                .entry((base.clone(), day))
                .or_default()
                .entry(slot)
                .or_insert(0) += 1;
            self.group_buildings
                .entry((base.clone(), day, slot))
                .or_default()
                .push(address.to_string());
            *self.group_hours.entry(base).or_insert(0) += 1;
        }
    }

    /// Exact inverse of [`reserve`]; used by optimizer moves
    pub fn release_slot(
        &mut self,
        instructor: &InstructorId,
        groups: &[String],
        day: Day,
        slot: Slot,
        week_type: WeekType,
        address: &str,
    ) {
        if let Some(set) = self.instructor_slots.get_mut(&(day, slot, week_type)) {
            set.remove(instructor);
            if set.is_empty() {
                self.instructor_slots.remove(&(day, slot, week_type));
            }
        }
        decrement(&mut self.instructor_hours, instructor.clone());
        if let Some(days) = self.instructor_days.get_mut(instructor) {
            if let Some(count) = days.get_mut(&day) {
                *count -= 1;
                if *count == 0 {
                    days.remove(&day);
                }
            }
            if days.is_empty() {
                self.instructor_days.remove(instructor);
            }
        }

        if let Some(group_map) = self.group_slots.get_mut(&(day, slot, week_type)) {
            for group in groups {
                let base = base_group(group);
                if let Some(markers) = group_map.get_mut(&base) {
                    markers.remove(&parse_subgroup(group));
                    if markers.is_empty() {
                        group_map.remove(&base);
                    }
                }
            }
            if group_map.is_empty() {
                self.group_slots.remove(&(day, slot, week_type));
            }
        }

        for base in Self::distinct_bases(groups) {
            decrement(&mut self.group_daily_load, (base.clone(), day));
            if let Some(counts) = self.base_slot_counts.get_mut(&(base.clone(), day)) {
                if let Some(count) = counts.get_mut(&slot) {
                    *count -= 1;
                    if *count == 0 {
                        counts.remove(&slot);
                    }
                }
                if counts.is_empty() {
                    self.base_slot_counts.remove(&(base.clone(), day));
                }
            }
            if let Some(addrs) = self.group_buildings.get_mut(&(base.clone(), day, slot))
            {
                if let Some(pos) = addrs.iter().rposition(|a| a == address) {
                    addrs.remove(pos);
                }
                if addrs.is_empty() {
                    self.group_buildings.remove(&(base.clone(), day, slot));
                }
            }
            decrement(&mut self.group_hours, base);
        }
    }

    /// Count `count` hours of a subject against each group's daily cap
    pub fn reserve_subject_hours(
        &mut self,
        groups: &[String],
        day: Day,
        subject: &str,
        count: u32,
    ) {
        for base in Self::distinct_bases(groups) {
            *self
                .subject_hours
                .entry((base, day, subject.to_string()))
                .or_insert(0) += count;
        }
    }

    /// Inverse of [`reserve_subject_hours`]
    pub fn release_subject_hours(
        &mut self,
        groups: &[String],
        day: Day,
        subject: &str,
        count: u32,
    ) {
        for base in Self::distinct_bases(groups) {
            let key = (base, day, subject.to_string());
            if let Some(existing) = self.subject_hours.get_mut(&key) {
                *existing = existing.saturating_sub(count);
                if *existing == 0 {
                    self.subject_hours.remove(&key);
                }
            }
        }
    }

    // ---- availability probes -------------------------------------------

    /// Whether the instructor is weekly-unavailable at the slot's clock time
    fn is_weekly_unavailable(&self, instructor: &InstructorId, day: Day, slot: Slot) -> bool {
        self.weekly_unavailable
            .get(instructor)
            .and_then(|days| days.get(&day))
            .map(|slots| slots.contains(&slot))
            .unwrap_or(false)
    }

    /// Instructor availability including weekly unavailability and the
    /// Both<->{Odd,Even} cross-blocking rule
    pub fn is_instructor_available(
        &self,
        instructor: &InstructorId,
        day: Day,
        slot: Slot,
        week_type: WeekType,
    ) -> bool {
        if self.is_weekly_unavailable(instructor, day, slot) {
            return false;
        }
        !week_type.conflicting().iter().any(|wt| {
            self.instructor_slots
                .get(&(day, slot, *wt))
                .map(|set| set.contains(instructor))
                .unwrap_or(false)
        })
    }

    /// All groups free at the slot under the cross-blocking rule. A
    /// sibling subgroup does not block its pair, but a whole-group class
    /// blocks every subgroup and a subgroup class blocks the whole group.
    pub fn are_groups_available(
        &self,
        groups: &[String],
        day: Day,
        slot: Slot,
        week_type: WeekType,
    ) -> bool {
        groups.iter().all(|group| {
            let base = base_group(group);
            let marker = parse_subgroup(group);
            !week_type.conflicting().iter().any(|wt| {
                let Some(markers) = self
                    .group_slots
                    .get(&(day, slot, *wt))
                    .and_then(|map| map.get(&base))
                else {
                    return false;
                };
                match marker {
                    // Whole group asks: any reservation of the base blocks
                    None => !markers.is_empty(),
                    // Subgroup asks: the whole group or the same marker blocks
                    Some(m) => markers.contains(&None) || markers.contains(&Some(m)),
                }
            })
        })
    }

    pub fn is_slot_available(
        &self,
        instructor: &InstructorId,
        groups: &[String],
        day: Day,
        slot: Slot,
        week_type: WeekType,
    ) -> bool {
        self.is_instructor_available(instructor, day, slot, week_type)
            && self.are_groups_available(groups, day, slot, week_type)
    }

    pub fn are_consecutive_slots_available(
        &self,
        instructor: &InstructorId,
        groups: &[String],
        day: Day,
        start_slot: Slot,
        hours: u8,
        week_type: WeekType,
    ) -> bool {
        (0..hours).all(|i| {
            self.is_slot_available(instructor, groups, day, start_slot + i, week_type)
        })
    }

    /// Availability with the *first* failing reason, checked in the order
    /// instructor-unavailable, instructor-conflict, group-conflict
    pub fn check_slot_availability_reason(
        &self,
        instructor: &InstructorId,
        groups: &[String],
        day: Day,
        slot: Slot,
        week_type: WeekType,
    ) -> Result<(), (UnscheduledReason, String)> {
        if self.is_weekly_unavailable(instructor, day, slot) {
            return Err((
                UnscheduledReason::InstructorUnavailable,
                format!(
                    "Instructor '{}' is unavailable on {} at {}",
                    instructor,
                    day,
                    slot_to_time(slot).unwrap_or("?")
                ),
            ));
        }
        if !self.is_instructor_available(instructor, day, slot, week_type) {
            return Err((
                UnscheduledReason::InstructorConflict,
                format!(
                    "Instructor '{instructor}' already teaches on {day} slot {slot}"
                ),
            ));
        }
        for group in groups {
            if !self.are_groups_available(
                std::slice::from_ref(group),
                day,
                slot,
                week_type,
            ) {
                return Err((
                    UnscheduledReason::GroupConflict,
                    format!("Group '{group}' already has a class on {day} slot {slot}"),
                ));
            }
        }
        Ok(())
    }

    // ---- pedagogy counters ---------------------------------------------

    /// Whether `count` more hours of `subject` fit the per-day cap.
    /// Returns (fits the 2-hour cap, fits the 3-hour extreme cap).
    pub fn can_add_subject_hours(
        &self,
        groups: &[String],
        day: Day,
        subject: &str,
        count: u32,
    ) -> (bool, bool) {
        let mut normal = true;
        let mut extreme = true;
        for base in Self::distinct_bases(groups) {
            let existing = self
                .subject_hours
                .get(&(base, day, subject.to_string()))
                .copied()
                .unwrap_or(0);
            if existing + count > 2 {
                normal = false;
            }
            if existing + count > 3 {
                extreme = false;
            }
        }
        (normal, extreme)
    }

    pub fn get_group_daily_load(&self, group: &str, day: Day) -> u32 {
        self.group_daily_load
            .get(&(base_group(group), day))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of daily loads over the distinct base groups of `groups`
    pub fn get_groups_total_daily_load(&self, groups: &[String], day: Day) -> u32 {
        Self::distinct_bases(groups)
            .iter()
            .map(|base| self.get_group_daily_load(base, day))
            .sum()
    }

    /// First group whose daily counter would exceed 6 after adding `hours`
    pub fn would_exceed_daily_load(
        &self,
        groups: &[String],
        day: Day,
        hours: u32,
    ) -> Option<String> {
        Self::distinct_bases(groups)
            .into_iter()
            .find(|base| self.get_group_daily_load(base, day) + hours > 6)
    }

    /// Slots on `day` where the group (by base) already has classes
    pub fn group_slots_on_day(&self, group: &str, day: Day) -> Vec<Slot> {
        self.base_slot_counts
            .get(&(base_group(group), day))
            .map(|counts| counts.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Total scheduled hours of an instructor
    pub fn instructor_scheduled_hours(&self, instructor: &InstructorId) -> u32 {
        self.instructor_hours.get(instructor).copied().unwrap_or(0)
    }

    /// Total scheduled hours over the distinct base groups of `groups`
    pub fn groups_scheduled_hours(&self, groups: &[String]) -> u32 {
        Self::distinct_bases(groups)
            .iter()
            .map(|base| self.group_hours.get(base).copied().unwrap_or(0))
            .sum()
    }

    // ---- building-change physics ---------------------------------------

    fn building_at(&self, base: &str, day: Day, slot: Slot) -> Option<&str> {
        self.group_buildings
            .get(&(base.to_string(), day, slot))
            .and_then(|addrs| addrs.last())
            .map(|s| s.as_str())
    }

    fn buildings_nearby(&self, a: &str, b: &str) -> bool {
        a == b
            || self
                .nearby
                .iter()
                .any(|cluster| cluster.contains(a) && cluster.contains(b))
    }

    /// First group for which this slot is a required travel gap: the
    /// neighboring slots hold classes in buildings outside one nearby
    /// cluster, so the slot between them must stay empty
    pub fn is_building_gap_slot(
        &self,
        groups: &[String],
        day: Day,
        slot: Slot,
    ) -> Option<String> {
        Self::distinct_bases(groups).into_iter().find(|base| {
            let before = slot
                .checked_sub(1)
                .filter(|s| *s >= crate::types::MIN_SLOT)
                .and_then(|s| self.building_at(base, day, s));
            let after = (slot < crate::types::MAX_SLOT)
                .then(|| self.building_at(base, day, slot + 1))
                .flatten();
            matches!((before, after), (Some(a), Some(b)) if !self.buildings_nearby(a, b))
        })
    }

    /// Whether an assignment at `slot` in building `address` would sit
    /// adjacent to a class in a building outside the address's nearby
    /// cluster, violating the travel-gap requirement
    pub fn check_building_gap_constraint(
        &self,
        groups: &[String],
        day: Day,
        slot: Slot,
        address: &str,
        _week_type: WeekType,
    ) -> Result<(), String> {
        for base in Self::distinct_bases(groups) {
            let mut neighbors = Vec::new();
            if slot > crate::types::MIN_SLOT {
                if let Some(before) = self.building_at(&base, day, slot - 1) {
                    neighbors.push((slot - 1, before));
                }
            }
            if slot < crate::types::MAX_SLOT {
                if let Some(after) = self.building_at(&base, day, slot + 1) {
                    neighbors.push((slot + 1, after));
                }
            }
            for (neighbor_slot, neighbor_addr) in neighbors {
                if !self.buildings_nearby(neighbor_addr, address) {
                    return Err(format!(
                        "Group '{base}' has a class at '{neighbor_addr}' in slot \
                         {neighbor_slot}; '{address}' requires a travel gap"
                    ));
                }
            }
        }
        Ok(())
    }

    // ---- windows --------------------------------------------------------

    /// Number of empty runs strictly between the first and last occupied
    /// slot of the day, were `slot` also occupied
    fn windows_after_insert(&self, base: &str, day: Day, slot: Slot) -> u32 {
        let mut occupied: BTreeSet<Slot> = self
            .base_slot_counts
            .get(&(base.to_string(), day))
            .map(|counts| counts.keys().copied().collect())
            .unwrap_or_default();
        occupied.insert(slot);

        let mut windows = 0;
        let mut prev: Option<Slot> = None;
        for s in &occupied {
            if let Some(p) = prev {
                if s - p > 1 {
                    windows += 1;
                }
            }
            prev = Some(*s);
        }
        windows
    }

    /// First group whose window count would exceed the cap after inserting
    /// a class at `slot`
    pub fn would_create_second_window(
        &self,
        groups: &[String],
        day: Day,
        slot: Slot,
        max_windows: u8,
    ) -> Option<String> {
        Self::distinct_bases(groups)
            .into_iter()
            .find(|base| self.windows_after_insert(base, day, slot) > max_windows as u32)
    }

    pub fn max_windows(&self) -> u8 {
        self.max_windows
    }

    // ---- day constraints ------------------------------------------------

    /// Instructor day-of-year constraints: certain instructors teach given
    /// study years only on given days, and some require all their classes
    /// on one weekday
    pub fn check_instructor_day_constraint(
        &self,
        instructor: &InstructorId,
        day: Day,
        groups: &[String],
    ) -> Result<(), String> {
        let Some(rule) = self.day_rules.get(instructor) else {
            return Ok(());
        };

        for group in groups {
            let Some(year) = parse_year(group) else {
                continue;
            };
            if let Some(allowed) = rule.year_days.get(&year) {
                if !allowed.contains(&day) {
                    return Err(format!(
                        "Instructor '{instructor}' teaches year {year} only on {:?}",
                        allowed.iter().map(|d| d.name()).collect::<Vec<_>>()
                    ));
                }
            }
        }

        if rule.one_day_per_week {
            if let Some(days) = self.instructor_days.get(instructor) {
                if !days.is_empty() && !days.contains_key(&day) {
                    return Err(format!(
                        "Instructor '{instructor}' teaches on a single weekday and \
                         already has classes on another day"
                    ));
                }
            }
        }

        Ok(())
    }

    // ---- day boundaries --------------------------------------------------

    /// Candidate positions anchored at the start or end of the day's
    /// valid-slot range, for same-instructor subgroup pairing
    pub fn find_day_boundary_slots(
        &self,
        instructor: &InstructorId,
        groups: &[String],
        day: Day,
        valid_slots: &[Slot],
        hours: u8,
        week_type: WeekType,
    ) -> Vec<(Slot, BoundaryAnchor)> {
        let mut positions = Vec::new();
        let Some(&first) = valid_slots.first() else {
            return positions;
        };
        let Some(&last) = valid_slots.last() else {
            return positions;
        };

        let fits = |start: Slot| {
            (0..hours).all(|i| valid_slots.contains(&(start + i)))
                && self.are_consecutive_slots_available(
                    instructor, groups, day, start, hours, week_type,
                )
        };

        if fits(first) {
            positions.push((first, BoundaryAnchor::DayStart));
        }
        if last + 1 >= hours {
            let end_start = last + 1 - hours;
            if end_start != first && fits(end_start) {
                positions.push((end_start, BoundaryAnchor::DayEnd));
            }
        }
        positions
    }
}

fn decrement<K: std::hash::Hash + Eq>(map: &mut HashMap<K, u32>, key: K) {
    if let Some(value) = map.get_mut(&key) {
        *value = value.saturating_sub(1);
        if *value == 0 {
            map.remove(&key);
        }
    }
}
