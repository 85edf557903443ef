use crate::types::{
    specialties_of, Assignment, Day, GroupBuildingRule, InstructorId, Room,
    RoomKey, RoomPolicy, RoomRule, RoomSpec, SchedulerConfig, Slot, StreamId,
    StreamType, WeekType,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Everything the room allocator needs to know about the class asking for
/// a room. Built from a `Stream` during placement and from an `Assignment`
/// during optimizer moves.
#[derive(Debug, Clone)]
pub struct RoomQuery<'a> {
    pub stream_id: Option<&'a StreamId>,
    pub subject: &'a str,
    pub instructor: InstructorId,
    pub stream_type: StreamType,
    pub groups: &'a [String],
    pub student_count: u32,
}

impl<'a> RoomQuery<'a> {
    pub fn for_stream(stream: &'a crate::types::Stream) -> Self {
        Self {
            stream_id: Some(&stream.id),
            subject: &stream.subject,
            instructor: stream.instructor_id(),
            stream_type: stream.stream_type,
            groups: &stream.groups,
            student_count: stream.student_count,
        }
    }

    pub fn for_assignment(assignment: &'a Assignment) -> Self {
        Self {
            stream_id: Some(&assignment.stream_id),
            subject: &assignment.subject,
            instructor: InstructorId::normalize(&assignment.instructor),
            stream_type: assignment.stream_type,
            groups: &assignment.groups,
            student_count: assignment.student_count,
        }
    }
}

/// Four-tier priority room allocator with elastic capacity.
///
/// Tier order: instructor special rooms, subject rooms (strict by default:
/// no fall-through), instructor non-special rooms, group-building rooms,
/// general pool. Within a tier the smallest exact-fit room wins; when
/// nothing fits exactly, a size-dependent buffer is added to each room's
/// capacity and the largest qualifying room wins.
#[derive(Debug, Clone, Default)]
pub struct RoomManager {
    rooms: Vec<Room>,
    subject_rooms: HashMap<String, RoomRule>,
    subject_policies: HashMap<String, RoomPolicy>,
    instructor_rooms: HashMap<InstructorId, RoomRule>,
    group_buildings: HashMap<String, GroupBuildingRule>,
    /// address -> specialties allowed to use the building
    reserved_addresses: HashMap<String, BTreeSet<String>>,
    /// stream -> addresses it may never use
    exclusions: HashMap<StreamId, Vec<String>>,
    /// (day, slot, week_type) -> occupied rooms
    occupancy: HashMap<(Day, Slot, WeekType), HashSet<RoomKey>>,
}

impl RoomManager {
    pub fn new(config: &SchedulerConfig) -> Self {
        let mut reserved_addresses: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (specialty, rule) in &config.group_buildings {
            for spec in &rule.addresses {
                if !spec.address.is_empty() {
                    reserved_addresses
                        .entry(spec.address.clone())
                        .or_default()
                        .insert(specialty.clone());
                }
            }
        }
        let subject_policies = config
            .subject_rooms
            .keys()
            .map(|s| (s.clone(), config.subject_room_policy(s)))
            .collect();

        Self {
            rooms: config.rooms.clone(),
            subject_rooms: config.subject_rooms.clone(),
            subject_policies,
            instructor_rooms: config.instructor_rooms.clone(),
            group_buildings: config.group_buildings.clone(),
            reserved_addresses,
            exclusions: config.stream_address_exclusions.clone(),
            occupancy: HashMap::new(),
        }
    }

    /// Materialize prior room reservations
    pub fn load_assignments(&mut self, assignments: &[Assignment]) {
        for a in assignments {
            let key = RoomKey {
                name: a.room.clone(),
                address: a.room_address.clone(),
            };
            self.occupancy
                .entry((a.day, a.slot, a.week_type))
                .or_default()
                .insert(key);
        }
    }

    // ---- occupancy ------------------------------------------------------

    /// Room availability under the Both<->{Odd,Even} cross-blocking rule
    pub fn is_room_free(
        &self,
        key: &RoomKey,
        day: Day,
        slot: Slot,
        week_type: WeekType,
    ) -> bool {
        !week_type.conflicting().iter().any(|wt| {
            self.occupancy
                .get(&(day, slot, *wt))
                .map(|set| set.contains(key))
                .unwrap_or(false)
        })
    }

    fn is_room_free_for_block(
        &self,
        key: &RoomKey,
        day: Day,
        slots: &[Slot],
        week_type: WeekType,
    ) -> bool {
        slots
            .iter()
            .all(|slot| self.is_room_free(key, day, *slot, week_type))
    }

    pub fn reserve(&mut self, room: &Room, day: Day, slot: Slot, week_type: WeekType) {
        self.occupancy
            .entry((day, slot, week_type))
            .or_default()
            .insert(room.key());
    }

    /// Exact inverse of [`reserve`]; there is no reference counting
    pub fn release(&mut self, key: &RoomKey, day: Day, slot: Slot, week_type: WeekType) {
        if let Some(set) = self.occupancy.get_mut(&(day, slot, week_type)) {
            set.remove(key);
            if set.is_empty() {
                self.occupancy.remove(&(day, slot, week_type));
            }
        }
    }

    // ---- catalog lookups ------------------------------------------------

    pub fn room_by_name(&self, name: &str, address: Option<&str>) -> Option<&Room> {
        self.rooms
            .iter()
            .find(|r| r.name == name && address.map(|a| r.address == a).unwrap_or(true))
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    fn resolve_specs(&self, specs: &[RoomSpec]) -> Vec<&Room> {
        let mut out = Vec::new();
        for spec in specs {
            match &spec.room {
                Some(name) => {
                    if let Some(room) = self
                        .rooms
                        .iter()
                        .find(|r| &r.name == name && r.address == spec.address)
                    {
                        out.push(room);
                    }
                }
                None => {
                    out.extend(self.rooms.iter().filter(|r| r.address == spec.address));
                }
            }
        }
        out
    }

    fn is_address_excluded(&self, stream_id: Option<&StreamId>, address: &str) -> bool {
        stream_id
            .and_then(|id| self.exclusions.get(id))
            .map(|addrs| addrs.iter().any(|a| a == address))
            .unwrap_or(false)
    }

    /// Reserved buildings admit only their designated specialties
    fn is_address_allowed_for_groups(&self, address: &str, groups: &[String]) -> bool {
        let Some(allowed) = self.reserved_addresses.get(address) else {
            return true;
        };
        specialties_of(groups)
            .iter()
            .all(|specialty| allowed.contains(specialty))
    }

    /// Rooms in the preferred building of the groups' shared specialty.
    /// Applies only when every group belongs to one specialty that has a
    /// building preference configured.
    fn group_building_rooms(&self, groups: &[String]) -> Vec<&Room> {
        let specialties = specialties_of(groups);
        let [specialty] = specialties.as_slice() else {
            return Vec::new();
        };
        let Some(rule) = self.group_buildings.get(specialty) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for spec in &rule.addresses {
            for room in self.rooms.iter().filter(|r| r.address == spec.address) {
                if spec.rooms.is_empty() || spec.rooms.contains(&room.name) {
                    out.push(room);
                }
            }
        }
        out
    }

    // ---- capacity selection --------------------------------------------

    /// Capacity buffer: 50% of the stream size up to 30 students, 20% from
    /// 100 up, linearly interpolated between
    pub fn capacity_buffer(student_count: u32) -> u32 {
        if student_count <= 30 {
            student_count / 2
        } else if student_count >= 100 {
            student_count / 5
        } else {
            let ratio = (student_count - 30) as f64 / 70.0;
            let pct = 0.5 - ratio * 0.3;
            (student_count as f64 * pct) as u32
        }
    }

    fn find_by_capacity<'a>(
        &self,
        candidates: &[&'a Room],
        query: &RoomQuery<'_>,
        day: Day,
        slots: &[Slot],
        week_type: WeekType,
        allow_special: bool,
        enforce_reserved: bool,
    ) -> Option<&'a Room> {
        let available: Vec<&Room> = candidates
            .iter()
            .copied()
            .filter(|r| allow_special || !r.is_special)
            .filter(|r| !self.is_address_excluded(query.stream_id, &r.address))
            .filter(|r| {
                !enforce_reserved
                    || self.is_address_allowed_for_groups(&r.address, query.groups)
            })
            .filter(|r| self.is_room_free_for_block(&r.key(), day, slots, week_type))
            .collect();

        if available.is_empty() {
            return None;
        }

        // Smallest exact-fit room minimizes waste
        if let Some(room) = available
            .iter()
            .copied()
            .filter(|r| r.capacity >= query.student_count)
            .min_by_key(|r| r.capacity)
        {
            return Some(room);
        }

        // Buffered fallback: largest room that fits with the elastic buffer
        let buffer = Self::capacity_buffer(query.student_count);
        available
            .into_iter()
            .filter(|r| r.capacity + buffer >= query.student_count)
            .max_by_key(|r| r.capacity)
    }

    // ---- the four-tier protocol ----------------------------------------

    /// Find a room for one slot
    pub fn find_room(
        &self,
        query: &RoomQuery<'_>,
        day: Day,
        slot: Slot,
        week_type: WeekType,
    ) -> Option<&Room> {
        self.find_room_for_block(query, day, &[slot], week_type)
    }

    /// Find a single room free across all `slots` of a multi-hour block
    pub fn find_room_for_block(
        &self,
        query: &RoomQuery<'_>,
        day: Day,
        slots: &[Slot],
        week_type: WeekType,
    ) -> Option<&Room> {
        // 0. Instructor special rooms
        if let Some(rule) = self.instructor_rooms.get(&query.instructor) {
            let special: Vec<&Room> = self
                .resolve_specs(rule.specs_for(query.stream_type))
                .into_iter()
                .filter(|r| r.is_special)
                .collect();
            if !special.is_empty() {
                if let Some(room) =
                    self.find_by_capacity(&special, query, day, slots, week_type, true, false)
                {
                    return Some(room);
                }
            }
        }

        // 1. Subject rooms: restrict the search, no fall-through when strict
        if let Some(rule) = self.subject_rooms.get(query.subject) {
            let allowed = self.resolve_specs(rule.specs_for(query.stream_type));
            if !allowed.is_empty() {
                let found =
                    self.find_by_capacity(&allowed, query, day, slots, week_type, true, false);
                let policy = self
                    .subject_policies
                    .get(query.subject)
                    .copied()
                    .unwrap_or(RoomPolicy::Strict);
                match (found, policy) {
                    (Some(room), _) => return Some(room),
                    (None, RoomPolicy::Strict) => return None,
                    (None, RoomPolicy::Preferred) => {}
                }
            }
        }

        // 2. Instructor non-special rooms
        if let Some(rule) = self.instructor_rooms.get(&query.instructor) {
            let regular: Vec<&Room> = self
                .resolve_specs(rule.specs_for(query.stream_type))
                .into_iter()
                .filter(|r| !r.is_special)
                .collect();
            if let Some(room) =
                self.find_by_capacity(&regular, query, day, slots, week_type, false, false)
            {
                return Some(room);
            }
        }

        // 3. Group-building rooms
        let preferred = self.group_building_rooms(query.groups);
        if !preferred.is_empty() {
            if let Some(room) =
                self.find_by_capacity(&preferred, query, day, slots, week_type, false, false)
            {
                return Some(room);
            }
        }

        // 4. General pool, minus reserved buildings of other specialties
        let all: Vec<&Room> = self.rooms.iter().collect();
        self.find_by_capacity(&all, query, day, slots, week_type, false, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AddressSpec, Stream, StreamHours, StreamType};

    fn room(name: &str, capacity: u32, address: &str, special: bool) -> Room {
        Room {
            name: name.to_string(),
            capacity,
            address: address.to_string(),
            is_special: special,
        }
    }

    fn stream(subject: &str, stream_type: StreamType, count: u32) -> Stream {
        Stream {
            id: StreamId("s1".to_string()),
            subject: subject.to_string(),
            stream_type,
            instructor: "Иванов И.И.".to_string(),
            language: String::new(),
            groups: vec!["АРХ-21 О".to_string()],
            student_count: count,
            hours: StreamHours { odd: 1, even: 1 },
            is_subgroup: false,
            is_implicit_subgroup: false,
            paired_stream_id: None,
        }
    }

    fn manager(rooms: Vec<Room>) -> RoomManager {
        RoomManager::new(&SchedulerConfig::with_rooms(rooms))
    }

    #[test]
    fn test_smallest_exact_fit_wins() {
        let m = manager(vec![
            room("big", 150, "A", false),
            room("mid", 100, "A", false),
            room("small", 50, "A", false),
        ]);
        let s = stream("Subj", StreamType::Lecture, 75);
        let q = RoomQuery::for_stream(&s);
        let found = m.find_room(&q, Day::Monday, 1, WeekType::Both).unwrap();
        assert_eq!(found.name, "mid");
    }

    #[test]
    fn test_buffered_fallback_picks_largest() {
        // 30 students, rooms 18/16/14/12: buffer 15, rooms 18 and 16
        // qualify, the largest qualifying room wins
        let m = manager(vec![
            room("r12", 12, "A", false),
            room("r14", 14, "A", false),
            room("r16", 16, "A", false),
            room("r18", 18, "A", false),
        ]);
        let s = stream("Subj", StreamType::Practical, 30);
        let q = RoomQuery::for_stream(&s);
        let found = m.find_room(&q, Day::Monday, 1, WeekType::Both).unwrap();
        assert_eq!(found.name, "r18");
    }

    #[test]
    fn test_capacity_buffer_thresholds() {
        assert_eq!(RoomManager::capacity_buffer(30), 15);
        assert_eq!(RoomManager::capacity_buffer(100), 20);
        assert_eq!(RoomManager::capacity_buffer(20), 10);
        assert_eq!(RoomManager::capacity_buffer(200), 40);
        // Linear interpolation in between
        let mid = RoomManager::capacity_buffer(65);
        assert!(mid > 13 && mid < 33, "got {mid}");
    }

    #[test]
    fn test_nothing_fits() {
        let m = manager(vec![room("tiny", 5, "A", false)]);
        let s = stream("Subj", StreamType::Lecture, 200);
        let q = RoomQuery::for_stream(&s);
        assert!(m.find_room(&q, Day::Monday, 1, WeekType::Both).is_none());
    }

    #[test]
    fn test_special_rooms_skipped_in_general_pool() {
        let m = manager(vec![room("gym", 100, "A", true)]);
        let s = stream("Subj", StreamType::Practical, 20);
        let q = RoomQuery::for_stream(&s);
        assert!(m.find_room(&q, Day::Monday, 1, WeekType::Both).is_none());
    }

    #[test]
    fn test_subject_rooms_are_strict() {
        let mut config = SchedulerConfig::with_rooms(vec![
            room("112", 25, "AddrX", false),
            room("201", 100, "AddrY", false),
        ]);
        config.subject_rooms.insert(
            "Chem".to_string(),
            RoomRule {
                lab: vec![RoomSpec {
                    address: "AddrX".to_string(),
                    room: Some("112".to_string()),
                }],
                ..RoomRule::default()
            },
        );
        let m = RoomManager::new(&config);
        let s = stream("Chem", StreamType::Lab, 20);
        let q = RoomQuery::for_stream(&s);

        let found = m.find_room(&q, Day::Monday, 1, WeekType::Both).unwrap();
        assert_eq!((found.name.as_str(), found.address.as_str()), ("112", "AddrX"));

        // Required room busy: no fall-through to the general pool
        let mut m = m;
        let required = m.room_by_name("112", Some("AddrX")).unwrap().clone();
        m.reserve(&required, Day::Monday, 1, WeekType::Both);
        assert!(m.find_room(&q, Day::Monday, 1, WeekType::Both).is_none());
    }

    #[test]
    fn test_preferred_subject_rooms_fall_through() {
        let mut config = SchedulerConfig::with_rooms(vec![
            room("112", 25, "AddrX", false),
            room("201", 100, "AddrY", false),
        ]);
        config.subject_rooms.insert(
            "Chem".to_string(),
            RoomRule {
                policy: Some(RoomPolicy::Preferred),
                lab: vec![RoomSpec {
                    address: "AddrX".to_string(),
                    room: Some("112".to_string()),
                }],
                ..RoomRule::default()
            },
        );
        let mut m = RoomManager::new(&config);
        let required = m.room_by_name("112", Some("AddrX")).unwrap().clone();
        m.reserve(&required, Day::Monday, 1, WeekType::Both);

        let s = stream("Chem", StreamType::Lab, 20);
        let q = RoomQuery::for_stream(&s);
        let found = m.find_room(&q, Day::Monday, 1, WeekType::Both).unwrap();
        assert_eq!(found.name, "201");
    }

    #[test]
    fn test_reserved_building_excluded_for_other_specialties() {
        let mut config = SchedulerConfig::with_rooms(vec![room("101", 50, "VetAddr", false)]);
        config.group_buildings.insert(
            "ВЕТ".to_string(),
            GroupBuildingRule {
                addresses: vec![AddressSpec {
                    address: "VetAddr".to_string(),
                    rooms: vec![],
                }],
            },
        );
        let m = RoomManager::new(&config);

        // АРХ group cannot use the ВЕТ building
        let s = stream("Subj", StreamType::Lecture, 20);
        let q = RoomQuery::for_stream(&s);
        assert!(m.find_room(&q, Day::Monday, 1, WeekType::Both).is_none());

        // ВЕТ group can (via the group-building tier)
        let mut vet = stream("Subj", StreamType::Lecture, 20);
        vet.groups = vec!["ВЕТ-21 О".to_string()];
        let q = RoomQuery::for_stream(&vet);
        assert!(m.find_room(&q, Day::Monday, 1, WeekType::Both).is_some());
    }

    #[test]
    fn test_instructor_special_room_tier() {
        let mut config = SchedulerConfig::with_rooms(vec![
            room("IT Group", 30, "A", true),
            room("101", 30, "A", false),
        ]);
        config.instructor_rooms.insert(
            InstructorId::normalize("Иванов И.И."),
            RoomRule {
                locations: vec![RoomSpec {
                    address: "A".to_string(),
                    room: Some("IT Group".to_string()),
                }],
                ..RoomRule::default()
            },
        );
        let m = RoomManager::new(&config);
        let s = stream("Subj", StreamType::Practical, 20);
        let q = RoomQuery::for_stream(&s);
        let found = m.find_room(&q, Day::Monday, 1, WeekType::Both).unwrap();
        assert_eq!(found.name, "IT Group");
    }

    #[test]
    fn test_room_occupancy_cross_blocking() {
        let mut m = manager(vec![room("101", 30, "A", false)]);
        let r = m.rooms()[0].clone();
        m.reserve(&r, Day::Monday, 1, WeekType::Odd);

        assert!(!m.is_room_free(&r.key(), Day::Monday, 1, WeekType::Odd));
        assert!(!m.is_room_free(&r.key(), Day::Monday, 1, WeekType::Both));
        assert!(m.is_room_free(&r.key(), Day::Monday, 1, WeekType::Even));

        m.release(&r.key(), Day::Monday, 1, WeekType::Odd);
        assert!(m.is_room_free(&r.key(), Day::Monday, 1, WeekType::Both));
    }

    #[test]
    fn test_block_requires_single_room_free_throughout() {
        let mut m = manager(vec![
            room("101", 30, "A", false),
            room("102", 30, "A", false),
        ]);
        let first = m.room_by_name("101", None).unwrap().clone();
        m.reserve(&first, Day::Monday, 2, WeekType::Both);

        let s = stream("Subj", StreamType::Lecture, 20);
        let q = RoomQuery::for_stream(&s);
        let found = m
            .find_room_for_block(&q, Day::Monday, &[1, 2], WeekType::Both)
            .unwrap();
        assert_eq!(found.name, "102");
    }

    #[test]
    fn test_stream_address_exclusions() {
        let mut config = SchedulerConfig::with_rooms(vec![room("101", 30, "A", false)]);
        config
            .stream_address_exclusions
            .insert(StreamId("s1".to_string()), vec!["A".to_string()]);
        let m = RoomManager::new(&config);
        let s = stream("Subj", StreamType::Lecture, 20);
        let q = RoomQuery::for_stream(&s);
        assert!(m.find_room(&q, Day::Monday, 1, WeekType::Both).is_none());
    }

    #[test]
    fn test_room_name_reuse_across_addresses() {
        let mut m = manager(vec![
            room("112", 30, "AddrX", false),
            room("112", 30, "AddrY", false),
        ]);
        let x = m.room_by_name("112", Some("AddrX")).unwrap().clone();
        m.reserve(&x, Day::Monday, 1, WeekType::Both);

        let y_key = RoomKey {
            name: "112".to_string(),
            address: "AddrY".to_string(),
        };
        assert!(m.is_room_free(&y_key, Day::Monday, 1, WeekType::Both));
    }
}
