use super::{Day, InstructorId, Room, Slot, StreamId, StreamType};
use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Base groups forced onto the second shift regardless of study year
pub type SecondShiftGroups = HashSet<String>;

/// How a room rule restricts selection.
///
/// `Strict` (the default for subject rules) means the listed rooms are the
/// only admissible ones; no fall-through to lower tiers when all are busy.
/// `Preferred` falls through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPolicy {
    Strict,
    Preferred,
}

/// One location entry in a subject or instructor room rule: a building
/// address, optionally narrowed to a single room name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub address: String,
    #[serde(default)]
    pub room: Option<String>,
}

/// Room rule for a subject or an instructor. The `locations` list applies
/// to every stream type; type-specific lists take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomRule {
    #[serde(default)]
    pub policy: Option<RoomPolicy>,
    #[serde(default)]
    pub lecture: Vec<RoomSpec>,
    #[serde(default, alias = "practice")]
    pub practical: Vec<RoomSpec>,
    #[serde(default)]
    pub lab: Vec<RoomSpec>,
    #[serde(default)]
    pub locations: Vec<RoomSpec>,
}

impl RoomRule {
    /// Location specs applying to the given stream type, falling back to
    /// the type-agnostic `locations` list
    pub fn specs_for(&self, stream_type: StreamType) -> &[RoomSpec] {
        let specific = match stream_type {
            StreamType::Lecture => &self.lecture,
            StreamType::Practical => &self.practical,
            StreamType::Lab => &self.lab,
        };
        if specific.is_empty() {
            &self.locations
        } else {
            specific
        }
    }
}

/// One building in a specialty's building preference, optionally narrowed
/// to a list of room names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSpec {
    pub address: String,
    #[serde(default)]
    pub rooms: Vec<String>,
}

/// Building preference of a specialty. Listing an address here also
/// *reserves* it: groups of other specialties may not use the building.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupBuildingRule {
    #[serde(default)]
    pub addresses: Vec<AddressSpec>,
}

/// A set of mutually-nearby building addresses; movement inside a cluster
/// does not require a travel gap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyCluster {
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearbyBuildings {
    #[serde(default)]
    pub groups: Vec<NearbyCluster>,
}

/// Raw weekly unavailability record, as stored in
/// instructor-availability.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorAvailabilityRecord {
    pub name: String,
    /// day name -> list of slot start times ("09:00", ...)
    #[serde(default)]
    pub weekly_unavailable: BTreeMap<String, Vec<String>>,
}

/// Raw day-of-year constraint record, as stored in instructor-days.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructorDayRecord {
    pub name: String,
    /// study year -> allowed day names
    #[serde(default)]
    pub year_days: BTreeMap<u8, Vec<String>>,
    #[serde(default)]
    pub one_day_per_week: bool,
}

/// Compiled day constraint for one instructor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayRule {
    pub year_days: HashMap<u8, Vec<Day>>,
    pub one_day_per_week: bool,
}

/// Weights of the stream complexity score. The ordering they induce is
/// what matters: large, multi-hour, overbooked and room-constrained
/// streams first, physically-flexible subjects last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityWeights {
    pub student_count: f64,
    pub hours: f64,
    pub instructor_load: f64,
    pub room_constraint: f64,
    pub tight_calendar: f64,
    pub flexible: f64,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            student_count: 1.0,
            hours: 10.0,
            instructor_load: 2.0,
            room_constraint: 50.0,
            tight_calendar: 100.0,
            flexible: 500.0,
        }
    }
}

fn default_max_windows() -> u8 {
    1
}

fn default_flexible_subjects() -> Vec<String> {
    vec!["Дене шынықтыру".to_string()]
}

/// Tunables loaded from scheduler.toml, with sensible defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    #[serde(default)]
    pub weights: ComplexityWeights,
    /// Hard cap on schedule windows per group-day
    #[serde(default = "default_max_windows")]
    pub max_windows: u8,
    /// Subjects with no day preference (e.g. physical education)
    #[serde(default = "default_flexible_subjects")]
    pub flexible_subjects: Vec<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            weights: ComplexityWeights::default(),
            max_windows: default_max_windows(),
            flexible_subjects: default_flexible_subjects(),
        }
    }
}

/// Everything the scheduling core needs besides the stream list, with all
/// name/time strings resolved to typed keys at construction. Unknown day
/// names or clock times are configuration errors and abort the run.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub rooms: Vec<Room>,
    pub subject_rooms: HashMap<String, RoomRule>,
    pub instructor_rooms: HashMap<InstructorId, RoomRule>,
    pub group_buildings: HashMap<String, GroupBuildingRule>,
    /// Mutually-nearby address clusters
    pub nearby: Vec<BTreeSet<String>>,
    /// instructor -> day -> slots the instructor cannot teach
    pub weekly_unavailable: HashMap<InstructorId, HashMap<Day, BTreeSet<Slot>>>,
    pub day_rules: HashMap<InstructorId, DayRule>,
    pub second_shift_groups: SecondShiftGroups,
    /// Zero-student base groups, stripped from streams before scheduling
    pub dead_groups: HashSet<String>,
    /// Per-stream building blacklist honored by every room tier
    pub stream_address_exclusions: HashMap<StreamId, Vec<String>>,
    pub tuning: Tuning,
}

impl SchedulerConfig {
    /// Minimal config: a room catalog and defaults everywhere else
    pub fn with_rooms(rooms: Vec<Room>) -> Self {
        Self {
            rooms,
            ..Self::default()
        }
    }

    /// Compile raw availability records into slot sets. Saturday entries
    /// are dropped (never scheduled); any other unknown day is fatal.
    pub fn set_availability(
        &mut self,
        records: Vec<InstructorAvailabilityRecord>,
    ) -> Result<(), SchedulerError> {
        for record in records {
            if record.name.is_empty() {
                continue;
            }
            let id = InstructorId::normalize(&record.name);
            let entry = self.weekly_unavailable.entry(id).or_default();
            for (day_name, times) in &record.weekly_unavailable {
                let day = match Day::from_name(day_name) {
                    Some(d) => d,
                    None if day_name.eq_ignore_ascii_case("saturday")
                        || day_name.eq_ignore_ascii_case("sunday") =>
                    {
                        continue;
                    }
                    None => {
                        return Err(SchedulerError::UnknownDayName {
                            day: day_name.clone(),
                            context: format!(
                                "weekly unavailability of '{}'",
                                record.name
                            ),
                        });
                    }
                };
                let slots = entry.entry(day).or_default();
                for time in times {
                    let slot = time_to_slot_checked(time, &record.name)?;
                    slots.insert(slot);
                }
            }
        }
        Ok(())
    }

    /// Compile raw day-of-year constraint records
    pub fn set_day_rules(
        &mut self,
        records: Vec<InstructorDayRecord>,
    ) -> Result<(), SchedulerError> {
        for record in records {
            let id = InstructorId::normalize(&record.name);
            let mut rule = DayRule {
                one_day_per_week: record.one_day_per_week,
                ..DayRule::default()
            };
            for (year, day_names) in &record.year_days {
                let mut days = Vec::new();
                for name in day_names {
                    let day = Day::from_name(name).ok_or_else(|| {
                        SchedulerError::UnknownDayName {
                            day: name.clone(),
                            context: format!("day constraint of '{}'", record.name),
                        }
                    })?;
                    days.push(day);
                }
                rule.year_days.insert(*year, days);
            }
            self.day_rules.insert(id, rule);
        }
        Ok(())
    }

    /// Replace instructor room rules, normalizing the keyed names
    pub fn set_instructor_rooms(&mut self, raw: HashMap<String, RoomRule>) {
        self.instructor_rooms = raw
            .into_iter()
            .map(|(name, rule)| (InstructorId::normalize(&name), rule))
            .collect();
    }

    /// Store nearby clusters as address sets
    pub fn set_nearby_buildings(&mut self, raw: NearbyBuildings) {
        self.nearby = raw
            .groups
            .into_iter()
            .map(|c| c.addresses.into_iter().collect())
            .filter(|s: &BTreeSet<String>| !s.is_empty())
            .collect();
    }

    /// Whether two addresses belong to the same nearby cluster (or are the
    /// same address)
    pub fn are_buildings_nearby(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        self.nearby
            .iter()
            .any(|cluster| cluster.contains(a) && cluster.contains(b))
    }

    pub fn is_flexible_subject(&self, subject: &str) -> bool {
        self.tuning
            .flexible_subjects
            .iter()
            .any(|s| s == subject)
    }

    /// Policy of a subject's room rule; strict unless declared otherwise
    pub fn subject_room_policy(&self, subject: &str) -> RoomPolicy {
        self.subject_rooms
            .get(subject)
            .and_then(|r| r.policy)
            .unwrap_or(RoomPolicy::Strict)
    }
}

fn time_to_slot_checked(time: &str, instructor: &str) -> Result<Slot, SchedulerError> {
    super::time_to_slot(time).ok_or_else(|| SchedulerError::UnknownClockTime {
        time: time.to_string(),
        context: format!("weekly unavailability of '{instructor}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_rule_locations_fallback() {
        let rule = RoomRule {
            locations: vec![RoomSpec {
                address: "Addr1".to_string(),
                room: None,
            }],
            ..RoomRule::default()
        };
        assert_eq!(rule.specs_for(StreamType::Lecture).len(), 1);
        assert_eq!(rule.specs_for(StreamType::Lab).len(), 1);

        let typed = RoomRule {
            lab: vec![RoomSpec {
                address: "Addr2".to_string(),
                room: Some("112".to_string()),
            }],
            locations: vec![RoomSpec {
                address: "Addr1".to_string(),
                room: None,
            }],
            ..RoomRule::default()
        };
        assert_eq!(typed.specs_for(StreamType::Lab)[0].address, "Addr2");
        assert_eq!(typed.specs_for(StreamType::Lecture)[0].address, "Addr1");
    }

    #[test]
    fn test_availability_compilation() {
        let mut config = SchedulerConfig::default();
        config
            .set_availability(vec![InstructorAvailabilityRecord {
                name: "проф. Иванов И.И.".to_string(),
                weekly_unavailable: BTreeMap::from([
                    ("monday".to_string(), vec!["09:00".to_string()]),
                    ("saturday".to_string(), vec!["09:00".to_string()]),
                ]),
            }])
            .unwrap();

        let id = InstructorId::normalize("Иванов И.И.");
        let days = &config.weekly_unavailable[&id];
        assert!(days[&Day::Monday].contains(&1));
        assert_eq!(days.len(), 1, "saturday entries are dropped");
    }

    #[test]
    fn test_availability_rejects_unknown_day() {
        let mut config = SchedulerConfig::default();
        let err = config.set_availability(vec![InstructorAvailabilityRecord {
            name: "Иванов И.И.".to_string(),
            weekly_unavailable: BTreeMap::from([(
                "holiday".to_string(),
                vec!["09:00".to_string()],
            )]),
        }]);
        assert!(err.is_err());
    }

    #[test]
    fn test_nearby_clusters() {
        let mut config = SchedulerConfig::default();
        config.set_nearby_buildings(NearbyBuildings {
            groups: vec![NearbyCluster {
                addresses: vec!["A".to_string(), "B".to_string()],
            }],
        });
        assert!(config.are_buildings_nearby("A", "B"));
        assert!(config.are_buildings_nearby("C", "C"));
        assert!(!config.are_buildings_nearby("A", "C"));
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning: Tuning = toml::from_str("").unwrap();
        assert_eq!(tuning.max_windows, 1);
        assert_eq!(tuning.flexible_subjects, vec!["Дене шынықтыру"]);
    }
}
