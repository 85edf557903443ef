use super::{load_group_list_csv, load_rooms_csv, SchedulerInput};
use crate::error::{Result, SchedulerError};
use crate::types::{
    GroupBuildingRule, InstructorAvailabilityRecord, InstructorDayRecord,
    NearbyBuildings, RoomRule, SchedulerConfig, Stream, StreamId, Tuning,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Load all scheduler inputs from a directory.
///
/// Required: `streams.json`, `rooms.csv`. Everything else is optional and
/// defaults to empty: `subject-rooms.json`, `instructor-rooms.json`,
/// `group-buildings.json`, `nearby-buildings.json`,
/// `instructor-availability.json`, `instructor-days.json`,
/// `groups-second-shift.csv`, `dead-groups.csv`,
/// `stream-address-exclusions.json`, `scheduler.toml`.
pub fn load_input_from_dir(dir: &Path) -> Result<SchedulerInput> {
    let streams: Vec<Stream> = load_json_file(&dir.join("streams.json"))?;
    let rooms = load_rooms_csv(&dir.join("rooms.csv"))?;

    let mut config = SchedulerConfig::with_rooms(rooms);

    if let Some(subject_rooms) =
        load_optional_json::<HashMap<String, RoomRule>>(&dir.join("subject-rooms.json"))?
    {
        config.subject_rooms = subject_rooms;
    }
    if let Some(instructor_rooms) =
        load_optional_json::<HashMap<String, RoomRule>>(&dir.join("instructor-rooms.json"))?
    {
        config.set_instructor_rooms(instructor_rooms);
    }
    if let Some(group_buildings) = load_optional_json::<HashMap<String, GroupBuildingRule>>(
        &dir.join("group-buildings.json"),
    )? {
        config.group_buildings = group_buildings;
    }
    if let Some(nearby) =
        load_optional_json::<NearbyBuildings>(&dir.join("nearby-buildings.json"))?
    {
        config.set_nearby_buildings(nearby);
    }
    if let Some(availability) = load_optional_json::<Vec<InstructorAvailabilityRecord>>(
        &dir.join("instructor-availability.json"),
    )? {
        config.set_availability(availability)?;
    }
    if let Some(day_rules) =
        load_optional_json::<Vec<InstructorDayRecord>>(&dir.join("instructor-days.json"))?
    {
        config.set_day_rules(day_rules)?;
    }
    if let Some(exclusions) = load_optional_json::<HashMap<String, Vec<String>>>(
        &dir.join("stream-address-exclusions.json"),
    )? {
        config.stream_address_exclusions = exclusions
            .into_iter()
            .map(|(id, addrs)| (StreamId(id), addrs))
            .collect();
    }

    let second_shift_path = dir.join("groups-second-shift.csv");
    if second_shift_path.exists() {
        config.second_shift_groups = load_group_list_csv(&second_shift_path)?;
    }
    let dead_groups_path = dir.join("dead-groups.csv");
    if dead_groups_path.exists() {
        config.dead_groups = load_group_list_csv(&dead_groups_path)?;
    }

    config.tuning = load_tuning_or_default(&dir.join("scheduler.toml"));

    Ok(SchedulerInput { streams, config })
}

/// Load the tuning file, or fall back to defaults
pub fn load_tuning_or_default(path: &Path) -> Tuning {
    if !path.exists() {
        return Tuning::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_default(),
        Err(_) => Tuning::default(),
    }
}

/// Generic JSON file loader
pub fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let path_str = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| SchedulerError::FileRead {
        path: path_str.clone(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| {
        SchedulerError::JsonParse {
            file: path_str,
            message: e.to_string(),
        }
        .into()
    })
}

fn load_optional_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    load_json_file(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamType;

    #[test]
    fn test_stream_json_shape() {
        let json = r#"{
            "id": "lec-1",
            "subject": "Математика",
            "stream_type": "lecture",
            "instructor": "а.о. Утебалиев М.М.",
            "language": "kazakh",
            "groups": ["СТР-21 О", "СТР-23 О"],
            "student_count": 48,
            "hours": {"odd_week": 2, "even_week": 1},
            "is_subgroup": false
        }"#;
        let stream: Stream = serde_json::from_str(json).unwrap();
        assert_eq!(stream.stream_type, StreamType::Lecture);
        assert_eq!(stream.hours.odd, 2);
        assert_eq!(stream.hours.even, 1);
        assert_eq!(stream.groups.len(), 2);
        assert!(!stream.is_subgroup);
        assert!(stream.paired_stream_id.is_none());
    }

    #[test]
    fn test_unknown_stream_type_rejected() {
        let json = r#"{
            "id": "x",
            "subject": "s",
            "stream_type": "seminar",
            "instructor": "i",
            "groups": []
        }"#;
        assert!(serde_json::from_str::<Stream>(json).is_err());
    }

    #[test]
    fn test_subject_rooms_shape() {
        let json = r#"{
            "Химия": {
                "lab": [{"address": "ул. Чапаева 69", "room": "112"}]
            },
            "Информатика": {
                "locations": [{"address": "ул. Чапаева 69"}]
            }
        }"#;
        let rules: HashMap<String, RoomRule> = serde_json::from_str(json).unwrap();
        assert_eq!(rules["Химия"].lab.len(), 1);
        assert_eq!(rules["Химия"].lab[0].room.as_deref(), Some("112"));
        assert!(rules["Информатика"].lab.is_empty());
        assert_eq!(rules["Информатика"].locations.len(), 1);
    }

    #[test]
    fn test_instructor_rooms_practice_alias() {
        let json = r#"{
            "Иванов И.И.": {
                "practice": [{"address": "A", "room": "101"}]
            }
        }"#;
        let rules: HashMap<String, RoomRule> = serde_json::from_str(json).unwrap();
        assert_eq!(rules["Иванов И.И."].practical.len(), 1);
    }

    #[test]
    fn test_instructor_days_shape() {
        let json = r#"[
            {"name": "Иванов И.И.", "year_days": {"2": ["monday", "tuesday"]},
             "one_day_per_week": true}
        ]"#;
        let records: Vec<InstructorDayRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].year_days[&2].len(), 2);
        assert!(records[0].one_day_per_week);
    }
}
