use super::SchedulerInput;
use crate::error::Result;
use crate::scheduler::RoomManager;
use crate::types::{parse_specialty, parse_year, StreamId};
use std::collections::HashSet;

/// Validation result with collected errors and warnings
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Validate loaded input before scheduling. Errors abort the run;
/// warnings are surfaced to the operator.
pub fn validate_input(input: &SchedulerInput) -> Result<ValidationResult> {
    let mut result = ValidationResult::default();

    // Duplicate stream ids
    let mut seen: HashSet<&StreamId> = HashSet::new();
    for stream in &input.streams {
        if !seen.insert(&stream.id) {
            result.add_error(format!("Duplicate stream ID: '{}'", stream.id));
        }
    }

    // Rooms
    if input.config.rooms.is_empty() {
        result.add_error("Empty rooms table: at least one room is required");
    }
    for room in &input.config.rooms {
        if room.capacity == 0 {
            result.add_warning(format!(
                "Room '{}' at '{}' has zero capacity",
                room.name, room.address
            ));
        }
    }

    // Streams
    for stream in &input.streams {
        if stream.groups.is_empty() {
            result.add_warning(format!("Stream '{}' has no groups", stream.id));
            continue;
        }
        for group in &stream.groups {
            if parse_specialty(group).is_none() || parse_year(group).is_none() {
                result.add_warning(format!(
                    "Stream '{}': group '{group}' does not match the group-name \
                     grammar",
                    stream.id
                ));
            }
        }
        if stream.instructor.trim().is_empty() {
            result.add_warning(format!("Stream '{}' has no instructor", stream.id));
        }
    }

    // Capacity sanity: a stream bigger than every room plus its buffer can
    // never be placed
    let max_capacity = input.config.rooms.iter().map(|r| r.capacity).max().unwrap_or(0);
    for stream in &input.streams {
        let buffer = RoomManager::capacity_buffer(stream.student_count);
        if stream.student_count > max_capacity + buffer {
            result.add_warning(format!(
                "Stream '{}' ({} students) exceeds every room's capacity plus \
                 buffer (largest room: {max_capacity})",
                stream.id, stream.student_count
            ));
        }
    }

    // Subject room rules referencing rooms missing from the catalog
    for (subject, rule) in &input.config.subject_rooms {
        let specs = rule
            .lecture
            .iter()
            .chain(&rule.practical)
            .chain(&rule.lab)
            .chain(&rule.locations);
        for spec in specs {
            let known = input.config.rooms.iter().any(|r| {
                r.address == spec.address
                    && spec.room.as_deref().map(|n| r.name == n).unwrap_or(true)
            });
            if !known {
                result.add_warning(format!(
                    "Subject '{subject}' requires unknown room '{}' at '{}'",
                    spec.room.as_deref().unwrap_or("*"),
                    spec.address
                ));
            }
        }
    }

    if !result.is_valid() {
        return Err(anyhow::anyhow!(
            "Validation failed with {} errors:\n{}",
            result.errors.len(),
            result.errors.join("\n")
        ));
    }

    Ok(result)
}
