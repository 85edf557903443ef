mod hard_constraints;

pub use hard_constraints::*;

use crate::types::{ScheduleResult, SchedulerConfig, Stream};

/// Severity of a detected violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One violated constraint on the emitted assignment set
#[derive(Debug, Clone)]
pub struct Violation {
    pub constraint: &'static str,
    pub message: String,
    pub severity: Severity,
}

/// Outcome of validating a schedule against the hard constraints
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self
            .violations
            .iter()
            .any(|v| v.severity == Severity::Error)
    }
}

/// Check every hard constraint on a schedule. The stream list supplies
/// shift and pairing information; the config supplies availability, room
/// rules and building clusters.
pub fn validate_schedule(
    result: &ScheduleResult,
    streams: &[Stream],
    config: &SchedulerConfig,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.violations.extend(check_instructor_conflicts(result));
    report.violations.extend(check_group_conflicts(result));
    report.violations.extend(check_room_conflicts(result));
    report
        .violations
        .extend(check_instructor_availability(result, config));
    report.violations.extend(check_shifts(result, streams, config));
    report.violations.extend(check_subject_rooms(result, config));
    report
        .violations
        .extend(check_reserved_buildings(result, config));
    report.violations.extend(check_daily_load(result));
    report.violations.extend(check_subject_daily_cap(result));
    report.violations.extend(check_building_gaps(result, config));
    report.violations.extend(check_multi_hour_contiguity(result));
    report.violations.extend(check_subgroup_pairing(result, streams));

    report
}
