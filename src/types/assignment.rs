use super::{Day, Slot, StreamId, StreamType, WeekType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stream placed at a concrete (day, slot, room, week-type) position.
///
/// Multi-hour placements emit one `Assignment` per hour in consecutive
/// slots, all sharing day, room and week type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub stream_id: StreamId,
    pub subject: String,
    pub stream_type: StreamType,
    pub instructor: String,
    pub groups: Vec<String>,
    pub student_count: u32,
    pub day: Day,
    pub slot: Slot,
    pub room: String,
    pub room_address: String,
    pub week_type: WeekType,
}

/// Reason a stream could not be placed, drawn from a closed set so
/// downstream tooling can key retry strategies on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    NoRoomAvailable,
    NoSlotAvailable,
    InstructorConflict,
    GroupConflict,
    InstructorUnavailable,
    ShiftConflict,
    BuildingGapRequired,
    SubjectDailyLimitExceeded,
    DailyLoadExceeded,
    MaxWindowsExceeded,
    InstructorDayConstraint,
    SubgroupPairingFailed,
    NoConsecutiveSlots,
    AllSlotsExhausted,
    Infeasible,
    SolverTimeout,
    Unknown,
}

impl UnscheduledReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnscheduledReason::NoRoomAvailable => "no_room_available",
            UnscheduledReason::NoSlotAvailable => "no_slot_available",
            UnscheduledReason::InstructorConflict => "instructor_conflict",
            UnscheduledReason::GroupConflict => "group_conflict",
            UnscheduledReason::InstructorUnavailable => "instructor_unavailable",
            UnscheduledReason::ShiftConflict => "shift_conflict",
            UnscheduledReason::BuildingGapRequired => "building_gap_required",
            UnscheduledReason::SubjectDailyLimitExceeded => "subject_daily_limit_exceeded",
            UnscheduledReason::DailyLoadExceeded => "daily_load_exceeded",
            UnscheduledReason::MaxWindowsExceeded => "max_windows_exceeded",
            UnscheduledReason::InstructorDayConstraint => "instructor_day_constraint",
            UnscheduledReason::SubgroupPairingFailed => "subgroup_pairing_failed",
            UnscheduledReason::NoConsecutiveSlots => "no_consecutive_slots",
            UnscheduledReason::AllSlotsExhausted => "all_slots_exhausted",
            UnscheduledReason::Infeasible => "infeasible",
            UnscheduledReason::SolverTimeout => "solver_timeout",
            UnscheduledReason::Unknown => "unknown",
        }
    }

    /// Retry priority for the stage-7 unscheduled queue; lower runs first
    pub fn retry_priority(&self) -> u8 {
        match self {
            UnscheduledReason::BuildingGapRequired => 1,
            UnscheduledReason::SubjectDailyLimitExceeded => 2,
            UnscheduledReason::GroupConflict => 3,
            UnscheduledReason::InstructorConflict => 4,
            UnscheduledReason::NoRoomAvailable => 5,
            UnscheduledReason::AllSlotsExhausted => 6,
            UnscheduledReason::InstructorUnavailable => 7,
            UnscheduledReason::DailyLoadExceeded => 8,
            UnscheduledReason::MaxWindowsExceeded => 9,
            UnscheduledReason::SubgroupPairingFailed => 10,
            _ => 100,
        }
    }
}

impl fmt::Display for UnscheduledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stream the pipeline could not place, with a structured reason and a
/// free-form detail string naming the offending resource and position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnscheduledStream {
    pub stream_id: StreamId,
    pub subject: String,
    pub stream_type: StreamType,
    pub instructor: String,
    pub groups: Vec<String>,
    pub student_count: u32,
    pub reason: UnscheduledReason,
    pub details: String,
}

impl UnscheduledStream {
    /// Build an unscheduled record from a stream and a failure
    pub fn from_stream(
        stream: &super::Stream,
        reason: UnscheduledReason,
        details: impl Into<String>,
    ) -> Self {
        Self {
            stream_id: stream.id.clone(),
            subject: stream.subject.clone(),
            stream_type: stream.stream_type,
            instructor: stream.instructor.clone(),
            groups: stream.groups.clone(),
            student_count: stream.student_count,
            reason,
            details: details.into(),
        }
    }
}
