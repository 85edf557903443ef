use super::{
    base_group, shift_for_groups, InstructorId, SecondShiftGroups, Shift, StreamId,
    WeekType,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of academic stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Lecture,
    Practical,
    Lab,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Lecture => "lecture",
            StreamType::Practical => "practical",
            StreamType::Lab => "lab",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Weekly hour counts per week parity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHours {
    #[serde(rename = "odd_week", default)]
    pub odd: u8,
    #[serde(rename = "even_week", default)]
    pub even: u8,
}

/// Atomic scheduling unit: one subject, one stream type, one instructor,
/// a set of student groups and weekly hour counts per week parity.
///
/// Streams are created once from parser output and never mutated; stage
/// bookkeeping (scores, shift, pairing) lives in stage-local structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub subject: String,
    pub stream_type: StreamType,
    /// Raw instructor spelling from the workload document (may carry an
    /// academic title prefix); use [`Stream::instructor_id`] for comparison
    pub instructor: String,
    #[serde(default)]
    pub language: String,
    pub groups: Vec<String>,
    #[serde(default)]
    pub student_count: u32,
    #[serde(default)]
    pub hours: StreamHours,
    #[serde(default)]
    pub is_subgroup: bool,
    #[serde(default)]
    pub is_implicit_subgroup: bool,
    #[serde(default)]
    pub paired_stream_id: Option<StreamId>,
}

impl Stream {
    /// Hours to place for a target week type: the per-parity count for
    /// `Odd`/`Even`, the max of the two for `Both`
    pub fn hours_for(&self, week_type: WeekType) -> u8 {
        match week_type {
            WeekType::Odd => self.hours.odd,
            WeekType::Even => self.hours.even,
            WeekType::Both => self.hours.odd.max(self.hours.even),
        }
    }

    /// Weekly hours used for priority sorting and `Both`-week placement
    pub fn max_hours(&self) -> u8 {
        self.hours.odd.max(self.hours.even)
    }

    /// Normalized instructor identity
    pub fn instructor_id(&self) -> InstructorId {
        InstructorId::normalize(&self.instructor)
    }

    /// Base groups (subgroup notation stripped), deduplicated
    pub fn base_groups(&self) -> Vec<String> {
        let mut out: Vec<String> = self.groups.iter().map(|g| base_group(g)).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Shift this stream's groups study in
    pub fn shift(&self, forced_second: &SecondShiftGroups) -> Shift {
        shift_for_groups(&self.groups, forced_second)
    }

    /// Whether any group of the stream carries subgroup notation or the
    /// stream is flagged as an (implicit) subgroup split
    pub fn is_any_subgroup(&self) -> bool {
        self.is_subgroup
            || self.is_implicit_subgroup
            || self.groups.iter().any(|g| super::parse_subgroup(g).is_some())
    }
}
