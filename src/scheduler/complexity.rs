use super::PipelineState;
use crate::types::{ComplexityWeights, Day, Shift, Stream, WeekType};

/// Context a stage gathers before scoring one stream
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreInputs {
    /// Hours the instructor already has on the board
    pub instructor_load: u32,
    /// Free (day, slot) positions left for the stream's groups
    pub group_available_slots: u32,
    /// Subject or instructor restricts the room choice
    pub has_room_constraint: bool,
    /// Subject accepts any weekday (e.g. physical education)
    pub is_flexible: bool,
}

/// Complexity score used to order streams inside a stage, largest first:
///
/// `score = a*students + b*hours + c*instructor_load + d*room_constraint
///          + e*(1/(available_slots+1)) - f*flexible`
///
/// Larger streams, multi-hour streams, overbooked instructors,
/// room-constrained subjects and tight group calendars go first; flexible
/// subjects go last. The weights are tunable; the ordering they induce is
/// what matters.
pub fn complexity_score(
    stream: &Stream,
    weights: &ComplexityWeights,
    inputs: ScoreInputs,
) -> f64 {
    let mut score = weights.student_count * stream.student_count as f64
        + weights.hours * stream.max_hours() as f64
        + weights.instructor_load * inputs.instructor_load as f64
        + weights.tight_calendar / (inputs.group_available_slots as f64 + 1.0);
    if inputs.has_room_constraint {
        score += weights.room_constraint;
    }
    if inputs.is_flexible {
        score -= weights.flexible;
    }
    score
}

/// Free positions a group has left on the given days within a shift
pub fn group_available_slots(
    state: &PipelineState,
    group: &str,
    days: &[Day],
    shift: Shift,
) -> u32 {
    let groups = [group.to_string()];
    let mut free = 0;
    for day in days {
        for &slot in shift.slots() {
            if state
                .conflicts
                .are_groups_available(&groups, *day, slot, WeekType::Both)
            {
                free += 1;
            }
        }
    }
    free
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StreamHours, StreamId, StreamType};

    fn stream(count: u32, hours: u8) -> Stream {
        Stream {
            id: StreamId("s".to_string()),
            subject: "Subj".to_string(),
            stream_type: StreamType::Lecture,
            instructor: "Иванов И.И.".to_string(),
            language: String::new(),
            groups: vec!["АРХ-21 О".to_string()],
            student_count: count,
            hours: StreamHours { odd: hours, even: hours },
            is_subgroup: false,
            is_implicit_subgroup: false,
            paired_stream_id: None,
        }
    }

    #[test]
    fn test_larger_streams_score_higher() {
        let w = ComplexityWeights::default();
        let big = complexity_score(&stream(120, 1), &w, ScoreInputs::default());
        let small = complexity_score(&stream(15, 1), &w, ScoreInputs::default());
        assert!(big > small);
    }

    #[test]
    fn test_room_constraint_raises_priority() {
        let w = ComplexityWeights::default();
        let constrained = complexity_score(
            &stream(20, 1),
            &w,
            ScoreInputs {
                has_room_constraint: true,
                ..ScoreInputs::default()
            },
        );
        let free = complexity_score(&stream(20, 1), &w, ScoreInputs::default());
        assert!(constrained > free);
    }

    #[test]
    fn test_flexible_subjects_sort_last() {
        let w = ComplexityWeights::default();
        let flexible = complexity_score(
            &stream(200, 2),
            &w,
            ScoreInputs {
                is_flexible: true,
                ..ScoreInputs::default()
            },
        );
        let regular = complexity_score(&stream(10, 1), &w, ScoreInputs::default());
        assert!(flexible < regular);
    }

    #[test]
    fn test_tight_calendar_raises_priority() {
        let w = ComplexityWeights::default();
        let tight = complexity_score(
            &stream(20, 1),
            &w,
            ScoreInputs {
                group_available_slots: 1,
                ..ScoreInputs::default()
            },
        );
        let open = complexity_score(
            &stream(20, 1),
            &w,
            ScoreInputs {
                group_available_slots: 34,
                ..ScoreInputs::default()
            },
        );
        assert!(tight > open);
    }
}
