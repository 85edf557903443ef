//! Property tests for the reservation laws and capacity arithmetic.

use course_scheduler::scheduler::{ConflictTracker, RoomManager};
use course_scheduler::types::{Day, InstructorId, SchedulerConfig, WeekType};
use proptest::prelude::*;

fn day_strategy() -> impl Strategy<Value = Day> {
    prop_oneof![
        Just(Day::Monday),
        Just(Day::Tuesday),
        Just(Day::Wednesday),
        Just(Day::Thursday),
        Just(Day::Friday),
    ]
}

fn week_type_strategy() -> impl Strategy<Value = WeekType> {
    prop_oneof![Just(WeekType::Odd), Just(WeekType::Even), Just(WeekType::Both)]
}

fn group_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("СТР-21 О".to_string()),
        Just("СТР-21 О /1/".to_string()),
        Just("СТР-21 О /2/".to_string()),
        Just("АРХ-31 О".to_string()),
        Just("ВЕТ-11".to_string()),
    ]
}

proptest! {
    /// reserve(x); release(x) restores the tracker to its prior state,
    /// counters included
    #[test]
    fn reserve_release_round_trip(
        day in day_strategy(),
        slot in 1u8..=13,
        week_type in week_type_strategy(),
        groups in prop::collection::vec(group_strategy(), 1..3),
        subject_hours in 0u32..3,
    ) {
        let config = SchedulerConfig::default();
        let mut tracker = ConflictTracker::new(&config);

        // Start from a non-empty board so restoration is non-trivial
        let other = InstructorId::normalize("Фонов Ф.Ф.");
        tracker.reserve(
            &other,
            &["ЮР-21 О".to_string()],
            Day::Monday,
            6,
            WeekType::Both,
            "Addr0",
        );
        let before = tracker.clone();

        let instructor = InstructorId::normalize("проф. Иванов И.И.");
        tracker.reserve(&instructor, &groups, day, slot, week_type, "Addr1");
        if subject_hours > 0 {
            tracker.reserve_subject_hours(&groups, day, "Math", subject_hours);
        }

        if subject_hours > 0 {
            tracker.release_subject_hours(&groups, day, "Math", subject_hours);
        }
        tracker.release_slot(&instructor, &groups, day, slot, week_type, "Addr1");

        prop_assert_eq!(tracker, before);
    }

    /// A reservation blocks exactly the week types that overlap it
    #[test]
    fn cross_blocking_is_symmetric(
        day in day_strategy(),
        slot in 1u8..=13,
        reserved in week_type_strategy(),
        queried in week_type_strategy(),
    ) {
        let config = SchedulerConfig::default();
        let mut tracker = ConflictTracker::new(&config);
        let instructor = InstructorId::normalize("Иванов И.И.");
        tracker.reserve(
            &instructor,
            &["СТР-21 О".to_string()],
            day,
            slot,
            reserved,
            "Addr1",
        );

        let overlap = reserved == queried
            || reserved == WeekType::Both
            || queried == WeekType::Both;
        prop_assert_eq!(
            !tracker.is_instructor_available(&instructor, day, slot, queried),
            overlap
        );
    }

    /// The capacity buffer respects its 20%..50% envelope
    #[test]
    fn capacity_buffer_envelope(count in 1u32..500) {
        let buffer = RoomManager::capacity_buffer(count);
        prop_assert!(buffer <= count / 2);
        prop_assert!(buffer + 1 >= count / 5);
    }
}
