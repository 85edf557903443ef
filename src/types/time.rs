use serde::{Deserialize, Serialize};
use std::fmt;

/// Days of the academic week, ordered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    /// All scheduling weekdays, in order
    pub const ALL: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    /// Primary days for lecture placement
    pub const PRIMARY: [Day; 3] = [Day::Monday, Day::Tuesday, Day::Wednesday];

    /// Fallback days for lecture placement (Stage 4+)
    pub const FALLBACK: [Day; 2] = [Day::Thursday, Day::Friday];

    /// Lowercase day name used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
        }
    }

    /// Parse a lowercase day name; Saturday appears in availability files
    /// but is never scheduled, so it is rejected here and must be filtered
    /// by the caller.
    pub fn from_name(name: &str) -> Option<Day> {
        match name.trim().to_lowercase().as_str() {
            "monday" => Some(Day::Monday),
            "tuesday" => Some(Day::Tuesday),
            "wednesday" => Some(Day::Wednesday),
            "thursday" => Some(Day::Thursday),
            "friday" => Some(Day::Friday),
            _ => None,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Week parity of an assignment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WeekType {
    Odd,
    Even,
    Both,
}

impl WeekType {
    /// Week types whose reservations block a reservation of `self`.
    ///
    /// `Both` occupies the same position on every academic week, so it
    /// conflicts with `Odd` and `Even` (and vice versa).
    pub fn conflicting(&self) -> &'static [WeekType] {
        match self {
            WeekType::Both => &[WeekType::Both, WeekType::Odd, WeekType::Even],
            WeekType::Odd => &[WeekType::Odd, WeekType::Both],
            WeekType::Even => &[WeekType::Even, WeekType::Both],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeekType::Odd => "odd",
            WeekType::Even => "even",
            WeekType::Both => "both",
        }
    }
}

impl fmt::Display for WeekType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Slot number within a day, 1..=13 at one-hour pitch starting 09:00
pub type Slot = u8;

pub const MIN_SLOT: Slot = 1;
pub const MAX_SLOT: Slot = 13;

/// Academic shift (first or second half of day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    First,
    Second,
}

pub const FIRST_SHIFT_SLOTS: [Slot; 5] = [1, 2, 3, 4, 5];
pub const SECOND_SHIFT_SLOTS: [Slot; 8] = [6, 7, 8, 9, 10, 11, 12, 13];

/// Extended first shift, used only as an overflow bucket for first-shift
/// streams once slots 1-5 are exhausted
pub const EXTENDED_FIRST_SHIFT_SLOTS: [Slot; 7] = [1, 2, 3, 4, 5, 6, 7];

impl Shift {
    /// Standard slots of this shift
    pub fn slots(&self) -> &'static [Slot] {
        match self {
            Shift::First => &FIRST_SHIFT_SLOTS,
            Shift::Second => &SECOND_SHIFT_SLOTS,
        }
    }

    /// Slots including the first-shift overflow bucket
    pub fn extended_slots(&self) -> &'static [Slot] {
        match self {
            Shift::First => &EXTENDED_FIRST_SHIFT_SLOTS,
            Shift::Second => &SECOND_SHIFT_SLOTS,
        }
    }

    /// Overflow slots beyond the standard range (empty for second shift)
    pub fn overflow_slots(&self) -> &'static [Slot] {
        match self {
            Shift::First => &[6, 7],
            Shift::Second => &[],
        }
    }

    /// Shift a slot belongs to, for statistics
    pub fn of_slot(slot: Slot) -> Shift {
        if slot <= 5 {
            Shift::First
        } else {
            Shift::Second
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::First => "first",
            Shift::Second => "second",
        }
    }
}

/// Clock start time of a slot, bit-exact per the wire protocol
pub fn slot_to_time(slot: Slot) -> Option<&'static str> {
    match slot {
        1 => Some("09:00"),
        2 => Some("10:00"),
        3 => Some("11:00"),
        4 => Some("12:00"),
        5 => Some("13:00"),
        6 => Some("14:00"),
        7 => Some("15:00"),
        8 => Some("16:00"),
        9 => Some("17:00"),
        10 => Some("18:00"),
        11 => Some("19:00"),
        12 => Some("20:00"),
        13 => Some("21:00"),
        _ => None,
    }
}

/// Inverse of [`slot_to_time`]
pub fn time_to_slot(time: &str) -> Option<Slot> {
    match time.trim() {
        "09:00" => Some(1),
        "10:00" => Some(2),
        "11:00" => Some(3),
        "12:00" => Some(4),
        "13:00" => Some(5),
        "14:00" => Some(6),
        "15:00" => Some(7),
        "16:00" => Some(8),
        "17:00" => Some(9),
        "18:00" => Some(10),
        "19:00" => Some(11),
        "20:00" => Some(12),
        "21:00" => Some(13),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_time_round_trip() {
        for slot in MIN_SLOT..=MAX_SLOT {
            let time = slot_to_time(slot).expect("slot in range");
            assert_eq!(time_to_slot(time), Some(slot));
        }
        assert_eq!(slot_to_time(0), None);
        assert_eq!(slot_to_time(14), None);
        assert_eq!(time_to_slot("08:00"), None);
    }

    #[test]
    fn test_week_type_cross_blocking() {
        assert!(WeekType::Odd.conflicting().contains(&WeekType::Both));
        assert!(WeekType::Even.conflicting().contains(&WeekType::Both));
        assert!(WeekType::Both.conflicting().contains(&WeekType::Odd));
        assert!(WeekType::Both.conflicting().contains(&WeekType::Even));
        assert!(!WeekType::Odd.conflicting().contains(&WeekType::Even));
    }

    #[test]
    fn test_shift_slots() {
        assert_eq!(Shift::First.slots(), &[1, 2, 3, 4, 5]);
        assert_eq!(Shift::Second.slots().len(), 8);
        assert_eq!(Shift::First.extended_slots(), &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(Shift::Second.overflow_slots(), &[] as &[Slot]);
        assert_eq!(Shift::of_slot(5), Shift::First);
        assert_eq!(Shift::of_slot(6), Shift::Second);
    }

    #[test]
    fn test_day_names() {
        assert_eq!(Day::from_name("Monday"), Some(Day::Monday));
        assert_eq!(Day::from_name("friday"), Some(Day::Friday));
        assert_eq!(Day::from_name("saturday"), None);
        assert_eq!(Day::Wednesday.name(), "wednesday");
    }

    #[test]
    fn test_day_ordering() {
        assert!(Day::Monday < Day::Friday);
        let mut days = vec![Day::Friday, Day::Monday, Day::Wednesday];
        days.sort();
        assert_eq!(days, vec![Day::Monday, Day::Wednesday, Day::Friday]);
    }
}
