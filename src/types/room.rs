use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical room.
///
/// Room names repeat across buildings; the (name, address) pair is the
/// identity. `is_special` marks rooms usable only when an instructor or
/// subject rule explicitly asks for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub capacity: u32,
    pub address: String,
    #[serde(default)]
    pub is_special: bool,
}

impl Room {
    pub fn key(&self) -> RoomKey {
        RoomKey {
            name: self.name.clone(),
            address: self.address.clone(),
        }
    }
}

/// Identity of a room: (name, address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomKey {
    pub name: String,
    pub address: String,
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_different_address_distinct() {
        let a = Room {
            name: "112".to_string(),
            capacity: 30,
            address: "Addr1".to_string(),
            is_special: false,
        };
        let b = Room {
            name: "112".to_string(),
            capacity: 20,
            address: "Addr2".to_string(),
            is_special: false,
        };
        assert_ne!(a.key(), b.key());
    }
}
