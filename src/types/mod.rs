mod time;
mod group;
mod instructor;
mod stream;
mod room;
mod assignment;
mod result;
mod config;

pub use time::*;
pub use group::*;
pub use instructor::*;
pub use stream::*;
pub use room::*;
pub use assignment::*;
pub use result::*;
pub use config::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for stream identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub String);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
