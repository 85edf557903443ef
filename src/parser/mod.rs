mod json;
mod rooms_csv;
mod validation;

pub use json::*;
pub use rooms_csv::*;
pub use validation::*;

use crate::types::{SchedulerConfig, Stream};

/// Everything the pipeline needs, loaded from an input directory
#[derive(Debug, Clone, Default)]
pub struct SchedulerInput {
    pub streams: Vec<Stream>,
    pub config: SchedulerConfig,
}
