use thiserror::Error;

/// Domain-specific errors for the scheduler
#[derive(Error, Debug)]
pub enum SchedulerError {
    // Input/Parse errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in '{file}': {message}")]
    JsonParse { file: String, message: String },

    #[error("Failed to parse rooms table '{file}' at line {line}: {message}")]
    RoomsParse {
        file: String,
        line: usize,
        message: String,
    },

    // Configuration errors (fatal before any scheduling)
    #[error("Unknown day name '{day}' in '{context}'")]
    UnknownDayName { day: String, context: String },

    #[error("Unknown clock time '{time}' in '{context}'")]
    UnknownClockTime { time: String, context: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Data validation errors
    #[error("Duplicate stream ID: '{0}'")]
    DuplicateStreamId(String),

    #[error("Empty rooms table: at least one room is required")]
    NoRooms,

    #[error("Room '{room}' at '{address}' has zero capacity")]
    ZeroCapacityRoom { room: String, address: String },

    // Validation errors
    #[error("Schedule violates hard constraint: {0}")]
    HardConstraintViolation(String),
}

/// Use anyhow::Result at application boundaries
pub type Result<T> = anyhow::Result<T>;
