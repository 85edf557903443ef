//! Course Scheduler - Staged greedy university timetable generator
//!
//! This library places academic *streams* (a subject taught to a set of
//! student groups by one instructor) into concrete (day, slot, room,
//! week-type) positions while respecting instructor/group/room mutual
//! exclusion, building-change travel gaps, subject pedagogy rules, daily
//! load limits and subgroup pairing.
//!
//! # Algorithm Overview
//!
//! The scheduler runs a pipeline of progressively harder stages:
//! 1. **Stage 1**: Multi-group lectures on primary days (Mon-Wed)
//! 2. **Stage 3**: Practicals without a lecture counterpart
//! 3. **Stage 4**: Single-group lectures with fallback days
//! 4. **Stage 5**: Practicals that depend on scheduled lectures
//! 5. **Stage 6**: Labs, including day-boundary subgroup pairing
//! 6. **Stage 7**: Optimizer - rebalance the board, retry unscheduled
//!
//! # Example
//!
//! ```no_run
//! use course_scheduler::parser::load_input_from_dir;
//! use course_scheduler::scheduler::schedule;
//! use course_scheduler::validator::validate_schedule;
//! use std::path::Path;
//!
//! let input = load_input_from_dir(Path::new("./data/demo")).unwrap();
//! let result = schedule(&input.streams, &input.config).unwrap();
//! let report = validate_schedule(&result, &input.streams, &input.config);
//! println!("Scheduled {} hours", result.statistics.scheduled_hours);
//! ```

pub mod error;
pub mod parser;
pub mod reporter;
pub mod scheduler;
pub mod types;
pub mod validator;

pub use error::{Result, SchedulerError};
