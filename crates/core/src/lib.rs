#![forbid(unsafe_code)]

pub mod error;
pub mod grading;
pub mod mastery;
pub mod model;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
