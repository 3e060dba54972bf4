#![forbid(unsafe_code)]

pub mod error;
pub mod gate;
pub mod grading;
pub mod lifecycle;
pub mod model;
pub mod policy;
pub mod selection;
pub mod time;

pub use error::Error;
pub use time::Clock;
