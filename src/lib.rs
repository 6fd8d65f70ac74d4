// src/lib.rs
pub mod batch;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod processing;
pub mod progress;
pub mod timescale;

pub use calendar::YearMonth;
pub use error::SpeiError;
pub use timescale::Timescale;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
