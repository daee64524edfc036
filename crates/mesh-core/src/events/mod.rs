//! Event output for the simulation.

pub mod logger;

pub use logger::EventLogger;
