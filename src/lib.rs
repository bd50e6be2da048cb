// src/lib.rs
//
// Gait cycle detection for motion-capture walking trials: foot-speed events,
// forceplate contact validation, cycle assembly and time normalization.

pub mod analysis;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod source;
pub mod types;

pub use analysis::{ContactInterval, ContactValidity, GaitCycle};
pub use error::{GaitError, Result};
pub use pipeline::{CycleFilter, CycleSpec, Trial, TrialDiagnostics};
pub use source::{MemorySource, TrialSource};
pub use types::{Config, Event, EventKind, EventSource, Side};
