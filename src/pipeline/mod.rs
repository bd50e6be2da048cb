// src/pipeline/mod.rs

pub mod batch;
pub mod cycle_spec;
pub mod diagnostics;
pub mod trial;

pub use batch::{find_trial_files, process_trial, write_diagnostics};
pub use cycle_spec::{CycleFilter, CycleSpec};
pub use diagnostics::{CycleSummary, SideThresholds, TrialDiagnostics};
pub use trial::Trial;
