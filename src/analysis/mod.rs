// src/analysis/mod.rs
//
// Gait event and cycle analysis.
//
// Signal flow:
//   foot markers → velocity → event_detector ─────────┐
//   force plates → forceplate (contacts, triangles) ──┼→ reconciler → cycles
//                  └─ refines velocity thresholds ────┘
//   cycles + any channel → normalizer
//
// Orchestrated by pipeline::Trial.

pub mod cycles;
pub mod event_detector;
pub mod filters;
pub mod forceplate;
pub mod normalizer;
pub mod reconciler;
pub mod velocity;

pub use cycles::{CycleAssembler, CycleAssembly, GaitCycle, RejectReason, RejectedCycle};
pub use event_detector::{EventDetector, SpeedState};
pub use forceplate::{
    plate_context, Candidate, ContactInterval, ContactValidity, Feet, FootMarkerSet, FootTriangle,
    ForceplateContactValidator, PlateContext,
};
pub use normalizer::{percent_axis, CroppedAnalog, CycleNormalizer};
pub use reconciler::{EventReconciler, ReconcileReport, Replacement, UnusableContactMatch};
pub use velocity::{EventThresholds, SpeedProfile, ThresholdOrigin, VelocityProfiler};
