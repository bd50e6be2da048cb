// src/pipeline/diagnostics.rs
//
// Per-trial record of what the analysis kept, dropped and why. Serialized
// next to each trial by the batch binary.

use crate::analysis::{
    ContactInterval, ContactValidity, EventThresholds, GaitCycle, PlateContext, ReconcileReport, RejectedCycle,
};
use crate::types::{Event, Side};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SideThresholds {
    pub side: Side,
    pub thresholds: EventThresholds,
    pub peak_speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleSummary {
    pub right_cycles: usize,
    pub left_cycles: usize,
    pub forceplate_cycles: usize,
    pub rejected_cycles: usize,
    pub cycle_errors: usize,
    pub valid_contacts: usize,
    pub unusable_contacts: usize,
}

impl CycleSummary {
    pub fn new(
        cycles: &[GaitCycle],
        rejected: &[RejectedCycle],
        cycle_errors: usize,
        contacts: &[ContactInterval],
    ) -> Self {
        let count = |side: Side| cycles.iter().filter(|c| c.side == side).count();
        let valid_contacts = contacts
            .iter()
            .filter(|c| c.validity == ContactValidity::Valid)
            .count();
        Self {
            right_cycles: count(Side::Right),
            left_cycles: count(Side::Left),
            forceplate_cycles: cycles.iter().filter(|c| c.on_forceplate()).count(),
            rejected_cycles: rejected.len(),
            cycle_errors,
            valid_contacts,
            unusable_contacts: contacts.len() - valid_contacts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialDiagnostics {
    pub trial: String,
    pub frame_rate: f64,
    pub frame_count: usize,
    pub thresholds: Vec<SideThresholds>,
    /// Reconciled events of both sides in frame order
    pub events: Vec<Event>,
    /// Per-side failures (missing markers, no events)
    pub side_errors: Vec<String>,
    /// Cycles whose toe-off policy resolved to Error
    pub cycle_errors: Vec<String>,
    pub rejected_cycles: Vec<RejectedCycle>,
    pub contacts: Vec<ContactInterval>,
    pub reconcile: ReconcileReport,
    pub plate_context: PlateContext,
    pub summary: CycleSummary,
}

impl TrialDiagnostics {
    pub fn log_summary(&self) {
        let s = &self.summary;
        info!(
            "{}: {} right / {} left cycles, {} on forceplate, plates '{}'",
            self.trial, s.right_cycles, s.left_cycles, s.forceplate_cycles, self.plate_context.coded
        );
        for e in self.side_errors.iter().chain(self.cycle_errors.iter()) {
            warn!("{}: {}", self.trial, e);
        }
        if s.rejected_cycles > 0 {
            info!("{}: {} cycles excluded", self.trial, s.rejected_cycles);
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
