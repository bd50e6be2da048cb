// src/analysis/reconciler.rs
//
// Snaps velocity events onto nearby forceplate events. Only contacts judged
// Valid for the event's side may replace; matches against Invalid or
// DoubleContact intervals are kept as report entries.

use super::forceplate::{ContactInterval, ContactValidity};
use crate::types::{Event, EventKind, ReconcileConfig, Side, SideEvents};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replacement {
    pub side: Side,
    pub kind: EventKind,
    pub velocity_frame: usize,
    pub forceplate_frame: usize,
    pub plate_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnusableContactMatch {
    pub side: Side,
    pub kind: EventKind,
    pub velocity_frame: usize,
    pub forceplate_frame: usize,
    pub plate_index: usize,
    pub validity: ContactValidity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub replacements: Vec<Replacement>,
    pub unusable_matches: Vec<UnusableContactMatch>,
}

pub struct EventReconciler {
    config: ReconcileConfig,
}

impl EventReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Nearest forceplate frame of `kind` within tolerance among contacts
    /// accepted by `usable`. Ties go to the earlier frame.
    fn nearest<'a>(
        &self,
        frame: usize,
        kind: EventKind,
        contacts: &'a [ContactInterval],
        usable: impl Fn(&ContactInterval) -> bool,
    ) -> Option<(usize, &'a ContactInterval)> {
        contacts
            .iter()
            .filter(|c| usable(c))
            .filter_map(|c| {
                let fp_frame = match kind {
                    EventKind::Strike => Some(c.strike_frame),
                    EventKind::ToeOff => c.toeoff_frame,
                }?;
                let dist = fp_frame.abs_diff(frame);
                (dist <= self.config.tolerance_frames).then_some((dist, fp_frame, c))
            })
            .min_by_key(|(dist, fp_frame, _)| (*dist, *fp_frame))
            .map(|(_, fp_frame, c)| (fp_frame, c))
    }

    pub fn reconcile(
        &self,
        velocity: &SideEvents,
        contacts: &[ContactInterval],
    ) -> (SideEvents, ReconcileReport) {
        let mut merged = SideEvents::default();
        let mut report = ReconcileReport::default();

        for side in Side::BOTH {
            let out = merged.side_mut(side);
            for event in velocity.side(side) {
                // unusable contacts carry no reliable side
                let unusable = self.nearest(event.frame, event.kind, contacts, |c| {
                    c.validity != ContactValidity::Valid
                });
                if let Some((fp_frame, contact)) = unusable {
                    report.unusable_matches.push(UnusableContactMatch {
                        side,
                        kind: event.kind,
                        velocity_frame: event.frame,
                        forceplate_frame: fp_frame,
                        plate_index: contact.plate_index,
                        validity: contact.validity,
                    });
                }

                let valid = self.nearest(event.frame, event.kind, contacts, |c| c.is_valid_for(side));
                let Some((fp_frame, contact)) = valid else {
                    out.push(*event);
                    continue;
                };
                debug!(
                    "{:?} {:?}: frame {} -> {} (FP{})",
                    side,
                    event.kind,
                    event.frame,
                    fp_frame,
                    contact.plate_index + 1
                );
                report.replacements.push(Replacement {
                    side,
                    kind: event.kind,
                    velocity_frame: event.frame,
                    forceplate_frame: fp_frame,
                    plate_index: contact.plate_index,
                });
                out.push(Event::forceplate(fp_frame, event.kind, side, contact.plate_index));
            }

            out.sort_by_key(|e| e.frame);
            out.dedup_by_key(|e| (e.frame, e.kind));
        }

        info!(
            "reconciled events: {} replaced by forceplate, {} near unusable contacts",
            report.replacements.len(),
            report.unusable_matches.len()
        );
        (merged, report)
    }
}
