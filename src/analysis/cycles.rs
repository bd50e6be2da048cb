// src/analysis/cycles.rs
//
// Consecutive strikes of a side form a cycle [start, end). Toe-off policies
// decide what happens when the cycle does not contain exactly one toe-off.

use super::forceplate::ContactInterval;
use crate::error::{CycleStructureKind, GaitError};
use crate::source::MarkerChannel;
use crate::types::{CycleConfig, EventKind, MultipleToeoffsPolicy, NoToeoffPolicy, Side, SideEvents};
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaitCycle {
    /// 1-based position of the starting strike in the side's strike list
    pub index: usize,
    pub side: Side,
    pub start: usize,
    /// Exclusive; the next strike of the same side
    pub end: usize,
    pub toeoff: usize,
    pub contralateral_strikes: Vec<usize>,
    pub contralateral_toeoffs: Vec<usize>,
    pub forceplate_contact: Option<ContactInterval>,
}

impl GaitCycle {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Toe-off position within the cycle, rounded to whole percent
    pub fn toeoff_percent(&self) -> u32 {
        (100.0 * (self.toeoff - self.start) as f64 / self.len() as f64).round() as u32
    }

    pub fn on_forceplate(&self) -> bool {
        self.forceplate_contact.is_some()
    }

    /// e.g. "right1" or "left2 (f)"
    pub fn name(&self) -> String {
        format!(
            "{}{}{}",
            self.side.name().to_lowercase(),
            self.index,
            if self.on_forceplate() { " (f)" } else { "" }
        )
    }

    pub fn contains(&self, frame: usize) -> bool {
        (self.start..self.end).contains(&frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RejectReason {
    NoToeoff,
    MultipleToeoffs(usize),
    TooShort { frames: usize },
    OutsideRegion { start_coord: f64, end_coord: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedCycle {
    pub side: Side,
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct CycleAssembly {
    pub cycles: Vec<GaitCycle>,
    pub rejected: Vec<RejectedCycle>,
    /// Cycles whose toe-off policy resolved to Error
    pub errors: Vec<GaitError>,
}

// ============================================================================
// ASSEMBLER
// ============================================================================

pub struct CycleAssembler {
    config: CycleConfig,
}

impl CycleAssembler {
    pub fn new(config: CycleConfig) -> Self {
        Self { config }
    }

    /// Build cycles for both sides. `tracking` is the marker used by the
    /// principal-range filter.
    pub fn assemble(
        &self,
        events: &SideEvents,
        contacts: &[ContactInterval],
        tracking: Option<&MarkerChannel>,
    ) -> CycleAssembly {
        let mut out = CycleAssembly::default();

        for side in Side::BOTH {
            let strikes = events.frames(side, EventKind::Strike);
            let toeoffs = events.frames(side, EventKind::ToeOff);
            let contra_strikes = events.frames(side.opposite(), EventKind::Strike);
            let contra_toeoffs = events.frames(side.opposite(), EventKind::ToeOff);

            for (i, pair) in strikes.windows(2).enumerate() {
                let (start, end) = (pair[0], pair[1]);
                let index = i + 1;
                let reject = |reason| RejectedCycle {
                    side,
                    index,
                    start,
                    end,
                    reason,
                };

                let inside: Vec<usize> = toeoffs
                    .iter()
                    .copied()
                    .filter(|&f| start < f && f < end)
                    .collect();

                let toeoff = match inside.as_slice() {
                    [only] => *only,
                    [] => match self.config.no_toeoff {
                        NoToeoffPolicy::Reject => {
                            debug!("{:?} cycle [{}, {}): no toe-off, rejected", side, start, end);
                            out.rejected.push(reject(RejectReason::NoToeoff));
                            continue;
                        }
                        NoToeoffPolicy::Error => {
                            warn!("{:?} cycle [{}, {}): no toe-off", side, start, end);
                            out.errors.push(GaitError::CycleStructure {
                                side,
                                start,
                                end,
                                kind: CycleStructureKind::NoToeoff,
                            });
                            continue;
                        }
                    },
                    [first, ..] => match self.config.multiple_toeoffs {
                        MultipleToeoffsPolicy::AcceptFirst => *first,
                        MultipleToeoffsPolicy::Reject => {
                            debug!(
                                "{:?} cycle [{}, {}): {} toe-offs, rejected",
                                side,
                                start,
                                end,
                                inside.len()
                            );
                            out.rejected.push(reject(RejectReason::MultipleToeoffs(inside.len())));
                            continue;
                        }
                        MultipleToeoffsPolicy::Error => {
                            warn!("{:?} cycle [{}, {}): {} toe-offs", side, start, end, inside.len());
                            out.errors.push(GaitError::CycleStructure {
                                side,
                                start,
                                end,
                                kind: CycleStructureKind::MultipleToeoffs(inside.len()),
                            });
                            continue;
                        }
                    },
                };

                if end - start < self.config.min_cycle_duration {
                    debug!("{:?} cycle [{}, {}): too short", side, start, end);
                    out.rejected.push(reject(RejectReason::TooShort { frames: end - start }));
                    continue;
                }

                if let Some(reason) = self.outside_region(tracking, start, end) {
                    debug!("{:?} cycle [{}, {}): outside principal range", side, start, end);
                    out.rejected.push(reject(reason));
                    continue;
                }

                let in_cycle = |frames: &[usize]| -> Vec<usize> {
                    frames.iter().copied().filter(|f| (start..end).contains(f)).collect()
                };

                out.cycles.push(GaitCycle {
                    index,
                    side,
                    start,
                    end,
                    toeoff,
                    contralateral_strikes: in_cycle(&contra_strikes),
                    contralateral_toeoffs: in_cycle(&contra_toeoffs),
                    forceplate_contact: attach_contact(side, start, end, contacts),
                });
            }
        }

        info!(
            "assembled {} cycles ({} forceplate), {} rejected, {} errors",
            out.cycles.len(),
            out.cycles.iter().filter(|c| c.on_forceplate()).count(),
            out.rejected.len(),
            out.errors.len()
        );
        out
    }

    /// Some(reason) when the tracking marker is outside the principal range
    /// at both ends of the cycle. Missing data never excludes.
    fn outside_region(&self, tracking: Option<&MarkerChannel>, start: usize, end: usize) -> Option<RejectReason> {
        let [lo, hi] = self.config.principal_range?;
        let marker = tracking?;
        let axis = self.config.principal_axis.index();
        let start_coord = marker.position(start)?[axis];
        // end is exclusive; the closing strike frame may be the last frame
        let end_coord = marker.position(end).or_else(|| marker.position(end - 1))?[axis];
        let outside = |v: f64| v < lo || v > hi;
        (outside(start_coord) && outside(end_coord)).then_some(RejectReason::OutsideRegion {
            start_coord,
            end_coord,
        })
    }
}

/// First Valid contact of the side intersecting the cycle, by plate index and
/// then strike frame.
fn attach_contact(side: Side, start: usize, end: usize, contacts: &[ContactInterval]) -> Option<ContactInterval> {
    contacts
        .iter()
        .filter(|c| c.is_valid_for(side) && c.intersects(start, end))
        .min_by_key(|c| (c.plate_index, c.strike_frame))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::forceplate::ContactValidity;
    use crate::types::{Axis, Event};

    fn right_events(strikes: &[usize], toeoffs: &[usize]) -> SideEvents {
        let mut right: Vec<Event> = strikes
            .iter()
            .map(|&f| Event::velocity(f, EventKind::Strike, Side::Right))
            .chain(toeoffs.iter().map(|&f| Event::velocity(f, EventKind::ToeOff, Side::Right)))
            .collect();
        right.sort_by_key(|e| e.frame);
        SideEvents {
            right,
            left: Vec::new(),
        }
    }

    fn assembler(no_toeoff: NoToeoffPolicy, multiple: MultipleToeoffsPolicy) -> CycleAssembler {
        CycleAssembler::new(CycleConfig {
            no_toeoff,
            multiple_toeoffs: multiple,
            ..Default::default()
        })
    }

    fn valid_contact(plate_index: usize, strike: usize, toeoff: usize, side: Side) -> ContactInterval {
        ContactInterval {
            plate_index,
            strike_frame: strike,
            toeoff_frame: Some(toeoff),
            end_frame: toeoff,
            peak_frame: strike + 5,
            peak_force: 700.0,
            side: Some(side),
            validity: ContactValidity::Valid,
            hinted: false,
        }
    }

    #[test]
    fn test_single_toeoff_cycle() {
        let a = CycleAssembler::new(CycleConfig::default());
        let out = a.assemble(&right_events(&[0, 120, 240], &[60]), &[], None);
        assert_eq!(out.cycles.len(), 1);
        let c = &out.cycles[0];
        assert_eq!((c.start, c.end, c.toeoff), (0, 120, 60));
        assert_eq!(c.index, 1);
        assert_eq!(c.toeoff_percent(), 50);
        assert_eq!(c.name(), "right1");
        // [120, 240) has no toe-off
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].reason, RejectReason::NoToeoff);
    }

    #[test]
    fn test_multiple_toeoff_policies() {
        let events = right_events(&[0, 120], &[60, 90]);

        let out = assembler(NoToeoffPolicy::Reject, MultipleToeoffsPolicy::Reject).assemble(&events, &[], None);
        assert!(out.cycles.is_empty());
        assert_eq!(out.rejected[0].reason, RejectReason::MultipleToeoffs(2));

        let out =
            assembler(NoToeoffPolicy::Reject, MultipleToeoffsPolicy::AcceptFirst).assemble(&events, &[], None);
        assert_eq!(out.cycles[0].toeoff, 60);

        let out = assembler(NoToeoffPolicy::Reject, MultipleToeoffsPolicy::Error).assemble(&events, &[], None);
        assert!(out.cycles.is_empty());
        assert_eq!(
            out.errors,
            vec![GaitError::CycleStructure {
                side: Side::Right,
                start: 0,
                end: 120,
                kind: CycleStructureKind::MultipleToeoffs(2),
            }]
        );
    }

    #[test]
    fn test_no_toeoff_error_keeps_other_cycles() {
        let out = assembler(NoToeoffPolicy::Error, MultipleToeoffsPolicy::AcceptFirst)
            .assemble(&right_events(&[0, 120, 240], &[60]), &[], None);
        assert_eq!(out.cycles.len(), 1);
        assert!(matches!(
            out.errors[0],
            GaitError::CycleStructure {
                start: 120,
                kind: CycleStructureKind::NoToeoff,
                ..
            }
        ));
    }

    #[test]
    fn test_short_cycle_excluded() {
        let a = CycleAssembler::new(CycleConfig::default());
        let out = a.assemble(&right_events(&[0, 8], &[4]), &[], None);
        assert!(out.cycles.is_empty());
        assert_eq!(out.rejected[0].reason, RejectReason::TooShort { frames: 8 });
    }

    #[test]
    fn test_principal_range_filter() {
        let a = CycleAssembler::new(CycleConfig {
            principal_axis: Axis::Y,
            principal_range: Some([0.0, 500.0]),
            ..Default::default()
        });
        // pelvis moves 10 units per frame along y
        let samples: Vec<Option<[f64; 3]>> = (0..400).map(|f| Some([0.0, f as f64 * 10.0, 900.0])).collect();
        let lasi = MarkerChannel::from_samples("LASI", &samples);
        let events = right_events(&[0, 120, 240, 360], &[60, 180, 300]);

        let out = a.assemble(&events, &[], Some(&lasi));
        let kept: Vec<usize> = out.cycles.iter().map(|c| c.start).collect();
        assert_eq!(kept, vec![0]);
        assert_eq!(out.rejected.len(), 2);

        // no tracking marker: nothing is excluded
        let out = a.assemble(&events, &[], None);
        assert_eq!(out.cycles.len(), 3);
    }

    #[test]
    fn test_forceplate_attachment_and_contralateral() {
        let a = CycleAssembler::new(CycleConfig::default());
        let mut events = right_events(&[10, 130], &[70]);
        events.left = vec![
            Event::velocity(0, EventKind::ToeOff, Side::Left),
            Event::velocity(65, EventKind::Strike, Side::Left),
            Event::velocity(125, EventKind::ToeOff, Side::Left),
        ];
        let contacts = [
            valid_contact(1, 10, 70, Side::Right),
            valid_contact(0, 12, 72, Side::Right),
            valid_contact(2, 65, 125, Side::Left),
        ];
        let out = a.assemble(&events, &contacts, None);
        let c = &out.cycles[0];
        assert_eq!(c.forceplate_contact.as_ref().map(|fp| fp.plate_index), Some(0));
        assert_eq!(c.name(), "right1 (f)");
        assert_eq!(c.contralateral_strikes, vec![65]);
        assert_eq!(c.contralateral_toeoffs, vec![125]);
    }
}
