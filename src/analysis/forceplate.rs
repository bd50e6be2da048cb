// src/analysis/forceplate.rs
//
// Forceplate contact detection and single-foot validation.
//
//   vertical force ─► candidate intervals (threshold runs, peak check)
//   foot markers   ─► FootTriangle per side ─► inside / touches plate
//                                            └► Valid(side) | Invalid | DoubleContact

use super::filters::median_filter_dense;
use crate::geometry::{distance3, heading, Point2};
use crate::source::{ForceplateChannel, ForceplateGeometry, MarkerChannel, PlateHint, SubjectParams};
use crate::types::{Event, EventKind, ForceplateConfig, Side};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, info, warn};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContactValidity {
    Valid,
    Invalid,
    DoubleContact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactInterval {
    pub plate_index: usize,
    /// Frame where force rises above the contact threshold
    pub strike_frame: usize,
    /// Frame where force falls back to the threshold; None if it never does
    pub toeoff_frame: Option<usize>,
    /// Exclusive end of the contact on the frame axis
    pub end_frame: usize,
    pub peak_frame: usize,
    pub peak_force: f64,
    pub side: Option<Side>,
    pub validity: ContactValidity,
    /// Validity taken from trial metadata instead of geometry
    pub hinted: bool,
}

impl ContactInterval {
    pub fn frame_range(&self) -> Range<usize> {
        self.strike_frame..self.end_frame
    }

    pub fn intersects(&self, start: usize, end: usize) -> bool {
        self.strike_frame < end && start < self.end_frame
    }

    pub fn is_valid_for(&self, side: Side) -> bool {
        self.validity == ContactValidity::Valid && self.side == Some(side)
    }

    /// Forceplate-derived events of a valid contact
    pub fn events(&self) -> Vec<Event> {
        let Some(side) = self.side else {
            return Vec::new();
        };
        let mut events = vec![Event::forceplate(
            self.strike_frame,
            EventKind::Strike,
            side,
            self.plate_index,
        )];
        if let Some(toeoff) = self.toeoff_frame {
            events.push(Event::forceplate(toeoff, EventKind::ToeOff, side, self.plate_index));
        }
        events
    }
}

/// A threshold run before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub interval: ContactInterval,
    /// False when the center of pressure moved more than allowed
    pub cop_ok: bool,
}

/// Estimated sole outline of one foot in the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FootTriangle {
    pub heel: Point2,
    pub medial_toe: Point2,
    pub lateral_toe: Point2,
}

impl FootTriangle {
    /// Triangle from heel and toe markers. `length` is the full heel-to-tip
    /// length, `breadth` the width across the toes.
    pub fn estimate(side: Side, heel: [f64; 3], toe: [f64; 3], length: f64, breadth: f64) -> Option<Self> {
        let heel2 = Point2::from_xyz(heel);
        let u = Point2::from_xyz(toe).sub(heel2).unit()?;
        let tip = heel2.add(u.scale(length));
        // counter-clockwise normal points to the subject's left
        let medial = match side {
            Side::Right => u.perp(),
            Side::Left => u.perp().scale(-1.0),
        };
        let half = breadth / 2.0;
        Some(Self {
            heel: heel2,
            medial_toe: tip.add(medial.scale(half)),
            lateral_toe: tip.sub(medial.scale(half)),
        })
    }

    /// Direction of the foot axis in the ground plane, degrees
    pub fn heading_deg(&self) -> f64 {
        let tip = self.medial_toe.add(self.lateral_toe).scale(0.5);
        heading(self.heel, tip).to_degrees()
    }

    pub fn vertices(&self) -> [Point2; 3] {
        [self.heel, self.medial_toe, self.lateral_toe]
    }

    /// All vertices on the plate
    pub fn inside(&self, plate: &ForceplateGeometry) -> bool {
        self.vertices().iter().all(|v| plate.contains(*v))
    }

    /// Any vertex on the plate
    pub fn touches(&self, plate: &ForceplateGeometry) -> bool {
        self.vertices().iter().any(|v| plate.contains(*v))
    }
}

/// Marker trajectories needed to place one foot.
#[derive(Debug, Clone)]
pub struct FootMarkerSet {
    pub heel: MarkerChannel,
    pub toe: MarkerChannel,
    pub ankle: Option<MarkerChannel>,
}

#[derive(Debug, Clone, Default)]
pub struct Feet {
    pub right: Option<FootMarkerSet>,
    pub left: Option<FootMarkerSet>,
}

impl Feet {
    pub fn get(&self, side: Side) -> Option<&FootMarkerSet> {
        match side {
            Side::Right => self.right.as_ref(),
            Side::Left => self.left.as_ref(),
        }
    }
}

/// Context recommendation per plate, for the caller to persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlateContext {
    /// "FP1" -> "Right" | "Left" | "Invalid"
    pub by_plate: BTreeMap<String, String>,
    /// One char per plate: R, L or X
    pub coded: String,
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct ForceplateContactValidator {
    config: ForceplateConfig,
}

impl ForceplateContactValidator {
    pub fn new(config: ForceplateConfig) -> Self {
        Self { config }
    }

    /// Threshold runs of the vertical force whose peak reaches the minimum
    /// load. Returned intervals are unclassified (Invalid, no side). A run
    /// already in progress at the first sample has no strike and is skipped.
    pub fn candidate_intervals(
        &self,
        plate: &ForceplateChannel,
        weight: f64,
        frame_rate: f64,
        frame_count: usize,
    ) -> Vec<Candidate> {
        if weight <= 0.0 || frame_rate <= 0.0 || plate.rate <= 0.0 || frame_count == 0 {
            warn!("FP{}: cannot detect contacts without weight and rates", plate.index + 1);
            return Vec::new();
        }

        let force = median_filter_dense(&plate.vertical_force(), self.config.force_median_width);
        let threshold = self.config.contact_threshold * weight;
        let min_peak = self.config.min_weight * weight;
        let samples_per_frame = plate.rate / frame_rate;
        let to_frame = |sample: usize| {
            ((sample as f64 / samples_per_frame).round() as usize).min(frame_count - 1)
        };

        let mut candidates = Vec::new();
        let mut i = 0;
        while i < force.len() {
            if force[i] <= threshold {
                i += 1;
                continue;
            }
            let start = i;
            let mut peak = i;
            while i < force.len() && force[i] > threshold {
                if force[i] > force[peak] {
                    peak = i;
                }
                i += 1;
            }
            let fall = (i < force.len()).then_some(i);

            if start == 0 {
                debug!("FP{}: contact in progress at start of data, skipped", plate.index + 1);
                continue;
            }
            if force[peak] <= min_peak {
                debug!(
                    "FP{}: contact at sample {} too light ({:.0} N <= {:.0} N)",
                    plate.index + 1,
                    start,
                    force[peak],
                    min_peak
                );
                continue;
            }

            let cop_ok = match self.config.max_cop_shift {
                Some(max_shift) => {
                    let shift = cop_shift(plate, start, fall.unwrap_or(force.len()));
                    if shift > max_shift {
                        debug!(
                            "FP{}: center of pressure shifts {:.0} during contact (double contact?)",
                            plate.index + 1,
                            shift
                        );
                    }
                    shift <= max_shift
                }
                None => true,
            };

            let strike_frame = to_frame(start);
            let toeoff_frame = fall.map(to_frame);
            candidates.push(Candidate {
                interval: ContactInterval {
                    plate_index: plate.index,
                    strike_frame,
                    toeoff_frame,
                    end_frame: toeoff_frame.unwrap_or(frame_count).max(strike_frame + 1),
                    peak_frame: to_frame(peak),
                    peak_force: force[peak],
                    side: None,
                    validity: ContactValidity::Invalid,
                    hinted: false,
                },
                cop_ok,
            });
        }
        candidates
    }

    pub fn foot_length(&self, side: Side, feet: &FootMarkerSet, subject: &SubjectParams, frame: usize) -> Option<f64> {
        if let Some(len) = subject.foot_len(side) {
            return Some(len);
        }
        let ankle = feet.ankle.as_ref()?.position(frame)?;
        let heel = feet.heel.position(frame)?;
        Some(self.config.foot_relative_len * distance3(ankle, heel))
    }

    pub fn foot_triangle(
        &self,
        side: Side,
        feet: &Feet,
        subject: &SubjectParams,
        frame: usize,
    ) -> Option<FootTriangle> {
        let markers = feet.get(side)?;
        let heel = markers.heel.position(frame)?;
        let toe = markers.toe.position(frame)?;
        let length = self.foot_length(side, markers, subject, frame)?;
        FootTriangle::estimate(side, heel, toe, length, self.config.foot_breadth)
    }

    /// Geometric classification of one contact.
    pub fn classify(
        &self,
        plate: &ForceplateGeometry,
        interval: &ContactInterval,
        feet: &Feet,
        subject: &SubjectParams,
    ) -> (Option<Side>, ContactValidity) {
        let mut window = vec![interval.strike_frame, interval.peak_frame];
        window.extend(interval.toeoff_frame);

        let mut touching = Vec::new();
        let mut passing = Vec::new();
        for side in Side::BOTH {
            let touches = window.iter().any(|&f| {
                self.foot_triangle(side, feet, subject, f)
                    .is_some_and(|t| t.touches(plate))
            });
            if touches {
                touching.push(side);
            }
            let at_peak = self.foot_triangle(side, feet, subject, interval.peak_frame);
            if let Some(t) = at_peak.filter(|t| t.inside(plate)) {
                debug!(
                    "FP{}: {:?} foot inside at frame {} (heading {:.0} deg)",
                    interval.plate_index + 1,
                    side,
                    interval.peak_frame,
                    t.heading_deg()
                );
                passing.push(side);
            }
        }

        if touching.len() == Side::BOTH.len() {
            return (None, ContactValidity::DoubleContact);
        }
        match passing.as_slice() {
            [side] => (Some(*side), ContactValidity::Valid),
            _ => (None, ContactValidity::Invalid),
        }
    }

    /// Detect and classify contacts on every plate. Intervals are returned in
    /// plate order, then by strike frame.
    pub fn validate(
        &self,
        plates: &[ForceplateChannel],
        feet: &Feet,
        subject: &SubjectParams,
        hints: &[PlateHint],
        frame_rate: f64,
        frame_count: usize,
    ) -> Vec<ContactInterval> {
        let weight = subject.weight();
        let mut all = Vec::new();

        for plate in plates {
            let hint = hints
                .get(plate.index)
                .copied()
                .filter(|_| self.config.honor_plate_hints)
                .unwrap_or(PlateHint::Auto);

            for candidate in self.candidate_intervals(plate, weight, frame_rate, frame_count) {
                let mut interval = candidate.interval;
                if !candidate.cop_ok {
                    all.push(interval);
                    continue;
                }
                let (side, validity) = match hint {
                    PlateHint::Right => (Some(Side::Right), ContactValidity::Valid),
                    PlateHint::Left => (Some(Side::Left), ContactValidity::Valid),
                    PlateHint::Invalid => (None, ContactValidity::Invalid),
                    PlateHint::Auto => self.classify(&plate.geometry, &interval, feet, subject),
                };
                interval.side = side;
                interval.validity = validity;
                interval.hinted = hint != PlateHint::Auto;

                info!(
                    "FP{}: contact frames {:?} -> {:?} {:?}{}",
                    plate.index + 1,
                    interval.frame_range(),
                    validity,
                    side,
                    if interval.hinted { " (from metadata)" } else { "" }
                );
                all.push(interval);
            }
        }

        all.sort_by_key(|c| (c.plate_index, c.strike_frame));
        all
    }
}

/// Largest x or y excursion of the center of pressure over a sample range.
fn cop_shift(plate: &ForceplateChannel, start: usize, end: usize) -> f64 {
    let cop = plate.center_of_pressure();
    let end = end.min(cop.len());
    let points: Vec<Point2> = cop.get(start..end).unwrap_or(&[]).iter().flatten().copied().collect();
    if points.is_empty() {
        return 0.0;
    }
    let span = |f: fn(&Point2) -> f64| {
        let lo = points.iter().map(f).fold(f64::INFINITY, f64::min);
        let hi = points.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
        hi - lo
    };
    span(|p| p.x).max(span(|p| p.y))
}

/// Recommended metadata context per plate: the side of the plate's first
/// valid contact, else Invalid.
pub fn plate_context(contacts: &[ContactInterval], n_plates: usize) -> PlateContext {
    let mut ctx = PlateContext::default();
    for index in 0..n_plates {
        let side = contacts
            .iter()
            .filter(|c| c.plate_index == index && c.validity == ContactValidity::Valid)
            .min_by_key(|c| c.strike_frame)
            .and_then(|c| c.side);
        let (name, code) = match side {
            Some(s) => (s.name(), s.as_str()),
            None => ("Invalid", "X"),
        };
        ctx.by_plate.insert(format!("FP{}", index + 1), name.to_string());
        ctx.coded.push_str(code);
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const PLATE: (f64, f64, f64, f64) = (0.0, 0.0, 500.0, 600.0);

    fn geometry() -> ForceplateGeometry {
        ForceplateGeometry::rect(PLATE.0, PLATE.1, PLATE.2, PLATE.3)
    }

    fn subject() -> SubjectParams {
        SubjectParams {
            bodymass: 70.0,
            right_foot_len: Some(250.0),
            left_foot_len: Some(250.0),
        }
    }

    /// Foot standing still at (x, y) pointing +y for `frames` frames
    fn still_foot(side: Side, x: f64, y: f64, frames: usize) -> FootMarkerSet {
        let p = side.as_str();
        let at = |dy: f64, z: f64| vec![Some([x, y + dy, z]); frames];
        FootMarkerSet {
            heel: MarkerChannel::from_samples(format!("{p}HEE"), &at(0.0, 30.0)),
            toe: MarkerChannel::from_samples(format!("{p}TOE"), &at(180.0, 30.0)),
            ankle: Some(MarkerChannel::from_samples(format!("{p}ANK"), &at(40.0, 80.0))),
        }
    }

    fn plate_with_force(fz: &[f64]) -> ForceplateChannel {
        let mut force = Array2::<f64>::zeros((fz.len(), 3));
        for (i, f) in fz.iter().enumerate() {
            force[[i, 2]] = -f;
        }
        ForceplateChannel {
            index: 0,
            geometry: geometry(),
            rate: 1000.0,
            moment: Array2::zeros((fz.len(), 3)),
            force,
            dz: 0.0,
        }
    }

    /// 100 Hz frames, 1000 Hz analog: contact from sample 200 to 800
    fn step_force() -> Vec<f64> {
        (0..1200)
            .map(|i| if (200..800).contains(&i) { 700.0 } else { 0.0 })
            .collect()
    }

    fn interval(strike: usize, peak: usize, toeoff: usize) -> ContactInterval {
        ContactInterval {
            plate_index: 0,
            strike_frame: strike,
            toeoff_frame: Some(toeoff),
            end_frame: toeoff,
            peak_frame: peak,
            peak_force: 700.0,
            side: None,
            validity: ContactValidity::Invalid,
            hinted: false,
        }
    }

    #[test]
    fn test_candidate_interval_frames() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        let plate = plate_with_force(&step_force());
        let found = v.candidate_intervals(&plate, subject().weight(), 100.0, 120);
        assert_eq!(found.len(), 1);
        assert!(found[0].cop_ok);
        let c = &found[0].interval;
        assert_eq!(c.strike_frame, 20);
        assert_eq!(c.toeoff_frame, Some(80));
        assert_eq!(c.peak_frame, 20);
        assert_eq!(c.frame_range(), 20..80);
    }

    #[test]
    fn test_light_contact_ignored() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        let fz: Vec<f64> = step_force().iter().map(|f| f * 0.5).collect();
        let plate = plate_with_force(&fz);
        assert!(v.candidate_intervals(&plate, subject().weight(), 100.0, 120).is_empty());
    }

    #[test]
    fn test_triangle_inside_is_valid() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        let feet = Feet {
            right: Some(still_foot(Side::Right, 250.0, 100.0, 120)),
            left: Some(still_foot(Side::Left, 800.0, 100.0, 120)),
        };
        let (side, validity) = v.classify(&geometry(), &interval(20, 40, 80), &feet, &subject());
        assert_eq!(validity, ContactValidity::Valid);
        assert_eq!(side, Some(Side::Right));
    }

    #[test]
    fn test_vertex_outside_is_invalid() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        // heel 10 units off the plate edge, toes on the plate
        let feet = Feet {
            right: Some(still_foot(Side::Right, 250.0, -10.0, 120)),
            left: Some(still_foot(Side::Left, 800.0, 100.0, 120)),
        };
        let (side, validity) = v.classify(&geometry(), &interval(20, 40, 80), &feet, &subject());
        assert_eq!(validity, ContactValidity::Invalid);
        assert_eq!(side, None);
    }

    #[test]
    fn test_both_feet_on_plate_is_double_contact() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        let feet = Feet {
            right: Some(still_foot(Side::Right, 300.0, 100.0, 120)),
            // left heel on the plate, toes beyond its far edge
            left: Some(still_foot(Side::Left, 100.0, 500.0, 120)),
        };
        let (side, validity) = v.classify(&geometry(), &interval(20, 40, 80), &feet, &subject());
        assert_eq!(validity, ContactValidity::DoubleContact);
        assert_eq!(side, None);
    }

    #[test]
    fn test_foot_length_from_ankle() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        let foot = still_foot(Side::Left, 0.0, 0.0, 3);
        let no_len = SubjectParams {
            bodymass: 70.0,
            ..Default::default()
        };
        // ankle-heel distance = hypot(40, 50)
        let expected = 3.5 * (40.0f64).hypot(50.0);
        let len = v.foot_length(Side::Left, &foot, &no_len, 1).unwrap();
        assert!((len - expected).abs() < 1e-9);
        assert_eq!(v.foot_length(Side::Left, &foot, &subject(), 1), Some(250.0));
    }

    #[test]
    fn test_triangle_orientation() {
        let tri = FootTriangle::estimate(Side::Right, [0.0, 0.0, 0.0], [0.0, 10.0, 0.0], 200.0, 100.0)
            .unwrap();
        // walking +y, the right foot's medial side is -x
        assert_eq!(tri.heel, Point2::new(0.0, 0.0));
        assert!((tri.medial_toe.x - -50.0).abs() < 1e-9);
        assert!((tri.lateral_toe.x - 50.0).abs() < 1e-9);
        assert!((tri.medial_toe.y - 200.0).abs() < 1e-9);
        assert!((tri.heading_deg() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_with_hint_skips_geometry() {
        let v = ForceplateContactValidator::new(ForceplateConfig::default());
        let plate = plate_with_force(&step_force());
        let contacts = v.validate(
            &[plate],
            &Feet::default(),
            &subject(),
            &[PlateHint::Left],
            100.0,
            120,
        );
        assert_eq!(contacts.len(), 1);
        assert!(contacts[0].hinted);
        assert!(contacts[0].is_valid_for(Side::Left));

        let ctx = plate_context(&contacts, 2);
        assert_eq!(ctx.by_plate["FP1"], "Left");
        assert_eq!(ctx.by_plate["FP2"], "Invalid");
        assert_eq!(ctx.coded, "LX");
    }

    #[test]
    fn test_hints_ignored_when_disabled() {
        let v = ForceplateContactValidator::new(ForceplateConfig {
            honor_plate_hints: false,
            ..Default::default()
        });
        let plate = plate_with_force(&step_force());
        let contacts = v.validate(&[plate], &Feet::default(), &subject(), &[PlateHint::Left], 100.0, 120);
        assert!(!contacts[0].hinted);
        assert_eq!(contacts[0].validity, ContactValidity::Invalid);
    }

    #[test]
    fn test_cop_shift_rejects_contact() {
        let v = ForceplateContactValidator::new(ForceplateConfig {
            max_cop_shift: Some(300.0),
            honor_plate_hints: true,
            ..Default::default()
        });
        let mut plate = plate_with_force(&step_force());
        // CoP x = -My / Fz sweeps 0 -> 400 during the contact
        for i in 200..800 {
            let x = (i - 200) as f64 / 600.0 * 400.0;
            plate.moment[[i, 1]] = x * 700.0;
        }
        let contacts = v.validate(&[plate], &Feet::default(), &subject(), &[PlateHint::Right], 100.0, 120);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].validity, ContactValidity::Invalid);
        assert!(contacts[0].events().is_empty());
    }
}
