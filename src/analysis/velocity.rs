// src/analysis/velocity.rs

use super::filters::median_filter;
use crate::error::{GaitError, Result};
use crate::source::MarkerChannel;
use crate::types::{Side, VelocityConfig};
use serde::Serialize;
use tracing::{debug, warn};

/// Foot-centroid speed of one side, in marker units per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedProfile {
    pub side: Side,
    /// None where the speed is undefined (marker gaps, frame 0)
    pub speed: Vec<Option<f64>>,
    pub peak: f64,
}

impl SpeedProfile {
    /// Build from a precomputed signal; peak is the largest defined value
    pub fn from_speed(side: Side, speed: Vec<Option<f64>>) -> Self {
        let peak = speed.iter().flatten().copied().fold(0.0, f64::max);
        Self { side, speed, peak }
    }

    pub fn at(&self, frame: usize) -> Option<f64> {
        self.speed.get(frame).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.speed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speed.is_empty()
    }

    pub fn defined_count(&self) -> usize {
        self.speed.iter().filter(|s| s.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThresholdOrigin {
    Heuristic,
    Forceplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventThresholds {
    pub strike: f64,
    pub toeoff: f64,
    pub strike_origin: ThresholdOrigin,
    pub toeoff_origin: ThresholdOrigin,
}

impl EventThresholds {
    pub fn fixed(strike: f64, toeoff: f64) -> Self {
        Self {
            strike,
            toeoff,
            strike_origin: ThresholdOrigin::Heuristic,
            toeoff_origin: ThresholdOrigin::Heuristic,
        }
    }
}

pub struct VelocityProfiler {
    config: VelocityConfig,
}

impl VelocityProfiler {
    pub fn new(config: VelocityConfig) -> Self {
        Self { config }
    }

    /// Speed of the centroid of the valid foot markers. A frame only gets a
    /// speed when it and the previous frame see the same set of markers, so a
    /// marker dropping out never shows up as foot motion.
    pub fn profile(&self, side: Side, markers: &[MarkerChannel]) -> Result<SpeedProfile> {
        if markers.is_empty() || markers.iter().all(|m| m.valid_count() == 0) {
            return Err(GaitError::MissingMarkers {
                side,
                markers: markers.iter().map(|m| m.name.clone()).collect(),
            });
        }

        let n_frames = markers.iter().map(|m| m.len()).max().unwrap_or(0);
        let mut speed = vec![None; n_frames];
        let mut prev: Option<(Vec<bool>, [f64; 3])> = None;

        for (frame, slot) in speed.iter_mut().enumerate() {
            let positions: Vec<Option<[f64; 3]>> =
                markers.iter().map(|m| m.position(frame)).collect();
            let mask: Vec<bool> = positions.iter().map(|p| p.is_some()).collect();
            let valid: Vec<[f64; 3]> = positions.iter().flatten().copied().collect();

            if valid.is_empty() {
                prev = None;
                continue;
            }

            let k = valid.len() as f64;
            let centroid = valid.iter().fold([0.0; 3], |acc, p| {
                [acc[0] + p[0] / k, acc[1] + p[1] / k, acc[2] + p[2] / k]
            });

            if let Some((prev_mask, prev_centroid)) = &prev {
                if *prev_mask == mask {
                    let d = [
                        centroid[0] - prev_centroid[0],
                        centroid[1] - prev_centroid[1],
                        centroid[2] - prev_centroid[2],
                    ];
                    *slot = Some((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt());
                }
            }
            prev = Some((mask, centroid));
        }

        let speed = median_filter(&speed, self.config.median_width);
        let profile = SpeedProfile::from_speed(side, speed);

        if profile.defined_count() == 0 || profile.peak <= 0.0 {
            return Err(GaitError::NoValidEvents { side });
        }

        debug!(
            "{:?} foot speed: {} defined frames of {}, peak {:.2}",
            side,
            profile.defined_count(),
            profile.len(),
            profile.peak
        );
        Ok(profile)
    }

    pub fn heuristic_thresholds(&self, profile: &SpeedProfile) -> EventThresholds {
        EventThresholds::fixed(
            self.config.strike_fraction * profile.peak,
            self.config.toeoff_fraction * profile.peak,
        )
    }

    /// Replace the heuristic thresholds with the profile's own speed at
    /// forceplate-derived events of the same trial. Undefined speeds are
    /// ignored; a threshold without any usable frame stays heuristic.
    pub fn refine_thresholds(
        &self,
        profile: &SpeedProfile,
        base: EventThresholds,
        fp_strikes: &[usize],
        fp_toeoffs: &[usize],
    ) -> EventThresholds {
        if !self.config.refine_from_forceplate {
            return base;
        }

        let mean_at = |frames: &[usize]| {
            let values: Vec<f64> = frames.iter().filter_map(|&f| profile.at(f)).collect();
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };

        let mut refined = base;
        if let Some(v) = mean_at(fp_strikes) {
            refined.strike = v;
            refined.strike_origin = ThresholdOrigin::Forceplate;
        }
        if let Some(v) = mean_at(fp_toeoffs) {
            refined.toeoff = v;
            refined.toeoff_origin = ThresholdOrigin::Forceplate;
        }

        if refined.strike >= refined.toeoff {
            warn!(
                "{:?}: forceplate thresholds overlap (strike {:.2} >= toeoff {:.2}), keeping heuristic",
                profile.side, refined.strike, refined.toeoff
            );
            return base;
        }
        debug!(
            "{:?} thresholds: strike {:.2} ({:?}), toeoff {:.2} ({:?})",
            profile.side,
            refined.strike,
            refined.strike_origin,
            refined.toeoff,
            refined.toeoff_origin
        );
        refined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_marker(name: &str, xs: &[Option<f64>]) -> MarkerChannel {
        let samples: Vec<Option<[f64; 3]>> = xs.iter().map(|x| x.map(|x| [x, 0.0, 0.0])).collect();
        MarkerChannel::from_samples(name, &samples)
    }

    fn raw_profiler() -> VelocityProfiler {
        VelocityProfiler::new(VelocityConfig {
            median_width: 1,
            ..Default::default()
        })
    }

    #[test]
    fn test_centroid_speed() {
        let heel = moving_marker("RHEE", &[Some(0.0), Some(2.0), Some(6.0)]);
        let toe = moving_marker("RTOE", &[Some(10.0), Some(12.0), Some(16.0)]);
        let p = raw_profiler().profile(Side::Right, &[heel, toe]).unwrap();
        assert_eq!(p.speed, vec![None, Some(2.0), Some(4.0)]);
        assert_eq!(p.peak, 4.0);
    }

    #[test]
    fn test_dropout_does_not_create_speed() {
        let heel = moving_marker("RHEE", &[Some(0.0), Some(0.0), Some(0.0), Some(0.0)]);
        let toe = moving_marker("RTOE", &[Some(100.0), None, Some(100.0), Some(101.0)]);
        let p = raw_profiler().profile(Side::Right, &[heel, toe]).unwrap();
        // frames 1 and 2 change the visible marker set
        assert_eq!(p.speed, vec![None, None, None, Some(0.5)]);
    }

    #[test]
    fn test_all_frames_missing() {
        let heel = moving_marker("LHEE", &[None, None]);
        let err = raw_profiler().profile(Side::Left, &[heel]).unwrap_err();
        assert!(matches!(err, GaitError::MissingMarkers { side: Side::Left, .. }));
    }

    #[test]
    fn test_stationary_foot_has_no_events() {
        let heel = moving_marker("LHEE", &[Some(1.0), Some(1.0), Some(1.0)]);
        let err = raw_profiler().profile(Side::Left, &[heel]).unwrap_err();
        assert_eq!(err, GaitError::NoValidEvents { side: Side::Left });
    }

    #[test]
    fn test_heuristic_and_refined_thresholds() {
        let profiler = raw_profiler();
        let profile = SpeedProfile::from_speed(
            Side::Right,
            vec![None, Some(10.0), Some(3.0), Some(1.0), None, Some(6.0)],
        );
        let base = profiler.heuristic_thresholds(&profile);
        assert!((base.strike - 2.0).abs() < 1e-12);
        assert!((base.toeoff - 4.5).abs() < 1e-12);

        // frame 4 is undefined and ignored; toeoff has no usable frame
        let refined = profiler.refine_thresholds(&profile, base, &[2, 3, 4], &[0]);
        assert_eq!(refined.strike, 2.0);
        assert_eq!(refined.strike_origin, ThresholdOrigin::Forceplate);
        assert_eq!(refined.toeoff, base.toeoff);
        assert_eq!(refined.toeoff_origin, ThresholdOrigin::Heuristic);
    }

    #[test]
    fn test_overlapping_refined_thresholds_fall_back() {
        let profiler = raw_profiler();
        let profile = SpeedProfile::from_speed(
            Side::Left,
            vec![Some(10.0), Some(8.0), Some(1.0), Some(5.0)],
        );
        let base = profiler.heuristic_thresholds(&profile);
        // strike speed 8 above toe-off speed 1
        let refined = profiler.refine_thresholds(&profile, base, &[1], &[2]);
        assert_eq!(refined, base);
        assert_eq!(refined.strike_origin, ThresholdOrigin::Heuristic);
    }
}
