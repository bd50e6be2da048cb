// src/analysis/normalizer.rs
//
// Time-normalization of channel data onto a fixed 0-100 % cycle grid.

use super::cycles::GaitCycle;
use crate::error::{GaitError, Result};
use crate::source::{AnalogChannel, MarkerChannel};
use crate::types::NormalizeConfig;
use ndarray::Array2;

/// Raw analog samples of one cycle with their position in the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedAnalog {
    pub percent: Vec<f64>,
    pub samples: Vec<Option<f64>>,
}

pub struct CycleNormalizer {
    config: NormalizeConfig,
}

impl CycleNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn grid_len(&self) -> usize {
        self.config.grid_len
    }

    /// Resample `series[start..end]` onto `n` evenly spaced points. Gaps are
    /// bridged linearly; outside the first/last valid sample the edge value
    /// is held. Frames past the end of the series count as missing, so the
    /// grid always spans the full cycle.
    pub fn normalize_series(
        &self,
        series: &[Option<f64>],
        start: usize,
        end: usize,
        n: usize,
        channel: &str,
    ) -> Result<Vec<f64>> {
        let missing = || GaitError::MissingData {
            channel: channel.to_string(),
            start,
            end,
        };
        if n < 2 {
            return Err(GaitError::InvalidConfig(format!("grid length {} < 2", n)));
        }
        if start >= end {
            return Err(missing());
        }

        let window: Vec<Option<f64>> = (start..end).map(|i| series.get(i).copied().flatten()).collect();
        let filled = fill_gaps(&window).ok_or_else(missing)?;
        Ok(resample(&filled, n))
    }

    /// Per-component normalization, shape (n, 3).
    pub fn normalize_marker(&self, marker: &MarkerChannel, cycle: &GaitCycle, n: usize) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((n, 3));
        for axis in 0..3 {
            let values = self.normalize_series(&marker.component(axis), cycle.start, cycle.end, n, &marker.name)?;
            for (i, v) in values.into_iter().enumerate() {
                out[[i, axis]] = v;
            }
        }
        Ok(out)
    }

    /// Analog data is cut at round(frame * samples_per_frame).
    pub fn normalize_analog(
        &self,
        analog: &AnalogChannel,
        cycle: &GaitCycle,
        frame_rate: f64,
        n: usize,
    ) -> Result<Vec<f64>> {
        let (a_start, a_end) = analog_range(analog, cycle, frame_rate);
        self.normalize_series(analog.samples(), a_start, a_end, n, &analog.name)
            .map_err(|e| match e {
                GaitError::MissingData { channel, .. } => GaitError::MissingData {
                    channel,
                    start: cycle.start,
                    end: cycle.end,
                },
                other => other,
            })
    }

    /// Raw analog samples of the cycle, no resampling. Percent is relative
    /// to the full cycle even when the channel ends early.
    pub fn crop_analog(&self, analog: &AnalogChannel, cycle: &GaitCycle, frame_rate: f64) -> CroppedAnalog {
        let (a_start, a_end) = analog_range(analog, cycle, frame_rate);
        let len = (a_end.saturating_sub(a_start)).max(1) as f64;
        let a_end = a_end.min(analog.len());
        let samples = analog.samples().get(a_start..a_end).unwrap_or(&[]).to_vec();
        let percent = (0..samples.len()).map(|i| 100.0 * i as f64 / len).collect();
        CroppedAnalog { percent, samples }
    }
}

/// 0..100 % axis matching a grid of `n` points
pub fn percent_axis(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n).map(|i| 100.0 * i as f64 / (n - 1) as f64).collect()
}

fn analog_range(analog: &AnalogChannel, cycle: &GaitCycle, frame_rate: f64) -> (usize, usize) {
    let spf = analog.rate / frame_rate;
    let a_start = (cycle.start as f64 * spf).round() as usize;
    let a_end = (cycle.end as f64 * spf).round() as usize;
    (a_start, a_end)
}

/// Dense copy with interior gaps interpolated and edges held. None when no
/// sample is valid.
fn fill_gaps(segment: &[Option<f64>]) -> Option<Vec<f64>> {
    let valid: Vec<(usize, f64)> = segment
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    let (first, last) = (*valid.first()?, *valid.last()?);

    let mut out = vec![0.0; segment.len()];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = if i <= first.0 {
            first.1
        } else if i >= last.0 {
            last.1
        } else {
            // neighbours on each side; valid is sorted by index
            let right = valid.partition_point(|(j, _)| *j < i);
            let (j1, v1) = valid[right];
            if j1 == i {
                v1
            } else {
                let (j0, v0) = valid[right - 1];
                v0 + (v1 - v0) * (i - j0) as f64 / (j1 - j0) as f64
            }
        };
    }
    Some(out)
}

fn resample(values: &[f64], n: usize) -> Vec<f64> {
    let m = values.len();
    if m == 1 {
        return vec![values[0]; n];
    }
    let step = (m - 1) as f64 / (n - 1) as f64;
    (0..n)
        .map(|k| {
            let t = k as f64 * step;
            let i0 = (t.floor() as usize).min(m - 1);
            let i1 = (i0 + 1).min(m - 1);
            let frac = t - i0 as f64;
            values[i0] + (values[i1] - values[i0]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn cycle(start: usize, end: usize) -> GaitCycle {
        GaitCycle {
            index: 1,
            side: Side::Right,
            start,
            end,
            toeoff: (start + end) / 2,
            contralateral_strikes: Vec::new(),
            contralateral_toeoffs: Vec::new(),
            forceplate_contact: None,
        }
    }

    fn normalizer() -> CycleNormalizer {
        CycleNormalizer::new(NormalizeConfig::default())
    }

    #[test]
    fn test_ramp_endpoints_and_monotonic() {
        let ramp: Vec<Option<f64>> = (0..150).map(|f| Some(f as f64)).collect();
        let out = normalizer().normalize_series(&ramp, 0, 100, 101, "ramp").unwrap();
        assert_eq!(out.len(), 101);
        assert_eq!(out[0], 0.0);
        assert!((out[100] - 99.0).abs() < 1e-9);
        assert!(out.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_idempotent() {
        let sig: Vec<Option<f64>> = (0..80).map(|f| Some((f as f64 * 0.37).sin())).collect();
        let n = normalizer();
        let a = n.normalize_series(&sig, 5, 70, 51, "sin").unwrap();
        let b = n.normalize_series(&sig, 5, 70, 51, "sin").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gaps_bridged_and_edges_held() {
        let sig = vec![None, Some(2.0), None, None, Some(8.0), None];
        let filled = fill_gaps(&sig).unwrap();
        assert_eq!(filled, vec![2.0, 2.0, 4.0, 6.0, 8.0, 8.0]);
    }

    #[test]
    fn test_no_valid_samples_is_missing_data() {
        let sig = vec![Some(1.0), None, None, None];
        let err = normalizer().normalize_series(&sig, 1, 4, 101, "RKneeAngles").unwrap_err();
        assert_eq!(
            err,
            GaitError::MissingData {
                channel: "RKneeAngles".to_string(),
                start: 1,
                end: 4,
            }
        );
    }

    #[test]
    fn test_analog_uses_samples_per_frame() {
        // 1000 Hz analog, 100 Hz frames: frames [10, 20) -> samples [100, 200)
        let values: Vec<f64> = (0..400).map(|i| i as f64).collect();
        let emg = AnalogChannel::from_values("EMG", 1000.0, values);
        let out = normalizer().normalize_analog(&emg, &cycle(10, 20), 100.0, 101).unwrap();
        assert_eq!(out[0], 100.0);
        assert!((out[100] - 199.0).abs() < 1e-9);

        let crop = normalizer().crop_analog(&emg, &cycle(10, 20), 100.0);
        assert_eq!(crop.samples.len(), 100);
        assert_eq!(crop.samples[0], Some(100.0));
        assert_eq!(crop.percent[50], 50.0);
    }

    #[test]
    fn test_channel_ending_mid_cycle_keeps_time_axis() {
        // data stops at frame 50 of a 100-frame cycle
        let short: Vec<Option<f64>> = (0..50).map(|f| Some(f as f64)).collect();
        let out = normalizer().normalize_series(&short, 0, 100, 101, "ramp").unwrap();
        assert_eq!(out.len(), 101);
        assert!((out[25] - 24.75).abs() < 1e-9);
        assert!((out[49] - 48.51).abs() < 1e-9);
        assert_eq!(out[100], 49.0);

        let err = normalizer().normalize_series(&short, 60, 100, 101, "ramp").unwrap_err();
        assert!(matches!(err, GaitError::MissingData { start: 60, end: 100, .. }));

        // 1000 Hz analog with 150 samples, frames [10, 20) -> samples [100, 200)
        let emg = AnalogChannel::from_values("EMG", 1000.0, (0..150).map(|i| i as f64).collect());
        let crop = normalizer().crop_analog(&emg, &cycle(10, 20), 100.0);
        assert_eq!(crop.samples.len(), 50);
        assert_eq!(crop.percent.last(), Some(&49.0));
    }

    #[test]
    fn test_marker_components() {
        let samples: Vec<Option<[f64; 3]>> = (0..50).map(|f| Some([f as f64, 2.0, -1.0])).collect();
        let m = MarkerChannel::from_samples("RKNE", &samples);
        let out = normalizer().normalize_marker(&m, &cycle(0, 41), 11).unwrap();
        assert_eq!(out.shape(), &[11, 3]);
        assert_eq!(out[[10, 0]], 40.0);
        assert_eq!(out[[5, 1]], 2.0);
    }

    #[test]
    fn test_percent_axis() {
        let axis = percent_axis(101);
        assert_eq!(axis[0], 0.0);
        assert_eq!(axis[100], 100.0);
    }
}
