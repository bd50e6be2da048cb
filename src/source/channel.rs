// src/source/channel.rs

use crate::error::{GaitError, Result};
use crate::geometry::{point_in_convex_polygon, Point2};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// 3D marker trajectory at the capture frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerChannel {
    pub name: String,
    positions: Array2<f64>,
    valid: Vec<bool>,
}

impl MarkerChannel {
    pub fn new(name: impl Into<String>, positions: Array2<f64>, valid: Vec<bool>) -> Result<Self> {
        let name = name.into();
        if positions.ncols() != 3 || positions.nrows() != valid.len() {
            return Err(GaitError::Source(format!(
                "marker '{}' has shape {:?} with {} validity flags",
                name,
                positions.dim(),
                valid.len()
            )));
        }
        // NaN coordinates count as gaps
        let valid = valid
            .iter()
            .zip(positions.rows())
            .map(|(&v, row)| v && row.iter().all(|c| c.is_finite()))
            .collect();
        Ok(Self {
            name,
            positions,
            valid,
        })
    }

    pub fn from_samples(name: impl Into<String>, samples: &[Option<[f64; 3]>]) -> Self {
        let mut positions = Array2::<f64>::zeros((samples.len(), 3));
        let mut valid = Vec::with_capacity(samples.len());
        for (i, s) in samples.iter().enumerate() {
            match s {
                Some(p) if p.iter().all(|c| c.is_finite()) => {
                    positions.row_mut(i).assign(&ArrayView1::from(&p[..]));
                    valid.push(true);
                }
                _ => valid.push(false),
            }
        }
        Self {
            name: name.into(),
            positions,
            valid,
        }
    }

    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    pub fn position(&self, frame: usize) -> Option<[f64; 3]> {
        if !*self.valid.get(frame)? {
            return None;
        }
        let row = self.positions.row(frame);
        Some([row[0], row[1], row[2]])
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    /// One coordinate as a gappy per-frame series
    pub fn component(&self, axis: usize) -> Vec<Option<f64>> {
        self.positions
            .column(axis)
            .iter()
            .zip(&self.valid)
            .map(|(&c, &v)| v.then_some(c))
            .collect()
    }
}

/// Scalar series at its own sample rate (analog devices, or frame-rate model outputs).
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogChannel {
    pub name: String,
    pub rate: f64,
    samples: Vec<Option<f64>>,
}

impl AnalogChannel {
    pub fn new(name: impl Into<String>, rate: f64, samples: Vec<Option<f64>>) -> Self {
        let samples = samples
            .into_iter()
            .map(|s| s.filter(|v| v.is_finite()))
            .collect();
        Self {
            name: name.into(),
            rate,
            samples,
        }
    }

    pub fn from_values(name: impl Into<String>, rate: f64, values: Vec<f64>) -> Self {
        Self::new(name, rate, values.into_iter().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Option<f64>] {
        &self.samples
    }
}

/// Plate outline in the global ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceplateGeometry {
    pub corners: [Point2; 4],
}

impl ForceplateGeometry {
    pub fn new(corners: [Point2; 4]) -> Self {
        Self { corners }
    }

    /// Axis-aligned plate from its extents
    pub fn rect(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::new([
            Point2::new(xmin, ymin),
            Point2::new(xmax, ymin),
            Point2::new(xmax, ymax),
            Point2::new(xmin, ymax),
        ])
    }

    pub fn contains(&self, p: Point2) -> bool {
        point_in_convex_polygon(p, &self.corners)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceplateChannel {
    /// 0-based plate index; metadata names it FP{index + 1}
    pub index: usize,
    pub geometry: ForceplateGeometry,
    pub rate: f64,
    /// (samples, 3) ground reaction force
    pub force: Array2<f64>,
    /// (samples, 3) moment about the plate origin
    pub moment: Array2<f64>,
    /// Distance from moment origin to plate surface
    pub dz: f64,
}

impl ForceplateChannel {
    pub fn len(&self) -> usize {
        self.force.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.force.nrows() == 0
    }

    /// Magnitude of the vertical force component
    pub fn vertical_force(&self) -> Vec<f64> {
        self.force
            .column(2)
            .iter()
            .map(|f| if f.is_finite() { f.abs() } else { 0.0 })
            .collect()
    }

    /// Center of pressure in plate coordinates (AMTI convention). Samples
    /// without vertical load have no defined CoP.
    pub fn center_of_pressure(&self) -> Vec<Option<Point2>> {
        let n = self.force.nrows().min(self.moment.nrows());
        (0..n)
            .map(|i| {
                let f = self.force.row(i);
                let m = self.moment.row(i);
                let fz = f[2];
                if fz.abs() < 1e-9 || !fz.is_finite() {
                    return None;
                }
                let x = -(m[1] + f[0] * self.dz) / fz;
                let y = (m[0] - f[1] * self.dz) / fz;
                (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
            })
            .collect()
    }
}
