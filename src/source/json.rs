// src/source/json.rs
//
// JSON trial fixtures: the interchange format the batch binary reads.

use super::{
    AnalogChannel, ForceplateChannel, ForceplateGeometry, MarkerChannel, MemorySource, PlateHint,
    SubjectParams,
};
use crate::error::{GaitError, Result};
use crate::geometry::Point2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialFile {
    pub name: String,
    pub frame_rate: f64,
    pub frame_count: usize,
    pub subject: SubjectParams,
    /// Per-frame positions; null marks a gap
    #[serde(default)]
    pub markers: BTreeMap<String, Vec<Option<[f64; 3]>>>,
    #[serde(default)]
    pub analogs: Vec<AnalogFile>,
    #[serde(default)]
    pub forceplates: Vec<ForceplateFile>,
    /// Context strings per plate: "Right", "Left", "Invalid" or "Auto"
    #[serde(default)]
    pub plate_context: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogFile {
    pub name: String,
    pub rate: f64,
    pub samples: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceplateFile {
    pub corners: [[f64; 2]; 4],
    pub rate: f64,
    pub force: Vec<[f64; 3]>,
    pub moment: Vec<[f64; 3]>,
    #[serde(default)]
    pub dz: f64,
}

fn rows_to_array(rows: &[[f64; 3]]) -> Array2<f64> {
    let mut arr = Array2::<f64>::zeros((rows.len(), 3));
    for (i, r) in rows.iter().enumerate() {
        for (j, v) in r.iter().enumerate() {
            arr[[i, j]] = *v;
        }
    }
    arr
}

impl TrialFile {
    pub fn into_source(self) -> Result<MemorySource> {
        if self.frame_rate <= 0.0 {
            return Err(GaitError::Source(format!(
                "trial '{}' has non-positive frame rate",
                self.name
            )));
        }
        let mut src = MemorySource::new(self.name, self.frame_rate, self.frame_count)
            .with_subject(self.subject)
            .with_hints(self.plate_context.iter().map(|s| PlateHint::parse(s)).collect());

        for (name, samples) in self.markers {
            src = src.with_marker(MarkerChannel::from_samples(name, &samples));
        }
        for a in self.analogs {
            src = src.with_analog(AnalogChannel::new(a.name, a.rate, a.samples));
        }
        for (index, fp) in self.forceplates.into_iter().enumerate() {
            if fp.force.len() != fp.moment.len() {
                return Err(GaitError::Source(format!(
                    "forceplate {} has {} force and {} moment samples",
                    index + 1,
                    fp.force.len(),
                    fp.moment.len()
                )));
            }
            let corners = fp.corners.map(|[x, y]| Point2::new(x, y));
            src = src.with_forceplate(ForceplateChannel {
                index,
                geometry: ForceplateGeometry::new(corners),
                rate: fp.rate,
                force: rows_to_array(&fp.force),
                moment: rows_to_array(&fp.moment),
                dz: fp.dz,
            });
        }
        Ok(src)
    }
}

pub fn load_json_trial<P: AsRef<Path>>(path: P) -> Result<MemorySource> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| GaitError::Source(format!("{}: {}", path.display(), e)))?;
    let file: TrialFile = serde_json::from_str(&contents)
        .map_err(|e| GaitError::Source(format!("{}: {}", path.display(), e)))?;
    file.into_source()
}
