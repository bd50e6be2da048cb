// src/source/mod.rs
//
// Data-source contract. Readers for capture systems live outside this crate;
// they hand typed channels to the analysis through `TrialSource`.

mod channel;
mod json;
mod memory;

pub use channel::{AnalogChannel, ForceplateChannel, ForceplateGeometry, MarkerChannel};
pub use json::{load_json_trial, AnalogFile, ForceplateFile, TrialFile};
pub use memory::MemorySource;

use crate::error::Result;
use crate::types::Side;
use serde::{Deserialize, Serialize};

pub const GRAVITY: f64 = 9.81;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectParams {
    pub bodymass: f64,
    #[serde(rename = "RightFootLen")]
    pub right_foot_len: Option<f64>,
    #[serde(rename = "LeftFootLen")]
    pub left_foot_len: Option<f64>,
}

impl SubjectParams {
    pub fn weight(&self) -> f64 {
        self.bodymass * GRAVITY
    }

    pub fn foot_len(&self, side: Side) -> Option<f64> {
        match side {
            Side::Right => self.right_foot_len,
            Side::Left => self.left_foot_len,
        }
        .filter(|l| *l > 0.0)
    }
}

/// Per-plate context stored in trial metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlateHint {
    Right,
    Left,
    Invalid,
    #[default]
    Auto,
}

impl PlateHint {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "right" | "r" => PlateHint::Right,
            "left" | "l" => PlateHint::Left,
            "invalid" | "x" => PlateHint::Invalid,
            _ => PlateHint::Auto,
        }
    }
}

pub trait TrialSource {
    fn trial_name(&self) -> &str;

    /// Marker frames per second
    fn frame_rate(&self) -> f64;

    fn frame_count(&self) -> usize;

    fn marker_names(&self) -> Vec<String>;

    fn marker(&self, name: &str) -> Result<MarkerChannel>;

    fn analog_names(&self) -> Vec<String>;

    fn analog(&self, name: &str) -> Result<AnalogChannel>;

    fn forceplates(&self) -> Result<Vec<ForceplateChannel>>;

    fn subject(&self) -> SubjectParams;

    fn plate_hints(&self) -> Vec<PlateHint> {
        Vec::new()
    }

    /// Monotonically increasing version for sources that can change between
    /// reads. None means the data never changes.
    fn change_token(&self) -> Option<u64> {
        None
    }
}
