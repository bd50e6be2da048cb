// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markers: MarkerConfig,
    pub velocity: VelocityConfig,
    pub forceplate: ForceplateConfig,
    pub reconcile: ReconcileConfig,
    pub cycles: CycleConfig,
    pub normalize: NormalizeConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

/// Marker names of one foot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootMarkers {
    pub heel: String,
    pub toe: String,
    pub ankle: String,
}

impl FootMarkers {
    pub fn for_side(side: Side) -> Self {
        let p = side.as_str();
        Self {
            heel: format!("{p}HEE"),
            toe: format!("{p}TOE"),
            ankle: format!("{p}ANK"),
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.heel, &self.toe, &self.ankle]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub right: FootMarkers,
    pub left: FootMarkers,
    /// Pelvis marker used for the principal-direction cycle filter
    pub tracking: String,
}

impl MarkerConfig {
    pub fn foot(&self, side: Side) -> &FootMarkers {
        match side {
            Side::Right => &self.right,
            Side::Left => &self.left,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            right: FootMarkers::for_side(Side::Right),
            left: FootMarkers::for_side(Side::Left),
            tracking: "LASI".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Strike threshold as a fraction of the side's peak foot speed
    pub strike_fraction: f64,
    /// Toe-off threshold as a fraction of the side's peak foot speed
    pub toeoff_fraction: f64,
    /// Median prefilter width for the speed signal (1 = off)
    pub median_width: usize,
    /// Replace heuristic thresholds by speeds at forceplate events of the same trial
    pub refine_from_forceplate: bool,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            strike_fraction: 0.20,
            toeoff_fraction: 0.45,
            median_width: 3,
            refine_from_forceplate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceplateConfig {
    /// Contact starts when vertical force exceeds this fraction of body weight
    pub contact_threshold: f64,
    /// Interval peak must exceed this fraction of body weight
    pub min_weight: f64,
    /// Median prefilter width for the vertical force (1 = off)
    pub force_median_width: usize,
    /// Foot length estimate = ratio * ankle-heel distance, when no subject parameter
    pub foot_relative_len: f64,
    /// Foot breadth at the toes, in marker units
    pub foot_breadth: f64,
    /// Max center-of-pressure excursion in x or y during a contact
    pub max_cop_shift: Option<f64>,
    /// Use per-plate context hints from trial metadata when present
    pub honor_plate_hints: bool,
}

impl Default for ForceplateConfig {
    fn default() -> Self {
        Self {
            contact_threshold: 0.10,
            min_weight: 0.80,
            force_median_width: 5,
            foot_relative_len: 3.5,
            foot_breadth: 100.0,
            max_cop_shift: None,
            honor_plate_hints: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Max |velocity frame - forceplate frame| for substitution (fixed, not rate-scaled)
    pub tolerance_frames: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance_frames: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoToeoffPolicy {
    Reject,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleToeoffsPolicy {
    Reject,
    AcceptFirst,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub no_toeoff: NoToeoffPolicy,
    pub multiple_toeoffs: MultipleToeoffsPolicy,
    /// Cycles shorter than this (frames) are excluded
    pub min_cycle_duration: usize,
    /// Walking direction axis for the region filter
    pub principal_axis: Axis,
    /// Allowed [min, max] coordinate of the tracking marker; None disables the filter
    pub principal_range: Option<[f64; 2]>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            no_toeoff: NoToeoffPolicy::Reject,
            multiple_toeoffs: MultipleToeoffsPolicy::AcceptFirst,
            min_cycle_duration: 10,
            principal_axis: Axis::Y,
            principal_range: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub grid_len: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { grid_len: 101 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub write_diagnostics: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: "trials".to_string(),
            output_dir: "diagnostics".to_string(),
            write_diagnostics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Context of an event or cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Right, Side::Left];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Right => "R",
            Self::Left => "L",
        }
    }

    /// Metadata spelling, e.g. forceplate context fields
    pub fn name(&self) -> &'static str {
        match self {
            Self::Right => "Right",
            Self::Left => "Left",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Strike,
    ToeOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    Velocity,
    Forceplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 0-based index into the marker-rate timeline
    pub frame: usize,
    pub kind: EventKind,
    pub side: Side,
    pub source: EventSource,
    pub plate_index: Option<usize>,
}

impl Event {
    pub fn velocity(frame: usize, kind: EventKind, side: Side) -> Self {
        Self {
            frame,
            kind,
            side,
            source: EventSource::Velocity,
            plate_index: None,
        }
    }

    pub fn forceplate(frame: usize, kind: EventKind, side: Side, plate_index: usize) -> Self {
        Self {
            frame,
            kind,
            side,
            source: EventSource::Forceplate,
            plate_index: Some(plate_index),
        }
    }
}

/// Events of both sides, each list sorted by frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SideEvents {
    pub right: Vec<Event>,
    pub left: Vec<Event>,
}

impl SideEvents {
    pub fn side(&self, side: Side) -> &[Event] {
        match side {
            Side::Right => &self.right,
            Side::Left => &self.left,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<Event> {
        match side {
            Side::Right => &mut self.right,
            Side::Left => &mut self.left,
        }
    }

    pub fn frames(&self, side: Side, kind: EventKind) -> Vec<usize> {
        self.side(side)
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.frame)
            .collect()
    }

    /// All events of both sides ordered by frame
    pub fn all(&self) -> Vec<Event> {
        let mut all: Vec<Event> = self.right.iter().chain(self.left.iter()).copied().collect();
        all.sort_by_key(|e| e.frame);
        all
    }
}
