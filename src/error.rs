// src/error.rs
//
// Data-quality and precondition failures. Per-side and per-cycle variants are
// recorded and processing continues; only EmptyTrial and source failures on
// event-critical channels abort trial construction.

use crate::types::Side;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, GaitError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleStructureKind {
    NoToeoff,
    MultipleToeoffs(usize),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GaitError {
    #[error("required foot markers missing for {side:?} side: {markers:?}")]
    MissingMarkers { side: Side, markers: Vec<String> },

    #[error("velocity profile never crosses threshold on {side:?} side")]
    NoValidEvents { side: Side },

    #[error("{kind:?} in {side:?} cycle [{start}, {end})")]
    CycleStructure {
        side: Side,
        start: usize,
        end: usize,
        kind: CycleStructureKind,
    },

    #[error("no valid samples of '{channel}' in frames [{start}, {end})")]
    MissingData {
        channel: String,
        start: usize,
        end: usize,
    },

    #[error("data source changed and re-analysis failed: {source}")]
    StaleSource {
        #[source]
        source: Box<GaitError>,
    },

    #[error("trial has no frames")]
    EmptyTrial,

    #[error("unknown channel '{name}'")]
    UnknownChannel { name: String },

    #[error("no cycle with index {index}")]
    UnknownCycle { index: usize },

    #[error("invalid forceplate index {index}")]
    InvalidPlate { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("data source error: {0}")]
    Source(String),
}

impl GaitError {
    /// Per-side or per-cycle problems that leave the rest of the trial usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GaitError::MissingMarkers { .. }
                | GaitError::NoValidEvents { .. }
                | GaitError::CycleStructure { .. }
                | GaitError::MissingData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(GaitError::NoValidEvents { side: Side::Left }.is_recoverable());
        assert!(!GaitError::EmptyTrial.is_recoverable());

        let stale = GaitError::StaleSource {
            source: Box::new(GaitError::EmptyTrial),
        };
        assert!(!stale.is_recoverable());
        assert!(stale.to_string().contains("no frames"));
    }
}
