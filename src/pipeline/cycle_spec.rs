// src/pipeline/cycle_spec.rs
//
// Cycle selection for queries.

use crate::analysis::GaitCycle;
use crate::types::Side;

/// Plain filter over the trial's cycle list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleFilter {
    pub side: Option<Side>,
    /// Only cycles with a valid forceplate contact
    pub forceplate_only: bool,
}

impl CycleFilter {
    pub fn side(side: Side) -> Self {
        Self {
            side: Some(side),
            ..Default::default()
        }
    }

    pub fn forceplate() -> Self {
        Self {
            forceplate_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, cycle: &GaitCycle) -> bool {
        self.side.map_or(true, |s| cycle.side == s) && (!self.forceplate_only || cycle.on_forceplate())
    }
}

/// Selection rule applied to each side independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleSpec {
    All,
    Forceplate,
    /// 1-based cycle indices
    Indices(Vec<usize>),
    /// First rule that selects anything wins, e.g. [Forceplate, All]
    FirstMatch(Vec<CycleSpec>),
}

impl CycleSpec {
    /// Cycles of `side` picked by this rule, in start order, at most
    /// `max_per_side` of them.
    pub fn select(&self, cycles: &[GaitCycle], side: Side, max_per_side: Option<usize>) -> Vec<GaitCycle> {
        let mut picked = self.resolve(cycles, side);
        picked.sort_by_key(|c| c.start);
        if let Some(max) = max_per_side {
            picked.truncate(max);
        }
        picked
    }

    fn resolve(&self, cycles: &[GaitCycle], side: Side) -> Vec<GaitCycle> {
        let of_side = cycles.iter().filter(|c| c.side == side);
        match self {
            CycleSpec::All => of_side.cloned().collect(),
            CycleSpec::Forceplate => of_side.filter(|c| c.on_forceplate()).cloned().collect(),
            CycleSpec::Indices(indices) => of_side.filter(|c| indices.contains(&c.index)).cloned().collect(),
            CycleSpec::FirstMatch(rules) => rules
                .iter()
                .map(|r| r.resolve(cycles, side))
                .find(|picked| !picked.is_empty())
                .unwrap_or_default(),
        }
    }
}
