// src/pipeline/trial.rs
//
// One walking trial: source data, the analysis built from it, and the
// cycle-indexed query interface.
//
//   forceplates + feet → contacts ─┬─────────────────────────────┐
//   foot markers → speed profile → thresholds (refined) → events → reconcile → cycles
//
// The analysis is a snapshot of the source. Before serving any query the
// trial compares the source's change token with the one it analysed; on a
// change (or after mark_stale) all caches are dropped and the analysis is
// rebuilt, so cycle boundaries and channel data always come from the same
// snapshot.

use super::cycle_spec::{CycleFilter, CycleSpec};
use super::diagnostics::{CycleSummary, SideThresholds, TrialDiagnostics};
use crate::analysis::{
    plate_context, ContactInterval, CroppedAnalog, CycleAssembler, CycleAssembly, CycleNormalizer, EventDetector,
    EventReconciler, EventThresholds, Feet, FootMarkerSet, ForceplateContactValidator, GaitCycle, PlateContext,
    ReconcileReport, VelocityProfiler,
};
use crate::error::{GaitError, Result};
use crate::source::{AnalogChannel, MarkerChannel, TrialSource};
use crate::types::{Config, EventKind, Side, SideEvents};
use ndarray::Array2;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ============================================================================
// ANALYSIS SNAPSHOT
// ============================================================================

#[derive(Debug, Clone)]
struct Analysis {
    contacts: Vec<ContactInterval>,
    thresholds: Vec<SideThresholds>,
    velocity_events: SideEvents,
    events: SideEvents,
    reconcile: ReconcileReport,
    assembly: CycleAssembly,
    plate_context: PlateContext,
    n_plates: usize,
    side_errors: Vec<GaitError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NormKey {
    side: Side,
    index: usize,
    channel: String,
    grid_len: usize,
    version: u64,
}

#[derive(Debug, Clone)]
enum Normalized {
    Marker(Array2<f64>),
    Analog(Vec<f64>),
}

/// Channel loaded only if the source has it; other source failures propagate.
fn optional_channel<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(ch) => Ok(Some(ch)),
        Err(GaitError::UnknownChannel { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================================
// TRIAL
// ============================================================================

pub struct Trial<S: TrialSource> {
    source: S,
    config: Config,
    analysis: Analysis,
    /// Change token the current analysis was built against
    analysed_token: Option<u64>,
    stale: bool,
    /// Bumped on every rebuild; part of the normalization cache key
    version: u64,
    markers: HashMap<String, MarkerChannel>,
    analogs: HashMap<String, AnalogChannel>,
    normalized: HashMap<NormKey, Normalized>,
    normalizer: CycleNormalizer,
}

impl<S: TrialSource> Trial<S> {
    /// Load event-critical channels and run the full analysis. Fails only on
    /// an empty trial, an invalid config or a broken source; per-side and
    /// per-cycle problems end up in diagnostics.
    pub fn new(source: S, config: Config) -> Result<Self> {
        config.validate()?;
        let analysed_token = source.change_token();
        let analysis = analyse(&source, &config)?;
        let normalizer = CycleNormalizer::new(config.normalize.clone());

        Ok(Self {
            source,
            config,
            analysis,
            analysed_token,
            stale: false,
            version: 0,
            markers: HashMap::new(),
            analogs: HashMap::new(),
            normalized: HashMap::new(),
            normalizer,
        })
    }

    pub fn name(&self) -> &str {
        self.source.trial_name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access for editing a live source. Edits that bump the change
    /// token are picked up by the next query.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Force a rebuild before the next query (for sources without a token).
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale || self.source.change_token() != self.analysed_token
    }

    fn refresh(&mut self) -> Result<()> {
        if !self.is_stale() {
            return Ok(());
        }
        info!("{}: source changed, rebuilding analysis", self.source.trial_name());
        self.markers.clear();
        self.analogs.clear();
        self.normalized.clear();

        let token = self.source.change_token();
        let analysis = analyse(&self.source, &self.config).map_err(|e| GaitError::StaleSource {
            source: Box::new(e),
        })?;
        self.analysis = analysis;
        self.analysed_token = token;
        self.stale = false;
        self.version += 1;
        Ok(())
    }

    fn fresh(&mut self) -> Result<&Analysis> {
        self.refresh()?;
        Ok(&self.analysis)
    }

    // ------------------------------------------------------------------
    // Event and cycle queries
    // ------------------------------------------------------------------

    pub fn cycles(&mut self, filter: &CycleFilter) -> Result<Vec<GaitCycle>> {
        let analysis = self.fresh()?;
        let mut cycles: Vec<GaitCycle> = analysis
            .assembly
            .cycles
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        cycles.sort_by_key(|c| (c.start, c.side));
        Ok(cycles)
    }

    /// Rule-based selection applied to each side; right side first.
    pub fn select_cycles(&mut self, spec: &CycleSpec, max_per_side: Option<usize>) -> Result<Vec<GaitCycle>> {
        let cycles = &self.fresh()?.assembly.cycles;
        Ok(Side::BOTH
            .iter()
            .flat_map(|&side| spec.select(cycles, side, max_per_side))
            .collect())
    }

    /// Cycle by side and 1-based index
    pub fn cycle(&mut self, side: Side, index: usize) -> Result<GaitCycle> {
        self.fresh()?
            .assembly
            .cycles
            .iter()
            .find(|c| c.side == side && c.index == index)
            .cloned()
            .ok_or(GaitError::UnknownCycle { index })
    }

    /// Reconciled events of both sides
    pub fn events(&mut self) -> Result<&SideEvents> {
        Ok(&self.fresh()?.events)
    }

    /// Events as detected from foot speed, before forceplate substitution
    pub fn velocity_events(&mut self) -> Result<&SideEvents> {
        Ok(&self.fresh()?.velocity_events)
    }

    pub fn contacts(&mut self) -> Result<&[ContactInterval]> {
        Ok(&self.fresh()?.contacts)
    }

    /// Contacts detected on one plate, in strike order
    pub fn contacts_on_plate(&mut self, plate_index: usize) -> Result<Vec<ContactInterval>> {
        let a = self.fresh()?;
        if plate_index >= a.n_plates {
            return Err(GaitError::InvalidPlate { index: plate_index });
        }
        Ok(a.contacts
            .iter()
            .filter(|c| c.plate_index == plate_index)
            .cloned()
            .collect())
    }

    pub fn thresholds(&mut self, side: Side) -> Result<Option<EventThresholds>> {
        Ok(self
            .fresh()?
            .thresholds
            .iter()
            .find(|t| t.side == side)
            .map(|t| t.thresholds))
    }

    pub fn plate_context(&mut self) -> Result<PlateContext> {
        Ok(self.fresh()?.plate_context.clone())
    }

    pub fn diagnostics(&mut self) -> Result<TrialDiagnostics> {
        let frame_rate = self.source.frame_rate();
        let frame_count = self.source.frame_count();
        let trial = self.source.trial_name().to_string();
        let a = self.fresh()?;

        Ok(TrialDiagnostics {
            trial,
            frame_rate,
            frame_count,
            thresholds: a.thresholds.clone(),
            events: a.events.all(),
            side_errors: a.side_errors.iter().map(|e| e.to_string()).collect(),
            cycle_errors: a.assembly.errors.iter().map(|e| e.to_string()).collect(),
            rejected_cycles: a.assembly.rejected.clone(),
            contacts: a.contacts.clone(),
            reconcile: a.reconcile.clone(),
            plate_context: a.plate_context.clone(),
            summary: CycleSummary::new(
                &a.assembly.cycles,
                &a.assembly.rejected,
                a.assembly.errors.len(),
                &a.contacts,
            ),
        })
    }

    // ------------------------------------------------------------------
    // Channel data
    // ------------------------------------------------------------------

    fn load_marker(&mut self, name: &str) -> Result<()> {
        self.refresh()?;
        if !self.markers.contains_key(name) {
            let marker = self.source.marker(name)?;
            debug!("loaded marker {} ({} valid frames)", name, marker.valid_count());
            self.markers.insert(name.to_string(), marker);
        }
        Ok(())
    }

    fn load_analog(&mut self, name: &str) -> Result<()> {
        self.refresh()?;
        if !self.analogs.contains_key(name) {
            let analog = self.source.analog(name)?;
            debug!("loaded analog {} ({} samples)", name, analog.len());
            self.analogs.insert(name.to_string(), analog);
        }
        Ok(())
    }

    /// Raw marker trajectory; row index is the absolute frame
    pub fn marker(&mut self, name: &str) -> Result<&MarkerChannel> {
        self.load_marker(name)?;
        self.markers
            .get(name)
            .ok_or_else(|| GaitError::UnknownChannel { name: name.to_string() })
    }

    /// Raw analog samples at the channel's own rate
    pub fn analog(&mut self, name: &str) -> Result<&AnalogChannel> {
        self.load_analog(name)?;
        self.analogs
            .get(name)
            .ok_or_else(|| GaitError::UnknownChannel { name: name.to_string() })
    }

    /// The current-snapshot version of a cycle handed out earlier. A cycle
    /// that no longer exists after a rebuild is rejected.
    fn resolve(&mut self, cycle: &GaitCycle) -> Result<GaitCycle> {
        self.fresh()?
            .assembly
            .cycles
            .iter()
            .find(|c| c.side == cycle.side && c.index == cycle.index && c.start == cycle.start && c.end == cycle.end)
            .cloned()
            .ok_or(GaitError::UnknownCycle { index: cycle.index })
    }

    fn norm_key(&self, cycle: &GaitCycle, channel: &str, grid_len: usize) -> NormKey {
        NormKey {
            side: cycle.side,
            index: cycle.index,
            channel: channel.to_string(),
            grid_len,
            version: self.version,
        }
    }

    /// Marker trajectory resampled to the cycle, shape (grid_len, 3).
    pub fn normalized_marker(&mut self, name: &str, cycle: &GaitCycle, grid_len: Option<usize>) -> Result<Array2<f64>> {
        let cycle = self.resolve(cycle)?;
        let n = grid_len.unwrap_or(self.normalizer.grid_len());
        let key = self.norm_key(&cycle, name, n);
        if let Some(Normalized::Marker(cached)) = self.normalized.get(&key) {
            return Ok(cached.clone());
        }

        self.load_marker(name)?;
        let marker = self
            .markers
            .get(name)
            .ok_or_else(|| GaitError::UnknownChannel { name: name.to_string() })?;
        let values = self.normalizer.normalize_marker(marker, &cycle, n)?;
        self.normalized.insert(key, Normalized::Marker(values.clone()));
        Ok(values)
    }

    /// Analog channel resampled to the cycle.
    pub fn normalized_analog(&mut self, name: &str, cycle: &GaitCycle, grid_len: Option<usize>) -> Result<Vec<f64>> {
        let cycle = self.resolve(cycle)?;
        let n = grid_len.unwrap_or(self.normalizer.grid_len());
        let key = self.norm_key(&cycle, name, n);
        if let Some(Normalized::Analog(cached)) = self.normalized.get(&key) {
            return Ok(cached.clone());
        }

        self.load_analog(name)?;
        let frame_rate = self.source.frame_rate();
        let analog = self
            .analogs
            .get(name)
            .ok_or_else(|| GaitError::UnknownChannel { name: name.to_string() })?;
        let values = self.normalizer.normalize_analog(analog, &cycle, frame_rate, n)?;
        self.normalized.insert(key, Normalized::Analog(values.clone()));
        Ok(values)
    }

    /// Any caller-computed per-frame series (e.g. model output) resampled to
    /// the cycle. Not cached.
    pub fn normalized_scalar(
        &mut self,
        name: &str,
        series: &[Option<f64>],
        cycle: &GaitCycle,
        grid_len: Option<usize>,
    ) -> Result<Vec<f64>> {
        let cycle = self.resolve(cycle)?;
        let n = grid_len.unwrap_or(self.normalizer.grid_len());
        self.normalizer.normalize_series(series, cycle.start, cycle.end, n, name)
    }

    /// Raw analog samples of the cycle with their 0-100 % positions.
    pub fn crop_analog(&mut self, name: &str, cycle: &GaitCycle) -> Result<CroppedAnalog> {
        let cycle = self.resolve(cycle)?;
        self.load_analog(name)?;
        let frame_rate = self.source.frame_rate();
        let analog = self
            .analogs
            .get(name)
            .ok_or_else(|| GaitError::UnknownChannel { name: name.to_string() })?;
        Ok(self.normalizer.crop_analog(analog, &cycle, frame_rate))
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

fn load_feet<S: TrialSource>(source: &S, config: &Config) -> Result<(Feet, Vec<(Side, Vec<MarkerChannel>)>)> {
    let mut feet = Feet::default();
    let mut by_side = Vec::new();

    for side in Side::BOTH {
        let names = config.markers.foot(side);
        let heel = optional_channel(source.marker(&names.heel))?;
        let toe = optional_channel(source.marker(&names.toe))?;
        let ankle = optional_channel(source.marker(&names.ankle))?;

        let speed_markers: Vec<MarkerChannel> = [&heel, &toe, &ankle].into_iter().flatten().cloned().collect();
        by_side.push((side, speed_markers));

        let set = match (heel, toe) {
            (Some(heel), Some(toe)) => Some(FootMarkerSet { heel, toe, ankle }),
            _ => {
                debug!("{:?}: no heel/toe pair, foot triangle unavailable", side);
                None
            }
        };
        match side {
            Side::Right => feet.right = set,
            Side::Left => feet.left = set,
        }
    }
    Ok((feet, by_side))
}

fn analyse<S: TrialSource>(source: &S, config: &Config) -> Result<Analysis> {
    let frame_count = source.frame_count();
    let frame_rate = source.frame_rate();
    if frame_count == 0 {
        return Err(GaitError::EmptyTrial);
    }

    let subject = source.subject();
    let plates = source.forceplates()?;
    let (feet, foot_markers) = load_feet(source, config)?;

    let validator = ForceplateContactValidator::new(config.forceplate.clone());
    let contacts = validator.validate(&plates, &feet, &subject, &source.plate_hints(), frame_rate, frame_count);

    let profiler = VelocityProfiler::new(config.velocity.clone());
    let mut velocity_events = SideEvents::default();
    let mut thresholds = Vec::new();
    let mut side_errors = Vec::new();

    for (side, markers) in &foot_markers {
        let side = *side;
        let profile = match profiler.profile(side, markers) {
            Ok(p) => p,
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => {
                let e = match e {
                    GaitError::MissingMarkers { side, markers } if markers.is_empty() => GaitError::MissingMarkers {
                        side,
                        markers: config.markers.foot(side).names().iter().map(|s| s.to_string()).collect(),
                    },
                    other => other,
                };
                warn!("{}: {}", source.trial_name(), e);
                side_errors.push(e);
                continue;
            }
        };

        let valid: Vec<&ContactInterval> = contacts.iter().filter(|c| c.is_valid_for(side)).collect();
        let fp_strikes: Vec<usize> = valid.iter().map(|c| c.strike_frame).collect();
        let fp_toeoffs: Vec<usize> = valid.iter().filter_map(|c| c.toeoff_frame).collect();
        let base = profiler.heuristic_thresholds(&profile);
        let t = profiler.refine_thresholds(&profile, base, &fp_strikes, &fp_toeoffs);
        thresholds.push(SideThresholds {
            side,
            thresholds: t,
            peak_speed: profile.peak,
        });

        match EventDetector::new(t).detect(&profile) {
            Ok(events) => {
                debug!(
                    "{:?}: {} strikes, {} toe-offs from foot speed",
                    side,
                    events.iter().filter(|e| e.kind == EventKind::Strike).count(),
                    events.iter().filter(|e| e.kind == EventKind::ToeOff).count()
                );
                *velocity_events.side_mut(side) = events;
            }
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(e) => {
                warn!("{}: {}", source.trial_name(), e);
                side_errors.push(e);
            }
        }
    }

    let (events, reconcile) = EventReconciler::new(config.reconcile.clone()).reconcile(&velocity_events, &contacts);

    let tracking = optional_channel(source.marker(&config.markers.tracking))?;
    if tracking.is_none() && config.cycles.principal_range.is_some() {
        debug!("tracking marker {} missing, principal range filter disabled", config.markers.tracking);
    }
    let assembly = CycleAssembler::new(config.cycles.clone()).assemble(&events, &contacts, tracking.as_ref());
    let plate_context = plate_context(&contacts, plates.len());

    info!(
        "{}: {} contacts, {} cycles, plates '{}'",
        source.trial_name(),
        contacts.len(),
        assembly.cycles.len(),
        plate_context.coded
    );

    Ok(Analysis {
        contacts,
        thresholds,
        velocity_events,
        events,
        reconcile,
        assembly,
        plate_context,
        n_plates: plates.len(),
        side_errors,
    })
}
