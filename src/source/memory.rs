// src/source/memory.rs

use super::{
    AnalogChannel, ForceplateChannel, MarkerChannel, PlateHint, SubjectParams, TrialSource,
};
use crate::error::{GaitError, Result};
use std::collections::BTreeMap;

/// In-memory trial data. Every mutation bumps the change token, so a `Trial`
/// built on it behaves like one backed by a live, externally edited source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    frame_rate: f64,
    frame_count: usize,
    markers: BTreeMap<String, MarkerChannel>,
    analogs: BTreeMap<String, AnalogChannel>,
    forceplates: Vec<ForceplateChannel>,
    subject: SubjectParams,
    hints: Vec<PlateHint>,
    version: u64,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frame_rate: f64, frame_count: usize) -> Self {
        Self {
            name: name.into(),
            frame_rate,
            frame_count,
            markers: BTreeMap::new(),
            analogs: BTreeMap::new(),
            forceplates: Vec::new(),
            subject: SubjectParams::default(),
            hints: Vec::new(),
            version: 0,
        }
    }

    pub fn with_marker(mut self, marker: MarkerChannel) -> Self {
        self.markers.insert(marker.name.clone(), marker);
        self
    }

    pub fn with_analog(mut self, analog: AnalogChannel) -> Self {
        self.analogs.insert(analog.name.clone(), analog);
        self
    }

    pub fn with_forceplate(mut self, plate: ForceplateChannel) -> Self {
        self.forceplates.push(plate);
        self
    }

    pub fn with_subject(mut self, subject: SubjectParams) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_hints(mut self, hints: Vec<PlateHint>) -> Self {
        self.hints = hints;
        self
    }

    pub fn set_marker(&mut self, marker: MarkerChannel) {
        self.markers.insert(marker.name.clone(), marker);
        self.touch();
    }

    pub fn set_analog(&mut self, analog: AnalogChannel) {
        self.analogs.insert(analog.name.clone(), analog);
        self.touch();
    }

    pub fn set_hints(&mut self, hints: Vec<PlateHint>) {
        self.hints = hints;
        self.touch();
    }

    pub fn remove_marker(&mut self, name: &str) -> Option<MarkerChannel> {
        let removed = self.markers.remove(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

impl TrialSource for MemorySource {
    fn trial_name(&self) -> &str {
        &self.name
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn marker_names(&self) -> Vec<String> {
        self.markers.keys().cloned().collect()
    }

    fn marker(&self, name: &str) -> Result<MarkerChannel> {
        self.markers
            .get(name)
            .cloned()
            .ok_or_else(|| GaitError::UnknownChannel {
                name: name.to_string(),
            })
    }

    fn analog_names(&self) -> Vec<String> {
        self.analogs.keys().cloned().collect()
    }

    fn analog(&self, name: &str) -> Result<AnalogChannel> {
        self.analogs
            .get(name)
            .cloned()
            .ok_or_else(|| GaitError::UnknownChannel {
                name: name.to_string(),
            })
    }

    fn forceplates(&self) -> Result<Vec<ForceplateChannel>> {
        Ok(self.forceplates.clone())
    }

    fn subject(&self) -> SubjectParams {
        self.subject.clone()
    }

    fn plate_hints(&self) -> Vec<PlateHint> {
        self.hints.clone()
    }

    fn change_token(&self) -> Option<u64> {
        Some(self.version)
    }
}
