// src/analysis/event_detector.rs
use super::velocity::{EventThresholds, SpeedProfile};
use crate::error::{GaitError, Result};
use crate::types::{Event, EventKind};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedState {
    /// Foot moving (swing)
    Above,
    /// Foot on the ground
    Below,
}

/// Hysteresis detector over one side's speed profile. Strikes are emitted on
/// the falling edge through the strike threshold, toe-offs on the rising edge
/// through the toe-off threshold, so a side's events always alternate.
pub struct EventDetector {
    thresholds: EventThresholds,
    state: Option<SpeedState>,
}

impl EventDetector {
    pub fn new(thresholds: EventThresholds) -> Self {
        Self {
            thresholds,
            state: None,
        }
    }

    pub fn state(&self) -> Option<SpeedState> {
        self.state
    }

    /// Feed one frame. Undefined speeds leave the state untouched.
    pub fn update(&mut self, frame: usize, speed: Option<f64>) -> Option<EventKind> {
        let v = speed?;

        match self.state {
            None => {
                self.state = Some(if v > self.thresholds.strike {
                    SpeedState::Above
                } else {
                    SpeedState::Below
                });
                None
            }

            Some(SpeedState::Above) => {
                if v <= self.thresholds.strike {
                    self.state = Some(SpeedState::Below);
                    debug!("strike at frame {} (speed {:.2})", frame, v);
                    Some(EventKind::Strike)
                } else {
                    None
                }
            }

            Some(SpeedState::Below) => {
                if v >= self.thresholds.toeoff {
                    self.state = Some(SpeedState::Above);
                    debug!("toeoff at frame {} (speed {:.2})", frame, v);
                    Some(EventKind::ToeOff)
                } else {
                    None
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Scan a whole profile. An empty result is reported as NoValidEvents.
    pub fn detect(&mut self, profile: &SpeedProfile) -> Result<Vec<Event>> {
        self.reset();
        let events: Vec<Event> = profile
            .speed
            .iter()
            .enumerate()
            .filter_map(|(frame, &v)| {
                self.update(frame, v)
                    .map(|kind| Event::velocity(frame, kind, profile.side))
            })
            .collect();

        if events.is_empty() {
            return Err(GaitError::NoValidEvents { side: profile.side });
        }
        Ok(events)
    }
}
