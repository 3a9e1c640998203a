//! Selection engine
//!
//! One state machine per registered device:
//!
//! ```text
//!   Idle(focus) --push--> Holding(focus) --held--> Locked(selection)
//!        ^                    |                          |
//!        +------decayed-------+                          |
//!        +----------------------reset--------------------+
//! ```
//!
//! Tilt moves the focus only while idle. Devices never share state; an
//! event for one device cannot change another's progress.

use super::config::EngineConfig;
use super::grid::{Direction, Grid};
use super::hold::{HoldChange, HoldTracker};
use super::tilt::{TiltAxes, TiltTracker};
use crate::data::{Event, MentalCommandEvent, MotionEvent, TransportEvent};
use crate::device::{DeviceId, SessionStatus};

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Holding,
    Locked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    FocusMoved {
        device: DeviceId,
        from: usize,
        to: usize,
    },
    HoldStarted {
        device: DeviceId,
        focus: usize,
    },
    HoldProgress {
        device: DeviceId,
        progress: f64,
    },
    HoldCancelled {
        device: DeviceId,
    },
    Locked {
        device: DeviceId,
        selection: usize,
    },
}

impl SelectionOutcome {
    pub fn device(&self) -> &str {
        match self {
            SelectionOutcome::FocusMoved { device, .. }
            | SelectionOutcome::HoldStarted { device, .. }
            | SelectionOutcome::HoldProgress { device, .. }
            | SelectionOutcome::HoldCancelled { device }
            | SelectionOutcome::Locked { device, .. } => device,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot {
    pub phase: Phase,
    pub focus: usize,
    /// Hold progress in [0, 1].
    pub progress: f64,
    pub locked: Option<usize>,
}

#[derive(Debug, Default)]
struct DeviceState {
    focus: usize,
    locked: Option<usize>,
    hold: HoldTracker,
    tilt: TiltTracker,
}

impl DeviceState {
    fn phase(&self) -> Phase {
        if self.locked.is_some() {
            Phase::Locked
        } else if self.hold.is_holding() {
            Phase::Holding
        } else {
            Phase::Idle
        }
    }
}

pub struct SelectionEngine {
    config: EngineConfig,
    grid: Grid,
    devices: BTreeMap<DeviceId, DeviceState>,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        SelectionEngine::new(EngineConfig::default())
    }
}

impl SelectionEngine {
    pub fn new(config: EngineConfig) -> SelectionEngine {
        SelectionEngine {
            grid: Grid::new(config.grid_columns, config.grid_cells),
            config,
            devices: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Starts tracking `device` with focus on the first cell. Returns false
    /// if it was already registered; its state is left as is.
    pub fn register(&mut self, device: &str) -> bool {
        if self.devices.contains_key(device) {
            return false;
        }
        tracing::debug!(device, "selection tracking started");
        self.devices.insert(device.to_string(), DeviceState::default());
        true
    }

    pub fn unregister(&mut self, device: &str) -> bool {
        self.devices.remove(device).is_some()
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Re-arms `device`: clears any hold or lock and recaptures the tilt
    /// baseline on the next motion frame. Focus is kept.
    pub fn reset(&mut self, device: &str) -> bool {
        match self.devices.get_mut(device) {
            Some(state) => {
                state.locked = None;
                state.hold.reset();
                state.tilt.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&mut self) {
        for state in self.devices.values_mut() {
            state.locked = None;
            state.hold.reset();
            state.tilt.reset();
        }
    }

    /// Takes the current head pose of `device` as neutral.
    pub fn calibrate(&mut self, device: &str) -> bool {
        match self.devices.get_mut(device) {
            Some(state) => {
                state.tilt.calibrate();
                true
            }
            None => false,
        }
    }

    /// Drops every device.
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn snapshot(&self, device: &str) -> Option<SelectionSnapshot> {
        self.devices.get(device).map(|state| SelectionSnapshot {
            phase: state.phase(),
            focus: state.focus,
            progress: state.hold.progress(&self.config),
            locked: state.locked,
        })
    }

    fn hold_outcome(
        device: &str,
        state: &mut DeviceState,
        change: HoldChange,
    ) -> SelectionOutcome {
        let device = device.to_string();
        match change {
            HoldChange::Started => {
                state.tilt.clear_counters();
                SelectionOutcome::HoldStarted {
                    device,
                    focus: state.focus,
                }
            }
            HoldChange::Progress(progress) => SelectionOutcome::HoldProgress { device, progress },
            HoldChange::Cancelled => SelectionOutcome::HoldCancelled { device },
            HoldChange::Completed => {
                state.locked = Some(state.focus);
                tracing::info!(device = %device, selection = state.focus, "selection locked");
                SelectionOutcome::Locked {
                    device,
                    selection: state.focus,
                }
            }
        }
    }

    pub fn on_command(&mut self, event: &MentalCommandEvent) -> Option<SelectionOutcome> {
        let state = self.devices.get_mut(&event.device)?;
        if state.locked.is_some() {
            return None;
        }
        let qualifying = event.is_push() && event.power >= self.config.push_threshold;
        let change = state.hold.on_frame(qualifying, event.time, &self.config)?;
        Some(Self::hold_outcome(&event.device, state, change))
    }

    pub fn on_motion(&mut self, event: &MotionEvent) -> Option<SelectionOutcome> {
        let state = self.devices.get_mut(&event.device)?;
        let axes = state
            .tilt
            .axes(event.roll, event.pitch, self.config.max_tilt_deg);
        self.on_tilt(&event.device, axes)
    }

    /// Feeds already normalized tilt axes for `device`.
    pub fn on_tilt(&mut self, device: &str, axes: TiltAxes) -> Option<SelectionOutcome> {
        let state = self.devices.get_mut(device)?;
        if state.phase() != Phase::Idle {
            return None;
        }
        let moves: Vec<Direction> =
            state
                .tilt
                .update(axes, self.config.tilt_threshold, self.config.sustain_frames);
        if moves.is_empty() {
            return None;
        }
        let grid = self.grid;
        let from = state.focus;
        state.focus = moves
            .into_iter()
            .fold(from, |focus, direction| grid.step(focus, direction));
        tracing::debug!(device, from, to = state.focus, "focus moved");
        Some(SelectionOutcome::FocusMoved {
            device: device.to_string(),
            from,
            to: state.focus,
        })
    }

    /// Decays holds of devices whose command stream went quiet. `now` is on
    /// the same clock as event timestamps.
    pub fn tick(&mut self, now: f64) -> Vec<SelectionOutcome> {
        let mut outcomes = Vec::new();
        for (device, state) in self.devices.iter_mut() {
            if let Some(change) = state.hold.tick(now, &self.config) {
                outcomes.push(Self::hold_outcome(device, state, change));
            }
        }
        outcomes
    }

    /// Routes a bus event. A session becoming ready registers its device, a
    /// disconnected session unregisters it, and a closed transport drops
    /// every device.
    pub fn handle_event(&mut self, event: &Event) -> Option<SelectionOutcome> {
        match event {
            Event::Command(e) => self.on_command(e),
            Event::Motion(e) => self.on_motion(e),
            Event::Session(e) => {
                match e.status {
                    Some(SessionStatus::Ready) => {
                        self.register(&e.device);
                    }
                    None => {
                        self.unregister(&e.device);
                    }
                    Some(_) => {}
                }
                None
            }
            Event::Transport(TransportEvent::Closed) => {
                self.clear();
                None
            }
            _ => None,
        }
    }
}
