//! Hold-to-confirm with decay.
//!
//! While holding, every frame moves the accumulator by the time since the
//! previous frame: up for a qualifying push, down by `decay_rate` times as
//! much for anything else. The hold completes when the accumulator reaches
//! the hold duration and is cancelled when decay brings it back to zero.

use super::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldChange {
    Started,
    Progress(f64),
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum HoldPhase {
    Idle,
    Holding,
    Done,
}

#[derive(Debug)]
pub struct HoldTracker {
    phase: HoldPhase,
    accumulated: f64,
    started: f64,
    last_frame: Option<f64>,
}

impl Default for HoldTracker {
    fn default() -> Self {
        HoldTracker::new()
    }
}

impl HoldTracker {
    pub fn new() -> HoldTracker {
        HoldTracker {
            phase: HoldPhase::Idle,
            accumulated: 0.0,
            started: 0.0,
            last_frame: None,
        }
    }

    pub fn is_holding(&self) -> bool {
        self.phase == HoldPhase::Holding
    }

    pub fn is_done(&self) -> bool {
        self.phase == HoldPhase::Done
    }

    /// Time of the push that started the current hold.
    pub fn started(&self) -> Option<f64> {
        self.is_holding().then_some(self.started)
    }

    pub fn progress(&self, config: &EngineConfig) -> f64 {
        match self.phase {
            HoldPhase::Idle => 0.0,
            HoldPhase::Holding => (self.accumulated / config.hold_duration()).clamp(0.0, 1.0),
            HoldPhase::Done => 1.0,
        }
    }

    pub fn on_frame(&mut self, qualifying: bool, time: f64, config: &EngineConfig) -> Option<HoldChange> {
        let elapsed = self.last_frame.map_or(0.0, |last| (time - last).max(0.0));
        self.last_frame = Some(time);
        match self.phase {
            HoldPhase::Done => None,
            HoldPhase::Idle if qualifying => {
                self.phase = HoldPhase::Holding;
                self.accumulated = 0.0;
                self.started = time;
                Some(HoldChange::Started)
            }
            HoldPhase::Idle => None,
            HoldPhase::Holding => {
                if qualifying {
                    self.accumulated += elapsed;
                } else {
                    self.accumulated -= elapsed * config.decay_rate;
                }
                Some(self.settle(qualifying, config))
            }
        }
    }

    /// Decays a hold whose stream went quiet for longer than `stale_after`.
    pub fn tick(&mut self, now: f64, config: &EngineConfig) -> Option<HoldChange> {
        let last = self.last_frame?;
        if !self.is_holding() || now - last <= config.stale_after() {
            return None;
        }
        self.accumulated -= (now - last) * config.decay_rate;
        self.last_frame = Some(now);
        Some(self.settle(false, config))
    }

    fn settle(&mut self, qualifying: bool, config: &EngineConfig) -> HoldChange {
        if self.accumulated >= config.hold_duration() {
            self.phase = HoldPhase::Done;
            HoldChange::Completed
        } else if !qualifying && self.accumulated <= 0.0 {
            self.phase = HoldPhase::Idle;
            self.accumulated = 0.0;
            HoldChange::Cancelled
        } else {
            HoldChange::Progress(self.progress(config))
        }
    }

    pub fn reset(&mut self) {
        *self = HoldTracker::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_power_frames_decay() {
        let config = EngineConfig::default();
        let mut hold = HoldTracker::new();
        assert_eq!(hold.on_frame(true, 0.0, &config), Some(HoldChange::Started));
        assert_eq!(hold.on_frame(true, 2.0, &config), Some(HoldChange::Progress(0.25)));
        assert_eq!(hold.on_frame(false, 3.0, &config), Some(HoldChange::Progress(0.125)));
        assert_eq!(hold.on_frame(false, 4.5, &config), Some(HoldChange::Cancelled));
        assert_eq!(hold.progress(&config), 0.0);
        assert!(!hold.is_holding());
    }

    #[test]
    fn idle_ignores_non_qualifying() {
        let config = EngineConfig::default();
        let mut hold = HoldTracker::new();
        assert_eq!(hold.on_frame(false, 0.0, &config), None);
        assert_eq!(hold.started(), None);
    }

    #[test]
    fn quiet_stream_decays_on_tick() {
        let config = EngineConfig::default();
        let mut hold = HoldTracker::new();
        hold.on_frame(true, 0.0, &config);
        hold.on_frame(true, 4.0, &config);
        assert_eq!(hold.tick(4.25, &config), None);
        assert_eq!(hold.tick(5.0, &config), Some(HoldChange::Progress(0.375)));
        assert_eq!(hold.tick(8.0, &config), Some(HoldChange::Cancelled));
        assert_eq!(hold.tick(10.0, &config), None);
    }

    #[test]
    fn completed_hold_stays_done() {
        let config = EngineConfig {
            hold_duration_ms: 1000,
            ..Default::default()
        };
        let mut hold = HoldTracker::new();
        hold.on_frame(true, 0.0, &config);
        assert_eq!(hold.on_frame(true, 1.0, &config), Some(HoldChange::Completed));
        assert_eq!(hold.on_frame(false, 5.0, &config), None);
        assert!(hold.is_done());
        hold.reset();
        assert!(!hold.is_done());
    }
}
