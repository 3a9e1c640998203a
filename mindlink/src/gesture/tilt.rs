//! Head tilt to focus moves.
//!
//! Roll and pitch are taken relative to a baseline pose and normalized by
//! the full-scale tilt, giving two axes in [-1, 1]: positive horizontal is
//! right, positive vertical is up. Each axis has its own sustained-frame
//! counters; a move fires once a direction held past the threshold for
//! `sustain_frames` consecutive frames.

use super::grid::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TiltAxes {
    pub horizontal: f64,
    pub vertical: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Pose {
    roll: f64,
    pitch: f64,
}

#[derive(Debug, Default)]
struct AxisCounter {
    positive: u32,
    negative: u32,
}

impl AxisCounter {
    /// Counts a frame and returns the sign of a completed run.
    fn update(&mut self, value: f64, threshold: f64, sustain: u32) -> Option<bool> {
        if value > threshold {
            self.negative = 0;
            self.positive += 1;
            if self.positive >= sustain {
                self.positive = 0;
                return Some(true);
            }
        } else if value < -threshold {
            self.positive = 0;
            self.negative += 1;
            if self.negative >= sustain {
                self.negative = 0;
                return Some(false);
            }
        } else {
            self.clear();
        }
        None
    }

    fn clear(&mut self) {
        self.positive = 0;
        self.negative = 0;
    }
}

#[derive(Debug, Default)]
pub struct TiltTracker {
    baseline: Option<Pose>,
    last: Option<Pose>,
    horizontal: AxisCounter,
    vertical: AxisCounter,
}

impl TiltTracker {
    pub fn new() -> TiltTracker {
        TiltTracker::default()
    }

    /// Normalizes a pose against the baseline. The first pose after a reset
    /// becomes the baseline and reads as neutral.
    pub fn axes(&mut self, roll: f64, pitch: f64, max_tilt_deg: f64) -> TiltAxes {
        let pose = Pose { roll, pitch };
        self.last = Some(pose);
        let baseline = *self.baseline.get_or_insert(pose);
        TiltAxes {
            horizontal: ((roll - baseline.roll) / max_tilt_deg).clamp(-1.0, 1.0),
            vertical: ((pitch - baseline.pitch) / max_tilt_deg).clamp(-1.0, 1.0),
        }
    }

    /// Feeds one frame of axes to the counters. Returns the moves that
    /// completed on this frame, horizontal first.
    pub fn update(&mut self, axes: TiltAxes, threshold: f64, sustain: u32) -> Vec<Direction> {
        let mut moves = Vec::new();
        match self.horizontal.update(axes.horizontal, threshold, sustain) {
            Some(true) => moves.push(Direction::Right),
            Some(false) => moves.push(Direction::Left),
            None => {}
        }
        match self.vertical.update(axes.vertical, threshold, sustain) {
            Some(true) => moves.push(Direction::Up),
            Some(false) => moves.push(Direction::Down),
            None => {}
        }
        moves
    }

    /// Uses the most recent pose as the baseline, or the next one if none
    /// was seen yet.
    pub fn calibrate(&mut self) {
        self.baseline = self.last;
        self.clear_counters();
    }

    pub fn clear_counters(&mut self) {
        self.horizontal.clear();
        self.vertical.clear();
    }

    /// Forgets the baseline and the counters.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.clear_counters();
    }
}
