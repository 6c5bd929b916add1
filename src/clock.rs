use std::time::Duration;

use serde::Serialize;
use web_time::Instant;

use crate::types::Side;

const LOW_TIME_WARNING_SECS: u32 = 10;
const LOW_TIME_NOTICE_SECS: u32 = 30;

/// Snapshot of both countdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockState {
    pub white_remaining: u32,
    pub black_remaining: u32,
    /// Side being charged, read fresh on every tick.
    pub active_side: Side,
    pub running: bool,
}

/// Two per-side countdowns in whole seconds.
///
/// Only `active_side` is charged on each tick. Once a side reaches zero the
/// clock stops for good; `start` will not revive it.
#[derive(Debug, Clone)]
pub struct Clock {
    state: ClockState,
}

impl Clock {
    pub fn new(initial_seconds: u32, active_side: Side) -> Self {
        Self {
            state: ClockState {
                white_remaining: initial_seconds,
                black_remaining: initial_seconds,
                active_side,
                running: false,
            },
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn active_side(&self) -> Side {
        self.state.active_side
    }

    pub fn set_active_side(&mut self, side: Side) {
        if self.state.active_side != side {
            log::debug!("clock now charging {side}");
        }
        self.state.active_side = side;
    }

    pub fn remaining(&self, side: Side) -> u32 {
        match side {
            Side::White => self.state.white_remaining,
            Side::Black => self.state.black_remaining,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn is_expired(&self) -> bool {
        self.state.white_remaining == 0 || self.state.black_remaining == 0
    }

    pub fn start(&mut self) {
        if !self.is_expired() {
            self.state.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.state.running = false;
    }

    /// Charges one second to the active side.
    /// Returns the side whose clock just expired, if any.
    pub fn tick(&mut self) -> Option<Side> {
        if !self.state.running {
            return None;
        }

        let side = self.state.active_side;
        let remaining = match side {
            Side::White => &mut self.state.white_remaining,
            Side::Black => &mut self.state.black_remaining,
        };
        let before = *remaining;
        *remaining = before.saturating_sub(1);
        let after = *remaining;

        if before > LOW_TIME_WARNING_SECS && after <= LOW_TIME_WARNING_SECS {
            log::warn!("{side} has {after} seconds remaining");
        } else if before > LOW_TIME_NOTICE_SECS && after <= LOW_TIME_NOTICE_SECS {
            log::info!("{side} has {after} seconds remaining");
        }

        if after == 0 {
            self.state.running = false;
            log::info!("{side} ran out of time");
            return Some(side);
        }
        None
    }

    /// Applies several ticks, stopping early on expiry.
    pub fn advance(&mut self, ticks: u32) -> Option<Side> {
        for _ in 0..ticks {
            if let Some(expired) = self.tick() {
                return Some(expired);
            }
        }
        None
    }
}

/// Repeating one-second timer source driving the clock.
pub trait TickSource {
    /// Whole seconds elapsed since the previous call.
    fn elapsed_ticks(&mut self) -> u32;
}

/// Wall-clock ticks. Fractions of a second carry over between polls.
#[derive(Debug, Clone)]
pub struct WallTicks {
    last: Instant,
    carry: Duration,
}

impl WallTicks {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            carry: Duration::ZERO,
        }
    }

    /// Forgets time accumulated so far, e.g. when a new game starts.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.carry = Duration::ZERO;
    }
}

impl Default for WallTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for WallTicks {
    fn elapsed_ticks(&mut self) -> u32 {
        let now = Instant::now();
        self.carry += now.duration_since(self.last);
        self.last = now;
        let whole = self.carry.as_secs();
        self.carry -= Duration::from_secs(whole);
        u32::try_from(whole).unwrap_or(u32::MAX)
    }
}

/// Ticks pushed by hand; used by hosts with their own interval and by tests.
#[derive(Debug, Clone, Default)]
pub struct ManualTicks {
    pending: u32,
}

impl ManualTicks {
    pub fn push(&mut self, ticks: u32) {
        self.pending = self.pending.saturating_add(ticks);
    }
}

impl TickSource for ManualTicks {
    fn elapsed_ticks(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }
}
