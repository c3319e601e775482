//! Game time model.
//!
//! Time is a monotonically increasing millisecond counter owned by the
//! caller's tick loop.  Nothing in the framework reads the wall clock for
//! game logic: the host advances a [`GameClock`] by the tick's `dt` and every
//! interval, TTL and sampling decision is made against that value.  This keeps
//! tests deterministic and lets a paused world stay paused.

use std::fmt;

// ── GameTime ─────────────────────────────────────────────────────────────────

/// An absolute game time in milliseconds since the clock started.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameTime(pub u64);

impl GameTime {
    pub const ZERO: GameTime = GameTime(0);

    /// Milliseconds elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: GameTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[inline]
    pub fn as_secs_f32(self) -> f32 {
        self.0 as f32 / 1000.0
    }
}

impl std::ops::Add<u64> for GameTime {
    type Output = GameTime;
    #[inline]
    fn add(self, rhs: u64) -> GameTime {
        GameTime(self.0 + rhs)
    }
}

impl std::ops::Sub for GameTime {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: GameTime) -> u64 {
        self.since(rhs)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

// ── GameClock ─────────────────────────────────────────────────────────────────

/// Tick counter plus current game time.
#[derive(Clone, Debug, Default)]
pub struct GameClock {
    now:   GameTime,
    ticks: u64,
}

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at an arbitrary time (e.g. a restored world).
    pub fn starting_at(now: GameTime) -> Self {
        Self { now, ticks: 0 }
    }

    #[inline]
    pub fn now(&self) -> GameTime {
        self.now
    }

    /// Number of `advance` calls so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance by one tick of `dt_ms` milliseconds and return the new time.
    #[inline]
    pub fn advance(&mut self, dt_ms: u32) -> GameTime {
        self.now = self.now + dt_ms as u64;
        self.ticks += 1;
        self.now
    }
}

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {} ({})", self.ticks, self.now)
    }
}
