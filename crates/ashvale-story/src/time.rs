//! Game clock and day/night cycle.
//!
//! The host advances this clock from its update loop and syncs the
//! day/night flag into [`WorldState`](crate::world_state::WorldState),
//! which is what `time.is_day` conditions actually read.

use serde::{Deserialize, Serialize};

/// Default starting hour (8:00).
const DEFAULT_START_HOUR: u32 = 8;
/// Default real seconds per game minute.
const DEFAULT_REAL_SECONDS_PER_MINUTE: f32 = 1.0;
/// Minutes in a game day.
const MINUTES_PER_DAY: f32 = 24.0 * 60.0;
/// Minutes in a game hour.
const MINUTES_PER_HOUR: f32 = 60.0;
/// Daytime runs from 06:00 (inclusive) to 18:00 (exclusive).
const DAWN_HOUR: u32 = 6;
/// First night hour.
const DUSK_HOUR: u32 = 18;

/// Game time with a day/night cycle.
///
/// Time of day is stored normalized: 0.0 = midnight, 0.5 = noon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameTime {
    /// Current time of day in [0.0, 1.0).
    time_of_day: f32,
    /// Number of complete days that have passed.
    day_count: u32,
    /// Real seconds per game minute.
    real_seconds_per_game_minute: f32,
}

impl Default for GameTime {
    fn default() -> Self {
        Self::new()
    }
}

impl GameTime {
    /// Creates a clock starting at 8:00 on day zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_time(DEFAULT_START_HOUR, 0, 0)
    }

    /// Creates a clock at a specific time.
    #[must_use]
    pub fn with_time(hour: u32, minute: u32, day: u32) -> Self {
        let hour = hour.min(23);
        let minute = minute.min(59);
        let minutes_today = hour as f32 * MINUTES_PER_HOUR + minute as f32;
        Self {
            time_of_day: minutes_today / MINUTES_PER_DAY,
            day_count: day,
            real_seconds_per_game_minute: DEFAULT_REAL_SECONDS_PER_MINUTE,
        }
    }

    /// Sets the time scale (real seconds per game minute).
    pub fn set_time_scale(&mut self, seconds_per_minute: f32) {
        self.real_seconds_per_game_minute = seconds_per_minute.max(0.01);
    }

    /// Advances the clock by `dt` real seconds.
    pub fn advance(&mut self, dt: f32) {
        let game_minutes = dt / self.real_seconds_per_game_minute;
        self.time_of_day += game_minutes / MINUTES_PER_DAY;
        while self.time_of_day >= 1.0 {
            self.time_of_day -= 1.0;
            self.day_count += 1;
        }
    }

    /// Current hour (0-23).
    #[must_use]
    pub fn hour(&self) -> u32 {
        (self.time_of_day * 24.0) as u32 % 24
    }

    /// Current minute (0-59).
    #[must_use]
    pub fn minute(&self) -> u32 {
        (self.time_of_day * MINUTES_PER_DAY) as u32 % 60
    }

    /// Number of complete days elapsed.
    #[must_use]
    pub const fn day_count(&self) -> u32 {
        self.day_count
    }

    /// Whether it is daytime (06:00-17:59).
    #[must_use]
    pub fn is_day(&self) -> bool {
        (DAWN_HOUR..DUSK_HOUR).contains(&self.hour())
    }

    /// Whether it is nighttime.
    #[must_use]
    pub fn is_night(&self) -> bool {
        !self.is_day()
    }
}
