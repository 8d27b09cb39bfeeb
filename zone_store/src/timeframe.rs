//! Timeframe utilities for bar intervals expressed in minutes.
//!
//! Every chart timeframe in this system is a whole number of minutes (a "day" for
//! equities is a 390-minute session, a "day" for crypto is 1440 minutes), so a
//! [`Timeframe`] is a non-zero minute count. The family-specific unit only matters
//! when deriving precomputed view names, see [`Timeframe::view_suffix`].
//!
//! ```
//! use zone_store::timeframe::Timeframe;
//!
//! let tf = Timeframe::from_minutes(1950).unwrap();
//! assert_eq!(tf.view_suffix(390, false), "5d");
//! assert_eq!(tf.to_string(), "1950min");
//! ```

use std::{fmt, num::NonZeroU32};

/// Minutes per hour, used by the hour unit of view names.
pub const MINUTES_PER_HOUR: u32 = 60;

/// A bar interval, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeframe {
    minutes: NonZeroU32,
}

impl Timeframe {
    /// `None` for zero.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        NonZeroU32::new(minutes).map(|minutes| Self { minutes })
    }

    pub const fn minutes(&self) -> u32 {
        self.minutes.get()
    }

    /// Interval literal accepted by Postgres / TimescaleDB `time_bucket` (e.g. `"65 minutes"`).
    pub fn pg_interval(&self) -> String {
        format!("{} minutes", self.minutes)
    }

    /// Suffix of the precomputed view for this timeframe: `<N><unit>`.
    ///
    /// * `day_minutes` - length of one "day" for the instrument family (390 or 1440).
    /// * `hour_unit` - whether the family names whole-hour views with `h`.
    ///
    /// Families without an hour unit (equities) only switch to `d` above one
    /// session, so the one-session view stays `390m`.
    pub fn view_suffix(&self, day_minutes: u32, hour_unit: bool) -> String {
        let m = self.minutes.get();
        let whole_days = day_minutes > 0 && m % day_minutes == 0;
        if hour_unit {
            if whole_days {
                return format!("{}d", m / day_minutes);
            }
            if m % MINUTES_PER_HOUR == 0 {
                return format!("{}h", m / MINUTES_PER_HOUR);
            }
        } else if whole_days && m > day_minutes {
            return format!("{}d", m / day_minutes);
        }
        format!("{m}m")
    }
}

/// `"<N>min"`, the label used in titles and output file names.
impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.minutes)
    }
}
