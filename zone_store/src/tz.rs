//! Market-time helpers.
//!
//! All instants stored and queried are UTC. Wall-clock times only appear at the
//! edge where the session open (e.g. 09:30 America/New_York) is applied.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, offset::LocalResult};
use chrono_tz::Tz;

use crate::config::MarketHours;

/// Longest DST gap searched when a local time does not exist.
const MAX_GAP_MINUTES: u32 = 120;

/// UTC instant of a local wall time.
///
/// A time repeated by a fall-back transition resolves to its first occurrence;
/// a time skipped by a spring-forward transition moves to the first valid minute
/// after the gap.
fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
    let mut t = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&t) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return Ok(dt.with_timezone(&Utc));
            }
            LocalResult::None => t += Duration::minutes(1),
        }
    }
    anyhow::bail!("nonexistent local time {naive} in {tz}")
}

/// Calendar date of `ts` as seen in the market time zone.
pub fn session_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// Session open on `date` (market-local calendar date), as a UTC instant.
pub fn session_open_utc(date: NaiveDate, hours: &MarketHours) -> anyhow::Result<DateTime<Utc>> {
    local_to_utc(date.and_time(hours.open), hours.tz)
}
