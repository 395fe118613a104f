//! §4.C — time resolver: hhmmss(.ss)/ddmmyy/GPS-week+TOW/UTC components to
//! a canonical timestamp, with century and leap-second disambiguation.
//!
//! Grounded on the teacher's `chrono` usage in `serialport.rs` and the
//! UTC-validity bitflags pattern in `nav_pvt/common.rs`.

use crate::error::DateTimeError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// A partially-resolved broken-down UTC date, as accumulated in
/// `NmeaScratch` across RMC/GGA/GLL/ZDA sentences within one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokenDownDate {
    pub year: i32, // four digit, or 0 if unknown
    pub month: u8, // 1..12, or 0 if unknown
    pub day: u8,   // 1..31, or 0 if unknown
}

/// A canonical UTC instant: seconds since epoch plus nanoseconds, kept
/// wide enough to express dates outside the `i64`-seconds Unix range that
/// some receivers report transiently (century rollover, GPS week rollover).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timespec {
    pub secs: i64,
    pub nsec: i64,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { secs: 0, nsec: 0 };
}

impl Default for Timespec {
    fn default() -> Self {
        Timespec::ZERO
    }
}

const GPS_EPOCH_UNIX: i64 = 315_964_800; // 1980-01-06T00:00:00Z

/// Decode a 6-digit `ddmmyy` NMEA field (§4.C `decode_ddmmyy`).
///
/// Two-digit years below 69 are interpreted as 2000+yy, 69..=99 as
/// 1900+yy, per the documented 1969..2068 window.
pub fn decode_ddmmyy(field: &str) -> Result<BrokenDownDate, DateTimeError> {
    let bytes = field.as_bytes();
    if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(DateTimeError::InvalidDate);
    }
    let day: u8 = field[0..2].parse().map_err(|_| DateTimeError::InvalidDate)?;
    let month: u8 = field[2..4].parse().map_err(|_| DateTimeError::InvalidDate)?;
    let yy: i32 = field[4..6].parse().map_err(|_| DateTimeError::InvalidDate)?;

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(DateTimeError::InvalidDate);
    }
    let year = if yy < 69 { 2000 + yy } else { 1900 + yy };
    Ok(BrokenDownDate { year, month, day })
}

/// Decode a `hhmmss(.fff...)` NMEA field (§4.C `decode_hhmmss`).
///
/// Returns `(hour, minute, second, nanosecond-of-second)`.
pub fn decode_hhmmss(field: &str) -> Result<(u8, u8, u8, u32), DateTimeError> {
    if field.len() < 6 {
        return Err(DateTimeError::InvalidTime);
    }
    let (hms, frac) = match field.find('.') {
        Some(idx) => (&field[..idx], &field[idx + 1..]),
        None => (field, ""),
    };
    if hms.len() != 6 || !hms.as_bytes().iter().all(u8::is_ascii_digit) {
        return Err(DateTimeError::InvalidTime);
    }
    let hour: u8 = hms[0..2].parse().map_err(|_| DateTimeError::InvalidTime)?;
    let min: u8 = hms[2..4].parse().map_err(|_| DateTimeError::InvalidTime)?;
    let sec: u8 = hms[4..6].parse().map_err(|_| DateTimeError::InvalidTime)?;
    if hour > 23 || min > 59 || sec > 60 {
        return Err(DateTimeError::InvalidTime);
    }
    let nsec = if frac.is_empty() {
        0
    } else {
        if !frac.as_bytes().iter().all(u8::is_ascii_digit) {
            return Err(DateTimeError::InvalidNanoseconds);
        }
        let digits = frac.len().min(9);
        let frac_val: u64 = frac[..digits].parse().map_err(|_| DateTimeError::InvalidNanoseconds)?;
        frac_val * 10u64.pow(9 - digits as u32)
    };
    Ok((hour, min, sec, nsec as u32))
}

/// §4.C `merge_ddmmyy`: apply a decoded date into scratch state.
pub fn merge_ddmmyy(date: &mut BrokenDownDate, decoded: BrokenDownDate) {
    *date = decoded;
}

/// §4.C `merge_hhmmss`: apply decoded hms into scratch, handling the
/// midnight wrap documented in §4.C ("if the new hour is less than
/// previous hour ... without a date, increment mday").
pub fn merge_hhmmss(
    date: &mut BrokenDownDate,
    prev_hour: Option<u8>,
    hour: u8,
) {
    if let Some(prev) = prev_hour {
        if hour < prev && date.day != 0 {
            let (y, m, d) = (date.year, date.month as u32, date.day as u32);
            if let Some(nd) = NaiveDate::from_ymd_opt(y, m, d) {
                let next = nd.succ_opt().unwrap_or(nd);
                date.year = next.year();
                date.month = next.month() as u8;
                date.day = next.day() as u8;
            }
        }
    }
}

/// §4.C `register_fractional_time`: compute seconds-of-day fraction from an
/// hhmmss field and shift the previous value into `lastFracTime`.
pub fn register_fractional_time(
    this_frac: &mut f64,
    last_frac: &mut f64,
    latch: &mut bool,
    hhmmss_field: &str,
) -> Result<(), DateTimeError> {
    let (h, m, s, nsec) = decode_hhmmss(hhmmss_field)?;
    *last_frac = *this_frac;
    *this_frac = h as f64 * 3600.0 + m as f64 * 60.0 + s as f64 + nsec as f64 / 1e9;
    *latch = true;
    Ok(())
}

/// §4.C `gpsd_utc_resolve`: combine scratch broken-down date + seconds of
/// day into a canonical UTC [`Timespec`].
pub fn gpsd_utc_resolve(
    date: BrokenDownDate,
    seconds_of_day: f64,
) -> Result<Timespec, DateTimeError> {
    if date.year == 0 || date.month == 0 || date.day == 0 {
        return Err(DateTimeError::InvalidDate);
    }
    let naive_date = NaiveDate::from_ymd_opt(date.year, date.month as u32, date.day as u32)
        .ok_or(DateTimeError::InvalidDate)?;
    let midnight = naive_date.and_hms_opt(0, 0, 0).ok_or(DateTimeError::InvalidDate)?;
    let dt = Utc.from_utc_datetime(&midnight);
    let secs = dt.timestamp() + seconds_of_day.trunc() as i64;
    let nsec = ((seconds_of_day.fract()) * 1e9).round() as i64;
    Ok(Timespec { secs, nsec })
}

/// §4.C `gpsd_gpstime_resolv`: GPS week + time-of-week (seconds) -> UTC,
/// applying `leap_seconds`.
pub fn gpsd_gpstime_resolv(week: u16, tow_secs: f64, leap_seconds: i32) -> Timespec {
    let gps_secs = GPS_EPOCH_UNIX + week as i64 * 604_800 + tow_secs.trunc() as i64;
    let nsec = (tow_secs.fract() * 1e9).round() as i64;
    Timespec { secs: gps_secs - leap_seconds as i64, nsec }
}

/// `gpsd_gpstime`: the leap-free variant, for callers (e.g. RINEX/RXM-RAWX)
/// that want raw GPS time rather than UTC.
pub fn gpsd_gpstime(week: u16, tow_secs: f64) -> Timespec {
    let gps_secs = GPS_EPOCH_UNIX + week as i64 * 604_800 + tow_secs.trunc() as i64;
    let nsec = (tow_secs.fract() * 1e9).round() as i64;
    Timespec { secs: gps_secs, nsec }
}

/// Tracks the century/leap-second/gps-week process-wide state (§3, §4.C,
/// owned by `Context` — see `src/context.rs`).
#[derive(Debug, Clone, Copy)]
pub struct CenturyState {
    pub century: i32, // e.g. 1900 or 2000
}

impl Default for CenturyState {
    fn default() -> Self {
        CenturyState { century: 2000 }
    }
}

impl CenturyState {
    /// ZDA supplies an authoritative 4-digit year: adopt its century directly.
    pub fn update_from_zda_year(&mut self, four_digit_year: i32) {
        self.century = (four_digit_year / 100) * 100;
    }

    /// RMC supplies `yy==0` while the tracked date's `tm_year % 100 == 99`:
    /// the century has rolled over.
    pub fn maybe_advance_on_rmc(&mut self, current_full_year: i32, new_yy: i32) {
        if new_yy == 0 && current_full_year % 100 == 99 {
            self.century += 100;
        }
    }

    /// Clamp a reported year descending by 100 if it lands implausibly far
    /// in the future (§4.C rollover workaround).
    pub fn clamp_future_year(year: i32) -> i32 {
        if year > 2080 {
            year - 100
        } else {
            year
        }
    }
}

/// Leap-second bookkeeping: "last writer wins" among UBX-NAV-TIMEGPS,
/// UBX-NAV-TIMELS, UBX-RXM-RAWX, and NMEA PGRMF (§4.C).
#[derive(Debug, Clone, Copy, Default)]
pub struct LeapState {
    pub leap_seconds: i32,
    pub leap_seconds_valid: bool,
}

impl LeapState {
    pub fn set(&mut self, value: i32) {
        self.leap_seconds = value;
        self.leap_seconds_valid = true;
    }
}

/// Computes a `NaiveDateTime` purely for tests/debugging convenience; not
/// part of the decoder hot path.
pub fn to_naive_datetime(ts: Timespec) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp(ts.secs, ts.nsec as u32).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ddmmyy_basic() {
        let d = decode_ddmmyy("130998").unwrap();
        assert_eq!(d, BrokenDownDate { year: 1998, month: 9, day: 13 });
    }

    #[test]
    fn decode_ddmmyy_rejects_bad_month() {
        assert!(decode_ddmmyy("139912").is_err());
    }

    #[test]
    fn decode_hhmmss_with_fraction() {
        let (h, m, s, nsec) = decode_hhmmss("081836.50").unwrap();
        assert_eq!((h, m, s), (8, 18, 36));
        assert_eq!(nsec, 500_000_000);
    }

    #[test]
    fn decode_hhmmss_no_fraction() {
        let (h, m, s, nsec) = decode_hhmmss("081836").unwrap();
        assert_eq!((h, m, s, nsec), (8, 18, 36, 0));
    }

    #[test]
    fn resolve_utc_s1_scenario() {
        let date = BrokenDownDate { year: 1998, month: 9, day: 13 };
        let ts = gpsd_utc_resolve(date, 8.0 * 3600.0 + 18.0 * 60.0 + 36.0).unwrap();
        let dt = to_naive_datetime(ts).unwrap();
        assert_eq!(dt.to_string(), "1998-09-13 08:18:36");
    }

    // §8 property 10: century disambiguation across an RMC yy=99 -> yy=00 pair.
    #[test]
    fn century_disambiguation_on_rollover() {
        let mut century = CenturyState::default();
        century.century = 1900;
        let first_full_year = 1999;
        century.maybe_advance_on_rmc(first_full_year, 0);
        assert_eq!(century.century, 2000);
    }

    #[test]
    fn midnight_wrap_advances_mday() {
        let mut date = BrokenDownDate { year: 2024, month: 1, day: 1 };
        merge_hhmmss(&mut date, Some(23), 0);
        assert_eq!(date, BrokenDownDate { year: 2024, month: 1, day: 2 });
    }
}
