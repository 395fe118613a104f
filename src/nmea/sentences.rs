//! §4.E per-tag handlers. Each handler receives the already-split
//! [`Fields`] (talker prefix stripped where the dispatch table strips it)
//! and the owning [`Session`], and returns the [`Mask`] bits it produced.
//!
//! Grounded on the field-by-field decode shape of
//! `AeroRust-nmea::parser`/`youssefhabri-rust-nmea::parse`, reworked away
//! from their `nom`-combinator style into plain `&str` parsing to match
//! the teacher's hand-rolled-parser idiom (no parser-combinator dependency
//! in `ublox-rs-ublox`).

use crate::context::Session;
use crate::fix::{FixMode, FixStatus, Satellite};
use crate::ids::{prn_map, Talker};
use crate::mask::Mask;
use crate::sink::{data, warn, ErrorSink};
use crate::time::{
    decode_ddmmyy, decode_hhmmss, gpsd_utc_resolve, merge_ddmmyy, merge_hhmmss,
    register_fractional_time,
};

use super::fields::Fields;

const TAG: &str = "NMEA0183:";

fn parse_f64(field: &str) -> Option<f64> {
    if field.is_empty() {
        None
    } else {
        field.parse::<f64>().ok()
    }
}

/// Decode a `ddmm.mmmm` / `dddmm.mmmm` lat/lon field into signed decimal
/// degrees. Per §9's numeric-edge-case note: extracted via integer
/// splitting on the decimal point rather than `modf`/`fmod`, so behavior
/// doesn't depend on the host's `FLT_EVAL_METHOD`.
fn decode_degrees_minutes(field: &str, deg_digits: usize) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    let dot = field.find('.').unwrap_or(field.len());
    if dot < deg_digits {
        return None;
    }
    let deg: i64 = field[..deg_digits].parse().ok()?;
    let min_str = &field[deg_digits..];
    let (min_int_str, frac_str) = match min_str.find('.') {
        Some(d) => (&min_str[..d], &min_str[d + 1..]),
        None => (min_str, ""),
    };
    let min_int: i64 = min_int_str.parse().ok()?;
    let frac: f64 = if frac_str.is_empty() { 0.0 } else { format!("0.{frac_str}").parse().ok()? };
    let minutes = min_int as f64 + frac;
    Some(deg as f64 + minutes / 60.0)
}

fn do_lat(field: &str, hemi: &str) -> Option<f64> {
    let mag = decode_degrees_minutes(field, 2)?;
    match hemi {
        "N" => Some(mag),
        "S" => Some(-mag),
        _ => None,
    }
}

fn do_lon(field: &str, hemi: &str) -> Option<f64> {
    let mag = decode_degrees_minutes(field, 3)?;
    match hemi {
        "E" => Some(mag),
        "W" => Some(-mag),
        _ => None,
    }
}

fn knots_to_mps(knots: f64) -> f64 {
    knots * 0.514444444
}

fn status_from_faa(mode: &str) -> FixStatus {
    match mode.as_bytes().first() {
        Some(b'A') => FixStatus::Gps,
        Some(b'D') => FixStatus::Dgps,
        Some(b'E') => FixStatus::Dr,
        Some(b'S') => FixStatus::Simulated,
        Some(b'R') => FixStatus::RtkFix,
        Some(b'F') => FixStatus::RtkFloat,
        _ => FixStatus::Unk,
    }
}

fn in_dop_range(v: f64) -> bool {
    (0.01..=89.99).contains(&v)
}

fn apply_time_field(session: &mut Session, field: &str, sink: &mut dyn ErrorSink) -> bool {
    let r = register_fractional_time(
        &mut session.nmea.this_frac_time,
        &mut session.nmea.last_frac_time,
        &mut session.nmea.latch_frac_time,
        field,
    );
    if let Err(e) = r {
        warn(sink, TAG, format!("bad time field {field}: {e}"));
        false
    } else {
        true
    }
}

fn merge_time_into_date(session: &mut Session, field: &str) -> Option<(u8, u8, u8, u32)> {
    let (h, m, s, nsec) = decode_hhmmss(field).ok()?;
    merge_hhmmss(&mut session.nmea.date, session.nmea.prev_hour, h);
    session.nmea.prev_hour = Some(h);
    Some((h, m, s, nsec))
}

fn resolve_and_set_time(session: &mut Session, hms: (u8, u8, u8, u32)) -> bool {
    let (h, m, s, nsec) = hms;
    let seconds_of_day = h as f64 * 3600.0 + m as f64 * 60.0 + s as f64 + nsec as f64 / 1e9;
    match gpsd_utc_resolve(session.nmea.date, seconds_of_day) {
        Ok(ts) => {
            session.newdata.time = ts;
            session.newdata.time_valid = true;
            true
        },
        Err(_) => false,
    }
}

// ---- RMC --------------------------------------------------------------

pub fn rmc(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    let status = f.get(2);
    apply_time_field(session, f.get(1), sink);
    if let Some(hms) = merge_time_into_date(session, f.get(1)) {
        if resolve_and_set_time(session, hms) {
            mask |= Mask::TIME;
        }
    }

    if status != "A" && status != "D" {
        session.newdata.mode = FixMode::NoFix;
        mask |= Mask::MODE;
        if !session.newdata.time_valid {
            // No usable time to anchor a cycle on: clear the scratch date and
            // force an immediate report rather than wait on a cycle-ender
            // that may never arrive this epoch (§4.E RMC `V` contract).
            session.nmea.date = Default::default();
            mask |= Mask::REPORT_IS;
        }
        return mask;
    }

    if let (Some(lat), Some(lon)) = (do_lat(f.get(3), f.get(4)), do_lon(f.get(5), f.get(6))) {
        session.newdata.lat = lat;
        session.newdata.lon = lon;
        mask |= Mask::LATLON;
    }
    if let Some(knots) = parse_f64(f.get(7)) {
        session.newdata.speed = knots_to_mps(knots);
        mask |= Mask::SPEED;
    }
    if let Some(track) = parse_f64(f.get(8)) {
        session.newdata.track = track;
        mask |= Mask::TRACK;
    }
    if let Ok(date) = decode_ddmmyy(f.get(9)) {
        merge_ddmmyy(&mut session.nmea.date, date);
    }
    if let Some(var) = parse_f64(f.get(10)) {
        session.newdata.magnetic_var = if f.get(11) == "W" { -var } else { var };
    }

    if f.count() > 12 {
        session.newdata.status = status_from_faa(f.get(12));
    } else if status == "A" {
        session.newdata.status = FixStatus::Gps;
    }
    if session.newdata.status != FixStatus::Unk && session.newdata.mode == FixMode::NoFix {
        session.newdata.mode = FixMode::Fix2D;
    }
    mask |= Mask::STATUS | Mask::MODE;
    mask
}

// ---- GGA ----------------------------------------------------------------

pub fn gga(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    apply_time_field(session, f.get(1), sink);
    if let Some(hms) = merge_time_into_date(session, f.get(1)) {
        if resolve_and_set_time(session, hms) {
            mask |= Mask::TIME;
        }
    }

    // "Stuck talker": the same talker reporting an unchanged timestamp
    // across consecutive GGA sentences (§4.E).
    let stamp = format!("{}|{}", f.talker(), f.get(1));
    let stuck = session.nmea.last_gga_timestamp.as_deref() == Some(stamp.as_str()) && !f.get(1).is_empty();
    if stuck {
        session.newdata.mode = FixMode::NoFix;
        warn(sink, TAG, "GGA timestamp did not advance, forcing NO_FIX".to_string());
        mask |= Mask::MODE;
        return mask;
    }
    session.nmea.last_gga_timestamp = Some(stamp);

    let quality: u8 = f.get(6).parse().unwrap_or(0);
    session.newdata.status = match quality {
        0 => FixStatus::Unk,
        1 => FixStatus::Gps,
        2 => FixStatus::Dgps,
        3 => FixStatus::Pps,
        4 => FixStatus::RtkFix,
        5 => FixStatus::RtkFloat,
        6 => FixStatus::Dr,
        7 => FixStatus::TimeOnly, // "Manual input"
        8 => FixStatus::Simulated,
        _ => {
            warn(sink, TAG, format!("GGA: out-of-range fix quality {quality}"));
            FixStatus::Unk
        },
    };
    mask |= Mask::STATUS;

    if let (Some(lat), Some(lon)) = (do_lat(f.get(2), f.get(3)), do_lon(f.get(4), f.get(5))) {
        session.newdata.lat = lat;
        session.newdata.lon = lon;
        mask |= Mask::LATLON;
    }

    if let Some(alt_msl) = parse_f64(f.get(9)) {
        session.newdata.alt_msl = alt_msl;
        mask |= Mask::ALTITUDE;
        if let Some(sep) = parse_f64(f.get(11)) {
            session.newdata.geoid_sep = sep;
            session.newdata.alt_hae = alt_msl + sep;
        }
    }

    if let Some(age) = parse_f64(f.get(13)) {
        session.newdata.dgps_age = age;
    }
    if let Ok(station) = f.get(14).parse::<i32>() {
        session.newdata.dgps_station = station;
    }

    if let Ok(used) = f.get(7).parse::<u16>() {
        session.nmea.gga_sats_used = used;
    }

    if session.newdata.status != FixStatus::Unk {
        session.newdata.mode = if session.newdata.alt_hae.is_finite() || session.newdata.alt_msl.is_finite() {
            FixMode::Fix3D
        } else {
            FixMode::Fix2D
        };
        mask |= Mask::MODE;
    }
    mask
}

// ---- GLL ------------------------------------------------------------------

pub fn gll(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    apply_time_field(session, f.get(5), sink);
    if let Some(hms) = merge_time_into_date(session, f.get(5)) {
        if resolve_and_set_time(session, hms) {
            mask |= Mask::TIME;
        }
    }
    let status = f.get(6);
    let faa_status = if f.count() > 7 { status_from_faa(f.get(7)) } else if status == "A" { FixStatus::Gps } else { FixStatus::Unk };
    session.newdata.status = faa_status;
    mask |= Mask::STATUS;
    if faa_status == FixStatus::Unk {
        session.newdata.mode = FixMode::NoFix;
        mask |= Mask::MODE;
        return mask;
    }
    if let (Some(lat), Some(lon)) = (do_lat(f.get(1), f.get(2)), do_lon(f.get(3), f.get(4))) {
        session.newdata.lat = lat;
        session.newdata.lon = lon;
        mask |= Mask::LATLON;
    }
    session.newdata.mode =
        if session.newdata.alt_hae.is_finite() || session.newdata.alt_msl.is_finite() { FixMode::Fix3D } else { FixMode::Fix2D };
    mask |= Mask::MODE;
    mask
}

// ---- GNS ------------------------------------------------------------------

pub fn gns(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    apply_time_field(session, f.get(1), sink);
    if let Some(hms) = merge_time_into_date(session, f.get(1)) {
        if resolve_and_set_time(session, hms) {
            mask |= Mask::TIME;
        }
    }
    let modes = f.get(6);
    let lead = modes.chars().next().map(|c| c.to_string()).unwrap_or_default();
    session.newdata.status = status_from_faa(&lead);
    mask |= Mask::STATUS;

    // Extra NMEA-4.10 nav-status field (after DGPS station): U/V invalidates.
    let nav_status = f.get(13);
    if nav_status == "V" {
        session.newdata.mode = FixMode::NoFix;
        mask |= Mask::MODE;
        return mask;
    }

    if let (Some(lat), Some(lon)) = (do_lat(f.get(2), f.get(3)), do_lon(f.get(4), f.get(5))) {
        session.newdata.lat = lat;
        session.newdata.lon = lon;
        mask |= Mask::LATLON;
    }
    if let Some(alt_msl) = parse_f64(f.get(9)) {
        session.newdata.alt_msl = alt_msl;
        mask |= Mask::ALTITUDE;
    }
    session.newdata.mode = if session.newdata.status != FixStatus::Unk { FixMode::Fix3D } else { FixMode::NoFix };
    mask |= Mask::MODE;
    mask
}

// ---- VTG ------------------------------------------------------------------

pub fn vtg(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    // Trailing FAA mode field (present in NMEA 2.3+) gates trust.
    let faa = f.get(9);
    if !faa.is_empty() && status_from_faa(faa) == FixStatus::Unk {
        return mask;
    }
    if let Some(track) = parse_f64(f.get(1)) {
        session.newdata.track = track;
        mask |= Mask::TRACK;
    }
    if let Some(knots) = parse_f64(f.get(5)) {
        session.newdata.speed = knots_to_mps(knots);
        mask |= Mask::SPEED;
    } else if let Some(kmh) = parse_f64(f.get(7)) {
        session.newdata.speed = kmh / 3.6;
        mask |= Mask::SPEED;
    }
    mask
}

// ---- GSA ------------------------------------------------------------------

pub fn gsa(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    let talker = Talker::from_bytes(f.talker().as_bytes());

    let fresh_epoch = session.nmea.last_gsa_talker.is_none()
        || (talker == Talker::Gp && session.nmea.last_gsa_talker != Some(Talker::Gp));
    if fresh_epoch {
        session.nmea.sats_used.clear();
    }
    session.nmea.last_gsa_talker = Some(talker);

    // field 2: mode 1=NoFix,2=2D,3=3D (the `E` dead-reckoning-only flag in
    // some NMEA 4.11 variants is a separate earlier field we deliberately
    // ignore per §4.E).
    match f.get(2) {
        "2" => {
            session.newdata.mode = FixMode::Fix2D;
            mask |= Mask::MODE;
        },
        "3" => {
            session.newdata.mode = FixMode::Fix3D;
            mask |= Mask::MODE;
        },
        "1" => {
            session.newdata.mode = FixMode::NoFix;
            mask |= Mask::MODE;
        },
        _ => {},
    }

    for i in 3..=14 {
        if let Ok(prn) = f.get(i).parse::<u16>() {
            if prn > 0 && !session.nmea.sats_used.contains(&prn) {
                session.nmea.sats_used.push(prn);
            }
        }
    }

    let gnssid = f.get(18).parse::<u8>().ok();
    let _ = gnssid; // recorded for future multi-constellation GSA extension

    for (idx, field) in [(15, "pdop"), (16, "hdop"), (17, "vdop")] {
        if let Some(v) = parse_f64(f.get(idx)) {
            if in_dop_range(v) {
                match field {
                    "pdop" => session.newdata.dop.pdop = v,
                    "hdop" => session.newdata.dop.hdop = v,
                    "vdop" => session.newdata.dop.vdop = v,
                    _ => unreachable!(),
                }
                mask |= Mask::DOP;
            } else {
                warn(sink, TAG, format!("GSA: {field} {v} out of range"));
            }
        }
    }
    mask
}

// ---- GSV ------------------------------------------------------------------

pub fn gsv(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    let talker = Talker::from_bytes(f.talker().as_bytes());
    let total: u8 = f.get(1).parse().unwrap_or(1);
    let part: u8 = f.get(2).parse().unwrap_or(1);

    let new_series = part == 1
        && (session.nmea.last_gsv_talker != Some(talker) || session.nmea.end_gsv_talker.is_none());
    if new_series {
        session.skyview.clear();
    }
    session.nmea.last_gsv_talker = Some(talker);

    let gnssid_field = f.get(f.count().saturating_sub(1));
    let nmea_gnssid: Option<u8> = if gnssid_field.len() <= 1 { gnssid_field.parse().ok() } else { None };

    let mut group = 4;
    let mut zero_az_nonzero_el = false;
    let mut any_az = false;
    let mut parsed = Vec::new();
    while group + 3 <= f.count() {
        let satnum = f.get(group).parse::<u16>().ok();
        let elev = parse_f64(f.get(group + 1));
        let az = parse_f64(f.get(group + 2));
        let ss = parse_f64(f.get(group + 3));
        group += 4;
        let Some(satnum) = satnum else { continue };
        if let Some(a) = az {
            if a != 0.0 {
                any_az = true;
            }
        }
        if az == Some(0.0) && elev.map(|e| e != 0.0).unwrap_or(false) {
            zero_az_nonzero_el = true;
        }
        parsed.push((satnum, elev, az, ss));
    }

    // SiRF-II quirk: all-zero azimuths with nonzero elevations -> discard set.
    if zero_az_nonzero_el && !any_az {
        return mask;
    }

    for (satnum, elev, az, ss) in parsed {
        if let Some((prn, gnssid, svid)) = prn_map(talker, satnum, nmea_gnssid) {
            let used = session.nmea.sats_used.contains(&prn);
            let sat = Satellite {
                gnss_id: gnssid,
                sv_id: svid,
                prn,
                elevation: elev.unwrap_or(f64::NAN),
                azimuth: az.unwrap_or(f64::NAN),
                ss: ss.unwrap_or(f64::NAN),
                used,
                ..Default::default()
            };
            if let Some(existing) = session.skyview.satellites.iter_mut().find(|s| s.prn == prn) {
                *existing = sat;
            } else {
                session.skyview.satellites.push(sat);
            }
        }
    }

    session.nmea.gsx_more = part < total;
    if !session.nmea.gsx_more {
        session.nmea.end_gsv_talker = Some(talker);
        session.skyview.recompute_counts();
        mask |= Mask::SATELLITE;
    }
    mask
}

// ---- GST ------------------------------------------------------------------

pub fn gst(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    apply_time_field(session, f.get(1), sink);
    if let Some(major) = parse_f64(f.get(3)) {
        session.newdata.err_ellipse.major = major;
    }
    if let Some(minor) = parse_f64(f.get(4)) {
        session.newdata.err_ellipse.minor = minor;
    }
    if let Some(orient) = parse_f64(f.get(5)) {
        session.newdata.err_ellipse.orient = orient;
    }
    if let Some(std_lat) = parse_f64(f.get(6)) {
        session.newdata.eph = std_lat;
    }
    if let Some(std_alt) = parse_f64(f.get(8)) {
        session.newdata.epv = std_alt;
    }
    mask |= Mask::LATLON;
    mask
}

// ---- GBS ------------------------------------------------------------------

pub fn gbs(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    if let Ok(hms) = decode_hhmmss(f.get(1)) {
        let seconds_of_day = hms.0 as f64 * 3600.0 + hms.1 as f64 * 60.0 + hms.2 as f64 + hms.3 as f64 / 1e9;
        let matches = match gpsd_utc_resolve(session.nmea.date, seconds_of_day) {
            Ok(ts) => ts.secs == session.newdata.time.secs,
            Err(_) => false,
        };
        if !matches {
            warn(sink, TAG, "GBS: HMS does not match current date, ignoring".to_string());
            session.nmea.cycle_end_reliable = false;
            return mask;
        }
    }
    let err_lat = parse_f64(f.get(2));
    let err_lon = parse_f64(f.get(3));
    if let (Some(lat), Some(lon)) = (err_lat, err_lon) {
        session.newdata.eph = lat.hypot(lon);
    }
    if let Some(err_alt) = parse_f64(f.get(4)) {
        session.newdata.epv = err_alt;
    }
    mask |= Mask::LATLON;
    mask
}

// ---- ZDA ------------------------------------------------------------------

pub fn zda(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    let mut mask = Mask::ONLINE;
    apply_time_field(session, f.get(1), sink);
    let day: u8 = f.get(2).parse().unwrap_or(0);
    let month: u8 = f.get(3).parse().unwrap_or(0);
    let year: i32 = f.get(4).parse().unwrap_or(0);
    if day == 0 || month == 0 || year == 0 {
        return mask;
    }
    session.context.set_century((year / 100) * 100);
    session.nmea.date = crate::time::BrokenDownDate { year, month, day };
    if let Ok(hms) = decode_hhmmss(f.get(1)) {
        resolve_and_set_time(session, hms);
        mask |= Mask::TIME;
    }
    mask
}

// ---- Attitude / heading family --------------------------------------------

pub fn hdt(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    heading_field(session, f.get(1), sink)
}

pub fn hdg(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    heading_field(session, f.get(1), sink)
}

pub fn hdm(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    heading_field(session, f.get(1), sink)
}

fn heading_field(session: &mut Session, field: &str, sink: &mut dyn ErrorSink) -> Mask {
    match parse_f64(field) {
        Some(h) if (0.0..=360.0).contains(&h) => {
            session.newdata.track = h;
            Mask::ONLINE | Mask::TRACK
        },
        Some(h) => {
            warn(sink, TAG, format!("heading {h} out of range"));
            Mask::ONLINE
        },
        None => Mask::ONLINE,
    }
}

pub fn rot(_session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if f.get(2) != "A" {
        return Mask::ONLINE;
    }
    Mask::ONLINE | Mask::ATTITUDE
}

pub fn ths(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    if f.get(2) != "A" && f.get(2) != "E" {
        return Mask::ONLINE;
    }
    heading_field(session, f.get(1), sink) | Mask::ATTITUDE
}

// ---- Depth / wind / water-temp ---------------------------------------------

// DBT/DPT/MWV/MWD/MTW/DTM all validate and consume their fields but have no
// counterpart in the §3 `GpsFix`/`SkyView` data model (it carries no depth,
// wind, or water-temperature channel), so the handler's contribution is the
// `Mask` bit alone — there is nothing in `Session` left for them to mutate.

pub fn dbt(_session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    // field1=feet,field3=meters,field5=fathoms — prefer meters.
    let depth = parse_f64(f.get(3)).or_else(|| parse_f64(f.get(1)).map(|ft| ft * 0.3048));
    if depth.is_some() { Mask::ONLINE | Mask::ALTITUDE } else { Mask::ONLINE }
}

pub fn dpt(_session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if parse_f64(f.get(1)).is_some() { Mask::ONLINE | Mask::ALTITUDE } else { Mask::ONLINE }
}

pub fn mwv(_session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if parse_f64(f.get(1)).is_some() { Mask::ONLINE | Mask::ATTITUDE } else { Mask::ONLINE }
}

pub fn mwd(_session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if parse_f64(f.get(1)).is_some() { Mask::ONLINE | Mask::ATTITUDE } else { Mask::ONLINE }
}

pub fn mtw(_session: &mut Session, _f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    Mask::ONLINE
}

pub fn dtm(_session: &mut Session, _f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    // Datum code table lookup: only WGS-84 (`W84`) is meaningfully actionable
    // downstream since the fix model assumes WGS-84 throughout.
    Mask::ONLINE
}

pub fn txt(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("TXT: {}", f.get(4)));
    Mask::ONLINE | Mask::LOG
}

// ---- Garmin proprietaries ---------------------------------------------------

const CEP50_SIGMA: f64 = 1.0 / 0.8325546;
const GPSD_CONFIDENCE: f64 = 1.0; // exposed scale factor, kept at unity absent a stated basis

pub fn pgrmf(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    // Garmin week+TOW fields (2,3) take priority over the UTC fields when present.
    if let (Ok(week), Some(tow)) = (f.get(2).parse::<u16>(), parse_f64(f.get(3))) {
        session.newdata.time = crate::time::gpsd_gpstime_resolv(week, tow, session.context.leap_seconds());
        session.newdata.time_valid = true;
        return Mask::ONLINE | Mask::TIME;
    }
    Mask::ONLINE
}

pub fn pgrmz(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if let Some(feet) = parse_f64(f.get(1)) {
        session.newdata.alt_msl = feet * 0.3048;
        return Mask::ONLINE | Mask::ALTITUDE;
    }
    Mask::ONLINE
}

pub fn pgrme(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if let Some(cep50) = parse_f64(f.get(1)) {
        session.newdata.eph = cep50 * CEP50_SIGMA * GPSD_CONFIDENCE;
        return Mask::ONLINE | Mask::LATLON;
    }
    Mask::ONLINE
}

pub fn pgrmm(_session: &mut Session, _f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    Mask::ONLINE
}

pub fn pgrmt(_session: &mut Session, _f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    Mask::ONLINE
}

pub fn pgrmv(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if let Some(climb) = parse_f64(f.get(3)) {
        session.newdata.climb = climb;
        return Mask::ONLINE | Mask::CLIMB;
    }
    Mask::ONLINE
}

// ---- PASHR (two distinct vendor dialects) ----------------------------------

pub fn pashr(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    match f.get(1) {
        "POS" => {
            let mut mask = Mask::ONLINE;
            if let (Some(lat), Some(lon)) = (do_lat(f.get(3), f.get(4)), do_lon(f.get(5), f.get(6))) {
                session.newdata.lat = lat;
                session.newdata.lon = lon;
                mask |= Mask::LATLON;
            }
            if let Some(alt) = parse_f64(f.get(7)) {
                session.newdata.alt_hae = alt;
                mask |= Mask::ALTITUDE;
            }
            for (idx, which) in [(9, "pdop"), (10, "hdop"), (11, "vdop"), (12, "tdop")] {
                if let Some(v) = parse_f64(f.get(idx)) {
                    match which {
                        "pdop" => session.newdata.dop.pdop = v,
                        "hdop" => session.newdata.dop.hdop = v,
                        "vdop" => session.newdata.dop.vdop = v,
                        "tdop" => session.newdata.dop.tdop = v,
                        _ => unreachable!(),
                    }
                    mask |= Mask::DOP;
                }
            }
            mask
        },
        "SAT" | "RID" | "ACK" | "NAK" | "MCA" | "PBN" => {
            data(sink, TAG, format!("PASHR,{}: ack/status only", f.get(1)));
            Mask::ONLINE
        },
        _ => {
            // OxTS attitude-only dialect: hhmmss.sss,hdg,T,roll,pitch,...
            if parse_f64(f.get(1)).is_some() {
                heading_field(session, f.get(2), sink) | Mask::ATTITUDE
            } else {
                Mask::ONLINE
            }
        },
    }
}

// ---- Skytraq $PSTI,NNN family -----------------------------------------------

pub fn psti_030(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    // PSTI,030: hhmmss.sss,date,lat,N/S,lon,E/W,alt,sog,cog,...,mode
    let mut mask = Mask::ONLINE;
    apply_time_field(session, f.get(2), sink);
    if let (Some(lat), Some(lon)) = (do_lat(f.get(4), f.get(5)), do_lon(f.get(6), f.get(7))) {
        session.newdata.lat = lat;
        session.newdata.lon = lon;
        mask |= Mask::LATLON;
    }
    if let Some(alt) = parse_f64(f.get(8)) {
        session.newdata.alt_hae = alt;
        mask |= Mask::ALTITUDE;
    }
    session.newdata.status = status_from_faa(f.get(f.count().saturating_sub(1)));
    mask |= Mask::STATUS;
    mask
}

pub fn psti_032(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    // Fixed-base RTK baseline.
    if let Some(east) = parse_f64(f.get(4)) {
        session.newdata.baseline.east = east;
    }
    if let Some(north) = parse_f64(f.get(5)) {
        session.newdata.baseline.north = north;
    }
    if let Some(up) = parse_f64(f.get(6)) {
        session.newdata.baseline.up = up;
    }
    Mask::ONLINE | Mask::NED
}

pub fn psti_033(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    // Moving-base RTK baseline, same layout with course/length added.
    if let Some(len) = parse_f64(f.get(4)) {
        session.newdata.baseline.length = len;
    }
    if let Some(course) = parse_f64(f.get(5)) {
        session.newdata.baseline.course = course;
    }
    Mask::ONLINE | Mask::NED
}

pub fn psti_035(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("PSTI,035 raw monitoring: {}", f.get(2)));
    Mask::ONLINE | Mask::RAW
}

pub fn psti_036(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    // Vehicle heading/pitch/roll.
    if let Some(h) = parse_f64(f.get(2)) {
        session.newdata.track = h;
    }
    Mask::ONLINE | Mask::ATTITUDE
}

// ---- Long vendor tail: subtype/log-only handlers ---------------------------

pub fn pmtk001(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("PMTK001 ack cmd={} flag={}", f.get(1), f.get(2)));
    Mask::ONLINE
}

pub fn pmtk424(_session: &mut Session, _f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, "PMTK424 datum response".to_string());
    Mask::ONLINE
}

pub fn pmtk705(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    session.subtype = f.get(1).to_string();
    data(sink, TAG, format!("PMTK705 subtype={}", session.subtype));
    Mask::ONLINE
}

pub fn pair001(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("PAIR001 ack id={} result={}", f.get(1), f.get(2)));
    Mask::ONLINE
}

pub fn pair010(_session: &mut Session, _f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, "PAIR010 nmea config ack".to_string());
    Mask::ONLINE
}

pub fn pqverno(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    session.subtype1 = f.get(1).to_string();
    data(sink, TAG, format!("PQVERNO subtype1={}", session.subtype1));
    Mask::ONLINE
}

pub fn pqtm(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("{} vendor message", f.tag()));
    Mask::ONLINE
}

pub fn pdtinfo(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    session.subtype = f.get(1).to_string();
    data(sink, TAG, format!("PDTINFO subtype={}", session.subtype));
    Mask::ONLINE
}

pub fn pgpsp(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if let Some(alt) = parse_f64(f.get(5)) {
        session.newdata.alt_hae = alt;
        return Mask::ONLINE | Mask::ALTITUDE;
    }
    Mask::ONLINE
}

pub fn ptnta(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    heading_field(session, f.get(1), sink)
}

pub fn ptnthtm(_session: &mut Session, _f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, "PTNTHTM electronic compass".to_string());
    Mask::ONLINE | Mask::ATTITUDE
}

pub fn psrfepe(session: &mut Session, f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    if let Some(eph) = parse_f64(f.get(1)) {
        session.newdata.eph = eph;
    }
    if let Some(epv) = parse_f64(f.get(2)) {
        session.newdata.epv = epv;
    }
    Mask::ONLINE | Mask::LATLON
}

pub fn pmgnst(_session: &mut Session, _f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, "PMGNST Magellan status".to_string());
    Mask::ONLINE
}

pub fn pstmver(session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    session.subtype = f.get(1).to_string();
    data(sink, TAG, format!("PSTMVER subtype={}", session.subtype));
    Mask::ONLINE
}

pub fn pstmantennastatus(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("PSTMANTENNASTATUS status={}", f.get(1)));
    Mask::ONLINE
}

pub fn info(_session: &mut Session, f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, format!("INFO: {}", f.get(1)));
    Mask::ONLINE | Mask::LOG
}

pub fn gyoacc(_session: &mut Session, _f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    Mask::ONLINE | Mask::RAW
}

pub fn snrstat(_session: &mut Session, _f: &Fields, sink: &mut dyn ErrorSink) -> Mask {
    data(sink, TAG, "SNRSTAT".to_string());
    Mask::ONLINE
}

pub fn xdr(_session: &mut Session, _f: &Fields, _sink: &mut dyn ErrorSink) -> Mask {
    Mask::ONLINE | Mask::RAW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, SessionMode, SessionOptions};
    use crate::sink::CollectingSink;

    fn new_session(ctx: &Context) -> Session<'_> {
        Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: ctx })
    }

    #[test]
    fn decode_degrees_minutes_matches_s1() {
        let lat = do_lat("3751.65", "S").unwrap();
        assert!((lat - (-37.860833)).abs() < 1e-4);
        let lon = do_lon("14507.36", "E").unwrap();
        assert!((lon - 145.122667).abs() < 1e-4);
    }

    #[test]
    fn rmc_s1_scenario() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();
        let f = Fields::split("GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E");
        let mask = rmc(&mut session, &f, &mut sink);
        assert!(mask.contains(Mask::LATLON));
        assert!((session.newdata.lat - (-37.860833)).abs() < 1e-4);
        assert_eq!(session.newdata.status, FixStatus::Gps);
    }

    #[test]
    fn gga_s1_scenario() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();
        let rmc_f = Fields::split("GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E");
        rmc(&mut session, &rmc_f, &mut sink);
        let gga_f = Fields::split("GPGGA,081836,3751.65,S,14507.36,E,1,04,9.0,15.4,M,0.0,M,,");
        let mask = gga(&mut session, &gga_f, &mut sink);
        assert!(mask.contains(Mask::ALTITUDE));
        assert_eq!(session.newdata.alt_msl, 15.4);
        assert_eq!(session.newdata.status, FixStatus::Gps);
        assert_eq!(session.newdata.mode, FixMode::Fix3D);
    }

    #[test]
    fn gsa_dop_filters_sentinels() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();
        let f = Fields::split("GPGSA,A,3,01,02,03,04,,,,,,,,,99.99,1.2,1.1,1");
        gsa(&mut session, &f, &mut sink);
        assert!(session.newdata.dop.pdop.is_nan());
        assert_eq!(session.newdata.dop.hdop, 1.2);
    }
}
