//! §3 — the `GpsFix` + `SkyView` data model. Grounded on
//! `ublox/src/ubx_packets/packets/nav_pvt/*.rs`, `nav_dop.rs`, `nav_sat.rs`
//! and `nav_rel_pos_ned/*.rs`'s field sets, merged with NMEA-only fields
//! (magnetic variation, FAA mode, DGPS age/station, baseline) the
//! UBX-only teacher never needed.

use crate::constants::MAXCHANNELS;
use crate::time::Timespec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixMode {
    #[default]
    NoFix,
    Fix2D,
    Fix3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixStatus {
    #[default]
    Unk,
    Gps,
    Dgps,
    RtkFix,
    RtkFloat,
    Dr,
    GnssDr,
    TimeOnly,
    Simulated,
    Pps,
}

/// ECEF position/velocity with accuracy, as reported by NAV-POSECEF/NAV-VELECEF
/// or the deprecated NAV-SOL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub p_acc: f64,
    pub v_acc: f64,
}

impl Ecef {
    pub const NAN: Ecef = Ecef {
        x: f64::NAN,
        y: f64::NAN,
        z: f64::NAN,
        vx: f64::NAN,
        vy: f64::NAN,
        vz: f64::NAN,
        p_acc: f64::NAN,
        v_acc: f64::NAN,
    };
}

/// North/East/Down relative position, as reported by NAV-RELPOSNED.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ned {
    pub rel_n: f64,
    pub rel_e: f64,
    pub rel_d: f64,
    pub rel_l: f64, // length
    pub rel_h: f64, // heading
    pub acc_n: f64,
    pub acc_e: f64,
    pub acc_d: f64,
}

impl Ned {
    pub const NAN: Ned = Ned {
        rel_n: f64::NAN,
        rel_e: f64::NAN,
        rel_d: f64::NAN,
        rel_l: f64::NAN,
        rel_h: f64::NAN,
        acc_n: f64::NAN,
        acc_e: f64::NAN,
        acc_d: f64::NAN,
    };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dops {
    pub gdop: f64,
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,
    pub tdop: f64,
    pub xdop: f64,
    pub ydop: f64,
}

impl Dops {
    pub const NAN: Dops = Dops {
        gdop: f64::NAN,
        pdop: f64::NAN,
        hdop: f64::NAN,
        vdop: f64::NAN,
        tdop: f64::NAN,
        xdop: f64::NAN,
        ydop: f64::NAN,
    };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorEllipse {
    pub orient: f64,
    pub major: f64,
    pub minor: f64,
}

impl ErrorEllipse {
    pub const NAN: ErrorEllipse =
        ErrorEllipse { orient: f64::NAN, major: f64::NAN, minor: f64::NAN };
}

/// RTK baseline (NAV-RELPOSNED derived, or NMEA PSTI,032/033).
#[derive(Debug, Clone, Copy, Default)]
pub struct Baseline {
    pub east: f64,
    pub north: f64,
    pub up: f64,
    pub length: f64,
    pub course: f64,
    pub status: FixStatus,
    pub ratio: f64,
}

impl Baseline {
    pub const NAN: Baseline = Baseline {
        east: f64::NAN,
        north: f64::NAN,
        up: f64::NAN,
        length: f64::NAN,
        course: f64::NAN,
        status: FixStatus::Unk,
        ratio: f64::NAN,
    };
}

/// §3 `GpsFix` — the consolidated fix. All numeric optionals default to
/// `NaN`; enums default to `Unk`/`NoFix`.
#[derive(Debug, Clone, Copy)]
pub struct GpsFix {
    pub time: Timespec,
    pub time_valid: bool,
    pub mode: FixMode,
    pub status: FixStatus,

    pub lat: f64,
    pub lon: f64,
    pub alt_hae: f64,
    pub alt_msl: f64,
    pub geoid_sep: f64,

    pub speed: f64,
    pub track: f64,
    pub magnetic_track: f64,
    pub magnetic_var: f64,
    pub climb: f64,

    pub ecef: Ecef,
    pub ned: Ned,
    pub dop: Dops,

    pub eph: f64,
    pub epv: f64,
    pub eps: f64,
    pub epd: f64,
    pub ept: f64,
    pub sep: f64,
    pub err_ellipse: ErrorEllipse,

    pub dgps_age: f64,
    pub dgps_station: i32,

    pub clock_bias: f64,
    pub clock_drift: f64,

    pub baseline: Baseline,
}

impl Default for GpsFix {
    fn default() -> Self {
        GpsFix {
            time: Timespec::ZERO,
            time_valid: false,
            mode: FixMode::NoFix,
            status: FixStatus::Unk,
            lat: f64::NAN,
            lon: f64::NAN,
            alt_hae: f64::NAN,
            alt_msl: f64::NAN,
            geoid_sep: f64::NAN,
            speed: f64::NAN,
            track: f64::NAN,
            magnetic_track: f64::NAN,
            magnetic_var: f64::NAN,
            climb: f64::NAN,
            ecef: Ecef::NAN,
            ned: Ned::NAN,
            dop: Dops::NAN,
            eph: f64::NAN,
            epv: f64::NAN,
            eps: f64::NAN,
            epd: f64::NAN,
            ept: f64::NAN,
            sep: f64::NAN,
            err_ellipse: ErrorEllipse::NAN,
            dgps_age: f64::NAN,
            dgps_station: -1,
            clock_bias: f64::NAN,
            clock_drift: f64::NAN,
            baseline: Baseline::NAN,
        }
    }
}

impl GpsFix {
    /// §3 invariant: `fix.status != Unk ⇒ fix.mode >= 2D`.
    pub fn status_mode_invariant_holds(&self) -> bool {
        self.status == FixStatus::Unk || self.mode != FixMode::NoFix
    }
}

/// §3 `Satellite` entry within a [`SkyView`].
#[derive(Debug, Clone, Copy)]
pub struct Satellite {
    pub gnss_id: crate::ids::GnssId,
    pub sv_id: u8,
    pub sig_id: u8,
    pub freq_id: i8,
    pub prn: u16, // NMEA-4.0 extended PRN; 0 means "suppressed" (§8 property 4)
    pub elevation: f64,
    pub azimuth: f64,
    pub ss: f64, // dB-Hz
    pub used: bool,
    pub health: SatHealth,
    pub quality_ind: u8,
    pub pr_res: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SatHealth {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl Default for Satellite {
    fn default() -> Self {
        Satellite {
            gnss_id: crate::ids::GnssId::Gps,
            sv_id: 0,
            sig_id: 0,
            freq_id: 0,
            prn: 0,
            elevation: f64::NAN,
            azimuth: f64::NAN,
            ss: f64::NAN,
            used: false,
            health: SatHealth::Unknown,
            quality_ind: 0,
            pr_res: f64::NAN,
        }
    }
}

/// §3 `SkyView` — accumulated across multiple GSV/GSA or NAV-SAT/NAV-SIG
/// messages within one epoch; zeroed at the first message of a new
/// accumulation cycle.
#[derive(Debug, Clone, Default)]
pub struct SkyView {
    pub satellites: Vec<Satellite>,
    pub satellites_used: u16,
    pub satellites_visible: u16,
    pub skyview_time: Option<Timespec>,
}

impl SkyView {
    pub fn clear(&mut self) {
        self.satellites.clear();
        self.satellites_used = 0;
        self.satellites_visible = 0;
        self.skyview_time = None;
    }

    /// §8 property 3: `satellites_used <= satellites_visible <= MAXCHANNELS`.
    pub fn invariant_holds(&self) -> bool {
        self.satellites_used <= self.satellites_visible
            && (self.satellites_visible as usize) <= MAXCHANNELS
    }

    /// Recompute the `used`/`visible` counters from the accumulated slots,
    /// suppressing PRN==0 entries per §8 property 4.
    pub fn recompute_counts(&mut self) {
        self.satellites.retain(|s| s.prn > 0);
        self.satellites_visible = self.satellites.len() as u16;
        self.satellites_used = self.satellites.iter().filter(|s| s.used).count() as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fix_has_nan_numerics_and_unk_status() {
        let f = GpsFix::default();
        assert!(f.lat.is_nan());
        assert_eq!(f.status, FixStatus::Unk);
        assert_eq!(f.mode, FixMode::NoFix);
        assert!(f.status_mode_invariant_holds());
    }

    #[test]
    fn skyview_suppresses_zero_prn() {
        let mut sky = SkyView::default();
        sky.satellites.push(Satellite { prn: 0, ..Default::default() });
        sky.satellites.push(Satellite { prn: 5, used: true, ..Default::default() });
        sky.recompute_counts();
        assert_eq!(sky.satellites_visible, 1);
        assert_eq!(sky.satellites_used, 1);
        assert!(sky.invariant_holds());
    }
}
