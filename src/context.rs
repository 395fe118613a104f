//! §3 data model (`Session`, `NmeaScratch`, `UbxScratch`) and §5's
//! process-wide `Context`. Grounded on the "owns everything, no pointer
//! graphs" shape of `ublox/src/serialport.rs::Device`.

use std::cell::Cell;

use crate::constants::{MAXCHANNELS, NMEA_NUM};
use crate::fix::{GpsFix, SkyView};
use crate::ids::Talker;
use crate::time::{BrokenDownDate, CenturyState, LeapState, Timespec};

/// §5/§9: century, leap-second count, and GPS week, shared read-mostly
/// across sessions a multiplexing host serializes via its own event loop.
/// Decoders only ever touch it through [`Context::advance_century`],
/// [`Context::set_leap_seconds`], and [`Context::set_gps_week`] — the
/// `Cell`s model "read-only except via the explicit setters" without
/// requiring a lock, since §5 guarantees single-threaded, serialized
/// access per session.
#[derive(Debug, Default)]
pub struct Context {
    century: Cell<i32>,
    leap_seconds: Cell<i32>,
    leap_seconds_valid: Cell<bool>,
    gps_week: Cell<u16>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            century: Cell::new(2000),
            leap_seconds: Cell::new(18),
            leap_seconds_valid: Cell::new(false),
            gps_week: Cell::new(0),
        }
    }

    pub fn century(&self) -> i32 {
        self.century.get()
    }

    pub fn leap_seconds(&self) -> i32 {
        self.leap_seconds.get()
    }

    pub fn leap_seconds_valid(&self) -> bool {
        self.leap_seconds_valid.get()
    }

    pub fn gps_week(&self) -> u16 {
        self.gps_week.get()
    }

    pub fn advance_century(&self, state: &mut CenturyState) {
        state.century = self.century.get();
        self.century.set(state.century);
    }

    pub fn set_century(&self, century: i32) {
        self.century.set(century);
    }

    pub fn set_leap_seconds(&self, value: i32) {
        self.leap_seconds.set(value);
        self.leap_seconds_valid.set(true);
    }

    pub fn set_gps_week(&self, week: u16) {
        // §3 invariant: gps_week is monotone non-decreasing modulo rollover.
        let prev = self.gps_week.get();
        if week >= prev || prev - week > 512 {
            self.gps_week.set(week);
        }
    }
}

impl From<&Context> for LeapState {
    fn from(ctx: &Context) -> Self {
        LeapState { leap_seconds: ctx.leap_seconds(), leap_seconds_valid: ctx.leap_seconds_valid() }
    }
}

/// A small fixed-capacity bit set, indexed by a sentence's position in the
/// NMEA dispatch table (§4.E `cycleEnders: BitSet`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BitSet64(u64);

impl BitSet64 {
    pub fn set(&mut self, idx: usize) {
        if idx < NMEA_NUM {
            self.0 |= 1 << idx;
        }
    }

    pub fn clear_bit(&mut self, idx: usize) {
        if idx < NMEA_NUM {
            self.0 &= !(1 << idx);
        }
    }

    pub fn get(&self, idx: usize) -> bool {
        idx < NMEA_NUM && (self.0 & (1 << idx)) != 0
    }
}

/// §3 `NmeaScratch`.
#[derive(Debug, Default)]
pub struct NmeaScratch {
    pub date: BrokenDownDate,
    pub subseconds: Timespec,
    pub this_frac_time: f64,
    pub last_frac_time: f64,
    pub latch_frac_time: bool,
    pub lasttag: Option<usize>,
    pub cycle_enders: BitSet64,
    pub cycle_continue: bool,
    pub sats_used: Vec<u16>,
    pub last_gsv_talker: Option<Talker>,
    pub last_gsa_talker: Option<Talker>,
    pub end_gsv_talker: Option<Talker>,
    pub seen_gsv: SeenGsv,
    pub gga_sats_used: u16,
    pub last_gga_timestamp: Option<String>,
    pub latch_mode: bool,
    pub gsx_more: bool,
    pub prev_hour: Option<u8>,
    pub cycle_end_reliable: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SeenGsv {
    pub gp: bool,
    pub gl: bool,
    pub ga: bool,
    pub gb: bool,
    pub gi: bool,
    pub gq: bool,
    pub gn: bool,
}

/// §3 `UbxScratch`.
#[derive(Debug)]
pub struct UbxScratch {
    pub protver: u8, // 0 = unknown
    pub last_protver: u8,
    pub port_id: Option<u8>,
    pub i_tow: i64, // -1 if absent
    pub last_i_tow: i64,
    pub end_msgid: u16, // (class << 8) | id
    pub last_msgid: u16,
    pub last_time: Option<Timespec>,
    pub sbas_in_use: bool,
    /// Snapshot of the most recent NAV-SAT az/el, keyed by extended PRN, so
    /// NAV-SIG (which carries no az/el of its own) can pair with it (§4.F,
    /// §9 "no cross-references" — this is an owned side buffer, not a
    /// pointer back into a `SkyView`).
    pub nav_sat_azel: std::collections::HashMap<u16, (f64, f64)>,
}

impl Default for UbxScratch {
    fn default() -> Self {
        UbxScratch {
            protver: 0,
            last_protver: 0,
            port_id: None,
            i_tow: -1,
            last_i_tow: -1,
            end_msgid: 0,
            last_msgid: 0,
            last_time: None,
            sbas_in_use: false,
            nav_sat_azel: std::collections::HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Passive,
    NmeaPreferred,
    BinaryPreferred,
}

pub struct SessionOptions<'a> {
    pub mode: SessionMode,
    pub readonly: bool,
    pub context: &'a Context,
}

/// §3 `Session` — process-wide-per-device state, created on open,
/// destroyed on close. Owns every piece of mutable parser/fix state; the
/// synthesizer only ever copies fields out of `newdata`, never aliases.
pub struct Session<'a> {
    pub context: &'a Context,
    pub mode: SessionMode,
    pub readonly: bool,

    pub lexer: crate::lexer::Lexer,
    pub nmea: NmeaScratch,
    pub ubx: UbxScratch,

    pub newdata: GpsFix,
    pub lastfix: GpsFix,
    pub oldfix: GpsFix,
    pub skyview: SkyView,

    pub subtype: String,
    pub subtype1: String,

    pub init_queue: i32,
}

impl<'a> Session<'a> {
    pub fn new(options: SessionOptions<'a>) -> Self {
        Session {
            context: options.context,
            mode: options.mode,
            readonly: options.readonly,
            lexer: crate::lexer::Lexer::new(),
            nmea: NmeaScratch::default(),
            ubx: UbxScratch::default(),
            newdata: GpsFix::default(),
            lastfix: GpsFix::default(),
            oldfix: GpsFix::default(),
            skyview: SkyView::default(),
            subtype: String::new(),
            subtype1: String::new(),
            init_queue: 0,
        }
    }
}

#[allow(dead_code)]
const _MAXCHANNELS_USED: usize = MAXCHANNELS;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitset_roundtrip() {
        let mut bs = BitSet64::default();
        bs.set(3);
        bs.set(10);
        assert!(bs.get(3) && bs.get(10));
        assert!(!bs.get(4));
        bs.clear_bit(3);
        assert!(!bs.get(3));
    }

    #[test]
    fn context_century_roundtrip() {
        let ctx = Context::new();
        ctx.set_century(1900);
        let mut state = CenturyState::default();
        ctx.advance_century(&mut state);
        assert_eq!(state.century, 1900);
    }
}
