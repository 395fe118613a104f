//! §9 design note: "sum types over tagged unions" — decoder output per
//! message is a `NavEvent`; the bitmap the source keeps for API
//! compatibility is kept here as a `bitflags` set, [`Mask`].

use bitflags::bitflags;

bitflags! {
    /// What kind(s) of update a single decoded message produced. Kept as a
    /// bitset (rather than only a `NavEvent` enum) because a single
    /// message frequently updates more than one axis at once (e.g. GGA
    /// touches both TIME and LATLON).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mask: u32 {
        /// Packet parsed but produced no semantic update (bare ACK, log-only TXT, ...).
        const ONLINE     = 0x0000_0001;
        const TIME       = 0x0000_0002;
        const LATLON     = 0x0000_0004;
        const ALTITUDE   = 0x0000_0008;
        const SPEED      = 0x0000_0010;
        const TRACK      = 0x0000_0020;
        const CLIMB      = 0x0000_0040;
        const STATUS     = 0x0000_0080;
        const MODE       = 0x0000_0100;
        const DOP        = 0x0000_0200;
        const SATELLITE  = 0x0000_0400;
        const ECEF       = 0x0000_0800;
        const NED        = 0x0000_1000;
        const ATTITUDE   = 0x0000_2000;
        const RAW        = 0x0000_4000;
        const CONFIG     = 0x0000_8000;
        const LOG        = 0x0001_0000;
        /// Epoch boundary detected; the accumulated scratch is about to be cleared.
        const CLEAR_IS   = 0x0002_0000;
        /// Epoch complete; the synthesizer should copy newdata into lastfix now.
        const REPORT_IS  = 0x0004_0000;
    }
}

/// §9: `enum NavEvent { Fix(FixDelta), Sky(SkyDelta), Raw(RawMeas), Log(LogEntry), Config(ConfigAck), None }`
///
/// A single handler call can emit zero or more of these; the dispatcher
/// collects them alongside the [`Mask`] it returns.
#[derive(Debug, Clone)]
pub enum NavEvent {
    Fix,
    Sky,
    Raw,
    Log(LogEntry),
    Config,
    None,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub tag: &'static str,
    pub message: std::string::String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Data,
    Warn,
    Error,
}
