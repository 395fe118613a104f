//! `gpsd_core` — NMEA 0183 and u-blox UBX packet lexing, per-protocol
//! decoding, and cycle-aware fix synthesis, with no serial/USB transport
//! of its own (§1 Non-goals: device probing, autobaud, and daemon/client
//! plumbing stay with a host crate).
//!
//! The pieces, in the order a host usually touches them:
//!
//! - [`lexer::Lexer`] frames a raw byte stream into [`lexer::Packet`]s.
//! - [`nmea::parse_sentence`] / [`ubx::parse_ubx`] decode one packet's
//!   body into a [`mask::Mask`], mutating [`context::Session`] scratch
//!   and `newdata` state as they go.
//! - [`synth::synthesize`] turns a `Mask::REPORT_IS` into a [`synth::Report`].
//! - [`cfgmachine`] drives a u-blox receiver's one-time configuration
//!   sequence, one stage per inbound UBX packet.
//!
//! [`drive`] wires the first three together for a host that just wants
//! "bytes in, reports out"; [`cfgmachine::advance`] is kept separate since
//! it needs a [`transport::Transport`] to write to, which `drive` doesn't
//! otherwise require.

pub mod bytes;
pub mod constants;
pub mod context;
pub mod error;
pub mod fix;
pub mod ids;
pub mod lexer;
pub mod mask;
pub mod nmea;
pub mod sink;
pub mod synth;
pub mod time;
pub mod transport;
pub mod ubx;

pub mod cfgmachine;

pub use context::{Context, NmeaScratch, Session, SessionMode, SessionOptions, UbxScratch};
pub use error::{DateTimeError, DecodeError, ParserError};
pub use fix::{Baseline, Dops, Ecef, ErrorEllipse, FixMode, FixStatus, GpsFix, Ned, Satellite, SatHealth, SkyView};
pub use ids::GnssId;
pub use lexer::{Lexer, Packet, Protocol};
pub use mask::{LogEntry, LogLevel, Mask, NavEvent};
pub use sink::{CollectingSink, ErrorSink, LogCrateSink};
pub use synth::{gpsd_error_model, synthesize, OnReport, Report};
pub use transport::{MemoryTransport, Parity, StopBits, Transport};

/// Decode every packet the lexer can frame out of `bytes`, feeding each one
/// through the matching protocol decoder and the synthesizer, in order.
///
/// This is the one-shot convenience a host reaches for first; nothing it
/// does can't be reproduced by driving [`lexer::Lexer::feed`],
/// [`nmea::parse_sentence`]/[`ubx::parse_ubx`] and [`synth::synthesize`]
/// directly, which a host wanting to interleave its own I/O will do
/// instead.
///
/// `bytes` is treated as a complete buffer, not a slice of a longer live
/// stream: if decoding left an epoch open (some handler touched more than
/// `Mask::ONLINE` but no cycle detector ever raised `REPORT_IS` to close
/// it out), `drive` flushes that trailing epoch with one final synthesis
/// call before returning, rather than silently dropping it. A host that
/// feeds `drive` one chunk at a time from a genuinely open stream should
/// call [`synth::synthesize`] directly instead, since every call here is
/// assumed to end at a buffer boundary worth reporting.
pub fn drive(session: &mut Session, bytes: &[u8], sink: &mut dyn ErrorSink) -> Vec<Report> {
    let packets = session.lexer.feed(bytes);
    let mut reports = Vec::new();
    let mut pending = false;
    for packet in packets {
        let mask = match packet.protocol {
            Protocol::Nmea => nmea::parse_sentence(packet.nmea_body(), session, sink),
            Protocol::Ubx => {
                let (class, id, payload) = packet.ubx_parts();
                ubx::parse_ubx(class, id, payload, session, sink)
            },
        };
        if let Some(report) = synth::synthesize(session, mask) {
            reports.push(report);
            pending = false;
        } else if !mask.difference(Mask::ONLINE).is_empty() {
            pending = true;
        }
    }
    if pending {
        if let Some(report) = synth::synthesize(session, Mask::REPORT_IS) {
            reports.push(report);
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, SessionMode, SessionOptions};

    #[test]
    fn drive_reports_nothing_for_partial_nonsense() {
        let ctx = Context::new();
        let mut session = Session::new(SessionOptions { mode: SessionMode::NmeaPreferred, readonly: true, context: &ctx });
        let mut sink = CollectingSink::default();
        let reports = drive(&mut session, b"not a packet at all", &mut sink);
        assert!(reports.is_empty());
    }
}
