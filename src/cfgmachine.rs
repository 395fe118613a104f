//! §4.H — the UBX configuration state machine: a staged, cooperative queue
//! that steps forward exactly one stage per inbound UBX packet, so probing
//! a device never blocks the decode loop waiting on a reply.
//!
//! Grounded on the "cooperative, one step per dispatch" shape implicit in
//! `ublox/src/serialport.rs::Device::configure`'s synchronous ACK-wait
//! sequence, reworked here into a non-blocking stepper since §5 forbids
//! anything that suspends outside `Transport::read`/`write`.

use crate::context::Session;
use crate::lexer::ubx_write;
use crate::sink::{data, ErrorSink};
use crate::transport::Transport;
use crate::ubx::{CLASS_CFG, CLASS_MON, CLASS_NAV, CLASS_SEC, CLASS_TIM};

const TAG: &str = "UBX:";

/// Sentinel meaning "queue not started" — distinct from stage `0`, which is
/// itself an active stage (§4.H: "`queue: i32` (0=disabled, 1..N=step)"
/// read here as "negative = disabled", since stage 0 does real work).
pub const DISABLED: i32 = -1;
const DONE: i32 = -1;

const CFG_MSG: u8 = 0x01;
const MON_VER: u8 = 0x04;
const MON_HW: u8 = 0x09;
const MON_RF: u8 = 0x38;
const MON_RXBUF: u8 = 0x07;
const MON_TXBUF: u8 = 0x08;
const MON_COMMS: u8 = 0x36;
const SEC_UNIQID: u8 = 0x03;
const NAV_DOP: u8 = 0x04;
const NAV_TIMEGPS: u8 = 0x20;
const NAV_CLOCK: u8 = 0x22;
const NAV_SOL: u8 = 0x06;
const NAV_SVINFO: u8 = 0x30;
const NAV_POSECEF: u8 = 0x01;
const NAV_PVT: u8 = 0x07;
const NAV_VELECEF: u8 = 0x11;
const NAV_SAT: u8 = 0x35;
const NAV_SIG: u8 = 0x43;
const NAV_EOE: u8 = 0x61;
const TIM_TIMELS: u8 = 0x26;

/// u-blox "NMEA standard messages" class; msgId per the u-blox interface
/// description (GGA=0x00 .. VTG=0x05).
const NMEA_CLASS: u8 = 0xf0;
const NMEA_DISABLE: [(u8, &str); 6] =
    [(0x00, "GGA"), (0x01, "GLL"), (0x02, "GSA"), (0x03, "GSV"), (0x04, "RMC"), (0x05, "VTG")];

const NMEA_DISABLE_STAGE_START: i32 = 50;
const NMEA_DISABLE_STAGE_STEP: i32 = 3;

/// Start (or restart, on a fresh PROTVER discovery) the config queue at
/// stage 0. [`crate::ubx::packets::mon_ver`] calls this directly when it
/// sees the protver change.
pub fn start(session: &mut Session) {
    session.init_queue = 0;
}

fn send(session: &Session, transport: &mut dyn Transport, class: u8, id: u8, payload: &[u8]) {
    if session.readonly {
        return; // passive mode: parse everything, write nothing (§4.H)
    }
    let frame = ubx_write(class, id, payload);
    let _ = transport.write(&frame);
}

fn cfg_msg(session: &Session, transport: &mut dyn Transport, class: u8, id: u8, rate: u8) {
    send(session, transport, CLASS_CFG, CFG_MSG, &[class, id, rate]);
}

fn poll(session: &Session, transport: &mut dyn Transport, class: u8, id: u8) {
    send(session, transport, class, id, &[]);
}

/// Advance the queue by exactly one stage, driven by the arrival of an
/// inbound UBX packet. A no-op once the queue reaches [`DONE`] or was never
/// [`start`]ed.
pub fn advance(session: &mut Session, transport: &mut dyn Transport, sink: &mut dyn ErrorSink) {
    if session.init_queue < 0 {
        return;
    }
    let stage = session.init_queue;
    let next = run_stage(session, stage, transport, sink);
    session.init_queue = next;
}

fn run_stage(session: &mut Session, stage: i32, transport: &mut dyn Transport, sink: &mut dyn ErrorSink) -> i32 {
    match stage {
        0 => {
            cfg_msg(session, transport, CLASS_NAV, NAV_DOP, 1);
            cfg_msg(session, transport, CLASS_NAV, NAV_TIMEGPS, 1);
            cfg_msg(session, transport, CLASS_NAV, NAV_CLOCK, 1);
            10
        },
        10 => {
            if session.subtype.is_empty() {
                poll(session, transport, CLASS_MON, MON_VER);
            }
            20
        },
        20 => {
            if session.ubx.protver == 0 {
                data(sink, TAG, "config queue: protver still unknown, retrying MON-VER poll".to_string());
                return 20; // stay until mon_ver() resolves a protver
            }
            if session.ubx.protver < 15 {
                cfg_msg(session, transport, CLASS_NAV, NAV_SOL, 1);
                cfg_msg(session, transport, CLASS_NAV, NAV_SVINFO, 1);
            } else {
                cfg_msg(session, transport, CLASS_NAV, NAV_POSECEF, 1);
                cfg_msg(session, transport, CLASS_NAV, NAV_PVT, 1);
                cfg_msg(session, transport, CLASS_NAV, NAV_VELECEF, 1);
                cfg_msg(session, transport, CLASS_NAV, NAV_SAT, 1);
                cfg_msg(session, transport, CLASS_NAV, NAV_SIG, 1);
            }
            NMEA_DISABLE_STAGE_START
        },
        s if (NMEA_DISABLE_STAGE_START..NMEA_DISABLE_STAGE_START + NMEA_DISABLE_STAGE_STEP * NMEA_DISABLE.len() as i32)
            .contains(&s)
            && (s - NMEA_DISABLE_STAGE_START) % NMEA_DISABLE_STAGE_STEP == 0 =>
        {
            let idx = ((s - NMEA_DISABLE_STAGE_START) / NMEA_DISABLE_STAGE_STEP) as usize;
            let (id, name) = NMEA_DISABLE[idx];
            cfg_msg(session, transport, NMEA_CLASS, id, 0);
            data(sink, TAG, format!("config queue: disabled NMEA {name}"));
            if idx + 1 < NMEA_DISABLE.len() {
                s + NMEA_DISABLE_STAGE_STEP
            } else {
                71
            }
        },
        71 => {
            if session.ubx.protver >= 15 {
                cfg_msg(session, transport, CLASS_NAV, NAV_EOE, 1);
            }
            75
        },
        75 => {
            if session.ubx.protver >= 15 {
                cfg_msg(session, transport, CLASS_TIM, TIM_TIMELS, 255);
            }
            80
        },
        80 => {
            if session.ubx.protver >= 18 {
                poll(session, transport, CLASS_SEC, SEC_UNIQID);
            }
            83
        },
        83 => {
            if session.ubx.protver < 27 {
                cfg_msg(session, transport, CLASS_MON, MON_HW, 4);
            } else {
                cfg_msg(session, transport, CLASS_MON, MON_RF, 4);
            }
            87
        },
        87 => {
            if session.ubx.protver < 15 {
                cfg_msg(session, transport, CLASS_NAV, NAV_POSECEF, 0);
                cfg_msg(session, transport, CLASS_NAV, NAV_PVT, 0);
                cfg_msg(session, transport, CLASS_NAV, NAV_VELECEF, 0);
                cfg_msg(session, transport, CLASS_NAV, NAV_SAT, 0);
                cfg_msg(session, transport, CLASS_NAV, NAV_SIG, 0);
            }
            90
        },
        90 => {
            if (15..27).contains(&session.ubx.protver) {
                cfg_msg(session, transport, CLASS_NAV, NAV_SOL, 0);
                cfg_msg(session, transport, CLASS_NAV, NAV_SVINFO, 0);
            }
            93
        },
        93 => {
            if session.ubx.protver < 27 {
                poll(session, transport, CLASS_MON, MON_RXBUF);
                poll(session, transport, CLASS_MON, MON_TXBUF);
            } else {
                poll(session, transport, CLASS_MON, MON_COMMS);
            }
            data(sink, TAG, "config queue: complete".to_string());
            DONE
        },
        _ => DONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, SessionMode, SessionOptions};
    use crate::sink::CollectingSink;
    use crate::transport::MemoryTransport;

    fn new_session(ctx: &Context) -> Session<'_> {
        Session::new(SessionOptions { mode: SessionMode::BinaryPreferred, readonly: false, context: ctx })
    }

    #[test]
    fn queue_stalls_at_20_until_protver_known() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut transport = MemoryTransport::default();
        let mut sink = CollectingSink::default();
        session.init_queue = 20;
        advance(&mut session, &mut transport, &mut sink);
        assert_eq!(session.init_queue, 20);

        session.ubx.protver = 15;
        advance(&mut session, &mut transport, &mut sink);
        assert_eq!(session.init_queue, NMEA_DISABLE_STAGE_START);
    }

    #[test]
    fn nmea_disable_stages_step_by_three_then_jump_to_71() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut transport = MemoryTransport::default();
        let mut sink = CollectingSink::default();
        session.init_queue = NMEA_DISABLE_STAGE_START;
        for _ in 0..NMEA_DISABLE.len() {
            advance(&mut session, &mut transport, &mut sink);
        }
        assert_eq!(session.init_queue, 71);
    }

    #[test]
    fn queue_reaches_done_after_93() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut transport = MemoryTransport::default();
        let mut sink = CollectingSink::default();
        session.ubx.protver = 20;
        session.init_queue = 93;
        advance(&mut session, &mut transport, &mut sink);
        assert_eq!(session.init_queue, DONE);
    }

    // §8 scenario S5: PROTVER discovery (a MON-VER reply with a new protver)
    // restarts the queue at stage 0.
    #[test]
    fn mon_ver_restarts_queue_on_new_protver() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();
        session.init_queue = 93;
        let mut payload = vec![0u8; 70];
        payload[0..7].copy_from_slice(b"ROM 2.3");
        let ext = b"PROTVER=18.00";
        payload[40..40 + ext.len()].copy_from_slice(ext);
        crate::ubx::packets::mon_ver(&mut session, &payload, &mut sink);
        assert_eq!(session.ubx.protver, 18);
        assert_eq!(session.init_queue, 0);
    }

    #[test]
    fn passive_mode_never_writes() {
        let ctx = Context::new();
        let mut session = Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: &ctx });
        let mut transport = MemoryTransport::default();
        let mut sink = CollectingSink::default();
        session.init_queue = 0;
        advance(&mut session, &mut transport, &mut sink);
        assert!(transport.outbox.is_empty());
        assert_eq!(session.init_queue, 10);
    }
}
