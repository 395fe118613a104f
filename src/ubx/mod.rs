//! §4.F — the UBX binary decoder: dispatch on `(class, id)`, per-message
//! field extraction (`packets`), and the iTOW-driven cycle-end detector.
//!
//! Grounded on `ublox/src/ubx_packets/ubx_common.rs`'s class/id constants
//! and `ublox/src/ubx_packets/packets/mod.rs`'s `match (class_id)` dispatch
//! shape, reworked from the teacher's `#[ubx_packet_recv]`-registered parser
//! table into a plain `match` over hand-rolled decoders.

pub mod packets;

use crate::context::{Session, UbxScratch};
use crate::mask::Mask;
use crate::sink::{data, ErrorSink};

const TAG: &str = "UBX:";

pub const CLASS_NAV: u8 = 0x01;
pub const CLASS_RXM: u8 = 0x02;
pub const CLASS_ACK: u8 = 0x05;
pub const CLASS_CFG: u8 = 0x06;
pub const CLASS_MON: u8 = 0x0a;
pub const CLASS_TIM: u8 = 0x0d;
pub const CLASS_SEC: u8 = 0x27;

pub const NAV_SOL: u8 = 0x06;
pub const NAV_PVT: u8 = 0x07;
pub const NAV_HPPOSECEF: u8 = 0x13;
pub const NAV_HPPOSLLH: u8 = 0x14;
pub const NAV_PVAT: u8 = 0x17;
pub const NAV_SVINFO: u8 = 0x30;
pub const NAV_SAT: u8 = 0x35;
pub const NAV_RELPOSNED: u8 = 0x3c;
pub const NAV_SIG: u8 = 0x43;
pub const NAV_EOE: u8 = 0x61;

pub const RXM_SFRBX: u8 = 0x13;
pub const RXM_RAWX: u8 = 0x15;

pub const MON_VER: u8 = 0x04;

pub const SEC_UNIQID: u8 = 0x03;

pub const TIM_TP: u8 = 0x01;

pub const CFG_PRT: u8 = 0x00;

fn msgid(class: u8, id: u8) -> u16 {
    (class as u16) << 8 | id as u16
}

/// §4.F iTOW-driven cycle-end detector, run only for NAV-class messages
/// (the only ones that share a coherent epoch clock).
///
/// "Maintain `last_iTOW`, `end_msgid`, `last_msgid`. If incoming msgid ==
/// `end_msgid` and iTOW is known: emit `REPORT_IS`. If `|last_iTOW - iTOW|
/// > 10 ms`: new epoch; if `last_msgid` differs from `end_msgid`, promote
/// `last_msgid` as the new ender; emit `CLEAR_IS`. Update `last_iTOW`,
/// `last_msgid`."
///
/// The `i64` delta handles the end-of-week iTOW wrap for free: the jump
/// from ~604,800,000 back to ~0 is still a delta far beyond the 10 ms
/// threshold, so it is already read as "new epoch", never mistaken for a
/// small forward step (§8 boundary behavior).
fn process_cycle(scratch: &mut UbxScratch, id: u16, itow: i64) -> Mask {
    let mut out = Mask::empty();

    if itow >= 0 && id == scratch.end_msgid {
        out |= Mask::REPORT_IS;
    }

    if scratch.last_i_tow >= 0 && itow >= 0 {
        let delta = (itow - scratch.last_i_tow).abs();
        if delta > crate::constants::EPOCH_STEP_THRESHOLD_MS {
            out |= Mask::CLEAR_IS;
            if scratch.last_msgid != scratch.end_msgid {
                scratch.end_msgid = scratch.last_msgid;
            }
        }
    }

    scratch.last_i_tow = itow;
    scratch.last_msgid = id;
    out
}

/// §4.F entry point: `parse_ubx(class, id, payload, session) -> Mask`.
pub fn parse_ubx(class: u8, id: u8, payload: &[u8], session: &mut Session, sink: &mut dyn ErrorSink) -> Mask {
    let handler_mask = match (class, id) {
        (CLASS_NAV, NAV_PVT) => packets::nav_pvt(session, payload, sink),
        (CLASS_NAV, NAV_SOL) => packets::nav_sol(session, payload, sink),
        (CLASS_NAV, NAV_HPPOSECEF) => packets::nav_hpposecef(session, payload, sink),
        (CLASS_NAV, NAV_HPPOSLLH) => packets::nav_hpposllh(session, payload, sink),
        (CLASS_NAV, NAV_SAT) => packets::nav_sat(session, payload, sink),
        (CLASS_NAV, NAV_SIG) => packets::nav_sig(session, payload, sink),
        (CLASS_NAV, NAV_SVINFO) => packets::nav_svinfo(session, payload, sink),
        (CLASS_NAV, NAV_EOE) => packets::nav_eoe(session, payload, sink),
        (CLASS_NAV, NAV_RELPOSNED) => packets::nav_relposned(session, payload, sink),
        (CLASS_NAV, NAV_PVAT) => packets::nav_pvat(session, payload, sink),
        (CLASS_RXM, RXM_RAWX) => packets::rxm_rawx(session, payload, sink),
        (CLASS_RXM, RXM_SFRBX) => packets::rxm_sfrbx(session, payload, sink),
        (CLASS_MON, MON_VER) => packets::mon_ver(session, payload, sink),
        (CLASS_SEC, SEC_UNIQID) => packets::sec_uniqid(session, payload, sink),
        (CLASS_TIM, TIM_TP) => packets::tim_tp(session, payload, sink),
        (CLASS_CFG, CFG_PRT) => packets::cfg_prt_response(session, payload, sink),
        (CLASS_ACK, _) => Mask::ONLINE | Mask::CONFIG,
        _ => {
            data(sink, TAG, format!("no handler registered for class=0x{class:02x} id=0x{id:02x}"));
            Mask::ONLINE
        },
    };

    // Only NAV-class messages carry an epoch-coherent iTOW; everything else
    // (RXM-RAWX's rcvTow is a different clock, MON/SEC/TIM/CFG/ACK carry
    // none at all) is excluded from cycle-end bookkeeping.
    if class != CLASS_NAV {
        return handler_mask;
    }

    let itow = session.ubx.i_tow;
    handler_mask | process_cycle(&mut session.ubx, msgid(class, id), itow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, SessionMode, SessionOptions};
    use crate::sink::CollectingSink;

    fn new_session(ctx: &Context) -> Session<'_> {
        Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: ctx })
    }

    fn nav_eoe_payload(itow: u32) -> Vec<u8> {
        itow.to_le_bytes().to_vec()
    }

    // §8 scenario S3 continuation: NAV-EOE gets learned as the cycle ender,
    // and the next epoch's NAV-EOE fires REPORT_IS.
    #[test]
    fn nav_eoe_learned_as_ender_across_two_epochs() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();

        let m1 = parse_ubx(CLASS_NAV, NAV_EOE, &nav_eoe_payload(1000), &mut session, &mut sink);
        assert!(!m1.contains(Mask::REPORT_IS));

        // Next epoch steps iTOW forward by 1000 ms: NAV-EOE (last_msgid) becomes the ender.
        let m2 = parse_ubx(CLASS_NAV, NAV_EOE, &nav_eoe_payload(2000), &mut session, &mut sink);
        assert!(m2.contains(Mask::CLEAR_IS));
        assert_eq!(session.ubx.end_msgid, msgid(CLASS_NAV, NAV_EOE));

        // Third epoch: NAV-EOE immediately recognized as the (now known) ender.
        let m3 = parse_ubx(CLASS_NAV, NAV_EOE, &nav_eoe_payload(3000), &mut session, &mut sink);
        assert!(m3.contains(Mask::REPORT_IS));
    }

    // §8 boundary: the iTOW week rollover (604,800,000 -> ~0) must read as a
    // new epoch, not get silently absorbed as a tiny or negative step.
    #[test]
    fn itow_week_rollover_is_new_epoch() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();

        let _ = parse_ubx(CLASS_NAV, NAV_EOE, &nav_eoe_payload(604_799_000), &mut session, &mut sink);
        let m = parse_ubx(CLASS_NAV, NAV_EOE, &nav_eoe_payload(500), &mut session, &mut sink);
        assert!(m.contains(Mask::CLEAR_IS));
    }

    #[test]
    fn unknown_class_id_yields_online_only() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        let mut sink = CollectingSink::default();
        let m = parse_ubx(0x99, 0x99, &[], &mut session, &mut sink);
        assert_eq!(m, Mask::ONLINE);
    }
}
