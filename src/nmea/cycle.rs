//! §4.E cycle-end detection: the four-step algorithm that turns a stream of
//! independently-decoded sentences into `CLEAR_IS`/`REPORT_IS` epoch
//! boundaries, without any sentence needing to know the device's message
//! set in advance.
//!
//! Grounded on the lock-step "sync on known cadence, else learn it"
//! approach documented in §4.E; there is no direct teacher analogue (the
//! teacher is UBX-only, where iTOW gives an unambiguous boundary — see
//! `crate::ubx::cycle`), so this is authored from the spec's literal
//! four-step description.

use crate::constants::EPOCH_STEP_THRESHOLD_MS;
use crate::context::NmeaScratch;
use crate::mask::Mask;

/// Run the cycle-end algorithm for the sentence just decoded at dispatch
/// table position `idx`, and fold `CLEAR_IS`/`REPORT_IS` into the mask the
/// handler itself produced.
///
/// `this_cycle_continue` / `last_cycle_continue` come from the dispatch
/// table entries for the current and previous (`scratch.lasttag`) tags
/// respectively — continuation entries (GSV/GSA multi-part sentences)
/// extend an in-progress cycle rather than ending it.
pub fn process(
    scratch: &mut NmeaScratch,
    idx: usize,
    this_cycle_continue: bool,
    last_cycle_continue: bool,
    handler_mask: Mask,
) -> Mask {
    let mut out = Mask::empty();

    // Step 1: a fresh, non-trivial time step means a new epoch started.
    let time_stepped = scratch.latch_frac_time
        && (scratch.this_frac_time - scratch.last_frac_time).abs() * 1000.0
            > EPOCH_STEP_THRESHOLD_MS as f64;

    if time_stepped {
        out |= Mask::CLEAR_IS;
        if let Some(last) = scratch.lasttag {
            if !scratch.cycle_enders.get(last) && !last_cycle_continue {
                scratch.cycle_enders.set(last);
                scratch.cycle_end_reliable = true;
            }
        }
    } else if scratch.lasttag.is_some_and(|last| scratch.cycle_enders.get(last)) {
        // Step 2: immediately after a known ender — a substantive update
        // (anything beyond bare ONLINE) means the epoch is already complete.
        if handler_mask.iter().any(|bit| bit != Mask::ONLINE) {
            out |= Mask::REPORT_IS;
        }
    }

    // Step 3: a continuation sentence carries the ender bit forward onto
    // itself, so the *next* sentence's step 2 check still fires correctly.
    if this_cycle_continue {
        if let Some(last) = scratch.lasttag {
            scratch.cycle_enders.clear_bit(last);
        }
        scratch.cycle_enders.set(idx);
    }

    // Step 4: a known ender that isn't mid-series (GSV/GSA `gsx_more`)
    // always closes the epoch out, even on the very first occurrence
    // learned via step 1 above.
    if scratch.cycle_enders.get(idx) && !scratch.gsx_more {
        out |= Mask::REPORT_IS;
    }

    scratch.lasttag = Some(idx);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_with_frac(this: f64, last: f64, latch: bool) -> NmeaScratch {
        let mut s = NmeaScratch::default();
        s.this_frac_time = this;
        s.last_frac_time = last;
        s.latch_frac_time = latch;
        s
    }

    #[test]
    fn learns_ender_on_first_time_step() {
        let mut s = scratch_with_frac(1.0, 1.0, false);
        // First sentence (idx 0) of epoch 1, no continuation.
        let m = process(&mut s, 0, false, false, Mask::TIME);
        assert!(!m.contains(Mask::CLEAR_IS));
        assert_eq!(s.lasttag, Some(0));

        // Second sentence (idx 1) steps time forward -> new epoch, idx 0
        // (lasttag) gets learned as the ender.
        s.this_frac_time = 2.0;
        s.last_frac_time = 1.0;
        s.latch_frac_time = true;
        let m2 = process(&mut s, 1, false, false, Mask::TIME | Mask::LATLON);
        assert!(m2.contains(Mask::CLEAR_IS));
        assert!(s.cycle_enders.get(0));
        assert!(s.cycle_end_reliable);
    }

    #[test]
    fn reports_immediately_after_known_ender() {
        let mut s = NmeaScratch::default();
        s.cycle_enders.set(0);
        s.lasttag = Some(0);
        let m = process(&mut s, 1, false, false, Mask::LATLON);
        assert!(m.contains(Mask::REPORT_IS));
    }

    #[test]
    fn online_only_mask_after_ender_does_not_report() {
        let mut s = NmeaScratch::default();
        s.cycle_enders.set(0);
        s.lasttag = Some(0);
        let m = process(&mut s, 1, false, false, Mask::ONLINE);
        assert!(!m.contains(Mask::REPORT_IS));
    }

    #[test]
    fn gsx_more_suppresses_report_on_known_ender() {
        let mut s = NmeaScratch::default();
        s.cycle_enders.set(2);
        s.gsx_more = true;
        let m = process(&mut s, 2, false, false, Mask::SATELLITE);
        assert!(!m.contains(Mask::REPORT_IS));
    }
}
