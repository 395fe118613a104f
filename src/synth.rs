//! §4.G — fix synthesis: turning a decoder's [`Mask`] updates into the
//! consolidated [`Report`] a host hands off to its own display/logging
//! layer, exactly at the epoch boundaries the NMEA/UBX cycle detectors
//! found (`Mask::REPORT_IS`).
//!
//! Grounded on the "newdata -> lastfix -> oldfix" rotation implicit in
//! `ublox/src/serialport.rs::Device::update`'s last-known-position cache,
//! generalized here to a three-deep history per §3/§4.G.

use crate::context::Session;
use crate::fix::{FixMode, GpsFix, SkyView};
use crate::mask::Mask;

/// §6 `Report` — fix, skyview, and the mask that triggered this report,
/// handed to an [`OnReport`] sink once per completed epoch.
#[derive(Debug, Clone)]
pub struct Report {
    pub fix: GpsFix,
    pub skyview: SkyView,
    pub mask: Mask,
}

/// §6 external output sink. A host implements this to receive one
/// [`Report`] per completed epoch; `LogEntry`s go through [`crate::sink::ErrorSink`]
/// instead, since they aren't tied to an epoch boundary.
pub trait OnReport {
    fn report(&mut self, report: Report);
}

/// §4.G `gpsd_error_model`: fills in any still-`NaN` accuracy figure from
/// the DOP values a decoder already populated. A pure function of the fix
/// alone — no session state — so a host can swap in its own model or unit
/// test this one in isolation. The actual UERE-based accuracy model is out
/// of scope (§1 Non-goals); this only exposes the seam it plugs into.
pub fn gpsd_error_model(fix: &GpsFix) -> GpsFix {
    const UERE: f64 = 5.0; // representative single-frequency C/A UERE, meters
    let mut out = *fix;
    if out.eph.is_nan() && !out.dop.hdop.is_nan() {
        out.eph = out.dop.hdop * UERE;
    }
    if out.epv.is_nan() && !out.dop.vdop.is_nan() {
        out.epv = out.dop.vdop * UERE;
    }
    if out.sep.is_nan() && !out.eph.is_nan() && !out.epv.is_nan() {
        out.sep = (out.eph * out.eph + out.epv * out.epv).sqrt();
    }
    out
}

/// §4.G mode-downgrade guard: an RMC-only cycle carries no altitude field,
/// so letting its bare 2D/3D-less mode stand would clobber a perfectly
/// good 3D fix established moments earlier by GGA/GSA. Keep 3D if the
/// previous fix was 3D and the incoming fix still carries a finite
/// altitude (i.e. nothing this cycle actively invalidated it).
fn guarded_mode(previous: &GpsFix, incoming: &GpsFix) -> FixMode {
    if incoming.mode == FixMode::Fix2D
        && previous.mode == FixMode::Fix3D
        && (incoming.alt_hae.is_finite() || incoming.alt_msl.is_finite())
    {
        return FixMode::Fix3D;
    }
    incoming.mode
}

/// Run once per `Mask::REPORT_IS`: apply the mode-downgrade guard and the
/// error model to `session.newdata`, rotate it into `lastfix`/`oldfix`, and
/// return the [`Report`] to hand to a host's [`OnReport`] sink. Returns
/// `None` when `mask` doesn't carry `REPORT_IS` (nothing to synthesize yet).
pub fn synthesize(session: &mut Session, mask: Mask) -> Option<Report> {
    if !mask.contains(Mask::REPORT_IS) {
        return None;
    }

    session.newdata.mode = guarded_mode(&session.lastfix, &session.newdata);
    session.newdata = gpsd_error_model(&session.newdata);

    session.oldfix = session.lastfix;
    session.lastfix = session.newdata;

    Some(Report { fix: session.lastfix, skyview: session.skyview.clone(), mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, SessionMode, SessionOptions};
    use crate::fix::FixStatus;

    fn new_session(ctx: &Context) -> Session<'_> {
        Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: ctx })
    }

    #[test]
    fn no_report_without_report_is_bit() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        assert!(synthesize(&mut session, Mask::LATLON).is_none());
    }

    #[test]
    fn rmc_only_cycle_keeps_3d_mode_with_finite_altitude() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        session.lastfix.mode = FixMode::Fix3D;
        session.lastfix.alt_msl = 15.4;
        session.newdata.mode = FixMode::Fix2D; // RMC alone carries no altitude/mode info
        session.newdata.alt_msl = 15.4; // carried forward from the prior GGA
        session.newdata.status = FixStatus::Gps;

        let report = synthesize(&mut session, Mask::REPORT_IS).unwrap();
        assert_eq!(report.fix.mode, FixMode::Fix3D);
    }

    #[test]
    fn genuine_2d_downgrade_is_not_overridden() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        session.lastfix.mode = FixMode::Fix3D;
        session.newdata.mode = FixMode::Fix2D;
        session.newdata.alt_msl = f64::NAN;
        session.newdata.alt_hae = f64::NAN;

        let report = synthesize(&mut session, Mask::REPORT_IS).unwrap();
        assert_eq!(report.fix.mode, FixMode::Fix2D);
    }

    #[test]
    fn error_model_fills_eph_from_hdop() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        session.newdata.dop.hdop = 1.2;
        session.newdata.dop.vdop = 2.0;
        let report = synthesize(&mut session, Mask::REPORT_IS).unwrap();
        assert!((report.fix.eph - 6.0).abs() < 1e-9);
        assert!((report.fix.epv - 10.0).abs() < 1e-9);
        assert!(report.fix.sep.is_finite());
    }

    #[test]
    fn lastfix_rotates_into_oldfix() {
        let ctx = Context::new();
        let mut session = new_session(&ctx);
        session.lastfix.lat = 1.0;
        session.newdata.lat = 2.0;
        synthesize(&mut session, Mask::REPORT_IS);
        assert_eq!(session.oldfix.lat, 1.0);
        assert_eq!(session.lastfix.lat, 2.0);
    }
}
