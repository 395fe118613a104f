//! End-to-end scenarios driving the public API the way a host would:
//! raw bytes in, through `Lexer`/`drive`, to reports and session state.

use gpsd_core::context::{Context, SessionMode, SessionOptions};
use gpsd_core::lexer::{nmea_write, ubx_write, Protocol};
use gpsd_core::sink::CollectingSink;
use gpsd_core::{cfgmachine, drive, ubx, FixMode, FixStatus, MemoryTransport, Session};

fn new_session(ctx: &Context, mode: SessionMode) -> Session<'_> {
    Session::new(SessionOptions { mode, readonly: true, context: ctx })
}

#[test]
fn s1_minimal_nmea_fix_end_to_end() {
    let ctx = Context::new();
    let mut session = new_session(&ctx, SessionMode::NmeaPreferred);
    let mut sink = CollectingSink::default();

    let stream = b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62\r\n\
$GPGGA,081836,3751.65,S,14507.36,E,1,04,9.0,15.4,M,0.0,M,,*41\r\n";

    let reports = drive(&mut session, stream, &mut sink);
    assert_eq!(reports.len(), 1);
    let fix = &reports[0].fix;

    assert!((fix.lat - (-37.860833)).abs() < 1e-4);
    assert!((fix.lon - 145.122667).abs() < 1e-4);
    assert!((fix.alt_msl - 15.4).abs() < 1e-6);
    assert_eq!(fix.speed, 0.0);
    assert!((fix.track - 360.0).abs() < 1e-6);
    assert!((fix.magnetic_var - 11.3).abs() < 1e-6);
    assert_eq!(fix.status, FixStatus::Gps);
    assert_eq!(fix.mode, FixMode::Fix3D);
}

#[test]
fn s2_nmea_cycle_ender_learned_as_vtg() {
    let ctx = Context::new();
    let mut session = new_session(&ctx, SessionMode::NmeaPreferred);
    let mut sink = CollectingSink::default();

    // One epoch: RMC, GGA, GSA, GSV, VTG; repeated with the time stepped
    // forward by one second so the second epoch's RMC triggers the step
    // that retroactively marks the *previous* epoch's last sentence (VTG)
    // as the cycle ender.
    let epoch = |hhmmss: &str| -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(nmea_write(&format!(
            "GPRMC,{hhmmss},A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E"
        )));
        out.extend(nmea_write(&format!("GPGGA,{hhmmss},3751.65,S,14507.36,E,1,04,9.0,15.4,M,0.0,M,,")));
        out.extend(nmea_write("GPGSA,A,3,04,05,,,,,,,,,,,2.5,1.3,2.1"));
        out.extend(nmea_write("GPGSV,1,1,04,04,40,083,46,05,09,160,39,07,15,291,36,08,25,071,40"));
        out.extend(nmea_write("GPVTG,360.0,T,,M,000.0,N,000.0,K,A"));
        out
    };

    let mut stream = epoch("081836");
    stream.extend(epoch("081837"));

    let reports = drive(&mut session, &stream, &mut sink);
    assert!(!reports.is_empty());

    // VTG is the 5th dispatch entry used above; after two epochs it must be
    // the learned cycle ender and the detector must consider it reliable.
    let vtg_idx = gpsd_core::nmea::DISPATCH.iter().position(|e| e.tag == "VTG").unwrap();
    assert!(session.nmea.cycle_enders.get(vtg_idx));
    assert!(session.nmea.cycle_end_reliable);
}

#[test]
fn s3_ubx_nav_pvt_happy_path_end_to_end() {
    let ctx = Context::new();
    let mut session = new_session(&ctx, SessionMode::BinaryPreferred);
    let mut sink = CollectingSink::default();

    let nav_pvt_payload = |i_tow: u32| -> Vec<u8> {
        let mut p = vec![0u8; 92];
        p[0..4].copy_from_slice(&i_tow.to_le_bytes());
        p[4..6].copy_from_slice(&2024u16.to_le_bytes());
        p[6] = 1; // month
        p[7] = 1; // day
        p[8] = 0; // hour
        p[9] = 0; // min
        p[10] = 0; // sec
        p[11] = 0b0000_0111; // valid: validDate|validTime|fullyResolved
        // nano at offset 16 stays 0 (payload is zero-initialized)
        p[20] = 3; // fixType = 3D
        p[21] = 0x01; // flags: gnssFixOK
        p[24..28].copy_from_slice(&(23_000_000i32).to_le_bytes()); // lon, 1e-7 deg
        p[28..32].copy_from_slice(&(483_000_000i32).to_le_bytes()); // lat, 1e-7 deg
        p[36..40].copy_from_slice(&(100_000i32).to_le_bytes()); // hMSL, mm
        p
    };

    let mut stream = ubx_write(ubx::CLASS_NAV, ubx::NAV_PVT, &nav_pvt_payload(1000));
    let m1 = {
        let pkts = session.lexer.feed(&stream);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].protocol, Protocol::Ubx);
        let (class, id, payload) = pkts[0].ubx_parts();
        ubx::parse_ubx(class, id, payload, &mut session, &mut sink)
    };
    assert_eq!(session.newdata.status, FixStatus::Gps);
    assert_eq!(session.newdata.mode, FixMode::Fix3D);
    assert!((session.newdata.lat - 48.3).abs() < 1e-5);
    assert!((session.newdata.lon - 2.3).abs() < 1e-5);
    assert!(!m1.contains(gpsd_core::Mask::REPORT_IS));

    stream = ubx_write(ubx::CLASS_NAV, ubx::NAV_PVT, &nav_pvt_payload(2000));
    let pkts = session.lexer.feed(&stream);
    let (class, id, payload) = pkts[0].ubx_parts();
    let m2 = ubx::parse_ubx(class, id, payload, &mut session, &mut sink);
    // The second packet's time step closes the first epoch and, since
    // NAV-PVT is the only NAV message ever seen, learns itself as the
    // cycle ender for next time.
    assert!(m2.contains(gpsd_core::Mask::CLEAR_IS));
    assert!(!m2.contains(gpsd_core::Mask::REPORT_IS));
    assert_eq!(session.ubx.end_msgid, (ubx::CLASS_NAV as u16) << 8 | ubx::NAV_PVT as u16);

    stream = ubx_write(ubx::CLASS_NAV, ubx::NAV_PVT, &nav_pvt_payload(3000));
    let pkts = session.lexer.feed(&stream);
    let (class, id, payload) = pkts[0].ubx_parts();
    let m3 = ubx::parse_ubx(class, id, payload, &mut session, &mut sink);
    // Now that NAV-PVT is the known ender, every subsequent packet reports
    // (and clears) its epoch immediately.
    assert!(m3.contains(gpsd_core::Mask::REPORT_IS));
}

#[test]
fn s4_nmea_checksum_failure_resyncs() {
    let ctx = Context::new();
    let mut session = new_session(&ctx, SessionMode::NmeaPreferred);
    let mut sink = CollectingSink::default();

    let mut stream = b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*00\r\n".to_vec();
    stream.extend_from_slice(b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62\r\n");

    let packets = session.lexer.feed(&stream);
    assert_eq!(packets.len(), 1, "bad-checksum sentence must not be emitted, only the good one");
    let m = gpsd_core::nmea::parse_sentence(packets[0].nmea_body(), &mut session, &mut sink);
    assert!(m.contains(gpsd_core::Mask::TIME));
}

#[test]
fn s5_protver_discovery_drives_nav_sat_sig_not_svinfo() {
    let ctx = Context::new();
    let mut session = new_session(&ctx, SessionMode::BinaryPreferred);
    session.readonly = false;
    let mut sink = CollectingSink::default();
    let mut transport = MemoryTransport::default();

    let mut payload = vec![0u8; 70];
    let ext = b"PROTVER=27.12";
    payload[40..40 + ext.len()].copy_from_slice(ext);
    ubx::packets::mon_ver(&mut session, &payload, &mut sink);
    assert_eq!(session.ubx.protver, 27);
    assert_eq!(session.init_queue, 0);

    // Drive stage 0 (NAV-DOP/TIMEGPS/CLOCK) and stage 10 (MON-VER poll,
    // skipped since subtype is already known) to reach stage 20.
    cfgmachine::advance(&mut session, &mut transport, &mut sink);
    cfgmachine::advance(&mut session, &mut transport, &mut sink);
    assert_eq!(session.init_queue, 20);

    transport.outbox.clear();
    cfgmachine::advance(&mut session, &mut transport, &mut sink);

    const CFG_MSG: u8 = 0x01;
    let nav_sat_enable = ubx_write(ubx::CLASS_CFG, CFG_MSG, &[ubx::CLASS_NAV, ubx::NAV_SAT, 1]);
    let nav_sig_enable = ubx_write(ubx::CLASS_CFG, CFG_MSG, &[ubx::CLASS_NAV, ubx::NAV_SIG, 1]);
    let nav_svinfo_enable = ubx_write(ubx::CLASS_CFG, CFG_MSG, &[ubx::CLASS_NAV, ubx::NAV_SVINFO, 1]);

    assert!(contains_subslice(&transport.outbox, &nav_sat_enable));
    assert!(contains_subslice(&transport.outbox, &nav_sig_enable));
    assert!(!contains_subslice(&transport.outbox, &nav_svinfo_enable));
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn s6_rxm_sfrbx_malformed_numwords_rejected_session_stays_usable() {
    let ctx = Context::new();
    let mut session = new_session(&ctx, SessionMode::BinaryPreferred);
    let mut sink = CollectingSink::default();

    let mut bad_payload = vec![0u8; 8];
    bad_payload[4] = 20; // numWords = 20, but no subframe words follow
    let bad_frame = ubx_write(ubx::CLASS_RXM, ubx::RXM_SFRBX, &bad_payload);

    let reports = drive(&mut session, &bad_frame, &mut sink);
    assert!(reports.is_empty());

    // Session must still decode a subsequent, unrelated packet normally.
    let good = ubx_write(ubx::CLASS_SEC, ubx::SEC_UNIQID, &[1, 0xde, 0xad, 0xbe, 0xef, 0x01]);
    let packets = session.lexer.feed(&good);
    assert_eq!(packets.len(), 1);
}
