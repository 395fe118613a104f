//! §4.E — the NMEA 0183 decoder: field splitting, a table-driven dispatch
//! (§9 "table-driven dispatch": `&'static [PhraseEntry]`, the per-tag
//! `cycle_enders` bit indexed by table position), and the cycle-end
//! detector that turns a bare stream of sentences into epoch boundaries.

pub mod cycle;
pub mod fields;
pub mod sentences;

use crate::context::Session;
use crate::mask::Mask;
use crate::sink::{data, warn, ErrorSink};

use fields::Fields;

const TAG: &str = "NMEA0183:";

pub struct PhraseEntry {
    /// Bare tag with talker prefix stripped (`"RMC"`), or the full tag for
    /// proprietary sentences (`"PGRMF"`, `"PSTI"`). `"PQTM"` is matched as a
    /// prefix, covering the whole Quectel `$PQTM*` vendor family.
    pub tag: &'static str,
    /// For `$PSTI,NNN` sentences, the numeric sub-tag carried in `field[1]`.
    pub subtag: Option<&'static str>,
    pub min_fields: usize,
    pub cycle_continue: bool,
    pub handler: fn(&mut Session, &Fields, &mut dyn ErrorSink) -> Mask,
}

macro_rules! entry {
    ($tag:expr, $subtag:expr, $min:expr, $cont:expr, $handler:path) => {
        PhraseEntry { tag: $tag, subtag: $subtag, min_fields: $min, cycle_continue: $cont, handler: $handler }
    };
}

pub static DISPATCH: &[PhraseEntry] = &[
    entry!("RMC", None, 10, false, sentences::rmc),
    entry!("GGA", None, 7, false, sentences::gga),
    entry!("GLL", None, 6, false, sentences::gll),
    entry!("GNS", None, 7, false, sentences::gns),
    entry!("VTG", None, 1, false, sentences::vtg),
    entry!("GSA", None, 3, false, sentences::gsa),
    entry!("GSV", None, 4, true, sentences::gsv),
    entry!("GST", None, 5, false, sentences::gst),
    entry!("GBS", None, 5, false, sentences::gbs),
    entry!("ZDA", None, 5, false, sentences::zda),
    entry!("HDT", None, 1, false, sentences::hdt),
    entry!("HDG", None, 1, false, sentences::hdg),
    entry!("HDM", None, 1, false, sentences::hdm),
    entry!("ROT", None, 2, false, sentences::rot),
    entry!("THS", None, 2, false, sentences::ths),
    entry!("DBT", None, 1, false, sentences::dbt),
    entry!("DPT", None, 1, false, sentences::dpt),
    entry!("MWV", None, 1, false, sentences::mwv),
    entry!("MWD", None, 1, false, sentences::mwd),
    entry!("MTW", None, 1, false, sentences::mtw),
    entry!("DTM", None, 1, false, sentences::dtm),
    entry!("TXT", None, 4, false, sentences::txt),
    entry!("PGRMF", None, 1, false, sentences::pgrmf),
    entry!("PGRMZ", None, 1, false, sentences::pgrmz),
    entry!("PGRME", None, 1, false, sentences::pgrme),
    entry!("PGRMM", None, 1, false, sentences::pgrmm),
    entry!("PGRMT", None, 1, false, sentences::pgrmt),
    entry!("PGRMV", None, 1, false, sentences::pgrmv),
    entry!("PASHR", None, 2, false, sentences::pashr),
    entry!("PSTI", Some("030"), 2, false, sentences::psti_030),
    entry!("PSTI", Some("032"), 2, false, sentences::psti_032),
    entry!("PSTI", Some("033"), 2, false, sentences::psti_033),
    entry!("PSTI", Some("035"), 2, false, sentences::psti_035),
    entry!("PSTI", Some("036"), 2, false, sentences::psti_036),
    entry!("PMTK001", None, 1, false, sentences::pmtk001),
    entry!("PMTK424", None, 1, false, sentences::pmtk424),
    entry!("PMTK705", None, 1, false, sentences::pmtk705),
    entry!("PAIR001", None, 1, false, sentences::pair001),
    entry!("PAIR010", None, 1, false, sentences::pair010),
    entry!("PQVERNO", None, 1, false, sentences::pqverno),
    entry!("PQTM", None, 1, false, sentences::pqtm),
    entry!("PDTINFO", None, 1, false, sentences::pdtinfo),
    entry!("PGPSP", None, 1, false, sentences::pgpsp),
    entry!("PTNTA", None, 1, false, sentences::ptnta),
    entry!("PTNTHTM", None, 1, false, sentences::ptnthtm),
    entry!("PSRFEPE", None, 1, false, sentences::psrfepe),
    entry!("PMGNST", None, 1, false, sentences::pmgnst),
    entry!("PSTMVER", None, 1, false, sentences::pstmver),
    entry!("PSTMANTENNASTATUS", None, 1, false, sentences::pstmantennastatus),
    entry!("INFO", None, 1, false, sentences::info),
    entry!("GYOACC", None, 1, false, sentences::gyoacc),
    entry!("SNRSTAT", None, 1, false, sentences::snrstat),
    entry!("XDR", None, 1, false, sentences::xdr),
];

fn find_entry<'a>(fields: &Fields) -> Option<(usize, &'a PhraseEntry)> {
    let tag = fields.bare_tag();
    DISPATCH.iter().enumerate().find(|(_, e)| match (e.tag, e.subtag) {
        ("PSTI", Some(sub)) => tag == "PSTI" && fields.get(1) == sub,
        ("PQTM", None) => tag.starts_with("PQTM"),
        (t, None) => t == tag,
        _ => false,
    })
}

/// §4.E entry point: `parse_sentence(sentence, session) -> Mask`.
///
/// `body` is the already-framed sentence with its leading `$`/`!` and
/// trailing `*HH\r\n` stripped (i.e. [`crate::lexer::Packet::nmea_body`]).
pub fn parse_sentence(body: &[u8], session: &mut Session, sink: &mut dyn ErrorSink) -> Mask {
    let Ok(text) = core::str::from_utf8(body) else {
        warn(sink, TAG, "sentence is not valid UTF-8".to_string());
        return Mask::ONLINE;
    };
    let fields = Fields::split(text);

    let Some((idx, entry)) = find_entry(&fields) else {
        data(sink, TAG, format!("no handler registered for {}", fields.tag()));
        return Mask::ONLINE;
    };

    if fields.count() < entry.min_fields {
        warn(
            sink,
            TAG,
            format!("{}: short sentence, need >= {} fields, got {}", fields.tag(), entry.min_fields, fields.count()),
        );
        return Mask::ONLINE;
    }

    session.nmea.latch_frac_time = false;
    let handler_mask = (entry.handler)(session, &fields, sink);

    let last_cycle_continue =
        session.nmea.lasttag.and_then(|i| DISPATCH.get(i)).map(|e| e.cycle_continue).unwrap_or(false);
    let cycle_bits = cycle::process(&mut session.nmea, idx, entry.cycle_continue, last_cycle_continue, handler_mask);

    handler_mask | cycle_bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, SessionMode, SessionOptions};
    use crate::sink::CollectingSink;

    #[test]
    fn s1_minimal_nmea_fix() {
        let ctx = Context::new();
        let mut session = Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: &ctx });
        let mut sink = CollectingSink::default();

        let m1 = parse_sentence(
            b"GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E",
            &mut session,
            &mut sink,
        );
        assert!(m1.contains(Mask::LATLON));

        let m2 = parse_sentence(
            b"GPGGA,081836,3751.65,S,14507.36,E,1,04,9.0,15.4,M,0.0,M,,",
            &mut session,
            &mut sink,
        );
        assert!(m2.contains(Mask::ALTITUDE));

        assert_eq!(session.newdata.status, crate::fix::FixStatus::Gps);
        assert_eq!(session.newdata.mode, crate::fix::FixMode::Fix3D);
        assert_eq!(session.newdata.alt_msl, 15.4);
        assert!((session.newdata.speed - 0.0).abs() < 1e-6);
        assert_eq!(session.newdata.track, 360.0);
        assert!((session.newdata.magnetic_var - 11.3).abs() < 1e-6);
    }

    #[test]
    fn unknown_tag_yields_online_only() {
        let ctx = Context::new();
        let mut session = Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: &ctx });
        let mut sink = CollectingSink::default();
        let m = parse_sentence(b"GPXYZ,1,2,3", &mut session, &mut sink);
        assert_eq!(m, Mask::ONLINE);
    }

    #[test]
    fn short_sentence_rejected_without_mutation() {
        let ctx = Context::new();
        let mut session = Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: &ctx });
        let mut sink = CollectingSink::default();
        let m = parse_sentence(b"GPRMC,081836", &mut session, &mut sink);
        assert_eq!(m, Mask::ONLINE);
        assert!(session.newdata.lat.is_nan());
    }

    // §8 boundary: a GSV set whose last sentence has < 4 SV groups (trailing
    // empty fields) is accepted without a spurious too-many-satellites error.
    #[test]
    fn gsv_short_final_part_accepted() {
        let ctx = Context::new();
        let mut session = Session::new(SessionOptions { mode: SessionMode::Passive, readonly: true, context: &ctx });
        let mut sink = CollectingSink::default();
        let m = parse_sentence(b"GPGSV,2,1,05,01,40,083,46,02,17,308,41,03,07,344,39,04,33,203,43", &mut session, &mut sink);
        assert!(!m.contains(Mask::SATELLITE));
        let m2 = parse_sentence(b"GPGSV,2,2,05,05,27,126,40,,,,,,,,", &mut session, &mut sink);
        assert!(m2.contains(Mask::SATELLITE));
        assert_eq!(session.skyview.satellites_visible, 5);
    }
}
