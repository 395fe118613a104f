//! §4.B — identifier tables: GNSS/signal id tables, NMEA talker maps, and
//! PRN <-> (gnssId, svId) conversions.
//!
//! Grounded on `ublox/src/ubx_packets/packets/cfg_gnss.rs`'s `GnssId` enum
//! and `nav_sat.rs`/`nav_sig.rs` field layout.

/// u-blox constellation identifier (glossary: gnssId).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum GnssId {
    #[default]
    Gps = 0,
    Sbas = 1,
    Galileo = 2,
    Beidou = 3,
    Imes = 4,
    Qzss = 5,
    Glonass = 6,
    NavIc = 7,
}

impl TryFrom<u8> for GnssId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => GnssId::Gps,
            1 => GnssId::Sbas,
            2 => GnssId::Galileo,
            3 => GnssId::Beidou,
            4 => GnssId::Imes,
            5 => GnssId::Qzss,
            6 => GnssId::Glonass,
            7 => GnssId::NavIc,
            _ => return Err(()),
        })
    }
}

/// NMEA talker ID, as used to pick a default constellation when the
/// sentence carries no explicit NMEA-4.10 `gnssId` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Talker {
    Gp,
    Gl,
    Ga,
    Gb,
    Gq,
    Gn,
    Gi,
    Bd,
    Pq,
    Qz,
    Other,
}

impl Talker {
    pub fn from_bytes(b: &[u8]) -> Talker {
        match b {
            b"GP" => Talker::Gp,
            b"GL" => Talker::Gl,
            b"GA" => Talker::Ga,
            b"GB" => Talker::Gb,
            b"GQ" => Talker::Gq,
            b"GN" => Talker::Gn,
            b"GI" => Talker::Gi,
            b"BD" => Talker::Bd,
            b"PQ" => Talker::Pq,
            b"QZ" => Talker::Qz,
            _ => Talker::Other,
        }
    }

    /// Default constellation implied by this talker, absent a more specific
    /// NMEA-4.10 gnssId field.
    pub fn default_gnss(self) -> Option<GnssId> {
        match self {
            Talker::Gp => Some(GnssId::Gps),
            Talker::Gl => Some(GnssId::Glonass),
            Talker::Ga => Some(GnssId::Galileo),
            Talker::Gb | Talker::Bd => Some(GnssId::Beidou),
            Talker::Gq | Talker::Qz => Some(GnssId::Qzss),
            Talker::Gi => Some(GnssId::NavIc),
            Talker::Gn | Talker::Pq | Talker::Other => None,
        }
    }
}

/// §4.B `prn_map`: (talker, local satellite number, optional NMEA-4.10
/// gnssId) -> (extended PRN, ubx gnssId, ubx svId).
///
/// Unknown/out-of-range combinations return `None` (PRN=0 at the caller,
/// per §4.B: "unknown ranges return PRN=0").
///
/// Open question (§9, documented rather than guessed): the BeiDou Quectel
/// range is accepted as `201..=264` (the wider of the two vendor-observed
/// ranges); firmware that only ever emits `201..=237` is a strict subset
/// and decodes identically.
pub fn prn_map(talker: Talker, satnum: u16, nmea_gnssid: Option<u8>) -> Option<(u16, GnssId, u8)> {
    let gnss = nmea_gnssid
        .and_then(|g| GnssId::try_from(g).ok())
        .or_else(|| talker.default_gnss())?;

    match gnss {
        GnssId::Gps if (1..=32).contains(&satnum) => Some((satnum, GnssId::Gps, satnum as u8)),
        GnssId::Sbas if (33..=64).contains(&satnum) => {
            let svid = (satnum - 33 + 120) as u8;
            Some((satnum, GnssId::Sbas, svid))
        },
        GnssId::Glonass if (65..=96).contains(&satnum) => {
            Some((satnum, GnssId::Glonass, (satnum - 64) as u8))
        },
        GnssId::Qzss if (193..=202).contains(&satnum) => {
            Some((satnum, GnssId::Qzss, (satnum - 192) as u8))
        },
        GnssId::Beidou if (1..=37).contains(&satnum) => {
            Some((satnum + 400, GnssId::Beidou, satnum as u8))
        },
        // Quectel quirk: some firmwares report BeiDou PRNs already offset into 201..264.
        GnssId::Beidou if (201..=264).contains(&satnum) => {
            let svid = (satnum - 200) as u8;
            Some((satnum + 200, GnssId::Beidou, svid))
        },
        GnssId::Galileo if (1..=36).contains(&satnum) => {
            Some((satnum + 300, GnssId::Galileo, satnum as u8))
        },
        // Quectel quirk: Galileo PRNs sometimes reported in 101..136.
        GnssId::Galileo if (101..=136).contains(&satnum) => {
            let svid = (satnum - 100) as u8;
            Some((satnum + 200, GnssId::Galileo, svid))
        },
        GnssId::NavIc if (1..=10).contains(&satnum) => {
            Some((satnum + 499, GnssId::NavIc, satnum as u8))
        },
        _ => None,
    }
}

/// §4.B `ubx_to_prn`: inverse of [`prn_map`] — recovers (extended PRN,
/// gnssId, svId) from a single extended-PRN scalar, with the same quirk
/// ranges honored.
pub fn ubx_to_prn(extended_prn: u16) -> Option<(u16, GnssId, u8)> {
    match extended_prn {
        1..=32 => Some((extended_prn, GnssId::Gps, extended_prn as u8)),
        33..=64 => {
            let svid = (extended_prn - 33 + 120) as u8;
            Some((extended_prn, GnssId::Sbas, svid))
        },
        65..=96 => Some((extended_prn, GnssId::Glonass, (extended_prn - 64) as u8)),
        193..=202 => Some((extended_prn, GnssId::Qzss, (extended_prn - 192) as u8)),
        301..=336 => Some((extended_prn, GnssId::Galileo, (extended_prn - 300) as u8)),
        401..=464 => Some((extended_prn, GnssId::Beidou, (extended_prn - 400) as u8)),
        500..=509 => Some((extended_prn, GnssId::NavIc, (extended_prn - 499) as u8)),
        _ => None,
    }
}

/// §4.B `nmea_sigid_to_ubx`: 7x12 table, entry 99 meaning "unknown" -> 0.
/// Row index is [`GnssId`] as `u8` (0..=6, GLONASS inclusive); NavIc has no
/// NMEA-4.10 signal table entry and always maps to 0.
const SIGID_TABLE: [[u8; 12]; 7] = {
    let mut t = [[99u8; 12]; 7];
    t[GnssId::Gps as usize][0] = 0; // L1 C/A
    t[GnssId::Gps as usize][5] = 3; // L2 CL
    t[GnssId::Gps as usize][6] = 4; // L2 CM
    t[GnssId::Gps as usize][7] = 6; // L5 I
    t[GnssId::Gps as usize][8] = 7; // L5 Q
    t[GnssId::Sbas as usize][0] = 0;
    t[GnssId::Galileo as usize][0] = 0; // E1 C
    t[GnssId::Galileo as usize][1] = 1; // E1 B
    t[GnssId::Galileo as usize][3] = 3; // E5a I
    t[GnssId::Galileo as usize][4] = 4; // E5a Q
    t[GnssId::Galileo as usize][5] = 5; // E5b I
    t[GnssId::Galileo as usize][6] = 6; // E5b Q
    t[GnssId::Beidou as usize][0] = 0; // B1I D1
    t[GnssId::Beidou as usize][1] = 1; // B1I D2
    t[GnssId::Beidou as usize][4] = 3; // B2I D1
    t[GnssId::Beidou as usize][5] = 4; // B2I D2
    t[GnssId::Qzss as usize][0] = 0; // L1 C/A
    t[GnssId::Qzss as usize][4] = 4; // L2 CM
    t[GnssId::Qzss as usize][5] = 5; // L2 CL
    t[GnssId::Glonass as usize][0] = 0; // L1 OF
    t[GnssId::Glonass as usize][2] = 2; // L2 OF
    t
};

pub fn nmea_sigid_to_ubx(gnss: GnssId, nmea_sigid: u8) -> u8 {
    let row = gnss as usize;
    if row >= SIGID_TABLE.len() || nmea_sigid as usize >= SIGID_TABLE[row].len() {
        return 0;
    }
    let v = SIGID_TABLE[row][nmea_sigid as usize];
    if v == 99 {
        0
    } else {
        v
    }
}

/// §4.B `sigid2obs`: RINEX-3 observation code for a (gnssId, sigId) pair.
/// Small table; unmapped combinations return an empty code.
pub fn sigid2obs(gnss: GnssId, sigid: u8) -> &'static str {
    match (gnss, sigid) {
        (GnssId::Gps, 0) => "1C",
        (GnssId::Gps, 3) => "2L",
        (GnssId::Gps, 4) => "2S",
        (GnssId::Gps, 6) => "5I",
        (GnssId::Gps, 7) => "5Q",
        (GnssId::Galileo, 0) => "1C",
        (GnssId::Galileo, 3) => "5I",
        (GnssId::Galileo, 4) => "5Q",
        (GnssId::Glonass, 0) => "1C",
        (GnssId::Glonass, 2) => "2C",
        (GnssId::Beidou, 0) => "2I",
        (GnssId::Beidou, 3) => "7I",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_identity_mapping() {
        assert_eq!(prn_map(Talker::Gp, 5, None), Some((5, GnssId::Gps, 5)));
        assert_eq!(ubx_to_prn(5), Some((5, GnssId::Gps, 5)));
    }

    #[test]
    fn sbas_offset_mapping() {
        assert_eq!(prn_map(Talker::Gn, 33, Some(1)), Some((33, GnssId::Sbas, 120)));
        assert_eq!(ubx_to_prn(33), Some((33, GnssId::Sbas, 120)));
    }

    #[test]
    fn unknown_range_is_none() {
        assert_eq!(prn_map(Talker::Gp, 200, None), None);
        assert_eq!(ubx_to_prn(9999), None);
    }

    #[test]
    fn sigid_unknown_entry_is_zero() {
        assert_eq!(nmea_sigid_to_ubx(GnssId::NavIc, 0), 0);
        assert_eq!(nmea_sigid_to_ubx(GnssId::Gps, 1), 0);
    }

    // §8 property 9: prn_map is a partial bijection on its defined domain.
    #[test]
    fn prn_map_round_trips_on_defined_domain() {
        let cases: &[(Talker, u16, Option<u8>)] = &[
            (Talker::Gp, 1, None),
            (Talker::Gp, 32, None),
            (Talker::Gn, 33, Some(1)),
            (Talker::Gn, 64, Some(1)),
            (Talker::Gl, 65, None),
            (Talker::Gl, 96, None),
            (Talker::Ga, 1, None),
            (Talker::Ga, 36, None),
            (Talker::Gb, 1, Some(3)),
            (Talker::Gb, 37, Some(3)),
            (Talker::Gq, 193, None),
            (Talker::Gi, 1, Some(7)),
        ];
        for &(talker, satnum, gnssid) in cases {
            let (ext, _, _) = prn_map(talker, satnum, gnssid).expect("defined slot");
            let (ext2, gnss2, svid2) = ubx_to_prn(ext).expect("inverse defined");
            assert_eq!(ext, ext2);
            let (ext3, gnss3, svid3) = prn_map(talker, satnum, gnssid).unwrap();
            assert_eq!(ext3, ext);
            assert_eq!((gnss2, svid2), (gnss3, svid3));
        }
    }
}
