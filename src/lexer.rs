//! §4.D — the protocol-agnostic packet lexer/framer.
//!
//! A single-threaded, cooperative byte-stream state machine: `feed` takes
//! whatever bytes the `Transport` handed over and returns the framed,
//! checksum-validated packets it could make out of them, buffering any
//! partial packet for the next call. Grounded on `ublox/src/parser.rs`
//! (iterator-driven `feed`/`UbxParserIter`) and the older
//! `ublox/src/protocol.rs` (`parse_buffer`/`BufferHeadContents`)
//! resync-on-garbage style, plus `ublox/src/parser/checksum.rs`'s
//! incremental `UbxChecksumCalc`.

use crate::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Nmea,
    Ubx,
}

/// A framed, checksum-validated packet. `bytes` holds the full frame
/// (sync chars through checksum/terminator inclusive) so a caller that
/// just wants to log raw traffic doesn't need to reconstruct it.
#[derive(Debug, Clone)]
pub struct Packet {
    pub protocol: Protocol,
    pub bytes: Vec<u8>,
}

impl Packet {
    /// For NMEA packets, the sentence body with the leading `$`/`!` and
    /// the trailing `*HH\r\n` stripped.
    pub fn nmea_body(&self) -> &[u8] {
        debug_assert_eq!(self.protocol, Protocol::Nmea);
        let end = self.bytes.iter().position(|&b| b == b'*').unwrap_or(self.bytes.len());
        &self.bytes[1..end]
    }

    /// For UBX packets, `(class, id, payload)`.
    pub fn ubx_parts(&self) -> (u8, u8, &[u8]) {
        debug_assert_eq!(self.protocol, Protocol::Ubx);
        let class = self.bytes[2];
        let id = self.bytes[3];
        let len = getleu16(&self.bytes, 4) as usize;
        (class, id, &self.bytes[6..6 + len])
    }
}

fn getleu16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    NmeaBody,
    NmeaStar,
    NmeaCksumHi,
    NmeaCksumLo,
    NmeaCr,
    UbxSync2,
    UbxHeader,
    UbxBody,
    UbxCkA,
    UbxCkB,
}

/// Incremental Fletcher-8 checksum calculator, streaming byte-by-byte as
/// the lexer consumes a UBX body (grounded on `UbxChecksumCalc`).
#[derive(Default)]
struct Fletcher8 {
    ck_a: u8,
    ck_b: u8,
}

impl Fletcher8 {
    fn update(&mut self, byte: u8) {
        self.ck_a = self.ck_a.wrapping_add(byte);
        self.ck_b = self.ck_b.wrapping_add(self.ck_a);
    }
}

pub struct Lexer {
    state: State,
    scratch: Vec<u8>,
    ubx_len: usize,
    ubx_sum: Fletcher8,
    nmea_sum: u8,
    nmea_expect: u8,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Lexer {
            state: State::Ground,
            scratch: Vec::new(),
            ubx_len: 0,
            ubx_sum: Fletcher8::default(),
            nmea_sum: 0,
            nmea_expect: 0,
        }
    }

    /// Feed newly-arrived bytes; returns every packet completed as a
    /// result. On a framing failure (bad checksum, over-length, or a
    /// byte that doesn't fit the current state) the lexer resets to
    /// `Ground` and attempts to resync from the very next byte — it never
    /// consumes more than necessary (§4.D).
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Packet> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(p) = self.feed_byte(b) {
                out.push(p);
            }
        }
        out
    }

    fn reset(&mut self) {
        self.state = State::Ground;
        self.scratch.clear();
        self.ubx_len = 0;
        self.ubx_sum = Fletcher8::default();
        self.nmea_sum = 0;
    }

    fn feed_byte(&mut self, b: u8) -> Option<Packet> {
        match self.state {
            State::Ground => {
                if b == NMEA_SYNC_CHAR || b == NMEA_ALT_SYNC_CHAR {
                    self.scratch.clear();
                    self.scratch.push(b);
                    self.nmea_sum = 0;
                    self.state = State::NmeaBody;
                } else if b == UBX_SYNC_CHAR_1 {
                    self.scratch.clear();
                    self.scratch.push(b);
                    self.state = State::UbxSync2;
                }
                None
            },
            State::UbxSync2 => {
                if b == UBX_SYNC_CHAR_2 {
                    self.scratch.push(b);
                    self.state = State::UbxHeader;
                } else if b == UBX_SYNC_CHAR_1 {
                    // stay, in case of B5 B5 62
                    self.scratch.clear();
                    self.scratch.push(b);
                } else {
                    self.reset();
                }
                None
            },
            State::UbxHeader => {
                self.scratch.push(b);
                if self.scratch.len() == UBX_HEADER_LEN {
                    self.ubx_len = getleu16(&self.scratch, 4) as usize;
                    self.ubx_sum = Fletcher8::default();
                    for &hb in &self.scratch[2..6] {
                        self.ubx_sum.update(hb);
                    }
                    self.state = if self.ubx_len == 0 { State::UbxCkA } else { State::UbxBody };
                }
                None
            },
            State::UbxBody => {
                self.scratch.push(b);
                self.ubx_sum.update(b);
                if self.scratch.len() == UBX_HEADER_LEN + self.ubx_len {
                    self.state = State::UbxCkA;
                }
                None
            },
            State::UbxCkA => {
                self.scratch.push(b);
                self.state = State::UbxCkB;
                None
            },
            State::UbxCkB => {
                self.scratch.push(b);
                let got_a = self.scratch[self.scratch.len() - 2];
                let got_b = self.scratch[self.scratch.len() - 1];
                let ok = got_a == self.ubx_sum.ck_a && got_b == self.ubx_sum.ck_b;
                let packet =
                    if ok { Some(Packet { protocol: Protocol::Ubx, bytes: self.scratch.clone() }) } else { None };
                self.reset();
                packet
            },
            State::NmeaBody => {
                if b == NMEA_END_CHAR_1 && self.looks_like_bare_skytraq() {
                    // Bare `$STI,...` with no `*checksum` (Skytraq quirk, §4.D).
                    self.scratch.push(b);
                    let bytes = std::mem::take(&mut self.scratch);
                    self.reset();
                    return Some(Packet { protocol: Protocol::Nmea, bytes });
                }
                if b == b'*' {
                    self.scratch.push(b);
                    self.state = State::NmeaStar;
                } else if b == NMEA_END_CHAR_1 || b == NMEA_END_CHAR_2 {
                    self.reset();
                } else {
                    self.scratch.push(b);
                    self.nmea_sum ^= b;
                    if self.scratch.len() > NMEA_MAX {
                        // Over-length packet: discard and return to Ground (§4.D).
                        self.reset();
                    }
                }
                None
            },
            State::NmeaStar => {
                self.scratch.push(b);
                if !b.is_ascii_hexdigit() {
                    self.reset();
                    return None;
                }
                self.nmea_expect = hex_val(b);
                self.state = State::NmeaCksumHi;
                None
            },
            State::NmeaCksumHi => {
                self.scratch.push(b);
                if !b.is_ascii_hexdigit() {
                    self.reset();
                    return None;
                }
                self.nmea_expect = (self.nmea_expect << 4) | hex_val(b);
                self.state = State::NmeaCksumLo;
                None
            },
            State::NmeaCksumLo => {
                if b == NMEA_END_CHAR_1 {
                    self.scratch.push(b);
                    self.state = State::NmeaCr;
                } else if b == NMEA_END_CHAR_2 {
                    self.finish_nmea()
                } else {
                    self.reset();
                    None
                }
            },
            State::NmeaCr => {
                if b == NMEA_END_CHAR_2 {
                    self.scratch.push(b);
                    self.finish_nmea()
                } else {
                    self.reset();
                    None
                }
            },
        }
    }

    fn finish_nmea(&mut self) -> Option<Packet> {
        let ok = self.nmea_sum == self.nmea_expect;
        let packet =
            if ok { Some(Packet { protocol: Protocol::Nmea, bytes: self.scratch.clone() }) } else { None };
        self.reset();
        packet
    }

    /// Heuristic for the documented bare-`$STI` quirk: a body that starts
    /// with `STI,` and contains no `*` is treated as a checksum-less
    /// Skytraq sentence terminated by a bare `\r` (no `\n` required).
    fn looks_like_bare_skytraq(&self) -> bool {
        self.scratch.len() >= 5 && self.scratch[1..].starts_with(b"STI,") && !self.scratch.contains(&b'*')
    }
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

/// §6: Fletcher-8 checksum for an outbound UBX frame, and the encoder used
/// by `cfgmachine::ubx_write`.
pub fn ubx_checksum(class_through_payload: &[u8]) -> (u8, u8) {
    let mut calc = Fletcher8::default();
    for &b in class_through_payload {
        calc.update(b);
    }
    (calc.ck_a, calc.ck_b)
}

pub fn ubx_write(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.push(UBX_SYNC_CHAR_1);
    frame.push(UBX_SYNC_CHAR_2);
    frame.push(class);
    frame.push(id);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    let (a, b) = ubx_checksum(&frame[2..]);
    frame.push(a);
    frame.push(b);
    frame
}

/// §6: XOR checksum over bytes strictly between `$`/`!` and `*`, for
/// outbound NMEA sentences (`$PMTK324,...`, `$PQVERNO,R`).
pub fn nmea_checksum(body_without_dollar: &[u8]) -> u8 {
    body_without_dollar.iter().fold(0u8, |acc, &b| acc ^ b)
}

pub fn nmea_write(body: &str) -> Vec<u8> {
    let cksum = nmea_checksum(body.as_bytes());
    let mut out = Vec::with_capacity(body.len() + 6);
    out.push(b'$');
    out.extend_from_slice(body.as_bytes());
    out.push(b'*');
    out.extend_from_slice(format!("{cksum:02X}").as_bytes());
    out.push(b'\r');
    out.push(b'\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_s1_minimal_nmea() {
        let mut lex = Lexer::new();
        let pkts = lex.feed(
            b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62\r\n",
        );
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].protocol, Protocol::Nmea);
    }

    #[test]
    fn rejects_bad_checksum_then_resyncs() {
        let mut lex = Lexer::new();
        let mut stream = Vec::new();
        stream.extend_from_slice(b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*00\r\n");
        stream.extend_from_slice(b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62\r\n");
        let pkts = lex.feed(&stream);
        assert_eq!(pkts.len(), 1, "bad-checksum packet must be dropped, good one kept");
    }

    #[test]
    fn nmea_max_boundary() {
        // Build a sentence body exactly NMEA_MAX bytes long (terminator included).
        let filler = "A".repeat(NMEA_MAX - 1 - 5); // "$" + filler + "*HH\r\n"
        let body = format!("${filler}");
        let cksum = nmea_checksum(&body.as_bytes()[1..]);
        let sentence = format!("{body}*{cksum:02X}\r\n");
        assert_eq!(sentence.len(), NMEA_MAX);
        let mut lex = Lexer::new();
        let pkts = lex.feed(sentence.as_bytes());
        assert_eq!(pkts.len(), 1);

        let over = format!("{sentence}X"); // push one more sentence byte -> still frames fine after it
        let mut lex2 = Lexer::new();
        // Feed an over-long sentence body (no terminator) to force the over-length path.
        let long_body = "B".repeat(NMEA_MAX + 5);
        let long = format!("${long_body}*00\r\n");
        let pkts2 = lex2.feed(long.as_bytes());
        assert!(pkts2.is_empty());
        let _ = over;
    }

    #[test]
    fn ubx_zero_length_payload_accepted() {
        let frame = ubx_write(0x05, 0x01, &[]);
        let mut lex = Lexer::new();
        let pkts = lex.feed(&frame);
        assert_eq!(pkts.len(), 1);
        let (class, id, payload) = pkts[0].ubx_parts();
        assert_eq!((class, id), (0x05, 0x01));
        assert!(payload.is_empty());
    }

    #[test]
    fn ubx_write_roundtrips_through_lexer() {
        let frame = ubx_write(0x01, 0x07, &[1, 2, 3, 4]);
        let mut lex = Lexer::new();
        let pkts = lex.feed(&frame);
        assert_eq!(pkts.len(), 1);
        let (class, id, payload) = pkts[0].ubx_parts();
        assert_eq!((class, id, payload), (0x01, 0x07, &[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn discards_garbage_prefix_before_ubx_sync() {
        let mut stream = vec![0x00, 0xff, 0x13];
        stream.extend_from_slice(&ubx_write(0x0a, 0x04, &[9, 9]));
        let mut lex = Lexer::new();
        let pkts = lex.feed(&stream);
        assert_eq!(pkts.len(), 1);
    }
}
