//! §4.E field splitting: "replace commas between `$`/`!` and `*` with NUL;
//! record pointers/lengths to each field". Adapted to safe Rust as a
//! zero-copy `&str` split rather than an in-place NUL-patch, since we
//! don't need C-string interop here. The first field (`field(0)`) is the
//! full tag including the 2-char talker ID (e.g. `"GPRMC"`).
//!
//! Grounded on the comma-splitting idiom in the pack's NMEA parsers
//! (`youssefhabri-rust-nmea::parse`, `AeroRust-nmea::parser`), rewritten
//! without `nom` since the teacher crate doesn't depend on it.

pub struct Fields<'a> {
    parts: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    /// `body` is the sentence with leading `$`/`!` and trailing `*HH` (and
    /// CR/LF) already stripped — i.e. [`crate::lexer::Packet::nmea_body`]
    /// with the checksum suffix also removed by the caller.
    pub fn split(body: &'a str) -> Fields<'a> {
        Fields { parts: body.split(',').collect() }
    }

    /// Field 0: the tag, including the talker prefix.
    pub fn tag(&self) -> &'a str {
        self.parts.first().copied().unwrap_or("")
    }

    /// Talker ID: the first two ASCII characters of the tag, or empty for
    /// a too-short tag (e.g. a malformed sentence).
    pub fn talker(&self) -> &'a str {
        let tag = self.tag();
        if tag.len() >= 2 {
            &tag[..2]
        } else {
            tag
        }
    }

    /// Tag with the talker prefix stripped, e.g. `"GPRMC"` -> `"RMC"`.
    /// Proprietary (`$P...`) tags are returned unchanged since they carry
    /// no talker ID to strip.
    pub fn bare_tag(&self) -> &'a str {
        let tag = self.tag();
        if tag.starts_with('P') || tag.len() < 2 {
            tag
        } else {
            &tag[2..]
        }
    }

    /// Field `n`, or `""` for any field beyond what was actually present
    /// (§4.E: "unused trailing fields point at empty string").
    pub fn get(&self, n: usize) -> &'a str {
        self.parts.get(n).copied().unwrap_or("")
    }

    pub fn count(&self) -> usize {
        self.parts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_pads_missing_fields() {
        let f = Fields::split("GPRMC,081836,A,3751.65,S");
        assert_eq!(f.tag(), "GPRMC");
        assert_eq!(f.talker(), "GP");
        assert_eq!(f.bare_tag(), "RMC");
        assert_eq!(f.get(1), "081836");
        assert_eq!(f.get(99), "");
    }

    #[test]
    fn proprietary_tag_kept_whole() {
        let f = Fields::split("PSTI,030,1");
        assert_eq!(f.bare_tag(), "PSTI");
        assert_eq!(f.get(1), "030");
    }
}
