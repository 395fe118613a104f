//! Wire-level constants shared by the lexer and decoders.

pub const UBX_SYNC_CHAR_1: u8 = 0xb5;
pub const UBX_SYNC_CHAR_2: u8 = 0x62;
pub(crate) const UBX_HEADER_LEN: usize = 6; // sync(2) + class(1) + id(1) + len_le(2)
pub(crate) const UBX_CHECKSUM_LEN: usize = 2;

pub const NMEA_SYNC_CHAR: u8 = b'$';
pub const NMEA_ALT_SYNC_CHAR: u8 = b'!';
pub const NMEA_END_CHAR_1: u8 = b'\r';
pub const NMEA_END_CHAR_2: u8 = b'\n';

/// Normal NMEA 0183 sentence length limit, checksum and terminator included.
pub const NMEA_MAX_NORMAL: usize = 82;
/// Tolerated maximum, to accommodate long Skytraq `$PSTI` sentences (§4.D).
pub const NMEA_MAX: usize = 105;

/// Maximum channel count a `SkyView` can hold (§3).
pub const MAXCHANNELS: usize = 140;

/// New-epoch threshold for both NMEA fractional-time and UBX iTOW deltas (§4.E, §4.F).
pub const EPOCH_STEP_THRESHOLD_MS: i64 = 10;

/// UBX iTOW wraps at end-of-week; a delta this large must still mean "new epoch",
/// never be treated as a plain forward jump (§8 boundary behavior).
pub const UBX_WEEK_MS: i64 = 604_800_000;

/// NMEA epoch cycle-ender bitset size: one bit per distinct sentence tag the
/// dispatch table can register (§4.E `cycleEnders: BitSet`).
pub const NMEA_NUM: usize = 64;
