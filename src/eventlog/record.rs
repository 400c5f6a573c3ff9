//! Event record codec.
//!
//! Every record is one 32-bit word, tagged by its high bits:
//!
//! | range                     | kind                                  |
//! |---------------------------|---------------------------------------|
//! | `0x00000000..=0x7fffffff` | Unix time anchor, 31-bit seconds      |
//! | `0x80000000..=0x80ffffff` | time diff, 24-bit milliseconds        |
//! | `0x81000000..=0x81ffffff` | simple event, 24-bit enumerant        |
//! | `0x82000000..=0x82ffffff` | 8-bit subtype + 16-bit data           |
//! | `0x83000000..=0xfffffffe` | unused, invalid                       |
//!
//! `0xffffffff` is an erased slot.

use std::fmt;

use crate::events::{Event16Kind, SimpleEvent};
use crate::storage::EMPTY_WORD;

const UNIX_TIME_FLAG: u32 = 0x8000_0000;
pub const UNIX_TIME_MAX: u32 = 0x7fff_ffff;

const TYPE_SHIFT: u32 = 24;
const TIME_DIFF_TYPE: u32 = 0x80;
const SIMPLE_EVENT_TYPE: u32 = 0x81;
const EVENT16_TYPE: u32 = 0x82;

pub const TIME_DIFF_MAX: u32 = 0x00ff_ffff;
const SIMPLE_EVENT_MASK: u32 = 0x00ff_ffff;
const EVENT16_SUBTYPE_SHIFT: u32 = 16;
const EVENT16_SUBTYPE_MASK: u32 = 0xff;
const EVENT16_VALUE_MASK: u32 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Seconds since the Unix epoch (31 bits, good until 2038).
    UnixTime(u32),
    /// Milliseconds since the previous anchor or diff (24 bits, ~4.6 hours).
    TimeDiff(u32),
    /// Payload-less event (24-bit enumerant).
    Simple(u32),
    /// Subtyped event carrying 16 bits of data.
    Event16 { kind: u8, data: u16 },
}

/// Outcome of decoding one stored word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Erased slot, nothing written here.
    Absent,
    /// Tag not recognised. Only reported, never repaired.
    Invalid(u32),
    Valid(Record),
}

impl Record {
    pub fn simple(event: SimpleEvent) -> Self {
        Self::Simple(event as u32)
    }

    pub fn event16(kind: Event16Kind, data: u16) -> Self {
        Self::Event16 { kind: kind as u8, data }
    }

    /// Pack into a record word. Payloads wider than their field are masked.
    pub fn encode(self) -> u32 {
        match self {
            Self::UnixTime(seconds) => seconds & UNIX_TIME_MAX,
            Self::TimeDiff(millis) => (TIME_DIFF_TYPE << TYPE_SHIFT) | (millis & TIME_DIFF_MAX),
            Self::Simple(event) => (SIMPLE_EVENT_TYPE << TYPE_SHIFT) | (event & SIMPLE_EVENT_MASK),
            Self::Event16 { kind, data } => {
                (EVENT16_TYPE << TYPE_SHIFT)
                    | ((kind as u32 & EVENT16_SUBTYPE_MASK) << EVENT16_SUBTYPE_SHIFT)
                    | (data as u32 & EVENT16_VALUE_MASK)
            }
        }
    }

    pub fn decode(word: u32) -> Decoded {
        if word == EMPTY_WORD {
            return Decoded::Absent;
        }
        if word & UNIX_TIME_FLAG == 0 {
            return Decoded::Valid(Self::UnixTime(word));
        }
        let record = match word >> TYPE_SHIFT {
            TIME_DIFF_TYPE => Self::TimeDiff(word & TIME_DIFF_MAX),
            SIMPLE_EVENT_TYPE => Self::Simple(word & SIMPLE_EVENT_MASK),
            EVENT16_TYPE => Self::Event16 {
                kind: ((word >> EVENT16_SUBTYPE_SHIFT) & EVENT16_SUBTYPE_MASK) as u8,
                data: (word & EVENT16_VALUE_MASK) as u16,
            },
            _ => return Decoded::Invalid(word),
        };
        Decoded::Valid(record)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnixTime(seconds) => write!(f, "time {}s", seconds),
            Self::TimeDiff(millis) => write!(f, "+{}ms", millis),
            Self::Simple(event) => match SimpleEvent::try_from(event) {
                Ok(event) => f.write_str(event.name()),
                Err(raw) => write!(f, "simple #{}", raw),
            },
            Self::Event16 { kind, data } => match Event16Kind::try_from(kind) {
                Ok(Event16Kind::TempUc) => write!(f, "{}={}", Event16Kind::TempUc.name(), data as i16),
                Ok(kind) => write!(f, "{}={}", kind.name(), data),
                Err(raw) => write!(f, "event16 #{}={}", raw, data),
            },
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("empty"),
            Self::Invalid(word) => write!(f, "invalid {:08x}", word),
            Self::Valid(record) => fmt::Display::fmt(record, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_documented_bit_layout() {
        assert_eq!(Record::UnixTime(1_700_000_000).encode(), 1_700_000_000);
        assert_eq!(Record::TimeDiff(1500).encode(), 0x8000_05dc);
        assert_eq!(Record::simple(SimpleEvent::ChargeStart).encode(), 0x8100_0005);
        assert_eq!(Record::event16(Event16Kind::VccData, 3700).encode(), 0x8200_0e74);
        assert_eq!(Record::Event16 { kind: 0xab, data: 0x1234 }.encode(), 0x82ab_1234);
    }

    #[test]
    fn masks_oversized_payloads() {
        assert_eq!(Record::UnixTime(0xffff_ffff).encode(), 0x7fff_ffff);
        assert_eq!(Record::TimeDiff(0x0100_0001).encode(), 0x8000_0001);
        assert_eq!(Record::Simple(0xff12_3456).encode(), 0x8112_3456);
    }

    #[test]
    fn empty_word_is_absent() {
        assert_eq!(Record::decode(EMPTY_WORD), Decoded::Absent);
    }

    #[test]
    fn unknown_tags_are_invalid() {
        for word in [0x8300_0000, 0x9000_0001, 0xfe00_0000, 0xffff_fffe] {
            assert_eq!(Record::decode(word), Decoded::Invalid(word));
        }
    }

    #[test]
    fn zero_word_is_epoch_anchor() {
        assert_eq!(Record::decode(0), Decoded::Valid(Record::UnixTime(0)));
    }

    #[test]
    fn display_names_known_events() {
        assert_eq!(Record::simple(SimpleEvent::WdtReset).to_string(), "wdt-reset");
        assert_eq!(Record::Simple(0x42).to_string(), "simple #66");
        assert_eq!(Record::event16(Event16Kind::TempUc, (-125i16) as u16).to_string(), "temp-decidegc=-125");
        assert_eq!(Record::TimeDiff(20).to_string(), "+20ms");
        assert_eq!(Record::decode(0x8300_0000).to_string(), "invalid 83000000");
    }
}
