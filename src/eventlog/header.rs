//! Page header word.
//!
//! Bits `[31:24]` hold the format version, `[23:16]` the header size in words
//! and `[15:0]` the page sequence number.

use crate::config::CURRENT_VERSION;

/// Word offset of the header inside every page.
pub const HEADER_WORD: usize = 0;

const VERSION_SHIFT: u32 = 24;
const VERSION_MASK: u32 = 0xff;
const HEADER_SIZE_SHIFT: u32 = 16;
const HEADER_SIZE_MASK: u32 = 0xff;
const PAGE_NUMBER_SHIFT: u32 = 0;
const PAGE_NUMBER_MASK: u32 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub version: u8,
    pub header_size: u8,
    pub page_number: u16,
}

impl PageHeader {
    /// Header for a page initialised by this firmware version.
    pub const fn new(header_size: u8, page_number: u16) -> Self {
        Self {
            version: CURRENT_VERSION,
            header_size,
            page_number,
        }
    }

    pub const fn encode(self) -> u32 {
        ((self.version as u32 & VERSION_MASK) << VERSION_SHIFT)
            | ((self.header_size as u32 & HEADER_SIZE_MASK) << HEADER_SIZE_SHIFT)
            | ((self.page_number as u32 & PAGE_NUMBER_MASK) << PAGE_NUMBER_SHIFT)
    }

    pub const fn decode(word: u32) -> Self {
        Self {
            version: ((word >> VERSION_SHIFT) & VERSION_MASK) as u8,
            header_size: ((word >> HEADER_SIZE_SHIFT) & HEADER_SIZE_MASK) as u8,
            page_number: ((word >> PAGE_NUMBER_SHIFT) & PAGE_NUMBER_MASK) as u16,
        }
    }
}
