// PlastiWatch V2 - Event Log Storage Backends
//
// An array of equally sized, independently erasable pages of 32-bit words.
// Erased words read as `EMPTY_WORD`; a write can only clear bits, the same
// as NOR flash. Backends never report errors: writes may come from a fault
// handler, so failures are swallowed and show up as missing records.

mod ram;
pub use ram::RamStorage;

#[cfg(target_os = "espidf")]
mod flash;
#[cfg(target_os = "espidf")]
pub use flash::FlashStorage;

/// Value of an erased word.
pub const EMPTY_WORD: u32 = 0xffff_ffff;

pub trait EventLogStorage {
    /// Number of pages. Fixed for the lifetime of the backend.
    fn pages_count(&self) -> usize;

    /// Words per page, header included. Identical for every page.
    fn page_size(&self) -> usize;

    /// Erase `page`, setting every word to `EMPTY_WORD`.
    fn erase(&mut self, page: usize);

    /// Program one word. Only clears bits already set.
    fn write(&mut self, page: usize, word_offset: usize, value: u32);

    /// Read one word, or `EMPTY_WORD` when it cannot be read.
    fn read(&self, page: usize, word_offset: usize) -> u32;
}
