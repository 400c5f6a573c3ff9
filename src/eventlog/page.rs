//! One physical page of the log, seen through its header.

use crate::storage::{EventLogStorage, EMPTY_WORD};

use super::header::{PageHeader, HEADER_WORD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    storage_index: usize,
    page_number: u16,
    header_size: u8,
}

impl Page {
    /// Page described by the header currently stored in `storage_index`.
    pub fn load<S: EventLogStorage>(storage: &S, storage_index: usize) -> Self {
        let header = PageHeader::decode(storage.read(storage_index, HEADER_WORD));
        Self {
            storage_index,
            page_number: header.page_number,
            header_size: header.header_size,
        }
    }

    /// Page that will carry `page_number` once `initialise` writes its header.
    pub fn fresh(storage_index: usize, page_number: u16, header_size: u8) -> Self {
        Self {
            storage_index,
            page_number,
            header_size,
        }
    }

    pub fn storage_index(&self) -> usize {
        self.storage_index
    }

    pub fn number(&self) -> u16 {
        self.page_number
    }

    pub fn header_size(&self) -> u8 {
        self.header_size
    }

    /// Write the header word. The page must be erased.
    pub fn initialise<S: EventLogStorage>(&self, storage: &mut S) {
        let header = PageHeader::new(self.header_size, self.page_number);
        storage.write(self.storage_index, HEADER_WORD, header.encode());
    }

    pub fn erase<S: EventLogStorage>(&self, storage: &mut S) {
        storage.erase(self.storage_index);
    }

    pub fn is_empty<S: EventLogStorage>(&self, storage: &S) -> bool {
        (0..storage.page_size()).all(|word| storage.read(self.storage_index, word) == EMPTY_WORD)
    }

    /// Record slots after the header.
    pub fn capacity<S: EventLogStorage>(&self, storage: &S) -> usize {
        storage.page_size().saturating_sub(self.header_size as usize)
    }

    /// Record at `event_index`, or `EMPTY_WORD` past the end of the page.
    pub fn read<S: EventLogStorage>(&self, storage: &S, event_index: usize) -> u32 {
        if event_index >= self.capacity(storage) {
            return EMPTY_WORD;
        }
        storage.read(self.storage_index, self.header_size as usize + event_index)
    }

    /// Program the record at `event_index`. Returns `false` if it does not fit.
    pub fn write<S: EventLogStorage>(&self, storage: &mut S, event_index: usize, word: u32) -> bool {
        if event_index >= self.capacity(storage) {
            return false;
        }
        storage.write(self.storage_index, self.header_size as usize + event_index, word);
        true
    }

    /// True once no more than `reserve` record slots remain after `event_index`.
    pub fn is_full_enough<S: EventLogStorage>(&self, storage: &S, event_index: usize, reserve: usize) -> bool {
        self.header_size as usize + event_index + reserve >= storage.page_size()
    }

    /// Step to the next physical page.
    ///
    /// The sequence number is carried forward rather than read back, so a
    /// stale or erased header never breaks the ordering of a walk. The header
    /// size is always taken from the stored header.
    pub fn advance<S: EventLogStorage>(&mut self, storage: &S) {
        self.page_number = self.page_number.wrapping_add(1);
        self.storage_index = (self.storage_index + 1) % storage.pages_count();
        self.header_size = PageHeader::decode(storage.read(self.storage_index, HEADER_WORD)).header_size;
    }
}
