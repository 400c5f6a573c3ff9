// PlastiWatch V2 - RAM Storage Backend
//
// Volatile stand-in for the flash partition. Mirrors flash semantics
// (erase to all-ones, AND on write) so engine behaviour is identical.

use crate::config::{RAM_PAGES, RAM_WORDS_PER_PAGE};

use super::{EventLogStorage, EMPTY_WORD};

#[derive(Debug, Clone)]
pub struct RamStorage {
    words: Vec<u32>,
    pages_count: usize,
    page_size: usize,
}

impl RamStorage {
    pub fn new(pages_count: usize, page_size: usize) -> Self {
        Self {
            words: vec![EMPTY_WORD; pages_count * page_size],
            pages_count,
            page_size,
        }
    }

    fn offset(&self, page: usize, word_offset: usize) -> Option<usize> {
        (page < self.pages_count && word_offset < self.page_size)
            .then(|| page * self.page_size + word_offset)
    }
}

impl Default for RamStorage {
    fn default() -> Self {
        Self::new(RAM_PAGES, RAM_WORDS_PER_PAGE)
    }
}

impl EventLogStorage for RamStorage {
    fn pages_count(&self) -> usize {
        self.pages_count
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn erase(&mut self, page: usize) {
        if page < self.pages_count {
            let start = page * self.page_size;
            self.words[start..start + self.page_size].fill(EMPTY_WORD);
        }
    }

    fn write(&mut self, page: usize, word_offset: usize, value: u32) {
        if let Some(i) = self.offset(page, word_offset) {
            self.words[i] &= value;
        }
    }

    fn read(&self, page: usize, word_offset: usize) -> u32 {
        self.offset(page, word_offset)
            .map_or(EMPTY_WORD, |i| self.words[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_erased() {
        let storage = RamStorage::new(2, 8);
        assert!((0..2).all(|p| (0..8).all(|w| storage.read(p, w) == EMPTY_WORD)));
    }

    #[test]
    fn write_only_clears_bits() {
        let mut storage = RamStorage::new(2, 8);
        storage.write(1, 3, 0x0000_ff0f);
        storage.write(1, 3, 0xffff_00ff);
        assert_eq!(storage.read(1, 3), 0x0000_000f);
    }

    #[test]
    fn erase_restores_one_page_only() {
        let mut storage = RamStorage::new(2, 8);
        storage.write(0, 0, 0);
        storage.write(1, 0, 0);
        storage.erase(1);
        assert_eq!(storage.read(0, 0), 0);
        assert_eq!(storage.read(1, 0), EMPTY_WORD);
    }

    #[test]
    fn out_of_range_access_is_ignored() {
        let mut storage = RamStorage::new(2, 8);
        storage.write(2, 0, 0);
        storage.write(0, 8, 0);
        storage.erase(5);
        assert_eq!(storage.read(0, 8), EMPTY_WORD);
        assert_eq!(storage.read(9, 0), EMPTY_WORD);
        assert_eq!(storage.read(1, 0), EMPTY_WORD);
    }
}
