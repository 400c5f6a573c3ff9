//! Read positions over the page ring.

use std::fmt;

use crate::storage::{EventLogStorage, EMPTY_WORD};

use super::page::Page;

/// Rotation-independent offset of a record: `page_number * page_size + event_index`.
///
/// Physical slots repeat after every lap of the ring, positions do not (within
/// the 2^16-page window of the sequence counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(u32);

impl Position {
    pub fn new(page_number: u16, page_size: usize, event_index: usize) -> Self {
        Self((page_number as u32).wrapping_mul(page_size as u32).wrapping_add(event_index as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A position inside one page of the log.
///
/// Cursors hold no borrow of the storage, so a reader can keep one across
/// appends and rotations and resume later against the current `end()`.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    page: Page,
    event_index: usize,
    page_size: usize,
}

impl Cursor {
    pub(super) fn at(page: Page, event_index: usize, page_size: usize) -> Self {
        Self {
            page,
            event_index,
            page_size,
        }
    }

    /// Cursor at the first record of `page`, moved forward past empty pages.
    pub(super) fn start<S: EventLogStorage>(storage: &S, page: Page, end: &Cursor) -> Self {
        let mut cursor = Self::at(page, 0, storage.page_size());
        cursor.skip_empty(storage, end);
        cursor
    }

    /// Stored word, or `EMPTY_WORD` past the usable end of the page.
    pub fn value<S: EventLogStorage>(&self, storage: &S) -> u32 {
        self.page.read(storage, self.event_index)
    }

    /// Step to the next record. Never moves beyond `end`.
    pub fn advance<S: EventLogStorage>(&mut self, storage: &S, end: &Cursor) {
        if self.reached(end) {
            return;
        }
        self.event_index += 1;
        self.skip_empty(storage, end);
    }

    pub fn index(&self) -> Position {
        Position::new(self.page.number(), self.page_size, self.event_index)
    }

    /// True once this cursor stands at or past `end` on the write page.
    pub fn reached(&self, end: &Cursor) -> bool {
        self.page.storage_index() == end.page.storage_index() && self.event_index >= end.event_index
    }

    pub fn storage_index(&self) -> usize {
        self.page.storage_index()
    }

    pub fn page_number(&self) -> u16 {
        self.page.number()
    }

    pub fn event_index(&self) -> usize {
        self.event_index
    }

    pub(super) fn bump(&mut self) {
        self.event_index += 1;
    }

    /// True if this cursor sits on a page older than `other`'s.
    ///
    /// Sequence numbers are compared with wrapping arithmetic, so the answer
    /// holds across the 0xFFFF -> 0 wrap for cursors less than 2^15 pages apart.
    pub(super) fn is_behind(&self, other: &Cursor) -> bool {
        let lag = other.page.number().wrapping_sub(self.page.number());
        lag != 0 && lag < 0x8000
    }

    // Roll over exhausted pages until a record or the write page turns up.
    // Arriving on the write page adopts its header, so the walk ends on a
    // position comparable with `end` even if older headers were stale.
    pub(super) fn skip_empty<S: EventLogStorage>(&mut self, storage: &S, end: &Cursor) {
        while self.page.storage_index() != end.page.storage_index() && self.value(storage) == EMPTY_WORD {
            self.page.advance(storage);
            self.event_index = 0;
            if self.page.storage_index() == end.page.storage_index() {
                self.page = end.page;
            }
        }
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.index() == other.index()
    }
}

impl Eq for Cursor {}

/// Walks `(Position, word)` pairs from a cursor up to `end`.
pub struct Iter<'a, S> {
    storage: &'a S,
    cursor: Cursor,
    end: Cursor,
}

impl<'a, S: EventLogStorage> Iter<'a, S> {
    pub(super) fn new(storage: &'a S, cursor: Cursor, end: Cursor) -> Self {
        Self {
            storage,
            cursor,
            end,
        }
    }
}

impl<S: EventLogStorage> Iterator for Iter<'_, S> {
    type Item = (Position, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.reached(&self.end) {
            return None;
        }
        let item = (self.cursor.index(), self.cursor.value(self.storage));
        self.cursor.advance(self.storage, &self.end);
        Some(item)
    }
}
