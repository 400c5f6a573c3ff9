// PlastiWatch V2 - Persistent Event Log
//
// Log-structured, wear-leveled history of system events kept in a ring of
// erasable pages. Each page starts with a header word carrying a sequence
// number; records follow, one 32-bit word each.
//
// Appends are safe from restricted contexts (panic hook, ISR-deferred work):
// they never allocate, log, block or fail. When the active page runs low the
// log asks its owner for a rotation through a `SwapRequestSink` and keeps
// filling the emergency reserve until `swap_pages` runs from a task.

pub mod cursor;
pub mod header;
pub mod page;
pub mod record;
mod shared;

use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::clock::WallClock;
use crate::config::LogConfig;
use crate::error::LogError;
use crate::events::{Event16Kind, SimpleEvent, SystemMessage};
use crate::storage::{EventLogStorage, EMPTY_WORD};

pub use cursor::{Cursor, Iter, Position};
pub use header::PageHeader;
pub use page::Page;
pub use record::{Decoded, Record};
pub use shared::SharedEventLog;

use header::HEADER_WORD;
use record::TIME_DIFF_MAX;

/// Receives the "pages nearly full, please rotate" notification.
///
/// Called from the append path, so implementations must not block.
pub trait SwapRequestSink {
    fn request_swap(&self);
}

impl SwapRequestSink for Sender<SystemMessage> {
    fn request_swap(&self) {
        // A closed channel means the system task is gone; nothing to notify.
        let _ = self.send(SystemMessage::SwapEventlogPages);
    }
}

pub struct EventLog<S, C, N> {
    storage: S,
    clock: C,
    swap_sink: N,
    config: LogConfig,
    write_page: Page,
    write_cursor: Cursor,
    last_anchor: Duration,
    swap_pending: bool,
    dropped: u32,
}

impl<S, C, N> EventLog<S, C, N>
where
    S: EventLogStorage,
    C: WallClock,
    N: SwapRequestSink,
{
    /// Recover the log from `storage` and anchor the current time.
    ///
    /// Blank storage is formatted first.
    pub fn new(mut storage: S, clock: C, swap_sink: N, config: LogConfig) -> Result<Self, LogError> {
        config.validate(storage.pages_count(), storage.page_size())?;

        if storage.read(0, HEADER_WORD) == EMPTY_WORD {
            log::info!("Event log storage is blank, formatting {} pages", storage.pages_count());
            format_pages(&mut storage, &config);
        }

        let write_page = find_last_page(&storage);
        let page_size = storage.page_size();
        let mut event_log = Self {
            storage,
            clock,
            swap_sink,
            config,
            write_page,
            write_cursor: Cursor::at(write_page, 0, page_size),
            last_anchor: Duration::ZERO,
            swap_pending: false,
            dropped: 0,
        };
        event_log.recover_write_cursor();

        log::info!(
            "Event log resumed on page #{} (slot {}) at record {}",
            event_log.write_page.number(),
            event_log.write_page.storage_index(),
            event_log.write_cursor.event_index()
        );

        event_log.write_unix_time();
        event_log.check_swap();
        Ok(event_log)
    }

    // ---------------------------------------------------------------------------
    // Append path
    // ---------------------------------------------------------------------------

    /// Append an encoded record, preceded by the time elapsed since the last one.
    ///
    /// Records that do not fit are dropped silently.
    pub fn write_event(&mut self, word: u32) {
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_anchor).as_millis();
        if elapsed > TIME_DIFF_MAX as u128 {
            self.write_anchor(now);
        } else if elapsed >= 1 {
            let millis = elapsed as u32;
            self.last_anchor += Duration::from_millis(millis as u64);
            self.push(Record::TimeDiff(millis).encode());
        }

        self.push(word);
        self.check_swap();
    }

    pub fn write_record(&mut self, record: Record) {
        self.write_event(record.encode());
    }

    pub fn write_simple(&mut self, event: SimpleEvent) {
        self.write_record(Record::simple(event));
    }

    pub fn write_event16(&mut self, kind: Event16Kind, data: u16) {
        self.write_record(Record::event16(kind, data));
    }

    /// Record the absolute time now, e.g. after the clock was synchronised.
    pub fn anchor_time(&mut self) {
        self.write_unix_time();
        self.check_swap();
    }

    // ---------------------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------------------

    /// Rotate to the next physical page, erasing it.
    ///
    /// Slow (a flash sector erase), so it runs from the task that received the
    /// swap request, never from the append path.
    pub fn swap_pages(&mut self) {
        let previous = self.write_page;
        let next_slot = (previous.storage_index() + 1) % self.storage.pages_count();
        self.write_page = Page::fresh(next_slot, previous.number().wrapping_add(1), self.config.header_size);
        self.write_page.erase(&mut self.storage);
        self.write_page.initialise(&mut self.storage);
        self.write_cursor = Cursor::at(self.write_page, 0, self.storage.page_size());
        self.swap_pending = false;
        self.write_unix_time();

        log::info!(
            "Event log rotated to page #{} (slot {})",
            self.write_page.number(),
            self.write_page.storage_index()
        );
    }

    /// Drop all history and start again from page #0.
    pub fn erase_all(&mut self) {
        format_pages(&mut self.storage, &self.config);
        self.write_page = Page::load(&self.storage, 0);
        self.write_cursor = Cursor::at(self.write_page, 0, self.storage.page_size());
        self.swap_pending = false;
        self.dropped = 0;
        self.write_unix_time();

        log::warn!("Event log erased");
    }

    // ---------------------------------------------------------------------------
    // Read path
    // ---------------------------------------------------------------------------

    /// Oldest surviving record.
    pub fn begin(&self) -> Cursor {
        let first_slot = (self.write_page.storage_index() + 1) % self.storage.pages_count();
        Cursor::start(&self.storage, Page::load(&self.storage, first_slot), &self.write_cursor)
    }

    /// One past the newest record.
    pub fn end(&self) -> Cursor {
        self.write_cursor
    }

    /// Every stored word from `begin()` to `end()`, with its position.
    pub fn iter(&self) -> Iter<'_, S> {
        Iter::new(&self.storage, self.begin(), self.end())
    }

    /// Decoded records from `begin()` to `end()`. Corrupt words are reported and skipped.
    pub fn records(&self) -> impl Iterator<Item = (Position, Record)> + '_ {
        self.iter().filter_map(|(position, word)| match Record::decode(word) {
            Decoded::Valid(record) => Some((position, record)),
            Decoded::Absent => None,
            Decoded::Invalid(word) => {
                log::warn!("Corrupt event log word {:08x} at position {}", word, position);
                None
            }
        })
    }

    /// Read the word under `cursor` and move it on, or `None` at `end()`.
    ///
    /// Lets a reader hold its place across appends and rotations. A reader
    /// left on a page that has since been recycled restarts at `begin()`.
    pub fn step(&self, cursor: &mut Cursor) -> Option<(Position, u32)> {
        let begin = self.begin();
        if cursor.is_behind(&begin) {
            log::warn!("Event log reader lapped at position {}, resuming at {}", cursor.index(), begin.index());
            *cursor = begin;
        }
        // A reader parked on the old write page moves onto the new one.
        cursor.skip_empty(&self.storage, &self.write_cursor);
        if cursor.reached(&self.write_cursor) {
            return None;
        }
        let item = (cursor.index(), cursor.value(&self.storage));
        cursor.advance(&self.storage, &self.write_cursor);
        Some(item)
    }

    // ---------------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------------

    pub fn write_page(&self) -> Page {
        self.write_page
    }

    pub fn swap_pending(&self) -> bool {
        self.swap_pending
    }

    /// Records lost because the page was full before the rotation ran.
    pub fn dropped_records(&self) -> u32 {
        self.dropped
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ---------------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------------

    fn recover_write_cursor(&mut self) {
        if self.write_page.is_empty(&self.storage) {
            // Power was lost between erasing the page and writing its header.
            let pages = self.storage.pages_count();
            let previous = Page::load(&self.storage, (self.write_page.storage_index() + pages - 1) % pages);
            log::warn!("Active event log page in slot {} has no header", self.write_page.storage_index());
            self.write_page = Page::fresh(
                self.write_page.storage_index(),
                previous.number().wrapping_add(1),
                self.config.header_size,
            );
            self.write_page.initialise(&mut self.storage);
            self.write_cursor = Cursor::at(self.write_page, 0, self.storage.page_size());
            return;
        }

        while self.write_cursor.value(&self.storage) != EMPTY_WORD {
            self.write_cursor.bump();
        }
    }

    fn write_unix_time(&mut self) {
        let now = self.clock.now();
        self.write_anchor(now);
    }

    fn write_anchor(&mut self, now: Duration) {
        let seconds = now.as_secs();
        self.last_anchor = Duration::from_secs(seconds);
        self.push(Record::UnixTime(seconds as u32).encode());
    }

    fn push(&mut self, word: u32) {
        if self.write_page.write(&mut self.storage, self.write_cursor.event_index(), word) {
            self.write_cursor.bump();
        } else {
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    fn check_swap(&mut self) {
        if self.swap_pending {
            return;
        }
        let full = self.write_page.is_full_enough(
            &self.storage,
            self.write_cursor.event_index(),
            self.config.emergency_reserve,
        );
        if full {
            self.swap_pending = true;
            self.swap_sink.request_swap();
        }
    }
}

/// Erase every page and write a consistent run of headers ending at slot 0.
///
/// Slot `k >= 1` gets sequence `k - pages` (wrapping), slot 0 gets 0, so the
/// boot scan picks slot 0 and readers walking the older slots see ordered
/// positions.
fn format_pages<S: EventLogStorage>(storage: &mut S, config: &LogConfig) {
    let pages = storage.pages_count();
    for slot in 0..pages {
        let number = if slot == 0 { 0 } else { (slot as u16).wrapping_sub(pages as u16) };
        let page = Page::fresh(slot, number, config.header_size);
        page.erase(storage);
        page.initialise(storage);
    }
}

/// Locate the active page: the end of the ascending run of sequence numbers.
///
/// Only the successor of the active page can break the run, because it holds
/// the oldest (or a half-erased) page. A run spanning the whole ring ends on
/// the last slot.
fn find_last_page<S: EventLogStorage>(storage: &S) -> Page {
    let pages = storage.pages_count();
    for slot in 0..pages - 1 {
        let page = Page::load(storage, slot);
        let next = Page::load(storage, slot + 1);
        if page.number().wrapping_add(1) != next.number() {
            return page;
        }
    }
    Page::load(storage, pages - 1)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::RamStorage;

    const START: Duration = Duration::from_secs(1_700_000_000);

    type TestLog = EventLog<RamStorage, ManualClock, Sender<SystemMessage>>;

    fn open(storage: RamStorage, config: LogConfig) -> (TestLog, ManualClock, Receiver<SystemMessage>) {
        let clock = ManualClock::starting_at(START);
        let (tx, rx) = mpsc::channel();
        let log = EventLog::new(storage, clock.clone(), tx, config).unwrap();
        (log, clock, rx)
    }

    fn small_config() -> LogConfig {
        LogConfig::default().with_emergency_reserve(4)
    }

    fn decoded(log: &TestLog) -> Vec<Record> {
        log.records().map(|(_, record)| record).collect()
    }

    fn write_header(storage: &mut RamStorage, slot: usize, number: u16) {
        storage.erase(slot);
        storage.write(slot, HEADER_WORD, PageHeader::new(1, number).encode());
    }

    #[test]
    fn virgin_storage_is_formatted_and_anchored() {
        let (log, _, _) = open(RamStorage::new(3, 32), small_config());
        assert_eq!(log.write_page().storage_index(), 0);
        assert_eq!(log.write_page().number(), 0);
        assert_eq!(PageHeader::decode(log.storage().read(1, 0)).page_number, 0xfffe);
        assert_eq!(PageHeader::decode(log.storage().read(2, 0)).page_number, 0xffff);
        assert_eq!(decoded(&log), [Record::UnixTime(1_700_000_000)]);
    }

    #[test]
    fn boot_picks_end_of_ascending_run() {
        let mut storage = RamStorage::new(3, 32);
        write_header(&mut storage, 0, 5);
        write_header(&mut storage, 1, 6);
        write_header(&mut storage, 2, 4);
        storage.write(1, 1, Record::simple(SimpleEvent::ColdStart).encode());

        let (log, _, _) = open(storage, small_config());
        assert_eq!(log.write_page().storage_index(), 1);
        assert_eq!(log.write_page().number(), 6);
        // Existing record kept, anchor appended behind it.
        assert_eq!(log.end().event_index(), 2);
    }

    #[test]
    fn boot_run_covering_every_slot_ends_on_last_slot() {
        let mut storage = RamStorage::new(3, 32);
        write_header(&mut storage, 0, 0xfffe);
        write_header(&mut storage, 1, 0xffff);
        write_header(&mut storage, 2, 0);

        let (log, _, _) = open(storage, small_config());
        assert_eq!(log.write_page().storage_index(), 2);
        assert_eq!(log.write_page().number(), 0);
    }

    #[test]
    fn reboot_resumes_after_last_record() {
        let (mut log, clock, _rx) = open(RamStorage::new(3, 64), small_config());
        clock.advance(Duration::from_millis(5));
        log.write_simple(SimpleEvent::BleConnect);
        let storage = log.storage().clone();
        let before: Vec<u32> = log.iter().map(|(_, w)| w).collect();

        let (rebooted, _, _) = open(storage, small_config());
        let after: Vec<u32> = rebooted.iter().map(|(_, w)| w).collect();
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(Record::decode(after[before.len()]), Decoded::Valid(Record::UnixTime(1_700_000_000)));
    }

    #[test]
    fn time_diff_written_only_when_time_passes() {
        let (mut log, clock, _rx) = open(RamStorage::new(3, 64), small_config());
        log.write_simple(SimpleEvent::ChargeStart);
        clock.advance(Duration::from_millis(250));
        log.write_event16(Event16Kind::VccData, 4100);

        assert_eq!(
            decoded(&log),
            [
                Record::UnixTime(1_700_000_000),
                Record::simple(SimpleEvent::ChargeStart),
                Record::TimeDiff(250),
                Record::event16(Event16Kind::VccData, 4100),
            ]
        );
    }

    #[test]
    fn time_diffs_do_not_drift() {
        let (mut log, clock, _rx) = open(RamStorage::new(3, 64), small_config());
        clock.advance(Duration::from_micros(1_500));
        log.write_simple(SimpleEvent::BleConnect);
        clock.advance(Duration::from_micros(1_500));
        log.write_simple(SimpleEvent::BleDisconnect);

        let diffs: u32 = log
            .records()
            .filter_map(|(_, r)| match r {
                Record::TimeDiff(ms) => Some(ms),
                _ => None,
            })
            .sum();
        assert_eq!(diffs, 3);
    }

    #[test]
    fn long_gap_re_anchors() {
        let (mut log, clock, _rx) = open(RamStorage::new(3, 64), small_config());
        clock.advance(Duration::from_secs(5 * 3600));
        log.write_simple(SimpleEvent::WdtReset);

        assert_eq!(
            decoded(&log),
            [
                Record::UnixTime(1_700_000_000),
                Record::UnixTime(1_700_018_000),
                Record::simple(SimpleEvent::WdtReset),
            ]
        );
    }

    #[test]
    fn swap_requested_once_until_rotation() {
        let (mut log, _, rx) = open(RamStorage::new(3, 16), small_config());
        for _ in 0..30 {
            log.write_simple(SimpleEvent::BleConnect);
        }
        assert!(log.swap_pending());
        assert_eq!(rx.try_iter().count(), 1);

        log.swap_pages();
        assert!(!log.swap_pending());
        for _ in 0..30 {
            log.write_simple(SimpleEvent::BleConnect);
        }
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn swap_request_fires_at_reserve_boundary() {
        // 16 words: header + 15 slots, reserve 4 -> request once 11 slots are used.
        let (mut log, _, rx) = open(RamStorage::new(3, 16), small_config());
        for _ in 0..9 {
            log.write_simple(SimpleEvent::BleConnect);
        }
        assert_eq!(log.end().event_index(), 10);
        assert!(!log.swap_pending());
        log.write_simple(SimpleEvent::BleConnect);
        assert!(log.swap_pending());
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [SystemMessage::SwapEventlogPages]);
    }

    #[test]
    fn full_page_drops_records_without_touching_header() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        while log.end().event_index() < 15 {
            log.write_simple(SimpleEvent::ChargeStop);
        }
        let header = log.storage().read(0, HEADER_WORD);
        let length = log.iter().count();

        log.write_simple(SimpleEvent::ChargeStart);
        assert_eq!(log.iter().count(), length);
        assert_eq!(log.dropped_records(), 1);
        assert_eq!(log.storage().read(0, HEADER_WORD), header);
        assert_eq!(log.storage().read(1, 1), EMPTY_WORD);
    }

    #[test]
    fn rotation_advances_sequence_and_keeps_history() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        log.write_simple(SimpleEvent::DfuStart);
        let oldest = log.begin().index();
        let last = log.end().index();

        log.swap_pages();
        assert_eq!(log.write_page().storage_index(), 1);
        assert_eq!(log.write_page().number(), 1);
        assert_eq!(PageHeader::decode(log.storage().read(1, HEADER_WORD)).page_number, 1);
        assert_eq!(log.begin().index(), oldest);
        assert!(log.end().index() > last);
        assert_eq!(
            decoded(&log),
            [
                Record::UnixTime(1_700_000_000),
                Record::simple(SimpleEvent::DfuStart),
                Record::UnixTime(1_700_000_000),
            ]
        );
    }

    #[test]
    fn ring_keeps_pages_count_minus_one_pages_of_history() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        log.write_simple(SimpleEvent::ColdStart);
        log.swap_pages();
        log.write_simple(SimpleEvent::SoftwareReset);
        log.swap_pages();
        log.write_simple(SimpleEvent::WdtReset);
        // Slot 0 (ColdStart) is reused by this rotation.
        log.swap_pages();

        let events: Vec<Record> = decoded(&log)
            .into_iter()
            .filter(|r| matches!(r, Record::Simple(_)))
            .collect();
        assert_eq!(
            events,
            [Record::simple(SimpleEvent::SoftwareReset), Record::simple(SimpleEvent::WdtReset)]
        );
        assert_eq!(log.write_page().number(), 3);
        assert_eq!(log.begin().page_number(), 1);
    }

    #[test]
    fn erase_all_leaves_single_anchor() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        for _ in 0..12 {
            log.write_simple(SimpleEvent::BleConnect);
        }
        log.swap_pages();
        log.erase_all();

        assert!(!log.swap_pending());
        assert_eq!(log.write_page().storage_index(), 0);
        let mut begin = log.begin();
        assert_ne!(begin, log.end());
        let first = log.step(&mut begin).map(|(_, word)| Record::decode(word));
        assert_eq!(first, Some(Decoded::Valid(Record::UnixTime(1_700_000_000))));
        assert_eq!(begin, log.end());
    }

    #[test]
    fn detached_cursor_follows_rotation() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        let mut cursor = log.begin();
        assert!(log.step(&mut cursor).is_some());
        assert!(log.step(&mut cursor).is_none());

        log.write_simple(SimpleEvent::BleConnect);
        log.swap_pages();
        let mut seen = Vec::new();
        while let Some((position, _)) = log.step(&mut cursor) {
            seen.push(position);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen[0] < seen[1]);
        assert_eq!(cursor, log.end());
    }

    #[test]
    fn caught_up_cursor_moves_onto_fresh_page() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        let mut cursor = log.begin();
        while log.step(&mut cursor).is_some() {}
        let last = cursor.index();

        log.swap_pages();
        let (position, word) = log.step(&mut cursor).unwrap();
        assert!(position > last);
        assert_eq!(Record::decode(word), Decoded::Valid(Record::UnixTime(1_700_000_000)));
        assert_eq!(log.step(&mut cursor), None);
        assert_eq!(cursor, log.end());
    }

    #[test]
    fn lapped_cursor_restarts_at_oldest_record() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        let mut cursor = log.begin();
        assert!(log.step(&mut cursor).is_some());

        for _ in 0..3 {
            log.write_simple(SimpleEvent::BleConnect);
            log.swap_pages();
        }
        assert_eq!(cursor.storage_index(), log.write_page().storage_index());

        let rest: Vec<(Position, u32)> = std::iter::from_fn(|| log.step(&mut cursor)).collect();
        let all: Vec<(Position, u32)> = log.iter().collect();
        assert_eq!(rest, all);
        assert_eq!(cursor, log.end());
    }

    #[test]
    fn invalid_words_are_skipped_when_decoding() {
        let (mut log, _, _rx) = open(RamStorage::new(3, 16), small_config());
        log.write_event(0x8300_0000);
        log.write_simple(SimpleEvent::ColdStart);
        assert_eq!(log.iter().count(), 3);
        assert_eq!(
            decoded(&log),
            [Record::UnixTime(1_700_000_000), Record::simple(SimpleEvent::ColdStart)]
        );
    }

    #[test]
    fn rejects_bad_geometry() {
        let (tx, _rx) = mpsc::channel::<SystemMessage>();
        let result = EventLog::new(RamStorage::new(1, 64), ManualClock::default(), tx, LogConfig::default());
        assert!(matches!(result, Err(LogError::TooFewPages { pages: 1 })));
    }
}
