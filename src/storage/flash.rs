// PlastiWatch V2 - Internal Flash Storage Backend
//
// Event log pages live in a dedicated data partition, one flash sector per
// page. Raw ESP-IDF partition calls; every failure is swallowed because
// writes may be issued from a panic hook.

use std::ffi::{c_void, CString};

use anyhow::{bail, Context};

use crate::config::{EVENTLOG_PARTITION_LABEL, FLASH_PAGES, FLASH_WORDS_PER_PAGE};

use super::{EventLogStorage, EMPTY_WORD};

const WORD_BYTES: usize = core::mem::size_of::<u32>();
const PAGE_BYTES: usize = FLASH_WORDS_PER_PAGE * WORD_BYTES;

pub struct FlashStorage {
    partition: *const esp_idf_sys::esp_partition_t,
}

// SAFETY: partition table entries are immutable and live for the whole
// programme; the pointer is only handed back to the partition API.
unsafe impl Send for FlashStorage {}

impl FlashStorage {
    /// Locate the `eventlog` data partition and check it can hold every page.
    pub fn take() -> anyhow::Result<Self> {
        let label = CString::new(EVENTLOG_PARTITION_LABEL)
            .context("partition label contains a NUL byte")?;

        let partition = unsafe {
            esp_idf_sys::esp_partition_find_first(
                esp_idf_sys::esp_partition_type_t_ESP_PARTITION_TYPE_DATA,
                esp_idf_sys::esp_partition_subtype_t_ESP_PARTITION_SUBTYPE_ANY,
                label.as_ptr(),
            )
        };
        if partition.is_null() {
            bail!("flash partition '{}' not found", EVENTLOG_PARTITION_LABEL);
        }

        let size = unsafe { (*partition).size } as usize;
        if size < FLASH_PAGES * PAGE_BYTES {
            bail!(
                "flash partition '{}' is {} bytes, need {}",
                EVENTLOG_PARTITION_LABEL,
                size,
                FLASH_PAGES * PAGE_BYTES
            );
        }

        log::info!(
            "Event log partition '{}': {} pages x {} words",
            EVENTLOG_PARTITION_LABEL,
            FLASH_PAGES,
            FLASH_WORDS_PER_PAGE
        );
        Ok(Self { partition })
    }

    fn in_range(page: usize, word_offset: usize) -> bool {
        page < FLASH_PAGES && word_offset < FLASH_WORDS_PER_PAGE
    }

    fn byte_offset(page: usize, word_offset: usize) -> usize {
        page * PAGE_BYTES + word_offset * WORD_BYTES
    }
}

impl EventLogStorage for FlashStorage {
    fn pages_count(&self) -> usize {
        FLASH_PAGES
    }

    fn page_size(&self) -> usize {
        FLASH_WORDS_PER_PAGE
    }

    fn erase(&mut self, page: usize) {
        if page >= FLASH_PAGES {
            return;
        }
        unsafe {
            esp_idf_sys::esp_partition_erase_range(self.partition, page * PAGE_BYTES, PAGE_BYTES);
        }
    }

    fn write(&mut self, page: usize, word_offset: usize, value: u32) {
        if !Self::in_range(page, word_offset) {
            return;
        }
        let bytes = value.to_le_bytes();
        unsafe {
            esp_idf_sys::esp_partition_write(
                self.partition,
                Self::byte_offset(page, word_offset),
                bytes.as_ptr() as *const c_void,
                WORD_BYTES,
            );
        }
    }

    fn read(&self, page: usize, word_offset: usize) -> u32 {
        if !Self::in_range(page, word_offset) {
            return EMPTY_WORD;
        }
        let mut bytes = [0xffu8; WORD_BYTES];
        let ret = unsafe {
            esp_idf_sys::esp_partition_read(
                self.partition,
                Self::byte_offset(page, word_offset),
                bytes.as_mut_ptr() as *mut c_void,
                WORD_BYTES,
            )
        };
        if ret != esp_idf_sys::ESP_OK {
            return EMPTY_WORD;
        }
        u32::from_le_bytes(bytes)
    }
}
