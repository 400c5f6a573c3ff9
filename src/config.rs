// PlastiWatch V2 - Hardware, Layout & Event Log Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

use crate::error::LogError;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_CHARGE_DETECT: i32 = 5; // D3    - Charger STAT line (active LOW while charging)
pub const PIN_BATTERY_ADC: u32 = 2;   // D0/A0 - Battery voltage (ADC)

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_SYSTEM: usize = 4096;
pub const STACK_POWER: usize = 4096;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const BATTERY_CHECK_INTERVAL_MS: u64 = 10_000; // 10 seconds

// ---------------------------------------------------------------------------
// Battery (1:2 resistor divider before the ADC pin, LiPo cell)
// ---------------------------------------------------------------------------
pub const ADC_FULL_SCALE: f32 = 4095.0;
pub const ADC_REFERENCE_V: f32 = 3.3;
pub const BATTERY_DIVIDER: f32 = 2.0;
/// Minimum change (mV) before a new VccData record is written.
pub const BATTERY_REPORT_DELTA_MV: u16 = 50;

// ---------------------------------------------------------------------------
// Event Log Storage Layout
// ---------------------------------------------------------------------------
/// Data partition holding the event log pages (see partitions.csv).
pub const EVENTLOG_PARTITION_LABEL: &str = "eventlog";
/// One flash sector (4 KiB) per page.
pub const FLASH_WORDS_PER_PAGE: usize = 0x400;
pub const FLASH_PAGES: usize = 3;
pub const RAM_WORDS_PER_PAGE: usize = 0x100;
pub const RAM_PAGES: usize = 3;

// ---------------------------------------------------------------------------
// Event Log Format
// ---------------------------------------------------------------------------
pub const CURRENT_VERSION: u8 = 0x01;
pub const DEFAULT_HEADER_SIZE: u8 = 0x01;
/// Trailing slots kept free after a swap is requested, so crash anchors and
/// reset reasons still fit before the rotation runs.
pub const EMERGENCY_EVENTS_AMOUNT: usize = 0x10;
/// Largest page the 32-bit Position space can address with 16-bit page numbers.
pub const MAX_WORDS_PER_PAGE: usize = 0x1_0000;

/// Runtime-tunable event log parameters.
///
/// Different page sizes change how many records the reserve represents, so
/// the reserve is chosen per backend rather than fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Free slots left in a page when the swap request fires.
    pub emergency_reserve: usize,
    /// Header words written at the start of every freshly initialised page.
    pub header_size: u8,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            emergency_reserve: EMERGENCY_EVENTS_AMOUNT,
            header_size: DEFAULT_HEADER_SIZE,
        }
    }
}

impl LogConfig {
    pub fn with_emergency_reserve(mut self, reserve: usize) -> Self {
        self.emergency_reserve = reserve;
        self
    }

    /// Check the configuration against a backend geometry.
    pub fn validate(&self, pages_count: usize, page_size: usize) -> Result<(), LogError> {
        if pages_count < 2 {
            return Err(LogError::TooFewPages { pages: pages_count });
        }
        if self.header_size == 0 {
            return Err(LogError::ZeroHeaderSize);
        }
        if page_size > MAX_WORDS_PER_PAGE {
            return Err(LogError::PageTooLarge { page_size });
        }
        // Header, reserve and at least one ordinary record.
        let needed = self.header_size as usize + self.emergency_reserve + 1;
        if page_size < needed {
            return Err(LogError::PageTooSmall { page_size, needed });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fits_both_backends() {
        let config = LogConfig::default();
        assert!(config.validate(FLASH_PAGES, FLASH_WORDS_PER_PAGE).is_ok());
        assert!(config.validate(RAM_PAGES, RAM_WORDS_PER_PAGE).is_ok());
    }

    #[test]
    fn rejects_single_page() {
        let err = LogConfig::default().validate(1, 256).unwrap_err();
        assert!(matches!(err, LogError::TooFewPages { pages: 1 }));
    }

    #[test]
    fn rejects_page_smaller_than_reserve() {
        let config = LogConfig::default().with_emergency_reserve(16);
        let err = config.validate(3, 17).unwrap_err();
        assert!(matches!(err, LogError::PageTooSmall { page_size: 17, needed: 18 }));
        assert!(config.validate(3, 18).is_ok());
    }

    #[test]
    fn rejects_zero_header_and_oversized_pages() {
        let config = LogConfig { emergency_reserve: 0, header_size: 0 };
        assert!(matches!(config.validate(3, 64), Err(LogError::ZeroHeaderSize)));
        assert!(matches!(
            LogConfig::default().validate(3, MAX_WORDS_PER_PAGE + 1),
            Err(LogError::PageTooLarge { .. })
        ));
    }
}
