// PlastiWatch V2 - Event Log Errors
//
// Only construction can fail. Appends, rotation and reads are total.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("event log needs at least 2 pages, backend has {pages}")]
    TooFewPages { pages: usize },

    #[error("page header size must be at least one word")]
    ZeroHeaderSize,

    #[error("page of {page_size} words cannot hold header, reserve and one record ({needed} words)")]
    PageTooSmall { page_size: usize, needed: usize },

    #[error("page of {page_size} words exceeds the addressable position space")]
    PageTooLarge { page_size: usize },
}
