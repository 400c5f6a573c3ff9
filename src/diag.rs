// PlastiWatch V2 - Event Log Diagnostics
//
// What the debug console can do with the log: stream it one entry per call
// (the console paces output to avoid flooding BLE), log a software reset,
// force a rotation, or wipe the history. Reading commands off the transport
// is the console's job.

use std::fmt;

use crate::clock::WallClock;
use crate::eventlog::{Cursor, Decoded, EventLog, Position, Record, SwapRequestSink};
use crate::events::SimpleEvent;
use crate::storage::EventLogStorage;

/// One raw log entry as printed by the console: `E: <position>,<word>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagEntry {
    pub position: Position,
    pub word: u32,
}

impl DiagEntry {
    pub fn decoded(&self) -> Decoded {
        Record::decode(self.word)
    }
}

impl fmt::Display for DiagEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E: {},{:08x}", self.position, self.word)
    }
}

/// Every entry from `begin()` to `end()`.
pub fn dump<S, C, N>(log: &EventLog<S, C, N>) -> Vec<DiagEntry>
where
    S: EventLogStorage,
    C: WallClock,
    N: SwapRequestSink,
{
    log.iter()
        .map(|(position, word)| DiagEntry { position, word })
        .collect()
}

/// A paced dump that survives appends made between steps.
#[derive(Debug, Clone, Copy)]
pub struct DumpSession {
    cursor: Cursor,
}

impl DumpSession {
    pub fn start<S, C, N>(log: &EventLog<S, C, N>) -> Self
    where
        S: EventLogStorage,
        C: WallClock,
        N: SwapRequestSink,
    {
        Self { cursor: log.begin() }
    }

    /// Next entry, or `None` once the session caught up with the writer.
    pub fn next_entry<S, C, N>(&mut self, log: &EventLog<S, C, N>) -> Option<DiagEntry>
    where
        S: EventLogStorage,
        C: WallClock,
        N: SwapRequestSink,
    {
        log.step(&mut self.cursor)
            .map(|(position, word)| DiagEntry { position, word })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagCommand {
    /// Print the whole log.
    Dump,
    /// Record a software reset marker.
    SoftwareReset,
    /// Rotate to a fresh page now.
    ForceRotation,
    /// Erase all history.
    EraseAll,
}

impl DiagCommand {
    fn tag(&self) -> char {
        match self {
            Self::Dump          => 'E',
            Self::SoftwareReset => 'R',
            Self::ForceRotation => 'T',
            Self::EraseAll      => 'P',
        }
    }
}

/// Run `command` and return the console reply lines.
pub fn execute<S, C, N>(log: &mut EventLog<S, C, N>, command: DiagCommand) -> Vec<String>
where
    S: EventLogStorage,
    C: WallClock,
    N: SwapRequestSink,
{
    let mut reply = Vec::new();
    match command {
        DiagCommand::Dump => {
            reply.extend(dump(log).iter().map(DiagEntry::to_string));
        }
        DiagCommand::SoftwareReset => log.write_simple(SimpleEvent::SoftwareReset),
        DiagCommand::ForceRotation => log.swap_pages(),
        DiagCommand::EraseAll => log.erase_all(),
    }
    reply.push(format!("{}:", command.tag()));
    reply
}
