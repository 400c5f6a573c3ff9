// PlastiWatch V2 - System Task
//
// Owns the slow side of the event log. Other tasks and the log itself post
// `SystemMessage`s here; this loop turns them into log records and runs the
// page rotation the log asked for, outside the append path.

use std::ops::ControlFlow;
use std::sync::mpsc::Receiver;

use crate::clock::WallClock;
use crate::eventlog::{SharedEventLog, SwapRequestSink};
use crate::events::{Event16Kind, SimpleEvent, SystemMessage};
use crate::storage::EventLogStorage;

pub fn system_task<S, C, N>(log: SharedEventLog<S, C, N>, system_rx: Receiver<SystemMessage>)
where
    S: EventLogStorage,
    C: WallClock,
    N: SwapRequestSink,
{
    log::info!("System task started");

    loop {
        let message = match system_rx.recv() {
            Ok(m) => m,
            Err(_) => {
                log::warn!("System channel closed - exiting system task");
                return;
            }
        };

        if handle_message(&log, message).is_break() {
            log::info!("System task stopping");
            return;
        }
    }
}

/// Apply one message to the log. `Break` ends the task.
pub fn handle_message<S, C, N>(log: &SharedEventLog<S, C, N>, message: SystemMessage) -> ControlFlow<()>
where
    S: EventLogStorage,
    C: WallClock,
    N: SwapRequestSink,
{
    match message {
        SystemMessage::SwapEventlogPages => log.lock().swap_pages(),
        SystemMessage::ChargingChanged(true) => log.write_simple(SimpleEvent::ChargeStart),
        SystemMessage::ChargingChanged(false) => log.write_simple(SimpleEvent::ChargeStop),
        SystemMessage::BatteryMillivolts(mv) => log.write_event16(Event16Kind::VccData, mv),
        SystemMessage::BleConnected => log.write_simple(SimpleEvent::BleConnect),
        SystemMessage::BleDisconnected => log.write_simple(SimpleEvent::BleDisconnect),
        SystemMessage::DfuStarted => log.write_simple(SimpleEvent::DfuStart),
        SystemMessage::DfuFinished => log.write_simple(SimpleEvent::DfuStop),
        SystemMessage::StepCount(steps) => log.write_event16(Event16Kind::StepCounter, steps),
        SystemMessage::TimeSynced => log.lock().anchor_time(),
        SystemMessage::Shutdown => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}
