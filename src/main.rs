// PlastiWatch V2 - Firmware Entry Point
//
// Boot sequence:
//   1. Open the event log (recovering the active page after power loss) and
//      record the cold start.
//   2. Install a panic hook that records a software reset before reboot.
//   3. Spawn the system task (log maintenance) and the power task.
//
// On a host build the same wiring runs over RAM storage as a short
// simulation and prints the resulting log.

use std::sync::mpsc::{self, Sender};
use std::thread;

use plastilog::config::*;
use plastilog::tasks;
use plastilog::{EventLog, EventLogStorage, SharedEventLog, SimpleEvent, SystemClock, SystemMessage};

type Shared<S> = SharedEventLog<S, SystemClock, Sender<SystemMessage>>;

fn open_log<S: EventLogStorage>(storage: S, system_tx: Sender<SystemMessage>) -> anyhow::Result<Shared<S>> {
    let shared = SharedEventLog::new(EventLog::new(storage, SystemClock, system_tx, LogConfig::default())?);
    shared.write_simple(SimpleEvent::ColdStart);
    Ok(shared)
}

/// Record a software reset from the panic hook without waiting on the log.
fn install_panic_hook<S>(event_log: Shared<S>)
where
    S: EventLogStorage + Send + 'static,
{
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        event_log.try_write_simple(SimpleEvent::SoftwareReset);
        default_hook(info);
    }));
}

// ---------------------------------------------------------------------------
// Main (device)
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp_idf_hal::gpio::{IOPin, PinDriver, Pull};
    use esp_idf_hal::prelude::*;
    use plastilog::storage::FlashStorage;

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("PlastiWatch V2 firmware starting");

    let peripherals = Peripherals::take()?;

    // Charger STAT line (open drain, active LOW).
    let mut charge_pin = PinDriver::input(peripherals.pins.gpio5.downgrade())?;
    charge_pin.set_pull(Pull::Up)?;

    // ---- Event log --------------------------------------------------------
    let (system_tx, system_rx) = mpsc::channel();
    let event_log = open_log(FlashStorage::take()?, system_tx.clone())?;
    install_panic_hook(event_log.clone());

    // ---- Spawn tasks (map to FreeRTOS tasks via std::thread) ---------------
    let system_log = event_log.clone();
    thread::Builder::new()
        .name("system".into())
        .stack_size(STACK_SYSTEM)
        .spawn(move || {
            tasks::system::system_task(system_log, system_rx);
        })?;

    thread::Builder::new()
        .name("power".into())
        .stack_size(STACK_POWER)
        .spawn(move || {
            tasks::power::power_task(charge_pin, system_tx);
        })?;

    log::info!("Boot complete - entering normal operation");

    // Main thread has nothing left to do - park it forever.
    loop {
        thread::sleep(std::time::Duration::from_secs(60));
    }
}

// ---------------------------------------------------------------------------
// Main (host simulation)
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use plastilog::diag::DumpSession;
    use plastilog::tasks::power::ChargeTracker;
    use plastilog::{Event16Kind, RamStorage};

    tracing_subscriber::fmt::init();
    log::info!("PlastiWatch V2 host simulation starting");

    let (system_tx, system_rx) = mpsc::channel();
    let event_log = open_log(RamStorage::default(), system_tx.clone())?;
    install_panic_hook(event_log.clone());

    let system_log = event_log.clone();
    let system = thread::Builder::new()
        .name("system".into())
        .stack_size(STACK_SYSTEM)
        .spawn(move || {
            tasks::system::system_task(system_log, system_rx);
        })?;

    // A plug-in, a BLE session, an unplug.
    let mut tracker = ChargeTracker::new();
    tracker.update(3850, true, &system_tx);
    system_tx.send(SystemMessage::BleConnected)?;
    tracker.update(4120, true, &system_tx);
    system_tx.send(SystemMessage::BleDisconnected)?;
    tracker.update(4180, false, &system_tx);

    // Enough traffic to reach the emergency reserve: the log queues a swap
    // request ahead of the shutdown below.
    for steps in 0..(RAM_WORDS_PER_PAGE - EMERGENCY_EVENTS_AMOUNT) as u16 {
        event_log.write_event16(Event16Kind::StepCounter, steps);
    }
    system_tx.send(SystemMessage::Shutdown)?;
    system
        .join()
        .map_err(|_| anyhow::anyhow!("system task panicked"))?;

    let guard = event_log.lock();
    let mut session = DumpSession::start(&*guard);
    while let Some(entry) = session.next_entry(&*guard) {
        println!("{}  {}", entry, entry.decoded());
    }
    log::info!(
        "Active page #{} (slot {}), {} records dropped",
        guard.write_page().number(),
        guard.write_page().storage_index(),
        guard.dropped_records()
    );
    Ok(())
}
