// PlastiWatch V2 - System Events & Data Types

// ---------------------------------------------------------------------------
// Simple events (no payload, 24-bit enumerant space)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SimpleEvent {
    ColdStart = 0,
    SoftwareReset = 1,
    WdtReset = 2,
    BleConnect = 3,
    BleDisconnect = 4,
    ChargeStart = 5,
    ChargeStop = 6,
    DfuStart = 7,
    DfuStop = 8,
}

impl SimpleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ColdStart     => "cold-start",
            Self::SoftwareReset => "software-reset",
            Self::WdtReset      => "wdt-reset",
            Self::BleConnect    => "ble-connect",
            Self::BleDisconnect => "ble-disconnect",
            Self::ChargeStart   => "charge-start",
            Self::ChargeStop    => "charge-stop",
            Self::DfuStart      => "dfu-start",
            Self::DfuStop       => "dfu-stop",
        }
    }
}

impl TryFrom<u32> for SimpleEvent {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ColdStart),
            1 => Ok(Self::SoftwareReset),
            2 => Ok(Self::WdtReset),
            3 => Ok(Self::BleConnect),
            4 => Ok(Self::BleDisconnect),
            5 => Ok(Self::ChargeStart),
            6 => Ok(Self::ChargeStop),
            7 => Ok(Self::DfuStart),
            8 => Ok(Self::DfuStop),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// 16-bit events (8-bit subtype + 16-bit data)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event16Kind {
    /// Battery voltage in millivolts.
    VccData = 0,
    /// Accelerometer sample: 4-bit sample number + 12-bit value.
    AccData = 1,
    /// Die temperature in 0.1 degC units, two's complement.
    TempUc = 2,
    /// Daily step counter.
    StepCounter = 3,
}

impl Event16Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VccData     => "vcc-mv",
            Self::AccData     => "acc",
            Self::TempUc      => "temp-decidegc",
            Self::StepCounter => "steps",
        }
    }
}

impl TryFrom<u8> for Event16Kind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::VccData),
            1 => Ok(Self::AccData),
            2 => Ok(Self::TempUc),
            3 => Ok(Self::StepCounter),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// System Messages - sent to the system task via channel
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMessage {
    /// The active event log page is nearly full; rotate it.
    SwapEventlogPages,
    /// Charger started (`true`) or stopped (`false`).
    ChargingChanged(bool),
    /// Battery voltage sample in millivolts.
    BatteryMillivolts(u16),
    BleConnected,
    BleDisconnected,
    DfuStarted,
    DfuFinished,
    /// Daily step counter update.
    StepCount(u16),
    /// Wall-clock time was (re)set; anchor absolute time in the log.
    TimeSynced,
    /// Stop the system task loop.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_event_values_are_stable() {
        assert_eq!(SimpleEvent::ColdStart as u32, 0);
        assert_eq!(SimpleEvent::DfuStop as u32, 8);
        assert_eq!(SimpleEvent::try_from(5), Ok(SimpleEvent::ChargeStart));
        assert_eq!(SimpleEvent::try_from(9), Err(9));
    }

    #[test]
    fn event16_kind_conversion() {
        assert_eq!(Event16Kind::try_from(0), Ok(Event16Kind::VccData));
        assert_eq!(Event16Kind::try_from(3), Ok(Event16Kind::StepCounter));
        assert_eq!(Event16Kind::try_from(0x40), Err(0x40));
    }
}
