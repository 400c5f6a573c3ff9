// PlastiWatch V2 - Power Monitoring Task
//
// Periodically reads battery voltage and the charger status line and
// reports changes to the system task, which records them in the event log.

use std::sync::mpsc::Sender;

use crate::config::*;
use crate::events::SystemMessage;

/// Convert a raw 12-bit ADC reading to battery millivolts.
pub fn millivolts_from_raw(raw: i32) -> u16 {
    let volts = (raw.max(0) as f32 / ADC_FULL_SCALE) * ADC_REFERENCE_V * BATTERY_DIVIDER;
    (volts * 1000.0) as u16
}

/// Turns periodic samples into change notifications.
#[derive(Debug, Default)]
pub struct ChargeTracker {
    charging: Option<bool>,
    reported_mv: Option<u16>,
}

impl ChargeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample. Charger edges are always reported; voltage only when
    /// it moved by at least [`BATTERY_REPORT_DELTA_MV`].
    pub fn update(&mut self, millivolts: u16, charging: bool, system_tx: &Sender<SystemMessage>) {
        // Boot assumes "not charging", so only a running charger is news.
        let previous = self.charging.unwrap_or(false);
        if charging != previous {
            let _ = system_tx.send(SystemMessage::ChargingChanged(charging));
        }
        self.charging = Some(charging);

        let moved = self
            .reported_mv
            .map_or(true, |last| last.abs_diff(millivolts) >= BATTERY_REPORT_DELTA_MV);
        if moved {
            let _ = system_tx.send(SystemMessage::BatteryMillivolts(millivolts));
            self.reported_mv = Some(millivolts);
        }
    }
}

/// Battery sense input on ADC1, read in oneshot mode.
#[cfg(target_os = "espidf")]
pub struct BatteryAdc {
    handle: esp_idf_sys::adc_oneshot_unit_handle_t,
    channel: esp_idf_sys::adc_channel_t,
}

#[cfg(target_os = "espidf")]
impl BatteryAdc {
    /// ADC1 channel 2 (GPIO2), 12-bit, 11 dB attenuation for the full 0-3.3 V range.
    pub fn new() -> anyhow::Result<Self> {
        use esp_idf_sys as sys;

        let mut handle: sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        // SAFETY: the config outlives the call and `handle` is a valid out pointer.
        let ret = unsafe {
            let unit_cfg = sys::adc_oneshot_unit_init_cfg_t {
                unit_id: sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            sys::adc_oneshot_new_unit(&unit_cfg, &mut handle)
        };
        if ret != sys::ESP_OK {
            anyhow::bail!("battery ADC unit init failed ({})", ret);
        }

        let channel = sys::adc_channel_t_ADC_CHANNEL_2;
        let chan_cfg = sys::adc_oneshot_chan_cfg_t {
            atten: sys::adc_atten_t_ADC_ATTEN_DB_11,
            bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        // SAFETY: `handle` was initialised above.
        let ret = unsafe { sys::adc_oneshot_config_channel(handle, channel, &chan_cfg) };
        if ret != sys::ESP_OK {
            anyhow::bail!("battery ADC channel config failed ({})", ret);
        }

        Ok(Self { handle, channel })
    }

    /// One conversion, scaled to cell millivolts.
    pub fn read_millivolts(&mut self) -> anyhow::Result<u16> {
        let mut raw: i32 = 0;
        // SAFETY: `handle` stays valid for the lifetime of `self`.
        let ret = unsafe { esp_idf_sys::adc_oneshot_read(self.handle, self.channel, &mut raw) };
        if ret != esp_idf_sys::ESP_OK {
            anyhow::bail!("battery ADC read failed ({})", ret);
        }
        Ok(millivolts_from_raw(raw))
    }
}

#[cfg(target_os = "espidf")]
pub fn power_task(
    charge_pin: esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::AnyIOPin, esp_idf_hal::gpio::Input>,
    system_tx: Sender<SystemMessage>,
) {
    use std::thread;
    use std::time::Duration;

    log::info!("Power task started");

    let mut adc = match BatteryAdc::new() {
        Ok(adc) => adc,
        Err(e) => {
            log::error!("Power task stopped: {:#}", e);
            return;
        }
    };
    let mut tracker = ChargeTracker::new();

    loop {
        match adc.read_millivolts() {
            // STAT is open-drain, pulled LOW while the charger runs.
            Ok(millivolts) => tracker.update(millivolts, charge_pin.is_low(), &system_tx),
            Err(e) => log::warn!("{:#}", e),
        }
        thread::sleep(Duration::from_millis(BATTERY_CHECK_INTERVAL_MS));
    }
}
