//! Event Monitor
//!
//! Blocking waits for tap and perimeter breach events, with timeout as the
//! only cancellation. A zero timeout polls.
//!
//! An event that lands right at the deadline resolves as success whenever it
//! is observable: after a nonzero wait times out, one extra zero-timeout poll
//! is issued, and a pending event found there is returned as `Ok`.

use crate::resolver;
use crate::session::{unexpected, Session};
use crate::{SeError, SeResult};
use sealbox_core::protocol::{Command, EventClass, Response};
use sealbox_core::{AccelAxis, AccelerometerData, ChannelState, EventActions, PerimeterChannel, PerimeterEvent};
use std::time::Duration;

/// Whole milliseconds, rounded up so a sub-millisecond wait still blocks
fn timeout_millis(timeout: Duration) -> u32 {
    let ms = (timeout.as_nanos() + 999_999) / 1_000_000;
    u32::try_from(ms).unwrap_or(u32::MAX)
}

impl Session {
    /// Block until a tap is detected or `timeout` expires
    ///
    /// Returns `SeError::TimedOut` when no tap arrived.
    pub fn wait_for_tap(&self, timeout: Duration) -> SeResult<()> {
        self.wait_for_event(EventClass::Tap, timeout)
    }

    /// Block until a breach on a notify-host channel or `timeout` expires
    ///
    /// Channels without `EventActions::NOTIFY_HOST` never wake this wait.
    pub fn wait_for_perimeter_event(&self, timeout: Duration) -> SeResult<()> {
        self.wait_for_event(EventClass::Perimeter, timeout)
    }

    fn wait_for_event(&self, class: EventClass, timeout: Duration) -> SeResult<()> {
        let timeout_ms = timeout_millis(timeout);
        match self.wait_once(class, timeout_ms) {
            Err(SeError::TimedOut) if timeout_ms > 0 => {
                log::trace!("{:?} wait expired after {} ms, final poll", class, timeout_ms);
                self.wait_once(class, 0)
            }
            other => other,
        }
    }

    fn wait_once(&self, class: EventClass, timeout_ms: u32) -> SeResult<()> {
        match self.call(Command::WaitForEvent { class, timeout_ms })? {
            Response::Event => Ok(()),
            other => Err(unexpected("WaitForEvent", other)),
        }
    }

    /// Set tap sensitivity in percent; 0 disables detection on the axis
    pub fn set_tap_sensitivity(&self, axis: AccelAxis, percent: f32) -> SeResult<()> {
        if percent.is_nan() || !(0.0..=100.0).contains(&percent) {
            return Err(SeError::InvalidArgument(format!(
                "tap sensitivity must be within 0..=100, got {}",
                percent
            )));
        }
        self.call_ok(Command::SetTapSensitivity { axis, percent })
    }

    /// Latest accelerometer snapshot
    pub fn get_accelerometer_data(&self) -> SeResult<AccelerometerData> {
        match self.call(Command::GetAccelerometer)? {
            Response::Accelerometer(data) => Ok(data),
            other => Err(unexpected("GetAccelerometer", other)),
        }
    }

    /// Configure what a breach on `channel` does
    pub fn set_perimeter_event_action(&self, channel: PerimeterChannel, actions: EventActions) -> SeResult<()> {
        self.ensure_open()?;
        let channel = resolver::channel_index(self.info(), channel)?;
        log::info!("Perimeter channel {} actions set to {:?}", channel, actions);
        self.call_ok(Command::SetPerimeterAction {
            channel,
            actions: actions.bits(),
        })
    }

    /// Unacknowledged perimeter events, oldest first
    pub fn get_perimeter_detect_info(&self) -> SeResult<Vec<PerimeterEvent>> {
        match self.call(Command::GetPerimeterEvents)? {
            Response::PerimeterEvents(events) => Ok(events),
            other => Err(unexpected("GetPerimeterEvents", other)),
        }
    }

    /// Drop every recorded perimeter event and re-arm all channels
    pub fn clear_perimeter_detect_events(&self) -> SeResult<()> {
        self.call_ok(Command::ClearPerimeterEvents)
    }

    /// State of every perimeter channel, indexed by channel
    pub fn perimeter_channel_states(&self) -> SeResult<Vec<ChannelState>> {
        match self.call(Command::GetPerimeterStates)? {
            Response::ChannelStates(states) => Ok(states),
            other => Err(unexpected("GetPerimeterStates", other)),
        }
    }
}
