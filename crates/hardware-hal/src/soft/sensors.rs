//! Accelerometer and perimeter detect state of the software secure element

use sealbox_core::{
    AccelAxis, AccelerometerData, ChannelState, EventActions, EventClass, PerimeterChannel,
    PerimeterEvent, TapDirection,
};

/// Full-scale g-force of the accelerometer; a tap must reach
/// `(100 - sensitivity) %` of it to register
pub const TAP_FULL_SCALE_G: f64 = 4.0;

/// Sensitivity applied at power-up
pub const DEFAULT_TAP_SENSITIVITY: f32 = 50.0;

#[derive(Debug, Clone, Default)]
struct Channel {
    actions: EventActions,
    triggered: bool,
}

impl Channel {
    fn state(&self) -> ChannelState {
        if self.triggered {
            ChannelState::Triggered
        } else if self.actions.is_empty() {
            ChannelState::Idle
        } else {
            ChannelState::Armed
        }
    }
}

/// What a breach asks the device to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreachOutcome {
    /// The breach was latched (false when the channel was already triggered)
    pub recorded: bool,
    /// Host waits should wake
    pub notify: bool,
    /// Key material must be destroyed
    pub self_destruct: bool,
}

/// Sensor state
#[derive(Debug)]
pub(crate) struct SensorState {
    tap_sensitivity: [f32; 3],
    accel: AccelerometerData,
    tap_latched: bool,
    channels: Vec<Channel>,
    events: Vec<PerimeterEvent>,
    perimeter_latched: bool,
}

impl SensorState {
    pub(crate) fn new(perimeter_channels: u8) -> Self {
        let mut accel = AccelerometerData::default();
        // Resting on a bench: 1 g along z
        accel.z.g_force = 1.0;

        SensorState {
            tap_sensitivity: [DEFAULT_TAP_SENSITIVITY; 3],
            accel,
            tap_latched: false,
            channels: vec![Channel::default(); perimeter_channels as usize],
            events: Vec::new(),
            perimeter_latched: false,
        }
    }

    pub(crate) fn set_tap_sensitivity(&mut self, axis: AccelAxis, percent: f32) {
        for &index in axis.indices() {
            self.tap_sensitivity[index] = percent;
        }
    }

    fn tap_threshold(&self, index: usize) -> Option<f64> {
        let pct = self.tap_sensitivity[index];
        if pct <= 0.0 {
            return None;
        }
        Some(TAP_FULL_SCALE_G * f64::from(100.0 - pct) / 100.0)
    }

    /// Feed an accelerometer sample; returns true when it registers as a tap
    pub(crate) fn record_tap(&mut self, axis: usize, g_force: f64) -> bool {
        let detected = match self.tap_threshold(axis) {
            Some(threshold) => g_force.abs() >= threshold && g_force != 0.0,
            None => false,
        };

        for index in 0..3 {
            if let Some(reading) = self.accel.axis_mut(index) {
                reading.tap_direction = TapDirection::None;
            }
        }
        if let Some(reading) = self.accel.axis_mut(axis) {
            reading.g_force = g_force;
            if detected {
                reading.tap_direction = if g_force < 0.0 {
                    TapDirection::Negative
                } else {
                    TapDirection::Positive
                };
            }
        }

        if detected {
            self.tap_latched = true;
        }
        detected
    }

    pub(crate) fn accelerometer(&self) -> AccelerometerData {
        self.accel
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn set_actions(&mut self, channel: usize, actions: EventActions) -> bool {
        match self.channels.get_mut(channel) {
            Some(ch) => {
                ch.actions = actions;
                true
            }
            None => false,
        }
    }

    /// Latch a breach on `channel` at `timestamp`
    pub(crate) fn record_breach(&mut self, channel: usize, timestamp: u64) -> BreachOutcome {
        let Some(ch) = self.channels.get_mut(channel) else {
            return BreachOutcome::default();
        };
        if ch.triggered {
            return BreachOutcome::default();
        }

        ch.triggered = true;
        let outcome = BreachOutcome {
            recorded: true,
            notify: ch.actions.contains(EventActions::NOTIFY_HOST),
            self_destruct: ch.actions.contains(EventActions::SELF_DESTRUCT),
        };

        self.events.push(PerimeterEvent {
            channel: PerimeterChannel(channel as u8),
            timestamp,
        });
        if outcome.notify {
            self.perimeter_latched = true;
        }
        outcome
    }

    pub(crate) fn perimeter_events(&self) -> Vec<PerimeterEvent> {
        self.events.clone()
    }

    pub(crate) fn channel_states(&self) -> Vec<ChannelState> {
        self.channels.iter().map(Channel::state).collect()
    }

    /// Drop every latched event and re-arm all channels at once
    pub(crate) fn clear_perimeter(&mut self) {
        self.events.clear();
        self.perimeter_latched = false;
        for ch in &mut self.channels {
            ch.triggered = false;
        }
    }

    pub(crate) fn has_pending(&self, class: EventClass) -> bool {
        match class {
            EventClass::Tap => self.tap_latched,
            EventClass::Perimeter => self.perimeter_latched,
        }
    }

    /// Consume the latched notification of `class`
    ///
    /// Detections arriving while the latch is already set collapse into it,
    /// so any number of unobserved events satisfies exactly one wait.
    pub(crate) fn take_pending(&mut self, class: EventClass) -> bool {
        let latch = match class {
            EventClass::Tap => &mut self.tap_latched,
            EventClass::Perimeter => &mut self.perimeter_latched,
        };
        std::mem::take(latch)
    }

    /// Forget pending notifications (device reset)
    pub(crate) fn reset_pending(&mut self) {
        self.tap_latched = false;
        self.perimeter_latched = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_threshold() {
        let mut sensors = SensorState::new(2);

        // 50 % of 4 g full scale: 2 g needed
        assert!(!sensors.record_tap(0, 1.5));
        assert!(sensors.record_tap(0, -2.5));
        let accel = sensors.accelerometer();
        assert_eq!(accel.x.tap_direction, TapDirection::Negative);
        assert_eq!(accel.x.g_force, -2.5);

        sensors.set_tap_sensitivity(AccelAxis::X, 100.0);
        assert!(sensors.record_tap(0, 0.1));

        sensors.set_tap_sensitivity(AccelAxis::All, 0.0);
        assert!(!sensors.record_tap(1, 3.9));
        assert_eq!(sensors.accelerometer().y.tap_direction, TapDirection::None);
    }

    #[test]
    fn test_pending_taps() {
        let mut sensors = SensorState::new(0);
        sensors.record_tap(2, 3.0);
        sensors.record_tap(2, 3.0);
        sensors.record_tap(1, -3.0);

        assert!(sensors.has_pending(EventClass::Tap));
        assert!(sensors.take_pending(EventClass::Tap));
        assert!(!sensors.has_pending(EventClass::Tap));
        assert!(!sensors.take_pending(EventClass::Tap));

        sensors.record_tap(0, 3.0);
        assert!(sensors.take_pending(EventClass::Tap));
        assert!(!sensors.has_pending(EventClass::Perimeter));
    }

    #[test]
    fn test_channel_state_machine() {
        let mut sensors = SensorState::new(2);
        assert_eq!(sensors.channel_states(), vec![ChannelState::Idle, ChannelState::Idle]);

        assert!(sensors.set_actions(0, EventActions::NOTIFY_HOST));
        assert_eq!(sensors.channel_states()[0], ChannelState::Armed);

        let outcome = sensors.record_breach(0, 100);
        assert!(outcome.recorded && outcome.notify && !outcome.self_destruct);
        assert_eq!(sensors.channel_states()[0], ChannelState::Triggered);

        // Reconfiguring does not clear the latch
        sensors.set_actions(0, EventActions::empty());
        assert_eq!(sensors.channel_states()[0], ChannelState::Triggered);

        // Second breach on a latched channel is not recorded
        assert!(!sensors.record_breach(0, 200).recorded);

        sensors.clear_perimeter();
        assert_eq!(sensors.channel_states()[0], ChannelState::Idle);
        assert!(sensors.perimeter_events().is_empty());
        assert!(!sensors.has_pending(EventClass::Perimeter));
    }

    #[test]
    fn test_breach_order_and_notify_filter() {
        let mut sensors = SensorState::new(2);
        sensors.set_actions(1, EventActions::NOTIFY_HOST);

        let silent = sensors.record_breach(0, 10);
        assert!(silent.recorded && !silent.notify);
        assert!(!sensors.has_pending(EventClass::Perimeter));

        sensors.record_breach(1, 20);
        assert!(sensors.has_pending(EventClass::Perimeter));

        let events = sensors.perimeter_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].channel, PerimeterChannel(0));
        assert_eq!(events[1].channel, PerimeterChannel(1));
    }

    #[test]
    fn test_unknown_channel() {
        let mut sensors = SensorState::new(1);
        assert!(!sensors.set_actions(3, EventActions::NOTIFY_HOST));
        assert_eq!(sensors.record_breach(3, 1), BreachOutcome::default());
        assert_eq!(sensors.channel_count(), 1);
    }
}
