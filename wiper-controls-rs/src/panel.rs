//! What the display shows, and when it may be told.

use crate::config::RefreshPolicy;
use crate::{Millis, MAX_CHANNELS};

/// One channel as shown on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReading {
    /// Short label, e.g. `"Bass"`.
    pub label: &'static str,
    /// Wiper step, 0–99.
    pub position: u8,
}

/// Mode flags toggled from the front panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Modes {
    /// Signal routed around the potentiometers.
    pub bypass: bool,
    /// Gain boost stage engaged.
    pub boost: bool,
}

/// Snapshot of everything the display renders in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelState {
    /// Channel readings in channel order. `None` for unused slots.
    pub channels: [Option<ChannelReading>; MAX_CHANNELS],
    pub modes: Modes,
}

impl PanelState {
    /// Iterate over the populated channel slots.
    pub fn readings(&self) -> impl Iterator<Item = &ChannelReading> {
        self.channels.iter().flatten()
    }
}

/// Receiver of panel frames.
///
/// `publish` must return promptly: it is called from the control loop
/// between pulse trains. Implementations that drive slow hardware hand the
/// frame to another task instead of rendering inline.
pub trait PanelSink {
    fn publish(&mut self, state: &PanelState);
}

/// Sink for builds without a display.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPanel;

impl PanelSink for NoPanel {
    fn publish(&mut self, _state: &PanelState) {}
}

/// Rate limiter for display refreshes.
///
/// A refresh is due when the state is dirty and at least
/// `min_interval_ms` has passed since the last one, or when
/// `max_interval_ms` has passed regardless. The very first poll is always
/// due.
#[derive(Debug, Clone, Copy)]
pub struct RefreshGate {
    policy: RefreshPolicy,
    last_refresh_ms: Option<Millis>,
    dirty: bool,
}

impl RefreshGate {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            last_refresh_ms: None,
            dirty: false,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns `true` if a refresh should happen at `now`, and if so
    /// records it and clears the dirty flag.
    pub fn poll(&mut self, now: Millis) -> bool {
        let due = match self.last_refresh_ms {
            None => true,
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                (self.dirty && elapsed >= self.policy.min_interval_ms)
                    || elapsed >= self.policy.max_interval_ms
            }
        };

        if due {
            self.last_refresh_ms = Some(now);
            self.dirty = false;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RefreshGate {
        RefreshGate::new(RefreshPolicy::default())
    }

    #[test]
    fn first_poll_is_due() {
        let mut g = gate();
        assert!(g.poll(0));
        assert!(!g.poll(10));
    }

    #[test]
    fn dirty_waits_for_min_interval() {
        let mut g = gate();
        g.poll(1000);
        g.mark_dirty();

        assert!(!g.poll(1050));
        assert!(g.is_dirty());
        assert!(g.poll(1100));
        assert!(!g.is_dirty());
    }

    #[test]
    fn clean_state_is_forced_at_max_interval() {
        let mut g = gate();
        g.poll(1000);

        assert!(!g.poll(1500));
        assert!(!g.poll(1999));
        assert!(g.poll(2000));
        assert!(!g.poll(2100));
    }

    #[test]
    fn burst_of_changes_is_coalesced() {
        let mut g = gate();
        g.poll(0);

        let mut refreshes = 0;
        for t in (10..=300).step_by(10) {
            g.mark_dirty();
            if g.poll(t) {
                refreshes += 1;
            }
        }
        // 100, 200, 300
        assert_eq!(refreshes, 3);
    }

    #[test]
    fn readings_skip_empty_slots() {
        let mut state = PanelState::default();
        state.channels[0] = Some(ChannelReading {
            label: "Level",
            position: 50,
        });
        let labels: Vec<_> = state.readings().map(|r| r.label).collect();
        assert_eq!(labels, ["Level"]);
    }

    #[test]
    fn no_panel_accepts_frames() {
        let mut sink = NoPanel;
        sink.publish(&PanelState::default());
    }
}
