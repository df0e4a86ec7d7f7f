//! Timing configuration for the control loop.
//!
//! Every tunable lives in [`ControlTiming`]; there are no module-level
//! timing constants. [`ControlTiming::default()`] is the timing the panel
//! ships with.

use crate::Millis;

/// How debounce settling windows are scoped across inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebounceScope {
    /// Each input has its own settling timer.
    #[default]
    PerInput,
    /// One settling timer shared by all inputs. An accepted transition on
    /// any input blocks every other input for the rest of the window.
    Shared,
}

/// When the display may be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshPolicy {
    /// Minimum spacing between two refreshes caused by state changes. Default: 100.
    pub min_interval_ms: Millis,
    /// Maximum age of the displayed frame; a refresh is forced after this. Default: 1000.
    pub max_interval_ms: Millis,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            max_interval_ms: 1000,
        }
    }
}

/// Timing for input processing and the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlTiming {
    /// Delay between two control loop ticks. Default: 10.
    pub tick_ms: Millis,
    /// Debounce settling window. Default: 50.
    pub debounce_ms: Millis,
    /// Debounce timer scope. Default: [`DebounceScope::PerInput`].
    pub debounce_scope: DebounceScope,
    /// Hold time before a held button starts repeating. Default: 500.
    pub initial_delay_ms: Millis,
    /// Spacing between repeated adjustments. Default: 100.
    pub repeat_interval_ms: Millis,
    /// Display refresh policy.
    pub refresh: RefreshPolicy,
}

impl Default for ControlTiming {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            debounce_ms: 50,
            debounce_scope: DebounceScope::PerInput,
            initial_delay_ms: 500,
            repeat_interval_ms: 100,
            refresh: RefreshPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_values() {
        let t = ControlTiming::default();
        assert_eq!(t.tick_ms, 10);
        assert_eq!(t.debounce_ms, 50);
        assert_eq!(t.debounce_scope, DebounceScope::PerInput);
        assert_eq!(t.initial_delay_ms, 500);
        assert_eq!(t.repeat_interval_ms, 100);
    }

    #[test]
    fn default_refresh_policy() {
        let p = RefreshPolicy::default();
        assert_eq!(p.min_interval_ms, 100);
        assert_eq!(p.max_interval_ms, 1000);
    }
}
