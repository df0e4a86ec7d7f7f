//! Settling-window debouncing of momentary switches.

use crate::config::DebounceScope;
use crate::Millis;

/// Electrical level of an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// `true` → [`Level::High`], `false` → [`Level::Low`].
    pub fn from_high(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }

    /// The opposite level.
    pub fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// A stable transition accepted by the [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// The input settled at its active level.
    Pressed,
    /// The input settled at its inactive level.
    Released,
}

/// Debounce and hold-to-repeat state of one momentary switch.
///
/// Created once at startup in the released state and only mutated by
/// [`Debouncer::poll`] and [`Repeater::poll`](crate::Repeater::poll).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputState {
    /// Level seen on the most recent poll.
    pub raw_level: Level,
    /// Level after debouncing.
    pub stable_level: Level,
    /// Time of the last accepted transition.
    pub last_transition_ms: Millis,
    /// Time of the last press edge.
    pub press_start_ms: Millis,
    /// Time of the last immediate or repeated adjustment.
    pub last_repeat_ms: Millis,
    /// `true` once a held press has passed the initial repeat delay.
    pub is_repeating: bool,
    active: Level,
}

impl InputState {
    /// New released input whose pressed level is `active`.
    pub fn new(active: Level) -> Self {
        let released = active.inverted();
        Self {
            raw_level: released,
            stable_level: released,
            last_transition_ms: 0,
            press_start_ms: 0,
            last_repeat_ms: 0,
            is_repeating: false,
            active,
        }
    }

    /// Switch to ground with a pull-up: pressed reads low.
    pub fn active_low() -> Self {
        Self::new(Level::Low)
    }

    /// The level that counts as pressed.
    pub fn active_level(&self) -> Level {
        self.active
    }

    /// The level that counts as released.
    pub fn released_level(&self) -> Level {
        self.active.inverted()
    }

    /// Returns `true` if the debounced level is the active level.
    pub fn is_pressed(&self) -> bool {
        self.stable_level == self.active
    }
}

/// Settling-window edge detector.
///
/// A raw level that differs from the stable level is accepted only when
/// more than `interval_ms` has passed since the last accepted transition.
/// Changes inside the window are dropped, not deferred: a bounce that ends
/// back at the stable level produces nothing.
///
/// With [`DebounceScope::Shared`] the "last accepted transition" is a single
/// timestamp across every input polled through this debouncer.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    interval_ms: Millis,
    scope: DebounceScope,
    shared_last_ms: Millis,
}

impl Debouncer {
    pub fn new(interval_ms: Millis, scope: DebounceScope) -> Self {
        Self {
            interval_ms,
            scope,
            shared_last_ms: 0,
        }
    }

    /// Feed one raw sample of `input` taken at `now`.
    ///
    /// Returns the accepted edge, if any.
    pub fn poll(&mut self, input: &mut InputState, raw: Level, now: Millis) -> Option<Edge> {
        input.raw_level = raw;

        if raw == input.stable_level {
            return None;
        }

        let last = match self.scope {
            DebounceScope::PerInput => input.last_transition_ms,
            DebounceScope::Shared => self.shared_last_ms,
        };
        if now.saturating_sub(last) <= self.interval_ms {
            return None;
        }

        input.stable_level = raw;
        input.last_transition_ms = now;
        self.shared_last_ms = now;

        if input.is_pressed() {
            Some(Edge::Pressed)
        } else {
            Some(Edge::Released)
        }
    }
}
