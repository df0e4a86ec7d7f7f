//! Hold-to-repeat for adjustment buttons.

use crate::debounce::{Edge, InputState};
use crate::Millis;

/// Synthesises repeated adjustments while a button stays pressed.
///
/// ```text
/// press ─┬─ adjust (immediate)
///        │  … initial_delay_ms …
///        ├─ adjust
///        │  … repeat_interval_ms …
///        ├─ adjust
///        ⋮
/// release ── stop
/// ```
///
/// The repeater knows nothing about range limits. Callers route every
/// adjustment through the same clamp-then-set path as a single press, so
/// holding at a bound keeps firing harmless no-op adjustments.
#[derive(Debug, Clone, Copy)]
pub struct Repeater {
    initial_delay_ms: Millis,
    repeat_interval_ms: Millis,
}

impl Repeater {
    pub fn new(initial_delay_ms: Millis, repeat_interval_ms: Millis) -> Self {
        Self {
            initial_delay_ms,
            repeat_interval_ms,
        }
    }

    /// Advance the repeat state of `input` by one tick.
    ///
    /// `edge` is what the debouncer accepted on this tick. Returns `true`
    /// when one adjustment should be applied now.
    pub fn poll(&self, input: &mut InputState, edge: Option<Edge>, now: Millis) -> bool {
        match edge {
            Some(Edge::Pressed) => {
                input.press_start_ms = now;
                input.last_repeat_ms = now;
                input.is_repeating = false;
                true
            }
            Some(Edge::Released) => {
                input.is_repeating = false;
                false
            }
            None if input.is_pressed() => self.poll_held(input, now),
            None => false,
        }
    }

    fn poll_held(&self, input: &mut InputState, now: Millis) -> bool {
        if !input.is_repeating && now.saturating_sub(input.press_start_ms) > self.initial_delay_ms {
            input.is_repeating = true;
        }

        if input.is_repeating && now.saturating_sub(input.last_repeat_ms) > self.repeat_interval_ms {
            input.last_repeat_ms = now;
            return true;
        }
        false
    }
}
