//! Encoder counter to wiper position binding.

use x9c_driver::clamp_position;

/// Converts a wrapping encoder counter into a bounded wiper target.
///
/// Only the difference between two counter readings carries meaning. The
/// difference is taken with wrapping subtraction so a counter rolling over
/// from `i32::MAX` to `i32::MIN` reads as a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderTracker {
    last_count: i32,
    bound_position: u8,
}

impl EncoderTracker {
    /// Start tracking from the current counter value and wiper step.
    pub fn new(count: i32, position: u8) -> Self {
        Self {
            last_count: count,
            bound_position: position,
        }
    }

    /// Process one counter reading.
    ///
    /// Applies the delta since the previous reading to the bound position,
    /// clamped to the wiper range. Returns the new target when it differs
    /// from `commanded`, the channel's last commanded step.
    ///
    /// The baseline is updated on every call, whether or not anything moved,
    /// so turning past a bound does not store up travel.
    pub fn poll(&mut self, count: i32, commanded: u8) -> Option<u8> {
        let delta = count.wrapping_sub(self.last_count);
        self.last_count = count;

        if delta != 0 {
            self.bound_position =
                clamp_position((self.bound_position as i32).saturating_add(delta));
        }

        (self.bound_position != commanded).then_some(self.bound_position)
    }

    /// Re-align with a channel that was moved by something else.
    pub fn rebind(&mut self, position: u8) {
        self.bound_position = position;
    }

    pub fn bound_position(&self) -> u8 {
        self.bound_position
    }

    pub fn last_count(&self) -> i32 {
        self.last_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_back() {
        let mut t = EncoderTracker::new(0, 50);
        assert_eq!(t.poll(3, 50), Some(53));
        assert_eq!(t.poll(1, 53), Some(51));
        assert_eq!(t.last_count(), 1);
    }

    #[test]
    fn no_movement_no_target() {
        let mut t = EncoderTracker::new(10, 50);
        assert_eq!(t.poll(10, 50), None);
    }

    #[test]
    fn clamps_at_top_and_does_not_accumulate() {
        let mut t = EncoderTracker::new(0, 97);
        assert_eq!(t.poll(10, 97), Some(99));
        // Further turning past the bound changes nothing.
        assert_eq!(t.poll(20, 99), None);
        // Turning back moves immediately, without unwinding the overshoot.
        assert_eq!(t.poll(19, 99), Some(98));
    }

    #[test]
    fn clamps_at_bottom() {
        let mut t = EncoderTracker::new(0, 2);
        assert_eq!(t.poll(-5, 2), Some(0));
        assert_eq!(t.poll(-9, 0), None);
        assert_eq!(t.bound_position(), 0);
    }

    #[test]
    fn wraparound_is_a_single_step() {
        let mut t = EncoderTracker::new(i32::MAX, 40);
        assert_eq!(t.poll(i32::MIN, 40), Some(41));

        let mut t = EncoderTracker::new(i32::MIN, 40);
        assert_eq!(t.poll(i32::MAX, 40), Some(39));
    }

    #[test]
    fn huge_delta_saturates_instead_of_overflowing() {
        let mut t = EncoderTracker::new(0, 50);
        assert_eq!(t.poll(i32::MAX, 50), Some(99));
    }

    #[test]
    fn baseline_updates_when_nothing_moves() {
        let mut t = EncoderTracker::new(0, 99);
        t.poll(5, 99);
        assert_eq!(t.last_count(), 5);
    }

    #[test]
    fn rebind_follows_external_moves() {
        let mut t = EncoderTracker::new(0, 50);
        t.rebind(20);
        assert_eq!(t.poll(1, 20), Some(21));
    }

    #[test]
    fn reports_target_when_commanded_differs() {
        // The channel was moved elsewhere but not rebound: the tracker
        // asks to restore its own bound position.
        let mut t = EncoderTracker::new(0, 30);
        assert_eq!(t.poll(0, 31), Some(30));
    }
}
