//! Software quadrature decoding of a mechanical rotary encoder.

/// Sub-step direction for every `(previous, current)` phase pair, indexed
/// by `previous << 2 | current` with a phase state of `A << 1 | B`.
///
/// Zero entries are either "no change" or an impossible double transition
/// (both phases flipped between two samples), which is ignored.
const TRANSITIONS: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

/// Gray-code decoder producing a free-running detent counter.
///
/// Each sample of the two phase levels advances an internal sub-step
/// accumulator. Once it reaches `counts_per_detent` in either direction the
/// public counter moves by one. The counter wraps on overflow; consumers
/// must only ever look at differences between two readings.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QuadratureDecoder {
    phase: u8,
    sub_steps: i8,
    counts_per_detent: i8,
    count: i32,
}

impl QuadratureDecoder {
    /// Start decoding from the current phase levels.
    ///
    /// `counts_per_detent` is the number of valid transitions between two
    /// mechanical clicks (4 for most encoders, 2 for half-step ones). Values
    /// below 1 are treated as 1.
    pub fn new(a: bool, b: bool, counts_per_detent: i8) -> Self {
        Self {
            phase: phase(a, b),
            sub_steps: 0,
            counts_per_detent: counts_per_detent.max(1),
            count: 0,
        }
    }

    /// Feed one sample. Returns the detent step taken (−1, 0 or +1).
    pub fn update(&mut self, a: bool, b: bool) -> i32 {
        let current = phase(a, b);
        let step = TRANSITIONS[((self.phase << 2) | current) as usize];
        self.phase = current;

        if step == 0 {
            return 0;
        }

        self.sub_steps += step;
        if self.sub_steps >= self.counts_per_detent {
            self.sub_steps = 0;
            self.count = self.count.wrapping_add(1);
            1
        } else if self.sub_steps <= -self.counts_per_detent {
            self.sub_steps = 0;
            self.count = self.count.wrapping_sub(1);
            -1
        } else {
            0
        }
    }

    /// Free-running detent counter.
    pub fn count(&self) -> i32 {
        self.count
    }
}

fn phase(a: bool, b: bool) -> u8 {
    ((a as u8) << 1) | b as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One detent in the direction that counts up, starting from (1, 1).
    const CW: [(bool, bool); 4] = [(false, true), (false, false), (true, false), (true, true)];
    /// One detent in the direction that counts down, starting from (1, 1).
    const CCW: [(bool, bool); 4] = [(true, false), (false, false), (false, true), (true, true)];

    fn turn(decoder: &mut QuadratureDecoder, sequence: &[(bool, bool)]) -> i32 {
        sequence.iter().map(|&(a, b)| decoder.update(a, b)).sum()
    }

    #[test]
    fn one_detent_each_way() {
        let mut d = QuadratureDecoder::new(true, true, 4);
        assert_eq!(turn(&mut d, &CW), 1);
        assert_eq!(d.count(), 1);
        assert_eq!(turn(&mut d, &CCW), -1);
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn partial_detent_does_not_count() {
        let mut d = QuadratureDecoder::new(true, true, 4);
        assert_eq!(turn(&mut d, &CW[..3]), 0);
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn repeated_samples_are_ignored() {
        let mut d = QuadratureDecoder::new(true, true, 4);
        for &(a, b) in &CW {
            d.update(a, b);
            d.update(a, b);
        }
        assert_eq!(d.count(), 1);
    }

    #[test]
    fn double_transition_is_ignored() {
        let mut d = QuadratureDecoder::new(true, true, 4);
        // (1,1) -> (0,0) flips both phases at once.
        assert_eq!(d.update(false, false), 0);
        assert_eq!(d.count(), 0);
    }

    #[test]
    fn half_step_encoder() {
        let mut d = QuadratureDecoder::new(true, true, 2);
        assert_eq!(turn(&mut d, &CW), 2);
    }

    #[test]
    fn counter_wraps() {
        let mut d = QuadratureDecoder::new(true, true, 1);
        d.count = i32::MAX;
        d.update(false, true);
        assert_eq!(d.count(), i32::MIN);
    }

    #[test]
    fn zero_counts_per_detent_is_clamped() {
        let mut d = QuadratureDecoder::new(true, true, 0);
        assert_eq!(d.update(false, true), 1);
    }
}
