//! Resampler (C7).
//!
//! A small windowed-sinc resampler driven by a pull callback: the voice
//! processor asks for [`crate::constants::SUBFRAME_SAMPLES`] output samples
//! at the voice's current rate, and the callback repeatedly invokes the
//! Sample Fetcher until either enough input has arrived or the voice goes
//! inactive, at which point the remainder is zero-padded so the resampler
//! never hangs waiting on a dead voice.

const SINC_HALF_WIDTH: usize = 4;
const SINC_TAPS: usize = SINC_HALF_WIDTH * 2;

/// Rate for this sub-frame: `1 / 2^((pitch + pitch_scale * 32 * ef) / 4096)`,
/// evaluated once per frame, not per sample.
pub fn compute_rate(pitch: i32, pitch_scale: i32, ef: f32) -> f32 {
    let exponent = (pitch as f32 + pitch_scale as f32 * 32.0 * ef) / 4096.0;
    1.0 / 2f32.powf(exponent)
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-8 {
        1.0
    } else {
        let px = std::f32::consts::PI * x;
        px.sin() / px
    }
}

fn window(x: f32, half_width: f32) -> f32 {
    // Hann window over the sinc kernel's support.
    0.5 * (1.0 + (std::f32::consts::PI * x / half_width).cos())
}

/// Ring history of recently pulled input samples, used as the sinc kernel's
/// support. Holds at least `SINC_TAPS` stereo samples.
pub struct ResamplerState {
    history: Vec<[f32; 2]>,
    read_pos: f32,
}

impl Default for ResamplerState {
    fn default() -> Self {
        Self { history: Vec::new(), read_pos: 0.0 }
    }
}

impl ResamplerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.read_pos = 0.0;
    }

    /// Produce `count` output samples at `rate` (output_samples_consumed =
    /// rate * count input samples), pulling input on demand via `pull`.
    /// `pull` returns `None` once the voice has gone inactive; the
    /// remainder of the requested output is zero-padded.
    pub fn process<F>(&mut self, rate: f32, count: usize, mut pull: F) -> Vec<[f32; 2]>
    where
        F: FnMut() -> Option<[f32; 2]>,
    {
        let mut out = Vec::with_capacity(count);
        let mut starved = false;

        for _ in 0..count {
            if starved {
                out.push([0.0, 0.0]);
                continue;
            }

            let needed = self.read_pos as usize + SINC_HALF_WIDTH + 1;
            while self.history.len() <= needed {
                match pull() {
                    Some(s) => self.history.push(s),
                    None => {
                        starved = true;
                        break;
                    }
                }
            }

            if starved && self.history.len() <= needed {
                out.push([0.0, 0.0]);
                continue;
            }

            out.push(self.interpolate());
            self.read_pos += rate;

            let drop = (self.read_pos as usize).saturating_sub(SINC_HALF_WIDTH);
            if drop > 0 && drop < self.history.len() {
                self.history.drain(0..drop);
                self.read_pos -= drop as f32;
            }
        }

        out
    }

    fn interpolate(&self) -> [f32; 2] {
        let center = self.read_pos;
        let base = center.floor() as isize;
        let mut acc = [0.0f32; 2];

        for tap in -(SINC_HALF_WIDTH as isize)..(SINC_HALF_WIDTH as isize) {
            let idx = base + tap;
            if idx < 0 || idx as usize >= self.history.len() {
                continue;
            }
            let x = center - idx as f32;
            let weight = sinc(x) * window(x, SINC_HALF_WIDTH as f32);
            let s = self.history[idx as usize];
            acc[0] += s[0] * weight;
            acc[1] += s[1] * weight;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_one_is_unity() {
        assert!((compute_rate(0, 0, 0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn starvation_zero_pads_remainder() {
        let mut state = ResamplerState::new();
        let mut supply = vec![[1.0f32, 1.0]; 3].into_iter();
        let out = state.process(1.0, 8, || supply.next());
        assert_eq!(out.len(), 8);
        assert_eq!(out[7], [0.0, 0.0]);
    }

    #[test]
    fn unity_rate_roughly_tracks_input_with_plenty_of_history() {
        let mut state = ResamplerState::new();
        let mut supply = (0..64).map(|_| [1.0f32, 1.0]);
        let out = state.process(1.0, 16, || supply.next());
        for s in &out[SINC_HALF_WIDTH..] {
            assert!((s[0] - 1.0).abs() < 0.05);
        }
    }
}
