//! SVF Low-Pass (C4).
//!
//! Chamberlin state-variable filter, one instance per channel per voice.
//! Ported directly from the reference filter (itself adapted from the SWH
//! LADSPA plugin package) rather than a biquad or Moog-ladder design, since
//! this filter's topology (and its soft anti-overflow cubic waveshaper on
//! the band-pass state) is specific to this hardware.

use crate::constants::{SVF_CUTOFF_MAX, SVF_CUTOFF_MIN, SVF_Q_MAX, SVF_Q_MIN};

#[derive(Debug, Clone, Copy, Default)]
pub struct SvfFilter {
    f: f32,
    q: f32,
    qnrm: f32,
    h: f32,
    b: f32,
    l: f32,
    n: f32,
    p: f32,
}

impl SvfFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `fc` is the raw `TAR_FCA.FC0` register value, `q_raw` is `FC1`.
    pub fn set_params(&mut self, fc_raw: u16, q_raw: u16) {
        let fc = 2f32.powf(fc_raw as f32 / 4096.0).clamp(SVF_CUTOFF_MIN, SVF_CUTOFF_MAX);
        let q = (q_raw as f32 / 32768.0).clamp(SVF_Q_MIN, SVF_Q_MAX);
        self.f = fc;
        self.q = q;
        self.qnrm = (q / 2.0 + 0.01).sqrt();
    }

    pub fn reset(&mut self) {
        self.h = 0.0;
        self.b = 0.0;
        self.l = 0.0;
        self.n = 0.0;
        self.p = 0.0;
    }

    /// Run one sample; returns the low-pass tap, clamped to `[-1, 1]` by the
    /// caller (the voice processor) rather than here, so the filter's own
    /// state stays unclamped.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let scaled = self.qnrm * input;
        self.b -= self.b * self.b * self.b * 0.001;
        self.h = scaled - self.l - self.q * self.b;
        self.b += self.f * self.h;
        self.l += self.f * self.b;
        self.n = self.l + self.h;
        self.p = self.l - self.h;
        self.l
    }
}

/// Decide whether the low-pass is active for a voice, per the
/// `CFG_MISC.FMODE` gating table (HRTF and stereo voices only filter in
/// mode 1, mono non-HRTF voices also filter in mode 3).
pub fn lp_enabled(voice_index: usize, fmode: u32, stereo: bool, hrtf_voice_count: usize) -> bool {
    if voice_index < hrtf_voice_count {
        fmode == 1
    } else if stereo {
        fmode == 1
    } else {
        fmode == 1 || fmode == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_sine_at_cutoff_stays_bounded() {
        for q_raw in [2603u16, 10000, 32768] {
            let mut f = SvfFilter::new();
            f.set_params(4096, q_raw);
            let mut max_out = 0f32;
            for i in 0..4096 {
                let phase = i as f32 / 48000.0 * std::f32::consts::TAU * 3000.0;
                let out = f.process(phase.sin());
                max_out = max_out.max(out.abs());
            }
            assert!(max_out <= 1.5, "q_raw={q_raw} max_out={max_out}");
        }
    }

    #[test]
    fn lp_gating_matches_hrtf_and_stereo_rules() {
        assert!(lp_enabled(0, 1, true, 64));
        assert!(!lp_enabled(0, 2, true, 64));
        assert!(lp_enabled(100, 1, false, 64));
        assert!(lp_enabled(100, 3, false, 64));
        assert!(!lp_enabled(100, 2, false, 64));
        assert!(lp_enabled(100, 1, true, 64));
    }
}
