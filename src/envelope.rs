//! Envelope Engine (C3).
//!
//! Two independent instances per voice (amplitude EA, filter EF) share this
//! state machine; the caller supplies which register/mask pair each
//! instance reads its rate parameters from. Kept as a small `Params`/`State`
//! pair in the same shape the DSP module collection uses elsewhere in this
//! crate for its envelope generators, but the eight states and their exact
//! formulas below are the hardware's, not a generic ADSR.

use crate::constants::{ENVELOPE_DECAY_BASE, ENVELOPE_RELEASE_LN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeStage {
    Off = 0,
    Delay = 1,
    Attack = 2,
    Hold = 3,
    Decay = 4,
    Sustain = 5,
    Release = 6,
    ForceRelease = 7,
}

impl EnvelopeStage {
    pub fn from_u8(v: u8) -> Self {
        match v & 0x7 {
            0 => EnvelopeStage::Off,
            1 => EnvelopeStage::Delay,
            2 => EnvelopeStage::Attack,
            3 => EnvelopeStage::Hold,
            4 => EnvelopeStage::Decay,
            5 => EnvelopeStage::Sustain,
            6 => EnvelopeStage::Release,
            _ => EnvelopeStage::ForceRelease,
        }
    }
}

/// Rate/time parameters read from a voice record's `CFG_ENV*` fields. Units
/// match the hardware registers: rates/times are 12-bit register values,
/// `sustain_level` is an 8-bit level.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeParams {
    pub delay_time: u32,
    pub attack_rate: u32,
    pub hold_time: u32,
    pub decay_rate: u32,
    pub sustain_level: u32,
    pub release_rate: u32,
}

/// Mutable per-envelope state, mirroring `PAR_STATE.{EA,EF}CUR`,
/// `CUR_ECNT.{EA,EF}COUNT`, and `PAR_OFFSET.EALVL` / `PAR_NEXT.EFLVL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeState {
    pub stage: u8,
    pub count: u32,
    pub level: u32,
}

impl EnvelopeState {
    pub fn stage(&self) -> EnvelopeStage {
        EnvelopeStage::from_u8(self.stage)
    }
}

/// Outcome of stepping one envelope by one sample.
pub struct StepResult {
    /// Normalized amplitude in `[0, 1]`.
    pub amplitude: f32,
    /// True only for the EA envelope reaching [`EnvelopeStage::ForceRelease`]
    /// — the voice processor must deactivate the voice on this tick.
    pub force_release_reached: bool,
}

/// Step one envelope by one sample through the eight-state machine.
pub fn step(state: &mut EnvelopeState, params: &EnvelopeParams, is_ea: bool) -> StepResult {
    let stage = state.stage();
    let mut force_release_reached = false;

    let amplitude = match stage {
        EnvelopeStage::Off => {
            state.count = 0;
            state.level = 0xFF;
            1.0
        }
        EnvelopeStage::Delay => {
            state.level = 0x00;
            if state.count == 0 {
                state.stage = EnvelopeStage::Attack as u8;
                state.count = 0;
            } else {
                state.count -= 1;
            }
            0.0
        }
        EnvelopeStage::Attack => {
            let value: u32 = if params.attack_rate == 0 {
                255
            } else {
                ((state.count * 255) / (params.attack_rate * 16)).min(255)
            };
            state.level = value;
            let attack_total = params.attack_rate * 16;
            if state.count == attack_total {
                state.stage = EnvelopeStage::Hold as u8;
                state.count = params.hold_time * 16;
            } else {
                state.count += 1;
            }
            value as f32 / 255.0
        }
        EnvelopeStage::Hold => {
            state.level = 0xFF;
            if state.count == 0 {
                state.stage = EnvelopeStage::Decay as u8;
                state.count = params.decay_rate * 16;
            } else {
                state.count -= 1;
            }
            1.0
        }
        EnvelopeStage::Decay => {
            let value: f32 = if params.decay_rate == 0 {
                0.0
            } else {
                let decay_total = params.decay_rate * 16;
                let exponent =
                    (decay_total.saturating_sub(state.count)) as f64 * 4096.0 / params.decay_rate as f64;
                255.0 * (ENVELOPE_DECAY_BASE as f64).powf(exponent) as f32
            };
            if value <= params.sustain_level as f32 + 0.2 || value > 255.0 {
                state.stage = EnvelopeStage::Sustain as u8;
            } else {
                state.count = state.count.saturating_sub(1);
                state.level = value as u32;
            }
            value / 255.0
        }
        EnvelopeStage::Sustain => {
            state.count = 0;
            state.level = params.sustain_level;
            params.sustain_level as f32 / 255.0
        }
        EnvelopeStage::Release => {
            if params.release_rate == 0 {
                state.count = 0;
            }
            if state.count == 0 {
                state.stage = EnvelopeStage::ForceRelease as u8;
                0.0
            } else {
                let release_total = (params.release_rate * 16) as f32;
                let pos = (1.0 - state.count as f32 / release_total).clamp(0.0, 1.0);
                let value = (ENVELOPE_RELEASE_LN * pos).exp() * state.level as f32;
                state.count -= 1;
                value / 255.0
            }
        }
        EnvelopeStage::ForceRelease => {
            if is_ea {
                force_release_reached = true;
            }
            0.0
        }
    };

    StepResult { amplitude, force_release_reached }
}

/// Loads `EA`/`EF` initial state from a `VOICE_ON` argument nibble.
pub fn trigger(state: &mut EnvelopeState, params: &EnvelopeParams) {
    state.stage = EnvelopeStage::Delay as u8;
    state.count = params.delay_time * 16;
    state.level = 0;
}

/// `VOICE_RELEASE`: load the release counter and transition to RELEASE.
pub fn release(state: &mut EnvelopeState, params: &EnvelopeParams) {
    state.stage = EnvelopeStage::Release as u8;
    state.count = params.release_rate * 16;
}
