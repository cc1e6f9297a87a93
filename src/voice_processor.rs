//! Voice Processor (C8).
//!
//! Per voice, per sub-frame: step the filter and amplitude envelopes,
//! fetch or multipass-source 32 samples, resample, filter (SVF, HRTF), and
//! accumulate gain-scaled copies into up to eight mixbins.

use crate::constants::{HRTF_VOICE_COUNT, SUBFRAME_SAMPLES};
use crate::envelope::{self, EnvelopeParams, EnvelopeState};
use crate::error::VpTrap;
use crate::fetcher::{self, BufferPointers, VoiceFormat};
use crate::fixed_point::SampleFormat;
use crate::guest_memory::GuestMemory;
use crate::mixbin::{decode_volumes, MixbinFrame};
use crate::resampler::{self, ResamplerState};
use crate::state::{VoiceFilterState, VoiceSslState};
use crate::svf;
use crate::voice_memory::{fields, VoiceMemoryAccessor};

/// Snapshot of the fields of a voice record needed to process one
/// sub-frame, read once up front rather than re-fetched per sample.
pub struct VoiceSnapshot {
    pub container_size: fetcher::ContainerSize,
    pub sample_size: SampleFormat,
    pub samples_per_block: u32,
    pub stereo: bool,
    pub is_stream: bool,
    pub persist: bool,
    pub loop_enabled: bool,
    pub multipass: bool,
    pub clear_mix: bool,
    pub fmode: u32,

    pub bins: [u8; 8],
    pub vols: [u16; 8],
    pub fca_fc0: u16,
    pub fca_fc1: u16,

    pub pitch: u16,
    pub pitch_scale: i32,

    pub hrtf_target: u16,

    pub base: u32,
    pub cbo: u32,
    pub ebo: u32,
    pub lbo: u32,

    pub ea_params: EnvelopeParams,
    pub ef_params: EnvelopeParams,
}

pub fn load_snapshot(acc: &VoiceMemoryAccessor, voice: u16) -> Result<VoiceSnapshot, VpTrap> {
    let fmt = acc.get(voice, fields::CFG_FMT)?;
    let container_size = fetcher::ContainerSize::from_bits(acc.get(voice, fields::CFG_FMT_CONTAINER_SIZE)?);
    let sample_size = match acc.get(voice, fields::CFG_FMT_SAMPLE_SIZE)? {
        0 => SampleFormat::U8,
        1 => SampleFormat::S16,
        2 => SampleFormat::S24,
        _ => SampleFormat::S32,
    };

    let vbin = acc.get(voice, fields::CFG_VBIN)?;
    let bins = [
        (vbin & 0x1F) as u8,
        ((vbin >> 5) & 0x1F) as u8,
        ((vbin >> 10) & 0x1F) as u8,
        ((vbin >> 16) & 0x1F) as u8,
        ((vbin >> 21) & 0x1F) as u8,
        ((vbin >> 26) & 0x1F) as u8,
        (fmt & 0x1F) as u8,
        ((fmt >> 5) & 0x1F) as u8,
    ];

    let vola = acc.get(voice, fields::TAR_VOLA)?;
    let volb = acc.get(voice, fields::TAR_VOLB)?;
    let volc = acc.get(voice, fields::TAR_VOLC)?;
    let vols = decode_volumes(vola, volb, volc);

    let env0 = acc.get(voice, fields::CFG_ENV0)?;
    let enva = acc.get(voice, fields::CFG_ENVA)?;
    let misc = acc.get(voice, fields::CFG_MISC)?;

    let ea_params = EnvelopeParams {
        attack_rate: env0 & 0xFFF,
        delay_time: (env0 >> 12) & 0xFFF,
        decay_rate: enva & 0xFFF,
        hold_time: (enva >> 12) & 0xFFF,
        sustain_level: (enva >> 24) & 0xFF,
        release_rate: acc.get(voice, fields::TAR_LFO_ENV_EA_RELEASERATE)?,
    };
    let ef_params = EnvelopeParams {
        attack_rate: 0,
        delay_time: 0,
        decay_rate: 0,
        hold_time: 0,
        sustain_level: 0,
        release_rate: misc & 0xFFF,
    };

    Ok(VoiceSnapshot {
        container_size,
        sample_size,
        samples_per_block: acc.get(voice, fields::CFG_FMT_SAMPLES_PER_BLOCK)?,
        stereo: acc.get_bool(voice, fields::CFG_FMT_STEREO)?,
        is_stream: acc.get_bool(voice, fields::CFG_FMT_DATA_TYPE)?,
        persist: acc.get_bool(voice, fields::CFG_FMT_PERSIST)?,
        loop_enabled: acc.get_bool(voice, fields::CFG_FMT_LOOP)?,
        multipass: acc.get_bool(voice, fields::CFG_FMT_MULTIPASS)?,
        clear_mix: acc.get_bool(voice, fields::CFG_FMT_CLEAR_MIX)?,
        fmode: acc.get(voice, fields::CFG_MISC_FMODE)?,
        bins,
        vols,
        fca_fc0: acc.get(voice, fields::TAR_FCA_FC0)? as u16,
        fca_fc1: acc.get(voice, fields::TAR_FCA_FC1)? as u16,
        pitch: acc.get(voice, fields::TAR_PITCH_LINK_PITCH)? as u16,
        pitch_scale: acc.get(voice, fields::CFG_ENV0_EF_PITCHSCALE)? as i32,
        hrtf_target: acc.get(voice, fields::TAR_HRTF)? as u16,
        base: acc.get(voice, fields::CUR_PSL_START_BA)?,
        cbo: acc.get(voice, fields::PAR_OFFSET_CBO)?,
        ebo: acc.get(voice, fields::PAR_NEXT_EBO)?,
        lbo: acc.get(voice, fields::CUR_PSH_SAMPLE_LBO)?,
        ea_params,
        ef_params,
    })
}

pub struct ProcessOutcome {
    pub deactivated: bool,
    pub new_cbo: u32,
    /// SSL segment-list exhaustion notifier, set by the stream-mode fetch
    /// path independently of `deactivated` (persisting streams keep playing
    /// past a completed segment list).
    pub stream_notifier: Option<fetcher::NotifierEvent>,
}

/// Load the host-side envelope state `(EA, EF)` from the guest-resident
/// `PAR_STATE`/`CUR_ECNT`/`PAR_OFFSET`/`PAR_NEXT` fields. Unlike filter or
/// SSL state, envelope state lives entirely in the voice record, so no
/// separate host-side store is needed.
pub fn load_envelope_states(acc: &VoiceMemoryAccessor, voice: u16) -> Result<(EnvelopeState, EnvelopeState), VpTrap> {
    let ea = EnvelopeState {
        stage: acc.get(voice, fields::PAR_STATE_EACUR)? as u8,
        count: acc.get(voice, fields::CUR_ECNT_EACOUNT)?,
        level: acc.get(voice, fields::PAR_OFFSET_EALVL)?,
    };
    let ef = EnvelopeState {
        stage: acc.get(voice, fields::PAR_STATE_EFCUR)? as u8,
        count: acc.get(voice, fields::CUR_ECNT_EFCOUNT)?,
        level: acc.get(voice, fields::PAR_NEXT_EFLVL)?,
    };
    Ok((ea, ef))
}

/// Inverse of [`load_envelope_states`], called after processing a sub-frame.
pub fn store_envelope_states(
    acc: &VoiceMemoryAccessor,
    voice: u16,
    ea: &EnvelopeState,
    ef: &EnvelopeState,
) -> Result<(), VpTrap> {
    acc.set(voice, fields::PAR_STATE_EACUR, ea.stage as u32)?;
    acc.set(voice, fields::CUR_ECNT_EACOUNT, ea.count)?;
    acc.set(voice, fields::PAR_OFFSET_EALVL, ea.level)?;
    acc.set(voice, fields::PAR_STATE_EFCUR, ef.stage as u32)?;
    acc.set(voice, fields::CUR_ECNT_EFCOUNT, ef.count)?;
    acc.set(voice, fields::PAR_NEXT_EFLVL, ef.level)?;
    Ok(())
}

/// Resolve the per-bin gain = `ea * 10^(vol/(-20*64)) / 2^headroom`.
fn bin_gain(ea: f32, vol: u16, headroom: u8) -> f32 {
    ea * 10f32.powf(vol as f32 / (-20.0 * 64.0)) / 2f32.powi(headroom as i32)
}

/// Process one voice for one 32-sample sub-frame.
#[allow(clippy::too_many_arguments)]
pub fn process_voice(
    voice: u16,
    voice_index: usize,
    mem: &dyn GuestMemory,
    snapshot: &VoiceSnapshot,
    ea_state: &mut EnvelopeState,
    ef_state: &mut EnvelopeState,
    ssl_state: &mut VoiceSslState,
    ssl_base: usize,
    filter: &mut VoiceFilterState,
    resampler: &mut ResamplerState,
    multipass_source: Option<[[f32; 2]; SUBFRAME_SAMPLES]>,
    hrtf_submix: [u8; 4],
    hrtf_headroom: u8,
    submix_headroom: &[u8],
    hrtf_globally_enabled: bool,
    out: &mut MixbinFrame,
) -> ProcessOutcome {
    let ef_step = envelope::step(ef_state, &snapshot.ef_params, false);
    let ef = ef_step.amplitude;

    let rate = resampler::compute_rate(snapshot.pitch as i32, snapshot.pitch_scale, ef);

    let ea_step = envelope::step(ea_state, &snapshot.ea_params, true);
    let ea = ea_step.amplitude;

    if ea_step.force_release_reached {
        return ProcessOutcome { deactivated: true, new_cbo: snapshot.cbo, stream_notifier: None };
    }

    let (samples, new_cbo, deactivate_fetch, stream_notifier) = if snapshot.multipass {
        (multipass_source.unwrap_or([[0.0; 2]; SUBFRAME_SAMPLES]).to_vec(), snapshot.cbo, false, None)
    } else if snapshot.is_stream {
        let format = VoiceFormat {
            container_size: snapshot.container_size,
            sample_size: snapshot.sample_size,
            samples_per_block: snapshot.samples_per_block,
            stereo: snapshot.stereo,
            is_stream: true,
            persist: snapshot.persist,
            loop_enabled: false,
        };
        let outcome = fetcher::fetch_stream_mode(
            voice,
            mem,
            &format,
            ssl_base,
            ssl_state,
            ea_state.stage as u8,
            filter,
            SUBFRAME_SAMPLES,
        );
        let mut raw = resampler.process(rate, SUBFRAME_SAMPLES, {
            let mut it = outcome.samples.into_iter();
            move || it.next()
        });
        raw.resize(SUBFRAME_SAMPLES, [0.0, 0.0]);
        (raw, snapshot.cbo, outcome.deactivate, outcome.notifier)
    } else {
        let format = VoiceFormat {
            container_size: snapshot.container_size,
            sample_size: snapshot.sample_size,
            samples_per_block: snapshot.samples_per_block,
            stereo: snapshot.stereo,
            is_stream: false,
            persist: snapshot.persist,
            loop_enabled: snapshot.loop_enabled,
        };
        let ptrs = BufferPointers { base: snapshot.base, cbo: snapshot.cbo, ebo: snapshot.ebo, lbo: snapshot.lbo };
        let needed_input = (SUBFRAME_SAMPLES as f32 * rate).ceil() as usize + 16;
        let outcome = fetcher::fetch_buffer_mode(voice, mem, &format, ptrs, filter, needed_input);
        let new_cbo = outcome.new_cbo;
        let deactivate = outcome.deactivate;
        let mut it = outcome.samples.into_iter();
        let mut raw = resampler.process(rate, SUBFRAME_SAMPLES, move || it.next());
        raw.resize(SUBFRAME_SAMPLES, [0.0, 0.0]);
        (raw, new_cbo, deactivate, None)
    };

    let mut buf = [[0.0f32; 2]; SUBFRAME_SAMPLES];
    for (dst, src) in buf.iter_mut().zip(samples.iter()) {
        *dst = *src;
    }

    let lp_enabled = svf::lp_enabled(voice_index, snapshot.fmode, snapshot.stereo, HRTF_VOICE_COUNT);
    if lp_enabled {
        filter.svf[0].set_params(snapshot.fca_fc0, snapshot.fca_fc1);
        filter.svf[1].set_params(snapshot.fca_fc0, snapshot.fca_fc1);
        for s in buf.iter_mut() {
            s[0] = filter.svf[0].process(s[0]).clamp(-1.0, 1.0);
            s[1] = filter.svf[1].process(s[1]).clamp(-1.0, 1.0);
        }
    }

    let hrtf_active = voice_index < HRTF_VOICE_COUNT
        && hrtf_globally_enabled
        && snapshot.hrtf_target != 0xFFFF;
    if hrtf_active {
        for s in buf.iter_mut() {
            *s = filter.hrtf.process(*s);
        }
    }

    let mut resolved_bins = snapshot.bins;
    if voice_index < HRTF_VOICE_COUNT {
        resolved_bins[0] = hrtf_submix[0];
        resolved_bins[1] = hrtf_submix[1];
        resolved_bins[2] = hrtf_submix[2];
        resolved_bins[3] = hrtf_submix[3];
    }

    for (b, &bin) in resolved_bins.iter().enumerate() {
        let headroom = if voice_index < HRTF_VOICE_COUNT && b < 4 {
            hrtf_headroom
        } else {
            submix_headroom[bin as usize]
        };
        let gain = bin_gain(ea, snapshot.vols[b], headroom);
        let channel = b % 2;
        let dest = &mut out.bins[bin as usize];
        for (i, sample) in buf.iter().enumerate() {
            dest[i] += sample[channel] * gain;
        }
    }

    if deactivate_fetch {
        filter.reset();
    }

    ProcessOutcome { deactivated: deactivate_fetch, new_cbo, stream_notifier }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_gain_unity_at_zero_attenuation_and_headroom() {
        let g = bin_gain(1.0, 0, 0);
        assert!((g - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bin_gain_halves_per_headroom_bit() {
        let g0 = bin_gain(1.0, 0, 0);
        let g1 = bin_gain(1.0, 0, 1);
        assert!((g0 / g1 - 2.0).abs() < 1e-4);
    }
}
