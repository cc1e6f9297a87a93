//! Sample Fetcher (C6).
//!
//! Computes a source address, decodes the voice's container/format, and
//! honors loop/stream/EOL semantics, producing up to N stereo samples and
//! advancing CBO. Multipass voices never reach this component — the voice
//! processor routes them through the Multipass Resolver (C9) instead.

use crate::adpcm::{self, DecodedBlock};
use crate::constants::ADPCM_BLOCK_SAMPLES;
use crate::error::VpError;
use crate::fixed_point::{container_to_f32, SampleFormat};
use crate::guest_memory::GuestMemory;
use crate::ssl::{self, SslSegment};
use crate::state::{VoiceFilterState, VoiceSslState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSize {
    B8,
    B16,
    Adpcm,
    B32,
}

impl ContainerSize {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => ContainerSize::B8,
            1 => ContainerSize::B16,
            2 => ContainerSize::Adpcm,
            _ => ContainerSize::B32,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            ContainerSize::B8 => 1,
            ContainerSize::B16 => 2,
            ContainerSize::Adpcm => 0, // not byte-addressed per sample
            ContainerSize::B32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VoiceFormat {
    pub container_size: ContainerSize,
    pub sample_size: SampleFormat,
    pub samples_per_block: u32,
    pub stereo: bool,
    pub is_stream: bool,
    pub persist: bool,
    pub loop_enabled: bool,
}

/// Current buffer-mode pointers, read from the voice record by the caller.
#[derive(Debug, Clone, Copy)]
pub struct BufferPointers {
    pub base: u32,
    pub cbo: u32,
    pub ebo: u32,
    pub lbo: u32,
}

/// What the caller should do after a fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierEvent {
    SslADone,
    SslBDone,
}

pub struct FetchOutcome {
    pub samples: Vec<[f32; 2]>,
    pub new_cbo: u32,
    /// Voice should be deactivated (end of non-looping buffer, stream
    /// exhausted without persist outside release, or a soft failure).
    pub deactivate: bool,
    pub notifier: Option<NotifierEvent>,
    pub error: Option<VpError>,
}

/// Is the envelope in or past the release family of states (RELEASE or
/// FORCE_RELEASE)? Needed by the stream-mode persist check.
pub fn is_released(ea_stage: u8) -> bool {
    ea_stage == 6 || ea_stage == 7
}

/// Buffer-mode fetch: non-stream, reads a linear/scatter-gather-mapped
/// region starting at `BA`, indexed by `CBO`.
pub fn fetch_buffer_mode(
    voice: u16,
    mem: &dyn GuestMemory,
    format: &VoiceFormat,
    ptrs: BufferPointers,
    filter: &mut VoiceFilterState,
    count: usize,
) -> FetchOutcome {
    let mut samples = Vec::with_capacity(count);
    let mut cbo = ptrs.cbo;
    let mut deactivate = false;
    let mut error = None;

    while samples.len() < count {
        if cbo >= ptrs.ebo {
            if format.loop_enabled {
                cbo = ptrs.lbo;
            } else {
                deactivate = true;
                break;
            }
        }

        match format.container_size {
            ContainerSize::Adpcm => {
                let block_bytes = if format.stereo { 72 } else { 36 };
                let block_index = cbo / ADPCM_BLOCK_SAMPLES as u32;
                let block_pos = (cbo % ADPCM_BLOCK_SAMPLES as u32) as usize;

                if filter.cached_block_start_cbo != block_index {
                    let addr = ptrs.base as usize + block_index as usize * block_bytes;
                    let mut raw = vec![0u8; block_bytes];
                    if mem.read_bytes(addr, &mut raw).is_err() {
                        deactivate = true;
                        break;
                    }

                    if is_stale_adpcm_buffer(&raw) {
                        error = Some(VpError::StaleAdpcmBuffer { voice });
                        deactivate = true;
                        break;
                    }

                    match adpcm::decode_block(&raw, if format.stereo { 2 } else { 1 }) {
                        Some(block) => {
                            filter.cached_block = Some(block);
                            filter.cached_block_start_cbo = block_index;
                        }
                        None => {
                            error = Some(VpError::AdpcmHeaderInvalid { voice });
                            deactivate = true;
                            break;
                        }
                    }
                }

                let block: &DecodedBlock = filter.cached_block.as_ref().unwrap();
                let l = block.sample(0, block_pos) as f32 / 32768.0;
                let r = if format.stereo { block.sample(1, block_pos) as f32 / 32768.0 } else { l };
                samples.push([l, r]);
                cbo += 1;
            }
            _ => {
                let container_bytes = format.container_size.bytes();
                let channels = if format.stereo { 2 } else { 1 };
                let addr = ptrs.base as usize + cbo as usize * container_bytes * channels;
                let mut raw = vec![0u8; container_bytes * channels];
                if mem.read_bytes(addr, &mut raw).is_err() {
                    deactivate = true;
                    break;
                }
                let l = container_to_f32(format.sample_size, &raw[0..container_bytes]);
                let r = if format.stereo {
                    container_to_f32(format.sample_size, &raw[container_bytes..container_bytes * 2])
                } else {
                    l
                };
                samples.push([l, r]);
                cbo += 1;
            }
        }
    }

    FetchOutcome { samples, new_cbo: cbo, deactivate, notifier: None, error }
}

/// 8 identical, non-zero header words is an observed stale-buffer
/// work-around condition for ADPCM blocks in buffer mode.
fn is_stale_adpcm_buffer(raw: &[u8]) -> bool {
    if raw.len() < 32 {
        return false;
    }
    let words: Vec<u32> = raw[0..32]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    words[0] != 0 && words.iter().all(|w| *w == words[0])
}

/// Stream-mode fetch: reads the currently active SSL segment. Loops are not
/// permitted for streams.
pub fn fetch_stream_mode(
    voice: u16,
    mem: &dyn GuestMemory,
    format: &VoiceFormat,
    ssl_base: usize,
    ssl_state: &mut VoiceSslState,
    ea_stage: u8,
    filter: &mut VoiceFilterState,
    count: usize,
) -> FetchOutcome {
    let mut samples = Vec::with_capacity(count);
    let mut deactivate = false;
    let mut notifier = None;
    let mut error = None;
    let mut seg_pos: u32 = 0;

    while samples.len() < count {
        let idx = ssl_state.current_index as usize;
        let desc = ssl_state.ssl[idx];
        let page = desc.base_page + desc.current_segment;
        let seg = match ssl::read_segment(mem, ssl_base, page as usize) {
            Ok(seg) => seg,
            Err(_) => {
                deactivate = true;
                break;
            }
        };

        if seg_pos > seg.last_index() as u32 {
            desc_advance_segment(ssl_state, idx, &seg, &mut notifier, &mut deactivate);
            if deactivate {
                break;
            }
            if is_released(ea_stage) && !format.persist {
                error = Some(VpError::StreamNotPersistent { voice });
                deactivate = true;
                break;
            }
            seg_pos = 0;
            continue;
        }

        let one = fetch_one_stream_sample(mem, format, &seg, seg_pos, filter);
        match one {
            Some(s) => samples.push(s),
            None => {
                deactivate = true;
                break;
            }
        }
        seg_pos += 1;
    }

    FetchOutcome { samples, new_cbo: 0, deactivate, notifier, error }
}

fn desc_advance_segment(
    ssl_state: &mut VoiceSslState,
    idx: usize,
    _seg: &SslSegment,
    notifier: &mut Option<NotifierEvent>,
    deactivate: &mut bool,
) {
    ssl_state.ssl[idx].current_segment += 1;
    if ssl_state.ssl[idx].current_segment >= ssl_state.ssl[idx].segment_count {
        ssl_state.ssl[idx].current_segment = 0;
        *notifier = Some(if idx == 0 { NotifierEvent::SslADone } else { NotifierEvent::SslBDone });
        ssl_state.current_index = 1 - ssl_state.current_index;
        *deactivate = false;
    }
}

fn fetch_one_stream_sample(
    mem: &dyn GuestMemory,
    format: &VoiceFormat,
    seg: &SslSegment,
    seg_pos: u32,
    filter: &mut VoiceFilterState,
) -> Option<[f32; 2]> {
    match format.container_size {
        ContainerSize::Adpcm => {
            let block_bytes = if seg.stereo { 72 } else { 36 };
            let block_index = seg_pos / ADPCM_BLOCK_SAMPLES as u32;
            let block_pos = (seg_pos % ADPCM_BLOCK_SAMPLES as u32) as usize;

            if filter.cached_block_start_cbo != block_index {
                let addr = seg.offset as usize + block_index as usize * block_bytes;
                let mut raw = vec![0u8; block_bytes];
                mem.read_bytes(addr, &mut raw).ok()?;
                let block = adpcm::decode_block(&raw, if seg.stereo { 2 } else { 1 })?;
                filter.cached_block = Some(block);
                filter.cached_block_start_cbo = block_index;
            }
            let block = filter.cached_block.as_ref()?;
            let l = block.sample(0, block_pos) as f32 / 32768.0;
            let r = if seg.stereo { block.sample(1, block_pos) as f32 / 32768.0 } else { l };
            Some([l, r])
        }
        _ => {
            let container_bytes = format.container_size.bytes();
            let channels = if seg.stereo { 2 } else { 1 };
            let addr = seg.offset as usize + seg_pos as usize * container_bytes * channels;
            let mut raw = vec![0u8; container_bytes * channels];
            mem.read_bytes(addr, &mut raw).ok()?;
            let l = container_to_f32(format.sample_size, &raw[0..container_bytes]);
            let r = if channels == 2 {
                container_to_f32(format.sample_size, &raw[container_bytes..container_bytes * 2])
            } else {
                l
            };
            Some([l, r])
        }
    }
}
