//! Process-wide host-side VP shared state.
//!
//! Kept as an explicit struct, injected by reference into each component at
//! construction rather than behind a global pointer. `voice_locked` is a
//! bitset the method dispatcher sets around edits and the frame driver
//! respects before enqueuing a voice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::adpcm::DecodedBlock;
use crate::constants::{HRTF_ENTRY_COUNT, HRTF_NUM_TAPS, NUM_MIXBINS, NUM_VOICES};
use crate::hrtf::HrtfFilter;
use crate::svf::SvfFilter;

/// Two SSL descriptors per voice (stream mode), tracking which of the two
/// is active and the current segment index within it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SslDescriptor {
    pub base_page: u32,
    pub segment_count: u32,
    pub current_segment: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceSslState {
    pub ssl: [SslDescriptor; 2],
    /// 0 or 1: which of `ssl` is currently playing.
    pub current_index: u8,
}

/// Host-resident per-voice filter state: SVF (2 channels), HRTF, and the
/// ADPCM decode cache used by the fetcher.
#[derive(Clone)]
pub struct VoiceFilterState {
    pub svf: [SvfFilter; 2],
    pub hrtf: HrtfFilter,
    pub cached_block: Option<DecodedBlock>,
    pub cached_block_start_cbo: u32,
}

impl Default for VoiceFilterState {
    fn default() -> Self {
        Self {
            svf: [SvfFilter::new(), SvfFilter::new()],
            hrtf: HrtfFilter::new(),
            cached_block: None,
            cached_block_start_cbo: u32::MAX,
        }
    }
}

impl VoiceFilterState {
    /// Mirrors `voice_reset_filters`: clear SVF and HRTF delay-line history
    /// and the ADPCM block cache when a voice deactivates.
    pub fn reset(&mut self) {
        for svf in &mut self.svf {
            svf.reset();
        }
        self.hrtf.clear_history();
        self.cached_block = None;
        self.cached_block_start_cbo = u32::MAX;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HrtfEntry {
    pub hrir: [[f32; HRTF_NUM_TAPS]; 2],
    pub itd: f32,
}

/// List head/current/next registers for the three voice lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceListRegs {
    pub top: u16,
    pub current: u16,
    pub next: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceList {
    TwoD,
    ThreeD,
    MultiPass,
}

pub struct VpSharedState {
    pub ssl_state: Mutex<Vec<VoiceSslState>>,
    pub ssl_base_page: Mutex<Vec<u32>>,
    pub hrtf_submix: Mutex<[u8; 4]>,
    pub hrtf_headroom: Mutex<u8>,
    pub submix_headroom: Mutex<[u8; NUM_MIXBINS]>,
    pub voice_locked: Vec<AtomicBool>,
    pub filters: Mutex<Vec<VoiceFilterState>>,
    pub hrtf_entries: Mutex<Vec<HrtfEntry>>,
    pub lists: Mutex<[VoiceListRegs; 3]>,
    pub hrtf_globally_enabled: AtomicBool,
}

impl Default for VpSharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl VpSharedState {
    pub fn new() -> Self {
        Self {
            ssl_state: Mutex::new(vec![VoiceSslState::default(); NUM_VOICES]),
            ssl_base_page: Mutex::new(vec![0u32; NUM_VOICES]),
            hrtf_submix: Mutex::new([0; 4]),
            hrtf_headroom: Mutex::new(0),
            submix_headroom: Mutex::new([0; NUM_MIXBINS]),
            voice_locked: (0..NUM_VOICES).map(|_| AtomicBool::new(false)).collect(),
            filters: Mutex::new(vec![VoiceFilterState::default(); NUM_VOICES]),
            hrtf_entries: Mutex::new(vec![HrtfEntry::default(); HRTF_ENTRY_COUNT]),
            lists: Mutex::new([VoiceListRegs::default(); 3]),
            hrtf_globally_enabled: AtomicBool::new(true),
        }
    }

    pub fn lock_voice(&self, voice: u16) {
        self.voice_locked[voice as usize].store(true, Ordering::Release);
    }

    pub fn unlock_voice(&self, voice: u16) {
        self.voice_locked[voice as usize].store(false, Ordering::Release);
    }

    pub fn is_voice_locked(&self, voice: u16) -> bool {
        self.voice_locked[voice as usize].load(Ordering::Acquire)
    }
}

impl Clone for VoiceFilterState {
    fn clone(&self) -> Self {
        Self {
            svf: self.svf,
            hrtf: self.hrtf.clone(),
            cached_block: self.cached_block.clone(),
            cached_block_start_cbo: self.cached_block_start_cbo,
        }
    }
}
