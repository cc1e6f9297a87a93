//! Shared scaffolding for the scenario integration tests.
//!
//! Each scenario wires a tiny guest memory image plus [`VpSharedState`] /
//! [`InterruptLatch`] the way a real register bus would, then drives it
//! through the public [`Dispatcher`]/[`FrameDriver`] API rather than poking
//! internal state directly.

#![allow(dead_code)]

use std::sync::Arc;

use mcpx_vp::dispatch::Dispatcher;
use mcpx_vp::notifier::InterruptLatch;
use mcpx_vp::regs;
use mcpx_vp::state::VpSharedState;
use mcpx_vp::voice_memory::{fields, VoiceMemoryAccessor};
use mcpx_vp::{FlatGuestMemory, FrameDriver, FrameDriverConfig, GuestMemory};

pub const VOICE_BASE: usize = 0x0000;
pub const SSL_BASE: usize = 0x0001_0000;
pub const NOTIFIER_BASE: usize = 0x0002_0000;
pub const SAMPLE_BASE: usize = 0x0003_0000;
pub const MEMORY_SIZE: usize = 0x0004_0000;

/// Build an empty image plus shared state, sized for a handful of voices.
pub fn new_harness() -> (Arc<FlatGuestMemory>, Arc<VpSharedState>, Arc<InterruptLatch>) {
    let mem = Arc::new(FlatGuestMemory::new(MEMORY_SIZE));
    let shared = Arc::new(VpSharedState::new());
    let interrupts = Arc::new(InterruptLatch::new());
    (mem, shared, interrupts)
}

pub fn driver(
    mem: Arc<FlatGuestMemory>,
    shared: Arc<VpSharedState>,
    interrupts: Arc<InterruptLatch>,
    num_workers: usize,
) -> FrameDriver {
    let mem: Arc<dyn GuestMemory> = mem;
    FrameDriver::new(
        mem,
        shared,
        interrupts,
        FrameDriverConfig {
            voice_base: VOICE_BASE,
            ssl_base: SSL_BASE,
            notifier_base: NOTIFIER_BASE,
            num_workers,
            realtime_priority: false,
        },
    )
}

/// Byte offset of a (voice, slot) notifier status byte, mirroring
/// `notifier::notifier_offset` (not itself public).
pub fn notifier_status_addr(voice: u16, slot_index: usize) -> usize {
    NOTIFIER_BASE
        + 16 * (mcpx_vp::constants::NOTIFIER_BASE_OFFSET + voice as usize * mcpx_vp::constants::NOTIFIER_COUNT + slot_index)
        + 15
}

/// Write `count` mono S16 samples of a 1 kHz sine at 48 kHz into `mem`
/// starting at `offset`.
pub fn write_sine(mem: &FlatGuestMemory, offset: usize, count: usize) {
    for i in 0..count {
        let phase = 2.0 * std::f32::consts::PI * 1000.0 * (i as f32) / 48_000.0;
        let sample = (phase.sin() * i16::MAX as f32) as i16;
        mem.write_u8(offset + i * 2, (sample as u16 & 0xFF) as u8).unwrap();
        mem.write_u8(offset + i * 2 + 1, ((sample as u16 >> 8) & 0xFF) as u8).unwrap();
    }
}

/// Program a voice to play a looping mono S16 PCM buffer into a single
/// mixbin at full volume and bring it up in SUSTAIN.
pub fn activate_mono_beep_voice(
    mem: &FlatGuestMemory,
    shared: &VpSharedState,
    interrupts: &InterruptLatch,
    handle: u16,
    sample_addr: usize,
    sample_count: usize,
    mixbin: u32,
) {
    let acc = VoiceMemoryAccessor::new(mem, VOICE_BASE);
    for field in [
        fields::CFG_VBIN_V0BIN,
        fields::CFG_VBIN_V1BIN,
        fields::CFG_VBIN_V2BIN,
        fields::CFG_VBIN_V3BIN,
        fields::CFG_VBIN_V4BIN,
        fields::CFG_VBIN_V5BIN,
    ] {
        acc.set(handle, field, mixbin).unwrap();
    }
    acc.set(handle, fields::CFG_FMT_V6BIN, mixbin).unwrap();
    acc.set(handle, fields::CFG_FMT_V7BIN, mixbin).unwrap();

    acc.set_bool(handle, fields::CFG_FMT_STEREO, false).unwrap();
    acc.set_bool(handle, fields::CFG_FMT_DATA_TYPE, false).unwrap();
    acc.set_bool(handle, fields::CFG_FMT_LOOP, true).unwrap();
    acc.set_bool(handle, fields::CFG_FMT_MULTIPASS, false).unwrap();
    acc.set(handle, fields::CFG_FMT_SAMPLE_SIZE, 1).unwrap();
    acc.set(handle, fields::CFG_FMT_CONTAINER_SIZE, 1).unwrap();

    acc.set(handle, fields::CFG_ENVA_EA_SUSTAINLEVEL, 0xFF).unwrap();
    acc.set(handle, fields::TAR_VOLA, 0).unwrap();
    acc.set(handle, fields::TAR_VOLB, 0).unwrap();
    acc.set(handle, fields::TAR_VOLC, 0).unwrap();
    acc.set(handle, fields::TAR_HRTF, 0xFFFF).unwrap();
    acc.set(handle, fields::TAR_PITCH_LINK_PITCH, 0).unwrap();

    acc.set(handle, fields::CUR_PSL_START_BA, sample_addr as u32).unwrap();
    acc.set(handle, fields::CUR_PSH_SAMPLE_LBO, 0).unwrap();
    acc.set(handle, fields::PAR_NEXT_EBO, (sample_count - 1) as u32).unwrap();

    let mut d = Dispatcher::new(mem, VOICE_BASE, SSL_BASE, NOTIFIER_BASE, shared, interrupts);
    d.dispatch(regs::SET_ANTECEDENT_VOICE, 1 << 16).unwrap();
    let ea_start: u32 = 5; // Sustain
    let ef_start: u32 = 0; // Off
    d.dispatch(regs::VOICE_ON, (ea_start << 28) | (ef_start << 24) | handle as u32).unwrap();
}
