//! MCPX Voice Processor demo harness.
//!
//! Programs one synthetic voice into a flat guest memory image, runs it
//! through the real frame driver for a configurable number of EP frames,
//! and prints each mixbin's RMS energy. There is no guest VM or register
//! bus here; `--voices` just repeats the same demo voice at consecutive
//! handles so the worker pool has more than one item to split across
//! threads.

use std::sync::Arc;

use clap::Parser;

use mcpx_vp::dispatch::Dispatcher;
use mcpx_vp::notifier::InterruptLatch;
use mcpx_vp::regs;
use mcpx_vp::state::VpSharedState;
use mcpx_vp::voice_memory::{fields, VoiceMemoryAccessor};
use mcpx_vp::{FlatGuestMemory, FrameDriver, FrameDriverConfig, GuestMemory, VpConfig};

const VOICE_BASE: usize = 0x0000;
const SSL_BASE: usize = 0x0001_0000;
const NOTIFIER_BASE: usize = 0x0002_0000;
const SAMPLE_BASE: usize = 0x0003_0000;
const MEMORY_SIZE: usize = 0x0004_0000;

const SAMPLE_COUNT: usize = 48;
const MIXBIN: u32 = 5;

// Voices below HRTF_VOICE_COUNT have their first four bin destinations
// overridden by the shared HRTF submix regardless of their own HRTF
// target, so the demo voices live above that line to keep all eight
// configured bin slots landing on MIXBIN.
const FIRST_HANDLE: u16 = mcpx_vp::constants::HRTF_VOICE_COUNT as u16;

#[derive(Parser)]
#[command(name = "mcpx_vp")]
#[command(about = "Run the MCPX voice processor core against a synthetic voice")]
struct Args {
    /// Number of 32-sample sub-frames to run
    #[arg(short, long, default_value_t = 64)]
    frames: u32,

    /// Number of identical demo voices to activate
    #[arg(short, long, default_value_t = 1)]
    voices: u16,

    /// Worker pool size (0 = auto)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Disable the global HRTF gate
    #[arg(long)]
    no_hrtf: bool,
}

fn print_banner(frames: u32, voices: u16, num_workers: usize) {
    println!();
    println!(" ╔╦╗╔═╗╔═╗═╗ ╦  ╦═╗   Sub-frames: {frames}");
    println!("  ║║╠═╝╠═╝╔╩╦╝  ╠╦╝   Voices: {voices}");
    println!(" ═╩╝╩  ╩  ╩ ╚═  ╩╚═   Workers: {num_workers}");
    println!();
}

/// Write `count` mono S16 samples of a 1 kHz sine at 48 kHz starting at
/// `offset`, matching the scenario the demo voice reads from.
fn write_sine(mem: &FlatGuestMemory, offset: usize, count: usize) {
    for i in 0..count {
        let phase = 2.0 * std::f32::consts::PI * 1000.0 * (i as f32) / 48_000.0;
        let sample = (phase.sin() * i16::MAX as f32) as i16;
        mem.write_u8(offset + i * 2, (sample as u16 & 0xFF) as u8).unwrap();
        mem.write_u8(offset + i * 2 + 1, ((sample as u16 >> 8) & 0xFF) as u8).unwrap();
    }
}

/// Program one voice's record to play the sine buffer as a looping mono
/// S16 PCM beep, mixed eight times into bin 5 at full volume, then bring
/// it up via the same `VOICE_ON` method a real register write would use.
fn activate_demo_voice(
    mem: &FlatGuestMemory,
    shared: &VpSharedState,
    interrupts: &InterruptLatch,
    handle: u16,
) {
    let acc = VoiceMemoryAccessor::new(mem, VOICE_BASE);
    acc.set(handle, fields::CFG_VBIN_V0BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_VBIN_V1BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_VBIN_V2BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_VBIN_V3BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_VBIN_V4BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_VBIN_V5BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_FMT_V6BIN, MIXBIN).unwrap();
    acc.set(handle, fields::CFG_FMT_V7BIN, MIXBIN).unwrap();

    acc.set_bool(handle, fields::CFG_FMT_STEREO, false).unwrap();
    acc.set_bool(handle, fields::CFG_FMT_DATA_TYPE, false).unwrap(); // buffer mode
    acc.set_bool(handle, fields::CFG_FMT_LOOP, true).unwrap();
    acc.set_bool(handle, fields::CFG_FMT_MULTIPASS, false).unwrap();
    acc.set(handle, fields::CFG_FMT_SAMPLE_SIZE, 1).unwrap(); // S16
    acc.set(handle, fields::CFG_FMT_CONTAINER_SIZE, 1).unwrap(); // B16

    acc.set(handle, fields::CFG_ENVA_EA_SUSTAINLEVEL, 0xFF).unwrap();
    acc.set(handle, fields::TAR_VOLA, 0).unwrap();
    acc.set(handle, fields::TAR_VOLB, 0).unwrap();
    acc.set(handle, fields::TAR_VOLC, 0).unwrap();
    acc.set(handle, fields::TAR_HRTF, 0xFFFF).unwrap();
    acc.set(handle, fields::TAR_PITCH_LINK_PITCH, 0).unwrap();

    let voice_offset = (handle as usize) * SAMPLE_COUNT * 2;
    acc.set(handle, fields::CUR_PSL_START_BA, (SAMPLE_BASE + voice_offset) as u32).unwrap();
    acc.set(handle, fields::CUR_PSH_SAMPLE_LBO, 0).unwrap();
    acc.set(handle, fields::PAR_NEXT_EBO, (SAMPLE_COUNT - 1) as u32).unwrap();

    let mut d = Dispatcher::new(mem, VOICE_BASE, SSL_BASE, NOTIFIER_BASE, shared, interrupts);
    d.dispatch(regs::SET_ANTECEDENT_VOICE, 1 << 16).unwrap(); // enqueue onto the 2D list
    let ea_start: u32 = 5; // Sustain
    let ef_start: u32 = 0; // Off
    d.dispatch(regs::VOICE_ON, (ea_start << 28) | (ef_start << 24) | handle as u32).unwrap();
}

fn rms(samples: &[f32; mcpx_vp::constants::SUBFRAME_SAMPLES]) -> f32 {
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

fn main() {
    let args = Args::parse();
    let num_workers_hint =
        VpConfig { num_workers: args.workers, ..VpConfig::default() }.resolved_num_workers();
    print_banner(args.frames, args.voices, num_workers_hint);

    let mem = Arc::new(FlatGuestMemory::new(MEMORY_SIZE));
    for v in 0..args.voices {
        let handle = FIRST_HANDLE + v;
        let voice_offset = (handle as usize) * SAMPLE_COUNT * 2;
        write_sine(&mem, SAMPLE_BASE + voice_offset, SAMPLE_COUNT);
    }

    let shared = Arc::new(VpSharedState::new());
    let interrupts = Arc::new(InterruptLatch::new());
    if args.no_hrtf {
        shared.hrtf_globally_enabled.store(false, std::sync::atomic::Ordering::Release);
    }

    for v in 0..args.voices {
        activate_demo_voice(&mem, &shared, &interrupts, FIRST_HANDLE + v);
    }

    let config = FrameDriverConfig {
        voice_base: VOICE_BASE,
        ssl_base: SSL_BASE,
        notifier_base: NOTIFIER_BASE,
        num_workers: num_workers_hint,
        realtime_priority: false,
    };
    let mut driver = FrameDriver::new(mem, shared, interrupts, config);

    let mut energy = [0.0f32; mcpx_vp::constants::NUM_MIXBINS];
    for _ in 0..args.frames {
        driver.throttle();
        match driver.run_subframe() {
            Ok(frame) => {
                for (bin, acc) in frame.bins.iter().zip(energy.iter_mut()) {
                    *acc += rms(bin);
                }
            }
            Err(trap) => {
                eprintln!("frame driver trapped: {trap}");
                break;
            }
        }
    }

    println!("Mixbin energy (summed RMS over {} sub-frames):", args.frames);
    for (bin, total) in energy.iter().enumerate() {
        if *total > 0.0 {
            println!("  bin {bin:2}: {total:.4}");
        }
    }

    driver.shutdown();
}
