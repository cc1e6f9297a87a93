//! Centralized constants for the voice processor core.

// Voice list / topology
pub const NUM_VOICES: usize = 256;
pub const HRTF_VOICE_COUNT: usize = 64;
pub const VOICE_HANDLE_NONE: u16 = 0xFFFF;
pub const MAX_LIST_TRAVERSAL: usize = NUM_VOICES;

// Frame geometry
pub const NUM_MIXBINS: usize = 32;
pub const SUBFRAME_SAMPLES: usize = 32;
pub const SUBFRAMES_PER_EP_FRAME: usize = 8;
pub const EP_FRAME_SAMPLES: usize = SUBFRAME_SAMPLES * SUBFRAMES_PER_EP_FRAME;
pub const EP_FRAME_US: u64 = 5333;
pub const MONITOR_SAMPLE_RATE: u32 = 48_000;

// Voice record layout
pub const VOICE_RECORD_BYTES: usize = 128;

// ADPCM
pub const ADPCM_BLOCK_SAMPLES: usize = 64;
pub const ADPCM_MONO_BLOCK_BYTES: usize = 36;
pub const ADPCM_STEREO_BLOCK_BYTES: usize = 72;

// HRTF
pub const HRTF_NUM_TAPS: usize = 31;
pub const HRTF_MAX_DELAY_SAMPLES: usize = 42;
pub const HRTF_BUFLEN: usize = HRTF_NUM_TAPS + HRTF_MAX_DELAY_SAMPLES; // 73
pub const HRTF_PARAM_SMOOTH_ALPHA: f32 = 0.01;
pub const HRTF_ENTRY_COUNT: usize = 128;

// SVF
pub const SVF_CUTOFF_MIN: f32 = 0.003_906;
pub const SVF_CUTOFF_MAX: f32 = 1.0;
pub const SVF_Q_MIN: f32 = 0.079_407;
pub const SVF_Q_MAX: f32 = 1.0;

// Envelope
pub const ENVELOPE_DECAY_BASE: f32 = 0.999_887_99;
pub const ENVELOPE_RELEASE_LN: f32 = -6.91;

// SSL / scatter-gather
pub const MAX_SSL_PRDS: usize = 2048;
pub const NV_PSGE_SIZE: usize = 8;
pub const SSL_SEGMENTS_PER_VOICE: usize = 2;

// Notifier
pub const NOTIFIER_RECORD_BYTES: usize = 16;
pub const NOTIFIER_BASE_OFFSET: usize = 2;
pub const NOTIFIER_COUNT: usize = 2;
pub const DONE_SUCCESS: u8 = 0x01;
pub const FEVINTSTS: u32 = 1 << 0;
pub const FENINTSTS: u32 = 1 << 1;

// Worker pool
pub const MAX_WORKERS: usize = 64;

// Register space
pub const VP_REGISTER_SPACE_BYTES: usize = 0x10000;
pub const PIO_FREE_VALUE: u32 = 0x80;
