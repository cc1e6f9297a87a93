//! MCPX Audio Processing Unit — Voice Processor core.
//!
//! A fixed-rate audio mixing engine: every 5.333 ms EP frame, walk the
//! 2D/3D/multipass voice lists, decode and resample each active voice's
//! sample stream, step its amplitude/filter envelopes, optionally run an
//! SVF low-pass and HRTF convolution, and accumulate gain-scaled copies
//! into 32 mixbins of 32 samples each. The downstream programmable DSP
//! layer that consumes those mixbins is out of scope for this crate.

pub mod adpcm;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod fixed_point;
pub mod frame_driver;
pub mod guest_memory;
pub mod hrtf;
pub mod logger;
pub mod mixbin;
pub mod multipass;
pub mod notifier;
pub mod regs;
pub mod resampler;
pub mod sge;
pub mod ssl;
pub mod state;
pub mod svf;
pub mod voice_memory;
pub mod voice_processor;
pub mod worker_pool;

pub use config::VpConfig;
pub use error::{VpError, VpTrap};
pub use frame_driver::{FrameDriver, FrameDriverConfig};
pub use guest_memory::{FlatGuestMemory, GuestMemory};
pub use state::VpSharedState;
