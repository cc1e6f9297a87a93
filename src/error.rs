//! Error taxonomy for the voice processor.
//!
//! Mirrors the split the core draws between soft, guest-observable failures
//! and programmer-error traps: the former are recovered locally, the latter
//! abort the process. See [`VpError`] and [`VpTrap`].

use std::fmt;

/// A voice handle, 0..[`crate::constants::NUM_VOICES`).
pub type VoiceHandle = u16;

/// Soft failure: the voice involved is deactivated and an SSL-done notifier
/// fires, but the process keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpError {
    /// ADPCM block header failed the sanity check (index out of range or
    /// reserved byte non-zero).
    AdpcmHeaderInvalid { voice: VoiceHandle },
    /// A streaming voice exhausted its segment list while already past
    /// RELEASE and not marked to persist.
    StreamNotPersistent { voice: VoiceHandle },
    /// All eight ADPCM header words in a buffer-mode block were identical
    /// and non-zero (stale-buffer heuristic).
    StaleAdpcmBuffer { voice: VoiceHandle },
    /// The resampler callback could not fill its request because the voice
    /// went inactive mid-frame; the remainder was zero-padded.
    ResamplerStarved { voice: VoiceHandle },
}

impl fmt::Display for VpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VpError::AdpcmHeaderInvalid { voice } => {
                write!(f, "voice {voice}: ADPCM block header failed sanity check")
            }
            VpError::StreamNotPersistent { voice } => {
                write!(
                    f,
                    "voice {voice}: stream segment exhausted without persist and outside release"
                )
            }
            VpError::StaleAdpcmBuffer { voice } => {
                write!(f, "voice {voice}: stale ADPCM buffer heuristic triggered")
            }
            VpError::ResamplerStarved { voice } => {
                write!(f, "voice {voice}: resampler starved, remainder zero-padded")
            }
        }
    }
}

impl std::error::Error for VpError {}

/// Programmer-error trap: an emulator bug or a malicious/impossible guest
/// state. Callers at the outermost boundary turn this into a panic rather
/// than attempt to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpTrap {
    UnrecognizedMethod { address: u32 },
    UnsupportedFormat { voice: VoiceHandle, detail: String },
    ImpossibleVoiceState { voice: VoiceHandle, detail: String },
    IndexOutOfRange { what: &'static str, index: usize, bound: usize },
    UnhandledRegister { address: u32 },
}

impl fmt::Display for VpTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VpTrap::UnrecognizedMethod { address } => {
                write!(f, "unrecognized method at address {address:#06x}")
            }
            VpTrap::UnsupportedFormat { voice, detail } => {
                write!(f, "voice {voice}: unsupported format: {detail}")
            }
            VpTrap::ImpossibleVoiceState { voice, detail } => {
                write!(f, "voice {voice}: impossible state: {detail}")
            }
            VpTrap::IndexOutOfRange { what, index, bound } => {
                write!(f, "{what} index {index} out of range (bound {bound})")
            }
            VpTrap::UnhandledRegister { address } => {
                write!(f, "unhandled register access at {address:#06x}")
            }
        }
    }
}

impl std::error::Error for VpTrap {}

/// Fatal: call this at the outermost boundary when a [`VpTrap`] surfaces.
/// No attempt is made to continue from an inconsistent state.
pub fn abort_on_trap(trap: VpTrap) -> ! {
    panic!("voice processor trap: {trap}");
}
