//! Voice Memory Accessor (C1).
//!
//! Voice records live in guest RAM, 128 bytes each, and are read/written
//! word-at-a-time little-endian. Bit-fields are not modeled as a packed
//! struct (that form does not round-trip safely across endianness and
//! alignment in a memory-safe port) — instead every field goes through an
//! explicit mask/shift accessor over a `GuestMemory` view, matching the
//! Design Notes' "typed memory view; bit-fields via explicit mask/shift
//! accessors" replacement.

use crate::constants::VOICE_RECORD_BYTES;
use crate::error::VpTrap;
use crate::guest_memory::GuestMemory;

/// Offset (within a 128-byte voice record) and mask/shift for one field,
/// grounded in the hardware's `NV_PAVS_VOICE_*` register layout.
#[derive(Debug, Clone, Copy)]
pub struct FieldLoc {
    pub offset: usize,
    pub mask: u32,
}

impl FieldLoc {
    pub const fn new(offset: usize, mask: u32) -> Self {
        Self { offset, mask }
    }

    fn shift(&self) -> u32 {
        self.mask.trailing_zeros()
    }
}

pub mod fields {
    use super::FieldLoc;

    pub const CFG_VBIN: FieldLoc = FieldLoc::new(0x00, 0xFFFF_FFFF);
    pub const CFG_VBIN_V0BIN: FieldLoc = FieldLoc::new(0x00, 0x1F);
    pub const CFG_VBIN_V1BIN: FieldLoc = FieldLoc::new(0x00, 0x1F << 5);
    pub const CFG_VBIN_V2BIN: FieldLoc = FieldLoc::new(0x00, 0x1F << 10);
    pub const CFG_VBIN_V3BIN: FieldLoc = FieldLoc::new(0x00, 0x1F << 16);
    pub const CFG_VBIN_V4BIN: FieldLoc = FieldLoc::new(0x00, 0x1F << 21);
    pub const CFG_VBIN_V5BIN: FieldLoc = FieldLoc::new(0x00, 0x1F << 26);
    pub const CFG_FMT: FieldLoc = FieldLoc::new(0x04, 0xFFFF_FFFF);
    pub const CFG_FMT_V6BIN: FieldLoc = FieldLoc::new(0x04, 0x1F);
    pub const CFG_FMT_V7BIN: FieldLoc = FieldLoc::new(0x04, 0x1F << 5);
    pub const CFG_FMT_SAMPLES_PER_BLOCK: FieldLoc = FieldLoc::new(0x04, 0x1F << 16);
    pub const CFG_FMT_MULTIPASS: FieldLoc = FieldLoc::new(0x04, 1 << 21);
    pub const CFG_FMT_LINKED: FieldLoc = FieldLoc::new(0x04, 1 << 22);
    pub const CFG_FMT_PERSIST: FieldLoc = FieldLoc::new(0x04, 1 << 23);
    pub const CFG_FMT_DATA_TYPE: FieldLoc = FieldLoc::new(0x04, 1 << 24);
    pub const CFG_FMT_LOOP: FieldLoc = FieldLoc::new(0x04, 1 << 25);
    pub const CFG_FMT_CLEAR_MIX: FieldLoc = FieldLoc::new(0x04, 1 << 26);
    pub const CFG_FMT_STEREO: FieldLoc = FieldLoc::new(0x04, 1 << 27);
    pub const CFG_FMT_SAMPLE_SIZE: FieldLoc = FieldLoc::new(0x04, 0x3 << 28);
    pub const CFG_FMT_CONTAINER_SIZE: FieldLoc = FieldLoc::new(0x04, 0x3 << 30);

    pub const CFG_ENV0: FieldLoc = FieldLoc::new(0x08, 0xFFFF_FFFF);
    pub const CFG_ENV0_EA_ATTACKRATE: FieldLoc = FieldLoc::new(0x08, 0xFFF);
    pub const CFG_ENV0_EA_DELAYTIME: FieldLoc = FieldLoc::new(0x08, 0xFFF << 12);
    pub const CFG_ENV0_EF_PITCHSCALE: FieldLoc = FieldLoc::new(0x08, 0xFF << 24);

    pub const CFG_ENVA: FieldLoc = FieldLoc::new(0x0C, 0xFFFF_FFFF);
    pub const CFG_ENVA_EA_DECAYRATE: FieldLoc = FieldLoc::new(0x0C, 0xFFF);
    pub const CFG_ENVA_EA_HOLDTIME: FieldLoc = FieldLoc::new(0x0C, 0xFFF << 12);
    pub const CFG_ENVA_EA_SUSTAINLEVEL: FieldLoc = FieldLoc::new(0x0C, 0xFF << 24);

    pub const CFG_ENV1: FieldLoc = FieldLoc::new(0x10, 0xFFFF_FFFF);
    pub const CFG_ENV1_EF_FCSCALE: FieldLoc = FieldLoc::new(0x10, 0xFF << 24);

    pub const CFG_ENVF: FieldLoc = FieldLoc::new(0x14, 0xFFFF_FFFF);

    pub const CFG_MISC: FieldLoc = FieldLoc::new(0x18, 0xFFFF_FFFF);
    pub const CFG_MISC_EF_RELEASERATE: FieldLoc = FieldLoc::new(0x18, 0xFFF);
    pub const CFG_MISC_FMODE: FieldLoc = FieldLoc::new(0x18, 0x3 << 16);

    pub const CUR_PSL_START_BA: FieldLoc = FieldLoc::new(0x20, 0x00FF_FFFF);
    pub const CUR_PSH_SAMPLE_LBO: FieldLoc = FieldLoc::new(0x24, 0x00FF_FFFF);

    pub const CUR_ECNT_EACOUNT: FieldLoc = FieldLoc::new(0x34, 0x0000_FFFF);
    pub const CUR_ECNT_EFCOUNT: FieldLoc = FieldLoc::new(0x34, 0xFFFF_0000);

    pub const PAR_STATE: FieldLoc = FieldLoc::new(0x54, 0xFFFF_FFFF);
    pub const PAR_STATE_PAUSED: FieldLoc = FieldLoc::new(0x54, 1 << 18);
    pub const PAR_STATE_NEW_VOICE: FieldLoc = FieldLoc::new(0x54, 1 << 20);
    pub const PAR_STATE_ACTIVE: FieldLoc = FieldLoc::new(0x54, 1 << 21);
    pub const PAR_STATE_EFCUR: FieldLoc = FieldLoc::new(0x54, 0xF << 24);
    pub const PAR_STATE_EACUR: FieldLoc = FieldLoc::new(0x54, 0xF << 28);

    pub const PAR_OFFSET_CBO: FieldLoc = FieldLoc::new(0x58, 0x00FF_FFFF);
    pub const PAR_OFFSET_EALVL: FieldLoc = FieldLoc::new(0x58, 0xFF00_0000);

    pub const PAR_NEXT_EBO: FieldLoc = FieldLoc::new(0x5C, 0x00FF_FFFF);
    pub const PAR_NEXT_EFLVL: FieldLoc = FieldLoc::new(0x5C, 0xFF00_0000);

    pub const TAR_VOLA: FieldLoc = FieldLoc::new(0x60, 0xFFFF_FFFF);
    pub const TAR_VOLB: FieldLoc = FieldLoc::new(0x64, 0xFFFF_FFFF);
    pub const TAR_VOLC: FieldLoc = FieldLoc::new(0x68, 0xFFFF_FFFF);
    pub const TAR_LFO_ENV_EA_RELEASERATE: FieldLoc = FieldLoc::new(0x6C, 0xFFF);

    /// HRTF entry handle bound to this voice (0xFFFF = none). Not present
    /// on real silicon as a separate register window, but placed in this
    /// unused 32-bit slot of the record the same way the rest of TAR_* is
    /// addressed, since the dispatcher must persist it per-voice somewhere.
    pub const TAR_HRTF: FieldLoc = FieldLoc::new(0x70, 0x0000_FFFF);

    pub const TAR_FCA_FC0: FieldLoc = FieldLoc::new(0x74, 0x0000_FFFF);
    pub const TAR_FCA_FC1: FieldLoc = FieldLoc::new(0x74, 0xFFFF_0000);
    pub const TAR_FCB: FieldLoc = FieldLoc::new(0x78, 0xFFFF_FFFF);

    pub const TAR_PITCH_LINK_NEXT_VOICE_HANDLE: FieldLoc = FieldLoc::new(0x7C, 0x0000_FFFF);
    pub const TAR_PITCH_LINK_PITCH: FieldLoc = FieldLoc::new(0x7C, 0xFFFF_0000);
}

/// Accessor over one voice's 128-byte record. `base` is the guest-physical
/// address of voice 0's record; voice `v`'s record starts at
/// `base + v * VOICE_RECORD_BYTES`.
pub struct VoiceMemoryAccessor<'a> {
    mem: &'a dyn GuestMemory,
    base: usize,
}

impl<'a> VoiceMemoryAccessor<'a> {
    pub fn new(mem: &'a dyn GuestMemory, base: usize) -> Self {
        Self { mem, base }
    }

    fn record_addr(&self, voice: u16) -> usize {
        self.base + voice as usize * VOICE_RECORD_BYTES
    }

    /// `get(voice, field)` — read and mask/shift one field of a voice record.
    pub fn get(&self, voice: u16, field: FieldLoc) -> Result<u32, VpTrap> {
        let addr = self.record_addr(voice) + field.offset;
        let word = self.mem.read_u32_le(addr)?;
        Ok((word & field.mask) >> field.shift())
    }

    /// `set(voice, field, value)` — read-modify-write one field of a voice
    /// record. Not atomic with respect to a concurrent reader of the same
    /// word; callers serialize through the voice lock when mutating a field
    /// the frame driver may read mid-frame.
    pub fn set(&self, voice: u16, field: FieldLoc, value: u32) -> Result<(), VpTrap> {
        let addr = self.record_addr(voice) + field.offset;
        let word = self.mem.read_u32_le(addr)?;
        let shifted = (value << field.shift()) & field.mask;
        let new_word = (word & !field.mask) | shifted;
        self.mem.write_u32_le(addr, new_word)
    }

    pub fn get_bool(&self, voice: u16, field: FieldLoc) -> Result<bool, VpTrap> {
        Ok(self.get(voice, field)? != 0)
    }

    pub fn set_bool(&self, voice: u16, field: FieldLoc, value: bool) -> Result<(), VpTrap> {
        self.set(voice, field, value as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest_memory::FlatGuestMemory;

    #[test]
    fn masked_field_round_trips_without_disturbing_siblings() {
        let mem = FlatGuestMemory::new(VOICE_RECORD_BYTES * 4);
        let acc = VoiceMemoryAccessor::new(&mem, 0);

        acc.set(2, fields::PAR_STATE_EACUR, 5).unwrap();
        acc.set(2, fields::PAR_STATE_ACTIVE, 1).unwrap();

        assert_eq!(acc.get(2, fields::PAR_STATE_EACUR).unwrap(), 5);
        assert_eq!(acc.get(2, fields::PAR_STATE_ACTIVE).unwrap(), 1);
        assert_eq!(acc.get(2, fields::PAR_STATE_PAUSED).unwrap(), 0);
    }

    #[test]
    fn pitch_link_next_handle_and_pitch_are_independent() {
        let mem = FlatGuestMemory::new(VOICE_RECORD_BYTES);
        let acc = VoiceMemoryAccessor::new(&mem, 0);

        acc.set(0, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE, 0xFFFF)
            .unwrap();
        acc.set(0, fields::TAR_PITCH_LINK_PITCH, 0x1234).unwrap();

        assert_eq!(
            acc.get(0, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE)
                .unwrap(),
            0xFFFF
        );
        assert_eq!(acc.get(0, fields::TAR_PITCH_LINK_PITCH).unwrap(), 0x1234);
    }
}
