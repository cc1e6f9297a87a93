//! Scatter-gather entry table (inbuf/outbuf).
//!
//! Each entry is 8 bytes at `VPSGEADDR + handle * 8`; the first 4 bytes are
//! a 4 KiB-aligned physical page. The remaining 4 bytes are reserved by the
//! hardware and unused by the voice processor core.

use crate::error::VpTrap;
use crate::guest_memory::GuestMemory;

pub const SGE_ENTRY_BYTES: usize = 8;
pub const PAGE_SIZE: usize = 4096;

pub fn physical_page(mem: &dyn GuestMemory, sge_base: usize, handle: u32) -> Result<u32, VpTrap> {
    let addr = sge_base + handle as usize * SGE_ENTRY_BYTES;
    let word = mem.read_u32_le(addr)?;
    Ok(word & !(PAGE_SIZE as u32 - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest_memory::FlatGuestMemory;

    #[test]
    fn page_is_masked_to_4k_alignment() {
        let mem = FlatGuestMemory::new(64);
        mem.write_u32_le(8, 0x3000 | 0xAB).unwrap();
        assert_eq!(physical_page(&mem, 0, 1).unwrap(), 0x3000);
    }
}
