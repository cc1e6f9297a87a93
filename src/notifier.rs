//! Notifier Unit (C13).
//!
//! On SSL completion and on an idle-voice trap, writes a two-byte
//! completion record into guest memory and raises the shared interrupt
//! status word. Grounded on `vp.c`'s `set_notify_status`, which computes
//! the offset the same way: a 16-byte-per-(voice,notifier) record with the
//! status byte last and an envelope-state byte just before it.

use crate::constants::{DONE_SUCCESS, FENINTSTS, FEVINTSTS, NOTIFIER_BASE_OFFSET, NOTIFIER_COUNT};
use crate::error::VpTrap;
use crate::guest_memory::GuestMemory;

/// Which of the two per-voice notifiers (SSL A / SSL B) fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierSlot {
    SslA = 0,
    SslB = 1,
}

fn notifier_offset(notifier_base: usize, voice: u16, slot: NotifierSlot) -> usize {
    notifier_base + 16 * (NOTIFIER_BASE_OFFSET + voice as usize * NOTIFIER_COUNT + slot as usize) + 15
}

/// Write the completion record for `(voice, slot)` and return the
/// interrupt bits that should be OR'd into the shared status word.
pub fn notify(mem: &dyn GuestMemory, notifier_base: usize, voice: u16, slot: NotifierSlot) -> Result<u32, VpTrap> {
    let status_addr = notifier_offset(notifier_base, voice, slot);
    mem.write_u8(status_addr, DONE_SUCCESS)?;
    mem.write_u8(status_addr - 1, 1)?;
    Ok(FEVINTSTS | FENINTSTS)
}

/// Shared interrupt status word the frame driver ORs notifier results
/// into; a latched `set_irq` fires at the next frame boundary.
pub struct InterruptLatch {
    status: std::sync::atomic::AtomicU32,
    pending: std::sync::atomic::AtomicBool,
}

impl Default for InterruptLatch {
    fn default() -> Self {
        Self { status: std::sync::atomic::AtomicU32::new(0), pending: std::sync::atomic::AtomicBool::new(false) }
    }
}

impl InterruptLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, mask: u32) {
        self.status.fetch_or(mask, std::sync::atomic::Ordering::SeqCst);
        self.pending.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn status(&self) -> u32 {
        self.status.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Take (clear) the latched pending flag; returns whether an interrupt
    /// should fire at this frame boundary.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest_memory::FlatGuestMemory;

    #[test]
    fn notify_writes_status_and_envelope_bytes_at_expected_offset() {
        let mem = FlatGuestMemory::new(4096);
        let mask = notify(&mem, 0x1000, 3, NotifierSlot::SslB).unwrap();
        assert_eq!(mask, FEVINTSTS | FENINTSTS);

        let expected = 0x1000 + 16 * (NOTIFIER_BASE_OFFSET + 3 * NOTIFIER_COUNT + 1) + 15;
        assert_eq!(mem.read_u8(expected).unwrap(), DONE_SUCCESS);
        assert_eq!(mem.read_u8(expected - 1).unwrap(), 1);
    }

    #[test]
    fn interrupt_latch_ors_and_drains_once() {
        let latch = InterruptLatch::new();
        latch.raise(0x1);
        latch.raise(0x2);
        assert_eq!(latch.status(), 0x3);
        assert!(latch.take_pending());
        assert!(!latch.take_pending());
    }
}
