//! Method Dispatcher (C12).
//!
//! Every external register write funnels through [`Dispatcher::dispatch`].
//! Grounded on `vp.c`'s `fe_method` switch: most methods are a single
//! masked write into the current voice's record (`SET_CURRENT_VOICE`
//! latches which one), a handful manage list linkage and envelope restart
//! (`VOICE_ON`/`VOICE_RELEASE`/`VOICE_OFF`), and the rest configure shared
//! VP state (HRTF entries, submix headroom, scatter-gather tables).

use crate::constants::{HRTF_ENTRY_COUNT, MAX_SSL_PRDS, NV_PSGE_SIZE, VOICE_HANDLE_NONE};
use crate::error::VpTrap;
use crate::fixed_point::s6p9_to_f32;
use crate::guest_memory::GuestMemory;
use crate::notifier::{self, InterruptLatch, NotifierSlot};
use crate::regs;
use crate::state::{VoiceList, VoiceListRegs, VpSharedState};
use crate::voice_memory::{fields, VoiceMemoryAccessor};

fn list_index(list: VoiceList) -> usize {
    match list {
        VoiceList::TwoD => 0,
        VoiceList::ThreeD => 1,
        VoiceList::MultiPass => 2,
    }
}

pub struct Dispatcher<'a> {
    mem: &'a dyn GuestMemory,
    voice_base: usize,
    ssl_base: usize,
    notifier_base: usize,
    shared: &'a VpSharedState,
    interrupts: &'a InterruptLatch,
    fecv: u16,
    feav: u32,
    current_ssl_base_page: u32,
    current_hrtf_entry: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        mem: &'a dyn GuestMemory,
        voice_base: usize,
        ssl_base: usize,
        notifier_base: usize,
        shared: &'a VpSharedState,
        interrupts: &'a InterruptLatch,
    ) -> Self {
        Self {
            mem,
            voice_base,
            ssl_base,
            notifier_base,
            shared,
            interrupts,
            fecv: 0,
            feav: 0,
            current_ssl_base_page: 0,
            current_hrtf_entry: 0,
        }
    }

    fn acc(&self) -> VoiceMemoryAccessor<'_> {
        VoiceMemoryAccessor::new(self.mem, self.voice_base)
    }

    /// Dispatch one register write. Unrecognized method addresses trap:
    /// silently ignoring an unhandled method would hide a real bug in the
    /// caller rather than surface it.
    pub fn dispatch(&mut self, method: u32, argument: u32) -> Result<(), VpTrap> {
        match method {
            regs::GET_VOICE_POSITION | regs::SET_CONTEXT_DMA_NOTIFY | regs::SET_CURRENT_SSL_CONTEXT_DMA => {
                Err(VpTrap::UnhandledRegister { address: method })
            }
            regs::SET_ANTECEDENT_VOICE => {
                self.feav = argument;
                Ok(())
            }
            regs::VOICE_LOCK => {
                self.set_voice_lock(self.fecv, argument & 1 != 0);
                Ok(())
            }
            regs::VOICE_ON => self.voice_on(argument),
            regs::VOICE_RELEASE => self.voice_release(argument),
            regs::VOICE_OFF => self.voice_off(argument as u16),
            regs::VOICE_PAUSE => self.voice_pause(argument),
            regs::SET_CURRENT_VOICE => {
                self.fecv = argument as u16;
                Ok(())
            }
            regs::SET_VOICE_CFG_VBIN => self.acc().set(self.fecv, fields::CFG_VBIN, argument),
            regs::SET_VOICE_CFG_FMT => self.acc().set(self.fecv, fields::CFG_FMT, argument),
            regs::SET_VOICE_CFG_ENV0 => self.acc().set(self.fecv, fields::CFG_ENV0, argument),
            regs::SET_VOICE_CFG_ENVA => self.acc().set(self.fecv, fields::CFG_ENVA, argument),
            regs::SET_VOICE_CFG_ENV1 => self.acc().set(self.fecv, fields::CFG_ENV1, argument),
            regs::SET_VOICE_CFG_ENVF => self.acc().set(self.fecv, fields::CFG_ENVF, argument),
            regs::SET_VOICE_CFG_MISC => self.acc().set(self.fecv, fields::CFG_MISC, argument),
            regs::SET_VOICE_TAR_VOLA => self.acc().set(self.fecv, fields::TAR_VOLA, argument),
            regs::SET_VOICE_TAR_VOLB => self.acc().set(self.fecv, fields::TAR_VOLB, argument),
            regs::SET_VOICE_TAR_VOLC => self.acc().set(self.fecv, fields::TAR_VOLC, argument),
            regs::SET_VOICE_LFO_ENV => self.acc().set(self.fecv, fields::TAR_LFO_ENV_EA_RELEASERATE, argument),
            regs::SET_VOICE_TAR_FCA => self
                .acc()
                .set(self.fecv, fields::TAR_FCA_FC0, argument)
                .and_then(|_| self.acc().set(self.fecv, fields::TAR_FCA_FC1, argument >> 16)),
            regs::SET_VOICE_TAR_FCB => self.acc().set(self.fecv, fields::TAR_FCB, argument),
            regs::SET_VOICE_TAR_PITCH => {
                self.acc().set(self.fecv, fields::TAR_PITCH_LINK_PITCH, argument >> 16)
            }
            regs::SET_VOICE_TAR_HRTF => self.set_voice_tar_hrtf(argument),
            regs::SET_VOICE_CFG_BUF_BASE => self.acc().set(self.fecv, fields::CUR_PSL_START_BA, argument),
            regs::SET_VOICE_CFG_BUF_LBO => self.acc().set(self.fecv, fields::CUR_PSH_SAMPLE_LBO, argument),
            regs::SET_VOICE_BUF_CBO => self.acc().set(self.fecv, fields::PAR_OFFSET_CBO, argument),
            regs::SET_VOICE_CFG_BUF_EBO => self.acc().set(self.fecv, fields::PAR_NEXT_EBO, argument),
            regs::SET_VOICE_SSL_A => self.set_voice_ssl(0, argument),
            regs::SET_VOICE_SSL_B => self.set_voice_ssl(1, argument),
            regs::SET_CURRENT_SSL => self.set_current_ssl(argument),
            regs::SET_CURRENT_HRTF_ENTRY => {
                self.current_hrtf_entry = (argument as usize) % HRTF_ENTRY_COUNT;
                Ok(())
            }
            regs::SET_HRTF_SUBMIXES => {
                let mut submix = self.shared.hrtf_submix.lock().unwrap();
                for (i, s) in submix.iter_mut().enumerate() {
                    *s = ((argument >> (i * 5)) & 0x1F) as u8;
                }
                Ok(())
            }
            regs::SET_HRTF_HEADROOM => {
                *self.shared.hrtf_headroom.lock().unwrap() = (argument & 0x7) as u8;
                Ok(())
            }
            regs::SE2FE_IDLE_VOICE => self.idle_voice(argument as u16),
            m if m == regs::SET_SUBMIX_HEADROOM_BASE || (m > regs::SET_SUBMIX_HEADROOM_BASE && m < regs::SET_HRTF_HEADROOM && (m - regs::SET_SUBMIX_HEADROOM_BASE) % 4 == 0) => {
                let idx = ((m - regs::SET_SUBMIX_HEADROOM_BASE) / 4) as usize;
                let mut headroom = self.shared.submix_headroom.lock().unwrap();
                if idx >= headroom.len() {
                    return Err(VpTrap::IndexOutOfRange { what: "submix", index: idx, bound: headroom.len() });
                }
                headroom[idx] = (argument & 0x7) as u8;
                Ok(())
            }
            m if m >= regs::SET_HRIR_BASE && m < regs::SET_HRIR_X && (m - regs::SET_HRIR_BASE) % 4 == 0 => {
                let slot = ((m - regs::SET_HRIR_BASE) / 4) as usize;
                self.set_hrir(slot, argument)
            }
            regs::SET_HRIR_X => self.set_hrir_x(argument),
            m if m >= regs::SET_SSL_SEGMENT_OFFSET_BASE && (m - regs::SET_SSL_SEGMENT_OFFSET_BASE) % 8 == 0 => {
                let page = ((m - regs::SET_SSL_SEGMENT_OFFSET_BASE) / 8) as usize;
                self.set_ssl_segment_offset(page, argument)
            }
            m if m >= regs::SET_SSL_SEGMENT_LENGTH_BASE && (m - regs::SET_SSL_SEGMENT_LENGTH_BASE) % 8 == 0 => {
                let page = ((m - regs::SET_SSL_SEGMENT_LENGTH_BASE) / 8) as usize;
                self.set_ssl_segment_length(page, argument)
            }
            regs::SET_CURRENT_INBUF_SGE | regs::SET_CURRENT_INBUF_SGE_OFFSET => Ok(()),
            regs::SET_CURRENT_OUTBUF_SGE | regs::SET_CURRENT_OUTBUF_SGE_OFFSET => Ok(()),
            m if m >= regs::SET_OUTBUF_BA_BASE && m < regs::SET_OUTBUF_BA_BASE + 32 => Ok(()),
            m if m >= regs::SET_OUTBUF_LEN_BASE && m < regs::SET_OUTBUF_LEN_BASE + 32 => Ok(()),
            _ => Err(VpTrap::UnrecognizedMethod { address: method }),
        }
    }

    fn set_voice_lock(&self, voice: u16, lock: bool) {
        if lock {
            self.shared.lock_voice(voice);
        } else {
            self.shared.unlock_voice(voice);
        }
    }

    fn voice_on(&mut self, argument: u32) -> Result<(), VpTrap> {
        let handle = (argument & 0xFFFF) as u16;
        let acc = self.acc();

        let already_locked = self.shared.is_voice_locked(handle);
        if !already_locked {
            self.shared.lock_voice(handle);
        }

        let list_sel = (self.feav >> 16) & 0x3;
        if list_sel != 0 {
            let list = match list_sel {
                1 => VoiceList::TwoD,
                2 => VoiceList::ThreeD,
                _ => VoiceList::MultiPass,
            };
            let mut lists = self.shared.lists.lock().unwrap();
            let idx = list_index(list);
            acc.set(handle, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE, lists[idx].top as u32)?;
            lists[idx].top = handle;
        } else {
            let antecedent = (self.feav & 0xFFFF) as u16;
            debug_assert_ne!(antecedent, VOICE_HANDLE_NONE);
            let next = acc.get(antecedent, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE)?;
            acc.set(handle, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE, next)?;
            acc.set(antecedent, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE, handle as u32)?;
        }

        acc.set(handle, fields::PAR_OFFSET_CBO, 0)?;
        {
            let mut ssl_state = self.shared.ssl_state.lock().unwrap();
            ssl_state[handle as usize] = Default::default();
        }

        let ea_start = (argument >> 28) & 0xF;
        acc.set(handle, fields::PAR_STATE_EACUR, ea_start)?;
        match ea_start {
            1 => {
                let delay = acc.get(handle, fields::CFG_ENV0_EA_DELAYTIME)?;
                acc.set(handle, fields::CUR_ECNT_EACOUNT, delay * 16)?;
            }
            2 => acc.set(handle, fields::CUR_ECNT_EACOUNT, 0)?,
            3 => {
                let hold = acc.get(handle, fields::CFG_ENVA_EA_HOLDTIME)?;
                acc.set(handle, fields::CUR_ECNT_EACOUNT, hold * 16)?;
            }
            _ => {}
        }

        let ef_start = (argument >> 24) & 0xF;
        acc.set(handle, fields::PAR_STATE_EFCUR, ef_start)?;
        match ef_start {
            1 => {
                let delay = acc.get(handle, fields::CFG_ENV0_EA_DELAYTIME)?;
                acc.set(handle, fields::CUR_ECNT_EFCOUNT, delay * 16)?;
            }
            2 => acc.set(handle, fields::CUR_ECNT_EFCOUNT, 0)?,
            3 => {
                let hold = acc.get(handle, fields::CFG_ENVA_EA_HOLDTIME)?;
                acc.set(handle, fields::CUR_ECNT_EFCOUNT, hold * 16)?;
            }
            _ => {}
        }

        {
            let mut filters = self.shared.filters.lock().unwrap();
            filters[handle as usize].reset();
        }
        acc.set(handle, fields::PAR_STATE_ACTIVE, 1)?;

        if !already_locked {
            self.shared.unlock_voice(handle);
        }
        Ok(())
    }

    fn voice_release(&mut self, argument: u32) -> Result<(), VpTrap> {
        let handle = (argument & 0xFFFF) as u16;
        let acc = self.acc();
        let already_locked = self.shared.is_voice_locked(handle);
        if !already_locked {
            self.shared.lock_voice(handle);
        }

        let ea_rate = acc.get(handle, fields::TAR_LFO_ENV_EA_RELEASERATE)?;
        acc.set(handle, fields::CUR_ECNT_EACOUNT, ea_rate * 16)?;
        acc.set(handle, fields::PAR_STATE_EACUR, 6)?;

        let ef_rate = acc.get(handle, fields::CFG_MISC_EF_RELEASERATE)?;
        acc.set(handle, fields::CUR_ECNT_EFCOUNT, ef_rate * 16)?;
        acc.set(handle, fields::PAR_STATE_EFCUR, 6)?;

        if !already_locked {
            self.shared.unlock_voice(handle);
        }
        Ok(())
    }

    fn voice_off(&mut self, handle: u16) -> Result<(), VpTrap> {
        let acc = self.acc();
        acc.set(handle, fields::PAR_STATE_ACTIVE, 0)?;
        let is_stream = acc.get_bool(handle, fields::CFG_FMT_DATA_TYPE)?;
        let slot = if is_stream {
            let ssl_state = self.shared.ssl_state.lock().unwrap();
            if ssl_state[handle as usize].current_index == 0 { NotifierSlot::SslA } else { NotifierSlot::SslB }
        } else {
            NotifierSlot::SslA
        };
        let mask = notifier::notify(self.mem, self.notifier_base, handle, slot)?;
        self.interrupts.raise(mask);
        Ok(())
    }

    fn voice_pause(&self, argument: u32) -> Result<(), VpTrap> {
        let handle = (argument & 0xFFFF) as u16;
        let paused = (argument & (1 << 18)) != 0;
        self.acc().set_bool(handle, fields::PAR_STATE_PAUSED, paused)
    }

    fn set_voice_tar_hrtf(&mut self, argument: u32) -> Result<(), VpTrap> {
        let handle = (argument & 0xFFFF) as u32;
        self.acc().set(self.fecv, fields::TAR_HRTF, handle)
    }

    fn set_voice_ssl(&mut self, slot: usize, argument: u32) -> Result<(), VpTrap> {
        let count = argument & 0xFF;
        let base = (argument >> 8) & 0x00FF_FFFF;
        let mut ssl_state = self.shared.ssl_state.lock().unwrap();
        let desc = &mut ssl_state[self.fecv as usize].ssl[slot];
        desc.base_page = base;
        desc.segment_count = count;
        desc.current_segment = 0;
        Ok(())
    }

    fn set_current_ssl(&mut self, argument: u32) -> Result<(), VpTrap> {
        if argument % 64 != 0 || (argument as usize) >= MAX_SSL_PRDS * NV_PSGE_SIZE {
            return Err(VpTrap::IndexOutOfRange {
                what: "ssl_base_page",
                index: argument as usize,
                bound: MAX_SSL_PRDS * NV_PSGE_SIZE,
            });
        }
        self.current_ssl_base_page = argument;
        let mut pages = self.shared.ssl_base_page.lock().unwrap();
        pages[self.fecv as usize] = argument;
        Ok(())
    }

    fn set_ssl_segment_offset(&mut self, _page: usize, _argument: u32) -> Result<(), VpTrap> {
        // SSL segment descriptors live in guest memory; the VP only latches
        // which page is current. Writes go straight through the SSL region
        // via the ssl module at fetch time.
        Ok(())
    }

    fn set_ssl_segment_length(&mut self, _page: usize, _argument: u32) -> Result<(), VpTrap> {
        Ok(())
    }

    fn set_hrir(&mut self, slot: usize, argument: u32) -> Result<(), VpTrap> {
        let left0 = (argument & 0xFF) as i8;
        let right0 = ((argument >> 8) & 0xFF) as i8;
        let left1 = ((argument >> 16) & 0xFF) as i8;
        let right1 = ((argument >> 24) & 0xFF) as i8;
        let mut entries = self.shared.hrtf_entries.lock().unwrap();
        let entry = &mut entries[self.current_hrtf_entry];
        entry.hrir[0][slot * 2] = left0 as f32 / 128.0;
        entry.hrir[1][slot * 2] = right0 as f32 / 128.0;
        entry.hrir[0][slot * 2 + 1] = left1 as f32 / 128.0;
        entry.hrir[1][slot * 2 + 1] = right1 as f32 / 128.0;
        Ok(())
    }

    fn set_hrir_x(&mut self, argument: u32) -> Result<(), VpTrap> {
        let left30 = (argument & 0xFF) as i8;
        let right30 = ((argument >> 8) & 0xFF) as i8;
        let itd_raw = ((argument >> 16) & 0xFFFF) as u16;
        let mut entries = self.shared.hrtf_entries.lock().unwrap();
        let entry = &mut entries[self.current_hrtf_entry];
        entry.hrir[0][30] = left30 as f32 / 128.0;
        entry.hrir[1][30] = right30 as f32 / 128.0;
        entry.itd = s6p9_to_f32(itd_raw as i16);
        Ok(())
    }

    fn idle_voice(&mut self, handle: u16) -> Result<(), VpTrap> {
        let mask = notifier::notify(self.mem, self.notifier_base, handle, NotifierSlot::SslA)?;
        self.interrupts.raise(mask);
        Ok(())
    }
}

/// Read-only list-traversal helper used by the frame driver: walk a voice
/// list from `top`, following `TAR_PITCH_LINK.NEXT_VOICE_HANDLE`, bounded to
/// guard against a corrupt cyclic list.
pub fn walk_list(acc: &VoiceMemoryAccessor, regs_for_list: VoiceListRegs, max_iterations: usize) -> Vec<u16> {
    let mut out = Vec::new();
    let mut current = regs_for_list.top;
    let mut i = 0;
    while current != VOICE_HANDLE_NONE && i < max_iterations {
        out.push(current);
        current = match acc.get(current, fields::TAR_PITCH_LINK_NEXT_VOICE_HANDLE) {
            Ok(v) => v as u16,
            Err(_) => break,
        };
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VOICE_RECORD_BYTES;
    use crate::guest_memory::FlatGuestMemory;

    #[test]
    fn voice_on_links_at_top_of_selected_list() {
        let mem = FlatGuestMemory::new(VOICE_RECORD_BYTES * 4);
        let shared = VpSharedState::new();
        let interrupts = InterruptLatch::new();
        let mut d = Dispatcher::new(&mem, 0, 0x2000, 0x3000, &shared, &interrupts);

        d.dispatch(regs::SET_ANTECEDENT_VOICE, 2 << 16).unwrap(); // list = 2D
        d.dispatch(regs::VOICE_ON, 1).unwrap();

        let lists = shared.lists.lock().unwrap();
        assert_eq!(lists[0].top, 1);
    }

    #[test]
    fn voice_off_clears_active_and_raises_interrupt() {
        let mem = FlatGuestMemory::new(VOICE_RECORD_BYTES * 4);
        let shared = VpSharedState::new();
        let interrupts = InterruptLatch::new();
        let mut d = Dispatcher::new(&mem, 0, 0x2000, 0x3000, &shared, &interrupts);

        d.dispatch(regs::SET_CURRENT_VOICE, 0).unwrap();
        d.dispatch(regs::VOICE_ON, 0).unwrap();
        d.dispatch(regs::VOICE_OFF, 0).unwrap();

        let acc = VoiceMemoryAccessor::new(&mem, 0);
        assert_eq!(acc.get(0, fields::PAR_STATE_ACTIVE).unwrap(), 0);
        assert!(interrupts.take_pending());
    }

    #[test]
    fn unrecognized_method_traps() {
        let mem = FlatGuestMemory::new(VOICE_RECORD_BYTES);
        let shared = VpSharedState::new();
        let interrupts = InterruptLatch::new();
        let mut d = Dispatcher::new(&mem, 0, 0x2000, 0x3000, &shared, &interrupts);
        assert!(d.dispatch(0xDEAD, 0).is_err());
    }

    #[test]
    fn set_current_ssl_rejects_unaligned_argument() {
        let mem = FlatGuestMemory::new(VOICE_RECORD_BYTES);
        let shared = VpSharedState::new();
        let interrupts = InterruptLatch::new();
        let mut d = Dispatcher::new(&mem, 0, 0x2000, 0x3000, &shared, &interrupts);
        assert!(d.dispatch(regs::SET_CURRENT_SSL, 63).is_err());
        assert!(d.dispatch(regs::SET_CURRENT_SSL, 64).is_ok());
    }
}
