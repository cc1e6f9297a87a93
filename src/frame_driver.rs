//! Frame Driver (C11).
//!
//! Owns the real-time loop. Each call to [`FrameDriver::run_subframe`] walks
//! the 2D/3D/MP voice lists, groups multipass readers behind their mixbin
//! source, hands the resulting work to the worker pool, and merges the
//! per-worker scratch frames into one 32-sample mixbin frame. Eight calls
//! make up one EP frame; [`FrameDriver::run_ep_frame`] is the convenience
//! wrapper a caller actually paces against wall-clock time.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{EP_FRAME_US, MAX_LIST_TRAVERSAL, SUBFRAMES_PER_EP_FRAME};
use crate::dispatch::walk_list;
use crate::error::{abort_on_trap, VpTrap};
use crate::fetcher::NotifierEvent;
use crate::guest_memory::GuestMemory;
use crate::logger::{self, Severity};
use crate::mixbin::MixbinFrame;
use crate::multipass::{self, MultipassVoice};
use crate::notifier::{self, InterruptLatch, NotifierSlot};
use crate::resampler::ResamplerState;
use crate::state::VpSharedState;
use crate::voice_memory::{fields, VoiceMemoryAccessor};
use crate::voice_processor;
use crate::worker_pool::{ProcessFn, WorkItem, WorkerPool};

/// Base addresses and worker-pool sizing the driver needs; everything else
/// (lists, filter state, HRTF entries) lives in [`VpSharedState`].
pub struct FrameDriverConfig {
    pub voice_base: usize,
    pub ssl_base: usize,
    pub notifier_base: usize,
    pub num_workers: usize,
    pub realtime_priority: bool,
}

/// How long the driver spins waiting for a voice lock held by a method
/// caller before giving up on that voice for this sub-frame.
const LOCK_WAIT_BUDGET: Duration = Duration::from_millis(1);
const LOCK_WAIT_STEP: Duration = Duration::from_micros(50);

pub struct FrameDriver {
    mem: Arc<dyn GuestMemory>,
    shared: Arc<VpSharedState>,
    interrupts: Arc<InterruptLatch>,
    config: FrameDriverConfig,
    pool: WorkerPool,
    sub_frame_index: u64,
    next_deadline: Instant,
    sub_frame_budget: Duration,
}

impl FrameDriver {
    pub fn new(
        mem: Arc<dyn GuestMemory>,
        shared: Arc<VpSharedState>,
        interrupts: Arc<InterruptLatch>,
        config: FrameDriverConfig,
    ) -> Self {
        let resamplers: Arc<Vec<Mutex<ResamplerState>>> = Arc::new(
            (0..crate::constants::NUM_VOICES).map(|_| Mutex::new(ResamplerState::new())).collect(),
        );

        let process: ProcessFn = {
            let mem = mem.clone();
            let shared = shared.clone();
            let interrupts = interrupts.clone();
            let voice_base = config.voice_base;
            let ssl_base = config.ssl_base;
            let notifier_base = config.notifier_base;
            Arc::new(move |item: WorkItem, out: &mut MixbinFrame| {
                process_one(&mem, &shared, &interrupts, voice_base, ssl_base, notifier_base, &resamplers, item, out);
            })
        };

        let pool = WorkerPool::new(config.num_workers, config.realtime_priority, process);
        let sub_frame_budget = Duration::from_micros(EP_FRAME_US / SUBFRAMES_PER_EP_FRAME as u64);

        Self {
            mem,
            shared,
            interrupts,
            config,
            pool,
            sub_frame_index: 0,
            next_deadline: Instant::now() + sub_frame_budget,
            sub_frame_budget,
        }
    }

    fn acc(&self) -> VoiceMemoryAccessor<'_> {
        VoiceMemoryAccessor::new(self.mem.as_ref(), self.config.voice_base)
    }

    /// Block until this sub-frame's deadline, or return immediately if
    /// already behind schedule (the real monitor-queue-slack escape hatch
    /// is out of scope here; a caller with a downstream queue can skip
    /// calling this and throttle externally instead).
    pub fn throttle(&mut self) {
        let now = Instant::now();
        if now < self.next_deadline {
            thread::sleep(self.next_deadline - now);
        } else if now > self.next_deadline + self.sub_frame_budget {
            logger::global().log(Severity::Warn, "frame driver fell behind schedule, skipping ahead");
        }
        self.next_deadline += self.sub_frame_budget;
    }

    /// Run one 32-sample sub-frame: list traversal, multipass grouping,
    /// worker dispatch, merge. Does not throttle; call [`Self::throttle`]
    /// first if real-time pacing is wanted.
    pub fn run_subframe(&mut self) -> Result<MixbinFrame, VpTrap> {
        let acc = self.acc();
        let items = self.build_work_items(&acc)?;
        let frame = self.pool.run_batch(&items);
        self.sub_frame_index += 1;
        Ok(frame)
    }

    /// Run a full EP frame (8 sub-frames), throttling between each.
    pub fn run_ep_frame(&mut self) -> Result<[MixbinFrame; SUBFRAMES_PER_EP_FRAME], VpTrap> {
        let mut out = std::array::from_fn(|_| MixbinFrame::new());
        for slot in out.iter_mut() {
            self.throttle();
            *slot = self.run_subframe()?;
        }
        Ok(out)
    }

    pub fn sub_frame_index(&self) -> u64 {
        self.sub_frame_index
    }

    pub fn shutdown(self) {
        self.pool.shutdown();
    }

    /// Walk the three voice lists, filter out locked/inactive voices
    /// (idling the latter), and interleave multipass readers behind their
    /// 3-D source.
    fn build_work_items(&self, acc: &VoiceMemoryAccessor) -> Result<Vec<WorkItem>, VpTrap> {
        let (top2d, top3d, topmp) = {
            let lists = self.shared.lists.lock().unwrap();
            (lists[0], lists[1], lists[2])
        };
        let list2d = walk_list(acc, top2d, MAX_LIST_TRAVERSAL);
        let list3d = walk_list(acc, top3d, MAX_LIST_TRAVERSAL);
        let listmp = walk_list(acc, topmp, MAX_LIST_TRAVERSAL);

        let active2d = self.admit_voices(acc, &list2d)?;
        let active3d = self.admit_voices(acc, &list3d)?;
        let activemp = self.admit_voices(acc, &listmp)?;

        let mut mp_descs = Vec::with_capacity(activemp.len());
        for v in &activemp {
            let source_bin = (acc.get(*v, fields::CFG_VBIN)? & 0x1F) as u8;
            let clear_mix = acc.get_bool(*v, fields::CFG_FMT_CLEAR_MIX)?;
            mp_descs.push(MultipassVoice { voice: *v, source_bin, clear_mix });
        }

        let mut items = Vec::with_capacity(active2d.len() + active3d.len() + mp_descs.len());
        for v in &active2d {
            items.push(WorkItem { voice: *v, is_multipass: false });
        }

        let mut mp_cursor = 0;
        for v in &active3d {
            items.push(WorkItem { voice: *v, is_multipass: false });
            let source_bin = (acc.get(*v, fields::CFG_VBIN)? & 0x1F) as u8;
            let group = multipass::group_following(&mp_descs[mp_cursor..], source_bin);
            for g in &group {
                items.push(WorkItem { voice: g.voice, is_multipass: true });
            }
            mp_cursor += group.len();
        }
        // Any multipass voices whose source never showed up in this frame's
        // 3-D pass still get processed; their read lands on a scratch bin
        // that nothing wrote this sub-frame, which is silence rather than
        // an error.
        for g in &mp_descs[mp_cursor..] {
            items.push(WorkItem { voice: g.voice, is_multipass: true });
        }

        Ok(items)
    }

    /// Drop voices the method dispatcher still holds locked (retrying
    /// briefly), and idle-notify voices that are inactive instead of
    /// enqueuing them.
    fn admit_voices(&self, acc: &VoiceMemoryAccessor, voices: &[u16]) -> Result<Vec<u16>, VpTrap> {
        let mut out = Vec::with_capacity(voices.len());
        for &voice in voices {
            if !self.wait_for_unlock(voice) {
                continue;
            }
            if acc.get(voice, fields::PAR_STATE_ACTIVE)? == 0 {
                self.idle_voice(voice)?;
                continue;
            }
            out.push(voice);
        }
        Ok(out)
    }

    fn wait_for_unlock(&self, voice: u16) -> bool {
        let deadline = Instant::now() + LOCK_WAIT_BUDGET;
        while self.shared.is_voice_locked(voice) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(LOCK_WAIT_STEP);
        }
        true
    }

    fn idle_voice(&self, voice: u16) -> Result<(), VpTrap> {
        let mask = notifier::notify(self.mem.as_ref(), self.config.notifier_base, voice, NotifierSlot::SslA)?;
        self.interrupts.raise(mask);
        Ok(())
    }
}

/// The work a single [`crate::worker_pool::WorkerPool`] thread does for one
/// queued voice: load its snapshot and envelope state, resolve a multipass
/// source if applicable, run the voice processor pipeline, and write back
/// the state the pipeline mutated.
#[allow(clippy::too_many_arguments)]
fn process_one(
    mem: &Arc<dyn GuestMemory>,
    shared: &Arc<VpSharedState>,
    interrupts: &Arc<InterruptLatch>,
    voice_base: usize,
    ssl_base: usize,
    notifier_base: usize,
    resamplers: &Arc<Vec<Mutex<ResamplerState>>>,
    item: WorkItem,
    out: &mut MixbinFrame,
) {
    let acc = VoiceMemoryAccessor::new(mem.as_ref(), voice_base);

    let snapshot = match voice_processor::load_snapshot(&acc, item.voice) {
        Ok(s) => s,
        Err(trap) => abort_on_trap(trap),
    };

    let multipass_source = if item.is_multipass {
        let mp = MultipassVoice { voice: item.voice, source_bin: snapshot.bins[0], clear_mix: snapshot.clear_mix };
        Some(multipass::resolve(out, &mp))
    } else {
        None
    };

    let (mut ea_state, mut ef_state) = match voice_processor::load_envelope_states(&acc, item.voice) {
        Ok(s) => s,
        Err(trap) => abort_on_trap(trap),
    };

    let mut ssl_state = shared.ssl_state.lock().unwrap()[item.voice as usize];
    let mut filter = shared.filters.lock().unwrap()[item.voice as usize].clone();
    let hrtf_submix = *shared.hrtf_submix.lock().unwrap();
    let hrtf_headroom = *shared.hrtf_headroom.lock().unwrap();
    let submix_headroom = *shared.submix_headroom.lock().unwrap();
    let hrtf_globally_enabled = shared.hrtf_globally_enabled.load(Ordering::Acquire);

    let mut resampler = resamplers[item.voice as usize].lock().unwrap();

    let outcome = voice_processor::process_voice(
        item.voice,
        item.voice as usize,
        mem.as_ref(),
        &snapshot,
        &mut ea_state,
        &mut ef_state,
        &mut ssl_state,
        ssl_base,
        &mut filter,
        &mut resampler,
        multipass_source,
        hrtf_submix,
        hrtf_headroom,
        &submix_headroom,
        hrtf_globally_enabled,
        out,
    );
    drop(resampler);

    if let Err(trap) = voice_processor::store_envelope_states(&acc, item.voice, &ea_state, &ef_state) {
        abort_on_trap(trap);
    }
    if let Err(trap) = acc.set(item.voice, fields::PAR_OFFSET_CBO, outcome.new_cbo) {
        abort_on_trap(trap);
    }

    shared.ssl_state.lock().unwrap()[item.voice as usize] = ssl_state;
    shared.filters.lock().unwrap()[item.voice as usize] = filter;

    if let Some(event) = outcome.stream_notifier {
        let slot = match event {
            NotifierEvent::SslADone => NotifierSlot::SslA,
            NotifierEvent::SslBDone => NotifierSlot::SslB,
        };
        match notifier::notify(mem.as_ref(), notifier_base, item.voice, slot) {
            Ok(mask) => interrupts.raise(mask),
            Err(trap) => abort_on_trap(trap),
        }
    }

    if outcome.deactivated {
        if let Err(trap) = acc.set(item.voice, fields::PAR_STATE_ACTIVE, 0) {
            abort_on_trap(trap);
        }
        let is_stream = match acc.get_bool(item.voice, fields::CFG_FMT_DATA_TYPE) {
            Ok(v) => v,
            Err(trap) => abort_on_trap(trap),
        };
        let slot =
            if is_stream && ssl_state.current_index != 0 { NotifierSlot::SslB } else { NotifierSlot::SslA };
        match notifier::notify(mem.as_ref(), notifier_base, item.voice, slot) {
            Ok(mask) => interrupts.raise(mask),
            Err(trap) => abort_on_trap(trap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::VOICE_RECORD_BYTES;
    use crate::dispatch::Dispatcher;
    use crate::guest_memory::FlatGuestMemory;
    use crate::regs;

    fn make_driver(num_voices: usize, num_workers: usize) -> FrameDriver {
        let mem: Arc<dyn GuestMemory> =
            Arc::new(FlatGuestMemory::new(VOICE_RECORD_BYTES * num_voices + 0x10000));
        let shared = Arc::new(VpSharedState::new());
        let interrupts = Arc::new(InterruptLatch::new());
        let config = FrameDriverConfig {
            voice_base: 0,
            ssl_base: VOICE_RECORD_BYTES * num_voices,
            notifier_base: VOICE_RECORD_BYTES * num_voices + 0x4000,
            num_workers,
            realtime_priority: false,
        };
        FrameDriver::new(mem, shared, interrupts, config)
    }

    #[test]
    fn silent_frame_with_no_active_voices_is_all_zero() {
        let mut driver = make_driver(8, 2);
        let frame = driver.run_subframe().unwrap();
        for bin in &frame.bins {
            assert!(bin.iter().all(|&s| s == 0.0));
        }
        driver.shutdown();
    }

    #[test]
    fn active_voice_on_2d_list_gets_enqueued_and_deactivates_cleanly() {
        let mem: Arc<dyn GuestMemory> = Arc::new(FlatGuestMemory::new(VOICE_RECORD_BYTES * 4 + 0x10000));
        let shared = Arc::new(VpSharedState::new());
        let interrupts = Arc::new(InterruptLatch::new());

        {
            let mut d = Dispatcher::new(mem.as_ref(), 0, VOICE_RECORD_BYTES * 4, VOICE_RECORD_BYTES * 4 + 0x4000, &shared, &interrupts);
            d.dispatch(regs::SET_ANTECEDENT_VOICE, 1 << 16).unwrap();
            d.dispatch(regs::VOICE_ON, 0).unwrap();
        }

        let config = FrameDriverConfig {
            voice_base: 0,
            ssl_base: VOICE_RECORD_BYTES * 4,
            notifier_base: VOICE_RECORD_BYTES * 4 + 0x4000,
            num_workers: 2,
            realtime_priority: false,
        };
        let mut driver = FrameDriver::new(mem, shared, interrupts, config);
        let frame = driver.run_subframe().unwrap();
        let _ = frame;
        driver.shutdown();
    }
}
