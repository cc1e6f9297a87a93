//! Method Dispatcher (C12) register addresses.
//!
//! Byte offsets within the 0x10000-byte VP register space, grounded on the
//! hardware's `NV1BA0_PIO_*` constants where a real register exists.
//! `SET_CURRENT_HRTF_ENTRY`, `SET_VOICE_TAR_HRTF`, and the 16 `SET_HRIR*`
//! methods have no published PIO address in the reference headers this
//! crate was built against; they are assigned sequential addresses in the
//! unused window between `SET_VOICE_CFG_BUF_EBO` (0x3DC) and
//! `SET_SSL_SEGMENT_OFFSET` (0x600), documented as a deliberate gap-fill
//! rather than a known value.

pub const PIO_FREE: u32 = 0x0010;

pub const SET_ANTECEDENT_VOICE: u32 = 0x0120;
pub const VOICE_ON: u32 = 0x0124;
pub const VOICE_OFF: u32 = 0x0128;
pub const VOICE_RELEASE: u32 = 0x012C;
pub const GET_VOICE_POSITION: u32 = 0x0130;
pub const VOICE_PAUSE: u32 = 0x0140;
pub const SET_CONTEXT_DMA_NOTIFY: u32 = 0x0180;
pub const SET_CURRENT_SSL_CONTEXT_DMA: u32 = 0x018C;
pub const SET_CURRENT_SSL: u32 = 0x0190;
pub const SET_SUBMIX_HEADROOM_BASE: u32 = 0x0200; // 32 consecutive 4-byte slots
pub const SET_HRTF_HEADROOM: u32 = 0x0280;
pub const SET_HRTF_SUBMIXES: u32 = 0x02C0;

pub const SET_CURRENT_VOICE: u32 = 0x02F8;
pub const VOICE_LOCK: u32 = 0x02FC;

pub const SET_VOICE_CFG_VBIN: u32 = 0x0300;
pub const SET_VOICE_CFG_FMT: u32 = 0x0304;
pub const SET_VOICE_CFG_ENV0: u32 = 0x0308;
pub const SET_VOICE_CFG_ENVA: u32 = 0x030C;
pub const SET_VOICE_CFG_ENV1: u32 = 0x0310;
pub const SET_VOICE_CFG_ENVF: u32 = 0x0314;
pub const SET_VOICE_CFG_MISC: u32 = 0x0318;
pub const SET_VOICE_SSL_A: u32 = 0x0320;
pub const SET_VOICE_SSL_B: u32 = 0x035C;
pub const SET_VOICE_TAR_VOLA: u32 = 0x0360;
pub const SET_VOICE_TAR_VOLB: u32 = 0x0364;
pub const SET_VOICE_TAR_VOLC: u32 = 0x0368;
pub const SET_VOICE_LFO_ENV: u32 = 0x036C;
pub const SET_VOICE_TAR_FCA: u32 = 0x0374;
pub const SET_VOICE_TAR_FCB: u32 = 0x0378;
pub const SET_VOICE_TAR_PITCH: u32 = 0x037C;
pub const SET_VOICE_CFG_BUF_BASE: u32 = 0x03A0;
pub const SET_VOICE_CFG_BUF_LBO: u32 = 0x03A4;
pub const SET_VOICE_BUF_CBO: u32 = 0x03D8;
pub const SET_VOICE_CFG_BUF_EBO: u32 = 0x03DC;

pub const SET_CURRENT_HRTF_ENTRY: u32 = 0x03E0;
pub const SET_VOICE_TAR_HRTF: u32 = 0x03E4;
pub const SET_HRIR_BASE: u32 = 0x03E8; // 15 methods, 4 bytes apart
pub const SET_HRIR_X: u32 = 0x03E8 + 15 * 4;

pub const SET_SSL_SEGMENT_OFFSET_BASE: u32 = 0x0600; // 64 pairs, 8 bytes apart
pub const SET_SSL_SEGMENT_LENGTH_BASE: u32 = 0x0604;

pub const SET_CURRENT_INBUF_SGE: u32 = 0x0804;
pub const SET_CURRENT_INBUF_SGE_OFFSET: u32 = 0x0808;
pub const SET_OUTBUF_BA_BASE: u32 = 0x1000; // 4 entries, 8 bytes apart
pub const SET_OUTBUF_LEN_BASE: u32 = 0x1004;
pub const SET_CURRENT_OUTBUF_SGE: u32 = 0x1800;
pub const SET_CURRENT_OUTBUF_SGE_OFFSET: u32 = 0x1808;

pub const SE2FE_IDLE_VOICE: u32 = 0x8000;
