//! A 3-D voice writes a mixbin, a second 3-D voice clears that same bin as a
//! multipass source, and a multipass reader picks up the pre-clear
//! contribution before the bin lands at zero.
//!
//! Exercised at the `multipass` module level directly against
//! [`MixbinFrame`]: the worker pool's placement guarantee only keeps a
//! source voice and its grouped readers on one worker, it never changes
//! what `multipass::resolve` computes, so this is the right level to pin
//! the numeric outcome without depending on `num_workers`.

use mcpx_vp::mixbin::MixbinFrame;
use mcpx_vp::multipass::{group_following, resolve, MultipassVoice};

const SOURCE_BIN: u8 = 31;
const OTHER_BIN: u8 = 0;

#[test]
fn reader_sees_source_bins_contents_and_then_the_bin_clears() {
    let mut frame = MixbinFrame::new();

    // Voice 10 (3-D, non-multipass) mixes independently into bin 0.
    frame.bins[OTHER_BIN as usize][0] = 0.25;
    // Voice 12 (3-D multipass source) has already mixed its contribution
    // into bin 31 for this sub-frame by the time the reader resolves.
    frame.bins[SOURCE_BIN as usize][0] = 0.3;
    frame.bins[SOURCE_BIN as usize][1] = -0.4;

    // Voice 11 (multipass reader) reads bin 31 and clears it.
    let reader = MultipassVoice { voice: 11, source_bin: SOURCE_BIN, clear_mix: true };
    let received = resolve(&mut frame, &reader);

    assert_eq!(received[0], [0.3, 0.3]);
    assert_eq!(received[1], [-0.4, -0.4]);

    // Bin 31 is zero once the frame's multipass pass has run...
    assert!(frame.bins[SOURCE_BIN as usize].iter().all(|&s| s == 0.0));
    // ...and voice 10's unrelated bin is untouched.
    assert_eq!(frame.bins[OTHER_BIN as usize][0], 0.25);
}

#[test]
fn reader_without_clear_mix_leaves_the_source_bin_intact() {
    let mut frame = MixbinFrame::new();
    frame.bins[SOURCE_BIN as usize][3] = 0.7;

    let reader = MultipassVoice { voice: 11, source_bin: SOURCE_BIN, clear_mix: false };
    let received = resolve(&mut frame, &reader);

    assert_eq!(received[3], [0.7, 0.7]);
    assert_eq!(frame.bins[SOURCE_BIN as usize][3], 0.7);
}

#[test]
fn the_3d_source_voices_mp_list_grouping_picks_up_only_its_own_readers() {
    // Voice 11 reads bin 31 (voice 12's bin); a second, unrelated reader
    // further down the MP list reads a different bin and must not be
    // swept into the same group.
    let mp_list = vec![
        MultipassVoice { voice: 11, source_bin: SOURCE_BIN, clear_mix: true },
        MultipassVoice { voice: 20, source_bin: OTHER_BIN, clear_mix: false },
    ];

    let group = group_following(&mp_list, SOURCE_BIN);
    assert_eq!(group.len(), 1);
    assert_eq!(group[0].voice, 11);
}
