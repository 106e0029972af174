// Licensed under the Apache-2.0 license

//! Splitting of key transfers into key-window sized frames.

use super::regs::{KS_CTL_CONT_MSK, KS_KEY_WINDOW_WORDS};

/// One hardware transaction of a key transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Offset of the first word of the frame within the key.
    pub offset: usize,
    /// Words carried by the frame, at most [`KS_KEY_WINDOW_WORDS`].
    pub len: usize,
    /// Continuation of the previous frame rather than a new transfer.
    pub cont: bool,
}

impl Frame {
    /// `CTL.CONT` bit for this frame.
    #[must_use]
    pub const fn ctl_bits(&self) -> u32 {
        if self.cont {
            KS_CTL_CONT_MSK
        } else {
            0
        }
    }
}

/// Iterator over the frames covering `total` words.
#[derive(Clone, Debug)]
pub struct Frames {
    total: usize,
    offset: usize,
}

/// Frames covering a key of `total` words, in transfer order.
#[must_use]
pub const fn frames(total: usize) -> Frames {
    Frames { total, offset: 0 }
}

impl Iterator for Frames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.offset >= self.total {
            return None;
        }
        let len = (self.total - self.offset).min(KS_KEY_WINDOW_WORDS);
        let frame = Frame {
            offset: self.offset,
            len,
            cont: self.offset != 0,
        };
        self.offset += len;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total.saturating_sub(self.offset).div_ceil(KS_KEY_WINDOW_WORDS);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Frames {}
