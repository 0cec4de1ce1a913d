use crate::compositor::FrameBuffer;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

/// Single-slot mailbox between the render worker and the host.
///
/// At most one frame is in flight. Offering a frame while one is still waiting replaces it, so the
/// host never sees an older frame after a newer one.
#[derive(Clone, Debug)]
pub struct DisplayLink {
    tx: Sender<FrameBuffer>,
    rx: Receiver<FrameBuffer>,
}

impl DisplayLink {
    /// Empty mailbox.
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Offer a frame. Returns `true` when the slot was empty, i.e. the host needs a wake-up.
    pub fn offer(&self, mut frame: FrameBuffer) -> bool {
        let mut was_empty = true;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return was_empty,
                Err(TrySendError::Full(back)) => {
                    // Superseded: the host has not picked it up yet.
                    let _ = self.rx.try_recv();
                    was_empty = false;
                    frame = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    /// Take the waiting frame, if any.
    pub fn take(&self) -> Option<FrameBuffer> {
        self.rx.try_recv().ok()
    }

    /// `true` when a frame is waiting.
    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for DisplayLink {
    fn default() -> Self {
        Self::new()
    }
}
