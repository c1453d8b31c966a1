use crossbeam::queue::ArrayQueue;
use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::frame::Frame;

/// Single-slot, newest-wins handoff between the transport thread and the UI thread.
///
/// Pushing never blocks: an unconsumed frame is replaced. Each push posts a
/// wake token to the UI loop; at most one token is ever pending.
pub struct FrameRelay {
    slot: ArrayQueue<Frame>,
    wake: Sender<()>,
}

impl FrameRelay {
    /// Create the relay and the receiver the UI loop waits on.
    pub fn new() -> (Self, Receiver<()>) {
        let (wake, woken) = crossbeam_channel::bounded(1);
        let relay = Self {
            slot: ArrayQueue::new(1),
            wake,
        };
        (relay, woken)
    }

    /// Store a frame, returning true if it displaced one nobody consumed.
    pub fn push(&self, frame: Frame) -> bool {
        let replaced = self.slot.force_push(frame).is_some();
        match self.wake.try_send(()) {
            // Full: the UI already has a wake pending
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                crate::utils::logger::debug("Frame relay: UI loop gone, frame left in slot");
            }
        }
        replaced
    }

    /// Take the pending frame, if any.
    pub fn take(&self) -> Option<Frame> {
        self.slot.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pixel_buffer::PixelBuffer;
    use std::sync::Arc;
    use std::time::Duration;

    fn frame(tag: u8) -> Frame {
        Frame::new(PixelBuffer::filled(1, 1, [tag, 0, 0, 255]), Duration::from_millis(tag as u64))
    }

    #[test]
    fn test_newest_frame_wins() {
        let (relay, _woken) = FrameRelay::new();
        assert!(!relay.push(frame(1)));
        assert!(relay.push(frame(2)));
        assert!(relay.push(frame(3)));

        let seen = relay.take().unwrap();
        assert_eq!(seen.pixels().pixel(0, 0), Some([3, 0, 0, 255]));
        assert!(relay.take().is_none());
    }

    #[test]
    fn test_single_wake_pending() {
        let (relay, woken) = FrameRelay::new();
        relay.push(frame(1));
        relay.push(frame(2));
        assert_eq!(woken.len(), 1);
        woken.try_recv().unwrap();
        assert!(woken.try_recv().is_err());
        assert!(relay.take().is_some());
    }

    #[test]
    fn test_push_survives_dropped_receiver() {
        let (relay, woken) = FrameRelay::new();
        drop(woken);
        relay.push(frame(7));
        assert!(relay.take().is_some());
    }

    #[test]
    fn test_cross_thread_handoff_sees_last_frame() {
        let (relay, woken) = FrameRelay::new();
        let relay = Arc::new(relay);
        let producer = {
            let relay = Arc::clone(&relay);
            std::thread::spawn(move || {
                for tag in 1..=50u8 {
                    relay.push(frame(tag));
                }
            })
        };
        producer.join().unwrap();

        woken.recv_timeout(Duration::from_secs(1)).unwrap();
        let last = relay.take().unwrap();
        assert_eq!(last.pixels().pixel(0, 0), Some([50, 0, 0, 255]));
    }
}
