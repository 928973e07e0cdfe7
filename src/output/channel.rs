use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};

use super::{DisplayUpdate, EncodedImage, OutputSink};

/// Pushes display updates into a bounded channel read by the UI thread.
///
/// When the UI falls behind, new frames are dropped rather than queued.
/// A clear is not dropped on a full queue: it waits up to `clear_wait` for room.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<DisplayUpdate>,
    clear_wait: Duration,
}

/// How long [`ChannelSink::clear`] waits for the display to make room.
pub const DEFAULT_CLEAR_WAIT: Duration = Duration::from_secs(1);

impl ChannelSink {
    /// Create a sink and the receiver the display side should drain.
    pub fn new(capacity: usize) -> (Self, Receiver<DisplayUpdate>) {
        Self::with_clear_wait(capacity, DEFAULT_CLEAR_WAIT)
    }

    pub fn with_clear_wait(
        capacity: usize,
        clear_wait: Duration,
    ) -> (Self, Receiver<DisplayUpdate>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx, clear_wait }, rx)
    }

    fn push(&self, update: DisplayUpdate) -> Result<()> {
        match self.tx.try_send(update) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::debug!("display queue full, dropping update");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("display receiver disconnected")),
        }
    }
}

impl OutputSink for ChannelSink {
    fn write_frame(&self, image: EncodedImage) -> Result<()> {
        self.push(DisplayUpdate::Frame(image))
    }

    fn clear(&self) -> Result<()> {
        match self.tx.send_timeout(DisplayUpdate::Clear, self.clear_wait) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(anyhow!(
                "display queue stayed full for {:?}, clear not delivered",
                self.clear_wait
            )),
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(anyhow!("display receiver disconnected"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn image(tag: u8) -> EncodedImage {
        EncodedImage {
            bytes: vec![tag],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn delivers_in_order_and_drops_when_full() {
        let (sink, rx) = ChannelSink::new(2);
        sink.write_frame(image(1)).unwrap();
        sink.clear().unwrap();
        sink.write_frame(image(3)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::Frame(image(1)));
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::Clear);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_waits_for_room_in_a_full_queue() {
        let (sink, rx) = ChannelSink::new(1);
        sink.write_frame(image(1)).unwrap();
        sink.write_frame(image(2)).unwrap();

        let clearing = thread::spawn(move || sink.clear());
        thread::sleep(Duration::from_millis(50));
        assert_eq!(rx.recv().unwrap(), DisplayUpdate::Frame(image(1)));
        clearing.join().unwrap().unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            DisplayUpdate::Clear
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_gives_up_on_a_stalled_display() {
        let (sink, rx) = ChannelSink::with_clear_wait(1, Duration::from_millis(20));
        sink.write_frame(image(1)).unwrap();
        assert!(sink.clear().is_err());
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::Frame(image(1)));
    }

    #[test]
    fn reports_a_vanished_display() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        assert!(sink.write_frame(image(1)).is_err());
        assert!(sink.clear().is_err());
    }
}
