use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::guidance::domain::guidance_decision::GuidanceDecision;
use crate::guidance::domain::guidance_sink::GuidanceSink;

/// Creates a linked sink/feed pair.
///
/// The sink side goes to the analysis worker; the feed side stays on the
/// thread that owns the display and drains decisions at its own pace.
pub fn guidance_channel() -> (ChannelGuidanceSink, GuidanceFeed) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ChannelGuidanceSink { tx }, GuidanceFeed { rx, last: None })
}

/// Worker-side half: forwards decisions without ever blocking.
pub struct ChannelGuidanceSink {
    tx: Sender<GuidanceDecision>,
}

impl GuidanceSink for ChannelGuidanceSink {
    fn update(&mut self, decision: GuidanceDecision) {
        if self.tx.send(decision).is_err() {
            log::debug!("Guidance feed closed; dropping {decision:?}");
        }
    }
}

/// Display-side half: holds the last decision shown.
pub struct GuidanceFeed {
    rx: Receiver<GuidanceDecision>,
    last: Option<GuidanceDecision>,
}

impl GuidanceFeed {
    /// Drains everything queued and returns the newest decision, if any
    /// arrived since the previous call. Never blocks.
    pub fn poll_latest(&mut self) -> Option<GuidanceDecision> {
        let newest = self.rx.try_iter().last()?;
        self.last = Some(newest);
        Some(newest)
    }

    /// Waits up to `timeout` for the next decision, in publication order.
    ///
    /// Returns `None` on timeout or once the sink side is gone and the
    /// queue is empty.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<GuidanceDecision> {
        match self.rx.recv_timeout(timeout) {
            Ok(decision) => {
                self.last = Some(decision);
                Some(decision)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Last decision handed to the display.
    pub fn last_displayed(&self) -> Option<GuidanceDecision> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::domain::guidance_decision::{HorizontalDirection, VerticalDirection};

    fn left_up() -> GuidanceDecision {
        GuidanceDecision::Directional {
            horizontal: HorizontalDirection::Left,
            vertical: VerticalDirection::Up,
        }
    }

    #[test]
    fn test_poll_latest_keeps_newest_only() {
        let (mut sink, mut feed) = guidance_channel();
        sink.update(GuidanceDecision::NoFaceDetected);
        sink.update(left_up());
        sink.update(GuidanceDecision::Centered);

        assert_eq!(feed.poll_latest(), Some(GuidanceDecision::Centered));
        assert_eq!(feed.last_displayed(), Some(GuidanceDecision::Centered));
        assert_eq!(feed.poll_latest(), None);
        assert_eq!(feed.last_displayed(), Some(GuidanceDecision::Centered));
    }

    #[test]
    fn test_next_timeout_preserves_order() {
        let (mut sink, mut feed) = guidance_channel();
        sink.update(left_up());
        sink.update(GuidanceDecision::Centered);

        let timeout = Duration::from_millis(10);
        assert_eq!(feed.next_timeout(timeout), Some(left_up()));
        assert_eq!(feed.next_timeout(timeout), Some(GuidanceDecision::Centered));
        assert_eq!(feed.next_timeout(timeout), None);
    }

    #[test]
    fn test_update_from_worker_thread() {
        let (mut sink, mut feed) = guidance_channel();
        std::thread::spawn(move || sink.update(GuidanceDecision::Centered))
            .join()
            .unwrap();
        assert_eq!(
            feed.next_timeout(Duration::from_secs(1)),
            Some(GuidanceDecision::Centered)
        );
    }

    #[test]
    fn test_queued_decisions_survive_sink_drop() {
        let (mut sink, mut feed) = guidance_channel();
        sink.update(GuidanceDecision::Centered);
        drop(sink);
        assert_eq!(feed.poll_latest(), Some(GuidanceDecision::Centered));
        assert_eq!(feed.next_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_update_after_feed_dropped_does_not_panic() {
        let (mut sink, feed) = guidance_channel();
        drop(feed);
        sink.update(GuidanceDecision::Centered);
    }
}
