//! Handshake negotiation with the receiver app.
//!
//! The companion sends a frame with sequence 0. Each side answers a frame
//! with sequence `n < 2` by sending `n + 1`. Any frame with a sequence above
//! 0 is an acknowledgement: the receiver is listening. Success is cached for
//! the lifetime of the negotiator so later transfers skip the exchange.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use bandbridge_protocol::HandshakeFrame;
use bandbridge_protocol::constants::HANDSHAKE_REPLY_LIMIT;

use crate::error::SessionError;

#[derive(Default)]
struct NegotiatorState {
    done: bool,
    waiter: Option<oneshot::Sender<()>>,
}

/// Tracks handshake progress for one session.
#[derive(Default)]
pub struct HandshakeNegotiator {
    state: Mutex<NegotiatorState>,
}

impl HandshakeNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the receiver has acknowledged.
    pub fn is_done(&self) -> bool {
        self.state.lock().unwrap().done
    }

    /// Runs the handshake.
    ///
    /// `send_initial` transmits the sequence-0 frame; it is only polled when
    /// no earlier handshake succeeded. The timeout starts after the frame
    /// was handed to the host.
    pub async fn perform<F>(&self, send_initial: F, timeout: Duration) -> Result<(), SessionError>
    where
        F: Future<Output = Result<(), SessionError>>,
    {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if state.done {
                debug!("handshake already completed, skipping");
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            state.waiter = Some(tx);
            rx
        };

        if let Err(e) = send_initial.await {
            self.state.lock().unwrap().waiter = None;
            warn!(error = %e, "failed to send handshake");
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => {
                info!("handshake completed");
                Ok(())
            }
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                self.state.lock().unwrap().waiter = None;
                warn!(timeout_ms = timeout.as_millis() as u64, "handshake timed out");
                Err(SessionError::HandshakeTimeout(timeout))
            }
        }
    }

    /// Handles an inbound handshake frame and returns the sequence to answer
    /// with, if any.
    ///
    /// An acknowledgement received while nobody waits still marks the
    /// handshake as done.
    pub fn on_frame(&self, frame: HandshakeFrame) -> Option<u32> {
        if frame.sequence > 0 {
            let mut state = self.state.lock().unwrap();
            state.done = true;
            if let Some(tx) = state.waiter.take() {
                let _ = tx.send(());
            }
        }

        if frame.sequence < HANDSHAKE_REPLY_LIMIT {
            debug!(sequence = frame.sequence, "handshake frame, replying");
            Some(frame.sequence + 1)
        } else {
            None
        }
    }

    /// Wakes a pending [`perform`](Self::perform) with [`SessionError::Closed`].
    pub fn abort(&self) {
        self.state.lock().unwrap().waiter = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn replies_below_limit() {
        let hs = HandshakeNegotiator::new();
        assert_eq!(hs.on_frame(HandshakeFrame::new(0)), Some(1));
        assert!(!hs.is_done());
        assert_eq!(hs.on_frame(HandshakeFrame::new(2)), None);
        assert_eq!(hs.on_frame(HandshakeFrame::new(5)), None);
    }

    #[test]
    fn first_ack_completes_and_is_answered() {
        let hs = HandshakeNegotiator::new();
        assert_eq!(hs.on_frame(HandshakeFrame::new(1)), Some(2));
        assert!(hs.is_done());
    }

    #[test]
    fn unsolicited_ack_marks_done() {
        let hs = HandshakeNegotiator::new();
        assert_eq!(hs.on_frame(HandshakeFrame::new(3)), None);
        assert!(hs.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_on_ack() {
        let hs = Arc::new(HandshakeNegotiator::new());
        let peer = hs.clone();
        let start = tokio::time::Instant::now();

        let result = hs
            .perform(
                async move {
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        assert_eq!(peer.on_frame(HandshakeFrame::new(1)), Some(2));
                    });
                    Ok(())
                },
                Duration::from_millis(3000),
            )
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_millis(3000));
        assert!(hs.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_reply() {
        let hs = HandshakeNegotiator::new();
        let start = tokio::time::Instant::now();

        let err = hs
            .perform(async { Ok(()) }, Duration::from_millis(3000))
            .await
            .unwrap_err();

        assert_eq!(err, SessionError::HandshakeTimeout(Duration::from_millis(3000)));
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert!(!hs.is_done());
    }

    #[tokio::test]
    async fn cached_success_skips_send() {
        let hs = HandshakeNegotiator::new();
        hs.on_frame(HandshakeFrame::new(2));

        let sends = AtomicUsize::new(0);
        hs.perform(
            async {
                sends.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await
        .unwrap();
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_failure_is_returned() {
        let hs = HandshakeNegotiator::new();
        let err = hs
            .perform(async { Err(SessionError::Closed) }, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_wakes_waiter() {
        let hs = Arc::new(HandshakeNegotiator::new());
        let other = hs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            other.abort();
        });
        let err = hs
            .perform(async { Ok(()) }, Duration::from_millis(3000))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Closed);
    }
}
