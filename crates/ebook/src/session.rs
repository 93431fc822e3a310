//! Transfer session: drives one file from handshake to a terminal state.
//!
//! A session is used from two tasks. The caller awaits [`TransferSession::send_file`],
//! which runs the handshake and sends the start message. A driver task runs
//! [`TransferSession::run`] over the host's inbound stream and reacts to the
//! receiver's events one at a time. The internal lock is never held across
//! an await.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use bandbridge_host::{DeviceBridge, Endpoint, InboundNotification, InboundReceiver, launch_and_settle};
use bandbridge_protocol::{
    FileCommand, FileEvent, HandshakeFrame, Inbound, SUCCESS_MARKER, encode_command, encode_handshake,
};
use bandbridge_transfer::{ChunkPlan, ProgressReport, SourceFile, TransferSnapshot, TransferState};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::flow::FlowController;
use crate::handshake::HandshakeNegotiator;
use crate::types::{CancelOrigin, TransferEvent};

struct SessionInner {
    state: TransferState,
    endpoint: Endpoint,
    filename: Option<String>,
    flow: Option<FlowController>,
    failure: Option<SessionError>,
}

/// A single-use transfer session towards one receiver app.
pub struct TransferSession {
    id: String,
    bridge: Arc<dyn DeviceBridge>,
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    handshake: HandshakeNegotiator,
    events_tx: mpsc::UnboundedSender<TransferEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransferEvent>>>,
    state_tx: watch::Sender<TransferState>,
    shutdown: CancellationToken,
}

impl TransferSession {
    /// Creates an idle session towards `config.app_id` on `device`.
    pub fn new(bridge: Arc<dyn DeviceBridge>, device: impl Into<String>, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(TransferState::Idle);
        let endpoint = Endpoint::new(device, config.app_id.clone());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            bridge,
            config,
            inner: Mutex::new(SessionInner {
                state: TransferState::Idle,
                endpoint,
                filename: None,
                flow: None,
                failure: None,
            }),
            handshake: HandshakeNegotiator::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            state_tx,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> TransferState {
        self.inner.lock().unwrap().state
    }

    pub fn endpoint(&self) -> Endpoint {
        self.inner.lock().unwrap().endpoint.clone()
    }

    /// The error that ended the session, if it failed.
    pub fn failure(&self) -> Option<SessionError> {
        self.inner.lock().unwrap().failure.clone()
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        let inner = self.inner.lock().unwrap();
        let (total_chunks, current_chunk) = inner
            .flow
            .as_ref()
            .map(|f| (f.total_chunks(), f.current_chunk()))
            .unwrap_or((0, 0));
        TransferSnapshot {
            session_id: self.id.clone(),
            state: inner.state,
            filename: inner.filename.clone(),
            total_chunks,
            chunk_size: self.config.chunk_size,
            current_chunk,
        }
    }

    /// Takes the event receiver. Returns `None` after the first call.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransferEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TransferState> {
        self.state_tx.subscribe()
    }

    /// Waits until the session reaches a terminal state and returns it.
    pub async fn wait_finished(&self) -> TransferState {
        let mut rx = self.state_tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// Changes the target app. Only allowed before the first transfer.
    pub fn set_app_id(&self, app_id: impl Into<String>) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            TransferState::Idle => {
                inner.endpoint.app_id = app_id.into();
                Ok(())
            }
            s if s.is_terminal() => Err(SessionError::SessionFinished(s)),
            _ => Err(SessionError::AlreadyBusy),
        }
    }

    // -----------------------------------------------------------------------
    // Outbound operations
    // -----------------------------------------------------------------------

    /// Starts sending `file`.
    ///
    /// Returns once the start message was handed to the host. The rest of
    /// the transfer is paced by the receiver through [`run`](Self::run), and
    /// its outcome arrives as events.
    pub async fn send_file(&self, file: &SourceFile) -> Result<(), SessionError> {
        let plan = {
            let mut inner = self.inner.lock().unwrap();
            match inner.state {
                s if s.is_busy() => return Err(SessionError::AlreadyBusy),
                s if s.is_terminal() => return Err(SessionError::SessionFinished(s)),
                _ => {}
            }

            let plan = ChunkPlan::with_content_size(file.content(), file.size(), self.config.chunk_size)?;
            inner.filename = Some(file.name().to_string());

            if plan.is_empty() {
                inner.flow = Some(FlowController::new(plan));
                self.advance(&mut inner, TransferState::Completed);
                drop(inner);
                info!(session = %self.id, file = file.name(), "empty file, nothing to send");
                self.emit(TransferEvent::Progress(ProgressReport::status(1.0, "transfer complete")));
                self.emit(TransferEvent::Completed {
                    message: "file is empty, nothing to send".into(),
                    count: 0,
                });
                return Ok(());
            }

            self.advance(&mut inner, TransferState::Handshaking);
            plan
        };

        let total_chunks = plan.total_chunks();
        info!(
            session = %self.id,
            file = file.name(),
            size = file.size(),
            total_chunks,
            "starting transfer"
        );

        if let Err(e) = self.perform_handshake().await {
            return Err(self.fail(e, 0));
        }

        let endpoint = self.endpoint();
        if let Err(e) = launch_and_settle(&*self.bridge, &endpoint, self.config.launch_settle()).await {
            debug!(session = %self.id, error = %e, "receiver launch failed, sending anyway");
        }

        {
            let mut inner = self.inner.lock().unwrap();
            if !self.advance(&mut inner, TransferState::AwaitingStart) {
                return Err(SessionError::Closed);
            }
            inner.flow = Some(FlowController::new(plan));
        }

        let start = FileCommand::StartTransfer {
            filename: file.name().to_string(),
            total: total_chunks,
            chunk_size: self.config.chunk_size,
        };
        if let Err(e) = self.transmit(&start).await {
            return Err(self.fail(e, 0));
        }

        // The receiver may already have answered, or the session been closed,
        // while the start message was in flight.
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            TransferState::AwaitingStart | TransferState::Transferring => {
                if inner.state == TransferState::AwaitingStart {
                    self.advance(&mut inner, TransferState::Transferring);
                }
                drop(inner);
                self.emit(TransferEvent::Progress(ProgressReport::status(0.0, "preparing...")));
                Ok(())
            }
            TransferState::Completed => Ok(()),
            TransferState::Failed => Err(inner.failure.clone().unwrap_or(SessionError::Closed)),
            _ if self.shutdown.is_cancelled() => Err(SessionError::Closed),
            _ => Err(SessionError::RemoteCancelled),
        }
    }

    /// Runs the handshake with the receiver. Succeeds immediately if an
    /// earlier handshake on this session succeeded.
    pub async fn perform_handshake(&self) -> Result<(), SessionError> {
        let endpoint = self.endpoint();
        let send_initial = async {
            let payload = encode_handshake(0)?;
            self.bridge
                .send_message(&endpoint, payload)
                .await
                .map_err(|source| SessionError::TransportFailure { count: 0, source })
        };
        self.handshake
            .perform(send_initial, self.config.handshake_timeout())
            .await
    }

    /// Sends chunk `index`. A no-op past the last chunk.
    ///
    /// A send failure fails the session.
    pub async fn send_chunk(&self, index: usize, is_resend: bool) -> Result<(), SessionError> {
        let (endpoint, prepared) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != TransferState::Transferring {
                return Err(SessionError::NotTransferring);
            }
            let endpoint = inner.endpoint.clone();
            let Some(flow) = inner.flow.as_mut() else {
                return Err(SessionError::NotTransferring);
            };
            match flow.prepare(index, is_resend)? {
                Some(prepared) => (endpoint, prepared),
                None => return Ok(()),
            }
        };

        self.emit(TransferEvent::Progress(prepared.progress));
        match self.bridge.send_message(&endpoint, prepared.payload).await {
            Ok(()) => {
                debug!(session = %self.id, index, resend = is_resend, "chunk sent");
                Ok(())
            }
            Err(source) => {
                warn!(session = %self.id, index, error = %source, "chunk send failed");
                Err(self.fail(SessionError::TransportFailure { count: index, source }, index))
            }
        }
    }

    /// Cancels the running transfer.
    ///
    /// The session ends `Cancelled` even if the receiver cannot be told.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != TransferState::Transferring {
                return Err(SessionError::NotTransferring);
            }
            self.advance(&mut inner, TransferState::Cancelled);
        }
        info!(session = %self.id, "transfer cancelled by caller");

        if let Err(e) = self.transmit(&FileCommand::Cancel).await {
            warn!(session = %self.id, error = %e, "failed to notify receiver of cancellation");
        }
        self.emit(TransferEvent::Cancelled {
            origin: CancelOrigin::Local,
            message: "transfer cancelled".into(),
        });
        Ok(())
    }

    /// Asks the receiver for its storage usage. The answer arrives as a
    /// [`TransferEvent::StorageReport`].
    pub async fn query_usage(&self) -> Result<(), SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.transmit(&FileCommand::GetUsage).await
    }

    /// Tears the session down. A running transfer ends `Cancelled`, and a
    /// pending handshake fails with [`SessionError::Closed`].
    pub fn close(&self) {
        let was_busy = {
            let mut inner = self.inner.lock().unwrap();
            let busy = inner.state.is_busy();
            if busy {
                self.advance(&mut inner, TransferState::Cancelled);
            }
            busy
        };
        self.handshake.abort();
        self.shutdown.cancel();

        if was_busy {
            info!(session = %self.id, "session closed during transfer");
            self.emit(TransferEvent::Cancelled {
                origin: CancelOrigin::Local,
                message: "session closed".into(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Inbound handling
    // -----------------------------------------------------------------------

    /// Processes inbound notifications until the stream ends or the session
    /// is closed.
    pub async fn run(&self, mut inbound: InboundReceiver) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(session = %self.id, "session driver stopped");
                    break;
                }
                msg = inbound.recv() => {
                    let Some(notification) = msg else {
                        debug!(session = %self.id, "inbound stream closed");
                        break;
                    };
                    match self.handle_notification(notification).await {
                        Ok(()) => {}
                        Err(SessionError::InvalidMessage(reason)) => {
                            warn!(session = %self.id, %reason, "ignoring invalid message");
                        }
                        Err(e) => debug!(session = %self.id, error = %e, "inbound handling error"),
                    }
                }
            }
        }
    }

    /// Handles one notification from the host. Messages for other apps are
    /// ignored.
    pub async fn handle_notification(&self, notification: InboundNotification) -> Result<(), SessionError> {
        let app_id = self.endpoint().app_id;
        if notification.app_id != app_id {
            trace!(from = %notification.app_id, "message for another app");
            return Ok(());
        }

        match Inbound::parse(&notification.payload)? {
            Inbound::Handshake(frame) => self.on_handshake_frame(frame).await,
            Inbound::File(event) => self.handle_event(event).await,
            Inbound::Unknown(tag) => {
                trace!(%tag, "ignoring message with unknown tag");
                Ok(())
            }
        }
    }

    async fn on_handshake_frame(&self, frame: HandshakeFrame) -> Result<(), SessionError> {
        let Some(reply) = self.handshake.on_frame(frame) else {
            return Ok(());
        };
        let endpoint = self.endpoint();
        let payload = encode_handshake(reply)?;
        if let Err(e) = self.bridge.send_message(&endpoint, payload).await {
            warn!(session = %self.id, sequence = reply, error = %e, "handshake reply failed");
        }
        Ok(())
    }

    /// Applies a receiver event to the session.
    pub async fn handle_event(&self, event: FileEvent) -> Result<(), SessionError> {
        let state = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == TransferState::AwaitingStart {
                self.advance(&mut inner, TransferState::Transferring);
            }
            inner.state
        };

        if state != TransferState::Transferring {
            if let FileEvent::Ready { usage, .. } = event {
                self.emit(TransferEvent::StorageReport {
                    usage,
                    ceiling: self.config.storage_ceiling,
                });
            } else {
                debug!(session = %self.id, event = event.kind(), %state, "ignoring event while not transferring");
            }
            return Ok(());
        }

        match event {
            FileEvent::Ready { usage, found, length } => {
                self.emit(TransferEvent::StorageReport {
                    usage,
                    ceiling: self.config.storage_ceiling,
                });
                if usage > self.config.storage_ceiling {
                    let err = SessionError::InsufficientStorage {
                        usage,
                        ceiling: self.config.storage_ceiling,
                    };
                    return Err(self.fail(err, 0));
                }

                if found && length > 0 {
                    let index = {
                        let inner = self.inner.lock().unwrap();
                        inner.flow.as_ref().map(|f| f.plan().resume_index(length)).unwrap_or(0)
                    };
                    info!(session = %self.id, received = length, index, "resuming partial transfer");
                    self.send_chunk(index, true).await
                } else {
                    self.send_chunk(0, false).await
                }
            }
            FileEvent::Error { count, message } => {
                warn!(session = %self.id, count, %message, "receiver reported chunk error, resending");
                self.send_chunk(count, false).await
            }
            FileEvent::Next { count, message } => {
                let total = self.total_chunks();
                if message.contains(SUCCESS_MARKER) {
                    self.complete(message, count);
                    Ok(())
                } else if count >= total {
                    self.complete(format!("transfer complete, {total} chunks"), total);
                    Ok(())
                } else {
                    self.send_chunk(count, false).await
                }
            }
            FileEvent::Success { message, count } => {
                self.complete(message, count);
                Ok(())
            }
            FileEvent::Cancel => {
                let cancelled = {
                    let mut inner = self.inner.lock().unwrap();
                    self.advance(&mut inner, TransferState::Cancelled)
                };
                if cancelled {
                    info!(session = %self.id, "transfer cancelled by receiver");
                    self.emit(TransferEvent::Cancelled {
                        origin: CancelOrigin::Remote,
                        message: SessionError::RemoteCancelled.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn total_chunks(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.flow.as_ref().map(FlowController::total_chunks).unwrap_or(0)
    }

    /// Moves to `next` if the transition is allowed. Returns whether it
    /// happened.
    fn advance(&self, inner: &mut SessionInner, next: TransferState) -> bool {
        if !inner.state.can_advance_to(next) {
            debug!(session = %self.id, from = %inner.state, to = %next, "state transition rejected");
            return false;
        }
        debug!(session = %self.id, from = %inner.state, to = %next, "state transition");
        inner.state = next;
        self.state_tx.send_replace(next);
        true
    }

    fn complete(&self, message: String, count: usize) {
        let completed = {
            let mut inner = self.inner.lock().unwrap();
            let done = self.advance(&mut inner, TransferState::Completed);
            if done {
                if let Some(flow) = inner.flow.as_mut() {
                    flow.mark_complete();
                }
            }
            done
        };
        if completed {
            info!(session = %self.id, count, %message, "transfer completed");
            self.emit(TransferEvent::Progress(ProgressReport::status(1.0, "transfer complete")));
            self.emit(TransferEvent::Completed { message, count });
        }
    }

    /// Fails the session with `err` unless it already ended, and hands the
    /// error back.
    fn fail(&self, err: SessionError, count: usize) -> SessionError {
        let failed = {
            let mut inner = self.inner.lock().unwrap();
            let failed = self.advance(&mut inner, TransferState::Failed);
            if failed {
                inner.failure = Some(err.clone());
            }
            failed
        };
        if failed {
            warn!(session = %self.id, error = %err, count, "transfer failed");
            self.emit(TransferEvent::Failed {
                error: err.clone(),
                count,
            });
        }
        err
    }

    async fn transmit(&self, command: &FileCommand) -> Result<(), SessionError> {
        let endpoint = self.endpoint();
        let payload = encode_command(command)?;
        self.bridge
            .send_message(&endpoint, payload)
            .await
            .map_err(|source| SessionError::TransportFailure { count: 0, source })
    }

    fn emit(&self, event: TransferEvent) {
        if self.events_tx.send(event).is_err() {
            trace!(session = %self.id, "event listener dropped");
        }
    }
}

impl Drop for TransferSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
