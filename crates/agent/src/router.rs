//! Media stream routing
//!
//! Each transport connection is bound to at most one call session, and each
//! session to at most one connection, through the correlation token carried
//! in the stream's `start` message. The binding table is the only state
//! shared between connections.
//!
//! Connections that never bind (unknown token, ended session, duplicate
//! stream) stay open; their frames are dropped. Closing a connection only
//! removes its binding and never touches the session. A binding is also
//! dropped as soon as its session ends, whether or not more frames arrive.

use crate::call_session::CallSession;
use crate::registry::CallRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use voice_dialer_core::{
    AudioEncoding, AudioFrame, CallEvent, RecognizerContext, RecognizerFactory, SampleRate,
    SpeechEvent, SpeechRecognizer,
};
use voice_dialer_transport::{parse_message, MediaPayload, StartMetadata, StreamMessage};

#[derive(Default)]
struct BindingTable {
    by_connection: HashMap<u64, String>,
    by_call: HashMap<String, u64>,
}

pub struct MediaStreamRouter {
    registry: Arc<CallRegistry>,
    recognizers: Arc<dyn RecognizerFactory>,
    bindings: Mutex<BindingTable>,
    next_id: AtomicU64,
}

impl MediaStreamRouter {
    pub fn new(registry: Arc<CallRegistry>, recognizers: Arc<dyn RecognizerFactory>) -> Self {
        Self {
            registry,
            recognizers,
            bindings: Mutex::new(BindingTable::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new transport connection. It stays unbound until `start`.
    pub fn accept(self: &Arc<Self>) -> MediaConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection = id, "Media connection accepted");
        MediaConnection {
            id,
            router: Arc::clone(self),
            bound: None,
            stats: ConnectionStats::default(),
        }
    }

    /// Claim `call_id` for `connection`; fails if another connection holds it
    fn bind(&self, connection: u64, call_id: &str) -> bool {
        let mut table = self.bindings.lock();
        if let Some(owner) = table.by_call.get(call_id) {
            return *owner == connection;
        }
        table.by_call.insert(call_id.to_string(), connection);
        table.by_connection.insert(connection, call_id.to_string());
        true
    }

    fn unbind(&self, connection: u64) -> Option<String> {
        let mut table = self.bindings.lock();
        let call_id = table.by_connection.remove(&connection)?;
        table.by_call.remove(&call_id);
        Some(call_id)
    }

    /// Drop `connection`'s binding once `session` reports `Ended`
    fn spawn_end_watch(
        self: &Arc<Self>,
        connection: u64,
        session: Arc<CallSession>,
        mut events: broadcast::Receiver<CallEvent>,
    ) -> JoinHandle<()> {
        let router = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CallEvent::Ended { .. }) | Err(broadcast::error::RecvError::Closed) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if session.is_ended() {
                            break;
                        }
                    }
                }
            }
            release_ended(&router, connection, session.call_id());
        })
    }

    /// Connection currently streaming for a call
    pub fn bound_connection(&self, call_id: &str) -> Option<u64> {
        self.bindings.lock().by_call.get(call_id).copied()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().by_connection.len()
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizers.name()
    }
}

/// Per-connection counters, reported when the connection closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub messages: u64,
    pub frames_routed: u64,
    pub frames_dropped: u64,
    pub malformed: u64,
}

fn release_ended(router: &Weak<MediaStreamRouter>, connection: u64, call_id: &str) {
    let Some(router) = router.upgrade() else {
        return;
    };
    if router.unbind(connection).is_some() {
        tracing::info!(connection, call_id, "Call ended, media stream unbound");
    }
}

struct BoundStream {
    session: Arc<CallSession>,
    recognizer: Box<dyn SpeechRecognizer>,
    encoding: AudioEncoding,
    sample_rate: SampleRate,
    frames: u64,
    end_watch: JoinHandle<()>,
}

/// One transport connection. Feed it every text frame in arrival order.
pub struct MediaConnection {
    id: u64,
    router: Arc<MediaStreamRouter>,
    bound: Option<BoundStream>,
    stats: ConnectionStats,
}

impl MediaConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Call id this connection streams for, if bound
    pub fn call_id(&self) -> Option<&str> {
        self.bound.as_ref().map(|b| b.session.call_id())
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Parse and handle one text frame. Malformed frames are skipped.
    pub async fn handle_text(&mut self, text: &str) {
        match parse_message(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::warn!(connection = self.id, error = %e, "Skipping malformed media message");
            }
        }
    }

    pub async fn handle_message(&mut self, message: StreamMessage) {
        self.stats.messages += 1;
        match message {
            StreamMessage::Connected { protocol } => {
                tracing::debug!(connection = self.id, ?protocol, "Media stream connected");
            }
            StreamMessage::Start { start, .. } => self.on_start(start),
            StreamMessage::Media { media, .. } => self.on_media(media).await,
            StreamMessage::Stop { .. } => self.on_stop().await,
            other => {
                tracing::trace!(connection = self.id, event = other.event_name(), "Ignoring stream event");
            }
        }
    }

    /// Transport closed. The session is left as it is.
    pub fn close(mut self) -> ConnectionStats {
        self.release("transport closed");
        self.stats
    }

    fn on_start(&mut self, start: StartMetadata) {
        if self.bound.is_some() {
            tracing::warn!(connection = self.id, "Duplicate start ignored");
            return;
        }

        let Some(token) = start.correlation_token() else {
            tracing::warn!(connection = self.id, "Start without correlation token, dropping stream");
            return;
        };

        let Some(session) = self.router.registry.resolve(token) else {
            tracing::warn!(connection = self.id, token, "No live call for stream, dropping frames");
            return;
        };

        if session.is_ended() {
            tracing::info!(
                connection = self.id,
                call_id = session.call_id(),
                "Stream started for an ended call, dropping frames"
            );
            return;
        }

        let (encoding, sample_rate) = match start.audio_format() {
            Ok(format) => format,
            Err(e) => {
                tracing::warn!(connection = self.id, call_id = session.call_id(), error = %e, "Unsupported media format");
                return;
            }
        };

        let context = RecognizerContext {
            call_id: session.call_id().to_string(),
            encoding,
            sample_rate,
        };
        let recognizer = match self.router.recognizers.create(&context) {
            Ok(recognizer) => recognizer,
            Err(e) => {
                tracing::error!(connection = self.id, call_id = session.call_id(), error = %e, "Failed to create recognizer");
                return;
            }
        };

        // Subscribe before binding so an end in between is still seen
        let events = session.subscribe();
        if !self.router.bind(self.id, session.call_id()) {
            tracing::warn!(
                connection = self.id,
                call_id = session.call_id(),
                "Call already has a media stream, dropping frames"
            );
            return;
        }
        if session.is_ended() {
            self.router.unbind(self.id);
            tracing::info!(connection = self.id, call_id = session.call_id(), "Call ended while binding");
            return;
        }
        let end_watch = self
            .router
            .spawn_end_watch(self.id, Arc::clone(&session), events);

        tracing::info!(
            connection = self.id,
            call_id = session.call_id(),
            recognizer = recognizer.name(),
            sample_rate = sample_rate.as_u32(),
            "Media stream bound"
        );

        self.bound = Some(BoundStream {
            session,
            recognizer,
            encoding,
            sample_rate,
            frames: 0,
            end_watch,
        });
    }

    async fn on_media(&mut self, media: MediaPayload) {
        if self.bound.as_ref().is_some_and(|b| b.session.is_ended()) {
            self.release("call ended");
        }
        let Some(stream) = self.bound.as_mut() else {
            self.stats.frames_dropped += 1;
            return;
        };

        if !media.is_inbound() {
            return;
        }

        let bytes = match media.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::warn!(connection = self.id, error = %e, "Skipping undecodable frame");
                return;
            }
        };

        let sequence = media.sequence().unwrap_or(stream.frames);
        stream.frames += 1;
        let frame = AudioFrame::decode(&bytes, stream.encoding, stream.sample_rate, sequence);

        let events = match stream.recognizer.accept_frame(&frame).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(connection = self.id, call_id = stream.session.call_id(), error = %e, "Recognizer failed on frame");
                Vec::new()
            }
        };
        self.stats.frames_routed += 1;

        route(&stream.session, events);

        if stream.session.is_ended() {
            self.release("call ended");
        }
    }

    async fn on_stop(&mut self) {
        if let Some(stream) = self.bound.as_mut() {
            match stream.recognizer.finish().await {
                Ok(events) => route(&stream.session, events),
                Err(e) => {
                    tracing::warn!(connection = self.id, call_id = stream.session.call_id(), error = %e, "Recognizer flush failed");
                }
            }
        }
        self.release("stream stopped");
    }

    fn release(&mut self, reason: &str) {
        if let Some(stream) = self.bound.take() {
            stream.end_watch.abort();
            self.router.unbind(self.id);
            tracing::info!(
                connection = self.id,
                call_id = stream.session.call_id(),
                frames = stream.frames,
                reason,
                "Media stream unbound"
            );
        }
    }
}

impl Drop for MediaConnection {
    fn drop(&mut self) {
        if let Some(stream) = self.bound.take() {
            stream.end_watch.abort();
            self.router.unbind(self.id);
        }
    }
}

fn route(session: &CallSession, events: Vec<SpeechEvent>) {
    for event in events {
        match event {
            SpeechEvent::Partial(text) => {
                session.on_speech_partial(&text);
            }
            SpeechEvent::Final(text) => {
                if let Err(e) = session.on_speech_final(&text) {
                    tracing::warn!(call_id = session.call_id(), error = %e, "Final transcript not applied");
                }
            }
        }
    }
}
