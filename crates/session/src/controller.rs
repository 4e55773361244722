//! Session controller
//!
//! State machine `Idle -> Starting -> Active -> Stopping -> Idle` over
//! the transport, synthesis, recognition and chat-backend seams. Start
//! either ends `Active` or rolls back to `Idle`; stop is best effort and
//! never fails outward. Submissions are serialized: one backend request
//! may be in flight per session, an overlapping submit is rejected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use avatar_agent_config::constants::replies;
use avatar_agent_config::Settings;
use avatar_agent_core::{ChatBackend, ChatEntry, ChatHistory, Message, SessionState};
use avatar_agent_recognition::{RecognitionAdapter, RecognizerFactory};
use avatar_agent_synthesis::{
    CancellationReason, SpeakOutcome, Synthesizer, SynthesizerFactory, SynthesizerReadiness,
};
use avatar_agent_transport::{MediaTransport, PlaybackSink, TransportFactory};

use crate::{policy, SessionError};

/// Resources owned by the session while it is up
struct ActiveSession {
    id: Uuid,
    transport: Arc<dyn MediaTransport>,
    synthesizer: Arc<dyn Synthesizer>,
}

/// Orchestrates one avatar conversation session at a time
pub struct SessionController {
    settings: Settings,
    transport_factory: Arc<dyn TransportFactory>,
    synthesizer_factory: Arc<dyn SynthesizerFactory>,
    chat_backend: Arc<dyn ChatBackend>,
    recognition: RecognitionAdapter,
    sink: Arc<PlaybackSink>,

    state: RwLock<SessionState>,
    /// Incremented on every start and stop; a backend response produced
    /// under an older epoch is dropped without effect
    epoch: AtomicU64,
    active: RwLock<Option<ActiveSession>>,
    history: RwLock<ChatHistory>,
    pending_input: RwLock<String>,
    /// Held for the duration of one backend round trip
    submit_lock: tokio::sync::Mutex<()>,
}

impl SessionController {
    /// Build a controller using the HTTP recognizer configured in
    /// `settings.recognition`.
    ///
    /// Spawns the transcript pump task, so a Tokio runtime must be
    /// running.
    pub fn new(
        settings: Settings,
        transport_factory: Arc<dyn TransportFactory>,
        synthesizer_factory: Arc<dyn SynthesizerFactory>,
        chat_backend: Arc<dyn ChatBackend>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(8);
        let recognition = RecognitionAdapter::new(settings.recognition.clone(), tx);
        Self::build(
            settings,
            transport_factory,
            synthesizer_factory,
            chat_backend,
            recognition,
            rx,
        )
    }

    /// Build a controller with an injected recognizer constructor
    pub fn with_recognizer_factory(
        settings: Settings,
        transport_factory: Arc<dyn TransportFactory>,
        synthesizer_factory: Arc<dyn SynthesizerFactory>,
        chat_backend: Arc<dyn ChatBackend>,
        recognizer_factory: RecognizerFactory,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(8);
        let recognition = RecognitionAdapter::with_factory(recognizer_factory, tx);
        Self::build(
            settings,
            transport_factory,
            synthesizer_factory,
            chat_backend,
            recognition,
            rx,
        )
    }

    fn build(
        settings: Settings,
        transport_factory: Arc<dyn TransportFactory>,
        synthesizer_factory: Arc<dyn SynthesizerFactory>,
        chat_backend: Arc<dyn ChatBackend>,
        recognition: RecognitionAdapter,
        transcript_rx: mpsc::Receiver<String>,
    ) -> Arc<Self> {
        let controller = Arc::new(Self {
            settings,
            transport_factory,
            synthesizer_factory,
            chat_backend,
            recognition,
            sink: Arc::new(PlaybackSink::new()),
            state: RwLock::new(SessionState::Idle),
            epoch: AtomicU64::new(0),
            active: RwLock::new(None),
            history: RwLock::new(ChatHistory::new()),
            pending_input: RwLock::new(String::new()),
            submit_lock: tokio::sync::Mutex::new(()),
        });
        Self::spawn_transcript_pump(&controller, transcript_rx);
        controller
    }

    /// Forwards captured utterances into `submit`
    fn spawn_transcript_pump(controller: &Arc<Self>, mut rx: mpsc::Receiver<String>) {
        let weak = Arc::downgrade(controller);
        tokio::spawn(async move {
            while let Some(transcript) = rx.recv().await {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = controller.submit(&transcript).await {
                    warn!(error = %e, "Dropping captured transcript");
                }
            }
        });
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Id of the running session, if any
    pub fn session_id(&self) -> Option<Uuid> {
        self.active.read().as_ref().map(|a| a.id)
    }

    /// Snapshot of the current transcript
    pub fn history(&self) -> Vec<ChatEntry> {
        self.history.read().entries().to_vec()
    }

    pub fn pending_input(&self) -> String {
        self.pending_input.read().clone()
    }

    pub fn set_pending_input(&self, text: impl Into<String>) {
        *self.pending_input.write() = text.into();
    }

    pub fn playback_sink(&self) -> Arc<PlaybackSink> {
        self.sink.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.recognition.is_listening()
    }

    /// Start a new session. Only valid from `Idle`; ends `Active` on
    /// success and rolls everything back to `Idle` on failure.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write();
            if !state.can_start() {
                return Err(SessionError::InvalidState(*state));
            }
            *state = SessionState::Starting;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let id = Uuid::new_v4();
        info!(session_id = %id, "Starting avatar session");

        match self.bring_up(id).await {
            Ok(active) => {
                // A stop may have run while resources were coming up;
                // it must not be undone by installing them now.
                let mut active = Some(active);
                {
                    let mut state = self.state.write();
                    if self.epoch.load(Ordering::SeqCst) == epoch
                        && *state == SessionState::Starting
                    {
                        self.history.write().clear();
                        *self.active.write() = active.take();
                        *state = SessionState::Active;
                    }
                }

                match active {
                    None => {
                        info!(session_id = %id, "Avatar session active");
                        Ok(())
                    }
                    Some(leftover) => {
                        warn!(session_id = %id, "Session stopped while starting, releasing resources");
                        self.release(leftover).await;
                        Err(SessionError::StoppedWhileStarting)
                    }
                }
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "Failed to start avatar session");
                *self.state.write() = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Close session resources, logging and swallowing every failure
    async fn release(&self, active: ActiveSession) {
        if let Err(e) = active.synthesizer.stop_speaking().await {
            warn!(session_id = %active.id, error = %e, "Failed to stop in-progress speech");
        }
        if let Err(e) = active.synthesizer.close().await {
            warn!(session_id = %active.id, error = %e, "Failed to close synthesizer");
        }
        if let Err(e) = active.transport.close().await {
            warn!(session_id = %active.id, error = %e, "Failed to close transport");
        }
        self.sink.release();
    }

    async fn bring_up(&self, id: Uuid) -> Result<ActiveSession, SessionError> {
        let transport = self
            .transport_factory
            .create_transport(&self.settings.ice, self.sink.clone())
            .await?;

        match self.attach_avatar(&transport).await {
            Ok(synthesizer) => Ok(ActiveSession {
                id,
                transport,
                synthesizer,
            }),
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    warn!(session_id = %id, error = %close_err, "Transport close during rollback failed");
                }
                self.sink.release();
                Err(e)
            }
        }
    }

    async fn attach_avatar(
        &self,
        transport: &Arc<dyn MediaTransport>,
    ) -> Result<Arc<dyn Synthesizer>, SessionError> {
        transport.add_bidirectional_media().await?;

        let synthesizer = self
            .synthesizer_factory
            .create_synthesizer(&self.settings.voice, &self.settings.avatar)?;

        if let Err(e) = synthesizer.start_avatar(transport.clone()).await {
            if let Err(close_err) = synthesizer.close().await {
                warn!(error = %close_err, "Synthesizer close during rollback failed");
            }
            return Err(e.into());
        }

        Ok(synthesizer)
    }

    /// Send one user message to the chat backend and voice the reply
    ///
    /// Rejected outside `Active` without touching the backend. A reply
    /// arriving after the session stopped (or restarted) is discarded.
    pub async fn submit(&self, text: &str) -> Result<(), SessionError> {
        if !self.state.read().is_active() {
            warn!("Ignoring message: session is not active");
            return Err(SessionError::NotActive);
        }

        let _guard = self
            .submit_lock
            .try_lock()
            .map_err(|_| SessionError::RequestInFlight)?;

        let epoch = self.epoch.load(Ordering::SeqCst);
        let messages = [Message::user(text)];
        let outcome = self.chat_backend.send(&messages).await;

        if self.epoch.load(Ordering::SeqCst) != epoch || !self.state.read().is_active() {
            debug!("Discarding backend response for an ended session");
            return Ok(());
        }

        match outcome {
            Ok(body) => {
                let reply = body
                    .get("response")
                    .and_then(|v| v.as_str())
                    .filter(|r| !r.is_empty())
                    .map(str::to_string);

                match reply {
                    Some(reply) => {
                        if policy::contains_sensitive_marker(&reply) {
                            info!("Sensitive reply detected, clearing pending input");
                            self.pending_input.write().clear();
                        }
                        self.history.write().push(ChatEntry::new(text, &reply));
                        if let Err(e) = self.speak(&reply).await {
                            error!(error = %e, "Failed to voice reply");
                        }
                    }
                    None => {
                        warn!("Backend reply missing a string response field");
                        self.history
                            .write()
                            .push(ChatEntry::new(text, replies::NOT_UNDERSTOOD));
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Chat backend request failed");
                self.history
                    .write()
                    .push(ChatEntry::new(text, replies::BACKEND_UNREACHABLE));
            }
        }

        Ok(())
    }

    /// Voice `text` through the session synthesizer
    pub async fn speak(&self, text: &str) -> Result<(), SessionError> {
        let synthesizer = {
            let active = self.active.read();
            match active.as_ref() {
                Some(a) if a.synthesizer.readiness() == SynthesizerReadiness::Started => {
                    a.synthesizer.clone()
                }
                _ => return Err(SessionError::SynthesizerNotReady),
            }
        };

        self.sink.unmute_audio();
        let result = synthesizer.speak(text).await;
        // Cleared whether or not synthesis succeeded
        self.pending_input.write().clear();
        let outcome = result?;

        match outcome {
            SpeakOutcome::Completed => {
                debug!("Synthesis completed");
            }
            SpeakOutcome::Canceled {
                reason: CancellationReason::Stopped,
                ..
            } => {
                info!("Synthesis stopped");
            }
            SpeakOutcome::Canceled {
                reason: CancellationReason::Error,
                error_details,
            } => {
                error!(
                    details = error_details.as_deref().unwrap_or("unknown"),
                    "Synthesis canceled by an engine error"
                );
                if let Err(e) = synthesizer.close().await {
                    warn!(error = %e, "Failed to close faulted synthesizer");
                }
            }
        }

        Ok(())
    }

    /// Toggle microphone capture; the resulting transcript is submitted
    /// automatically.
    pub fn toggle_listening(&self) -> Result<bool, SessionError> {
        if !self.state.read().is_active() {
            warn!("Ignoring listen toggle: session is not active");
            return Err(SessionError::NotActive);
        }
        Ok(self.recognition.toggle_listening()?)
    }

    /// Tear the session down. Best effort: every release failure is
    /// logged and swallowed, and the controller always ends `Idle` with
    /// an empty transcript.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write();
            if !state.can_stop() {
                debug!(state = %*state, "Stop ignored");
                return;
            }
            *state = SessionState::Stopping;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let active = self.active.write().take();
        if let Some(active) = active {
            info!(session_id = %active.id, "Stopping avatar session");
            self.release(active).await;
        }

        self.history.write().clear();
        self.pending_input.write().clear();
        *self.state.write() = SessionState::Idle;
        info!("Session idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use avatar_agent_config::{AvatarSettings, IceServerSettings, VoiceSettings};
    use avatar_agent_core::{BackendError, RecognitionError, SpeechRecognizer};
    use avatar_agent_synthesis::SynthesisError;
    use avatar_agent_transport::{ConnectionState, TransportError};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct MockTransport {
        close_count: Mutex<usize>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                close_count: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl MediaTransport for MockTransport {
        async fn add_bidirectional_media(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn create_offer(&self) -> Result<String, TransportError> {
            Ok("v=0".to_string())
        }

        async fn set_remote_answer(&self, _sdp: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn connection_state(&self) -> ConnectionState {
            ConnectionState::Connected
        }

        async fn close(&self) -> Result<(), TransportError> {
            *self.close_count.lock() += 1;
            Ok(())
        }
    }

    struct MockTransportFactory {
        transport: Arc<MockTransport>,
        fail: bool,
        /// When set, `create_transport` waits here before returning
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl TransportFactory for MockTransportFactory {
        async fn create_transport(
            &self,
            _ice: &IceServerSettings,
            _sink: Arc<PlaybackSink>,
        ) -> Result<Arc<dyn MediaTransport>, TransportError> {
            if self.fail {
                return Err(TransportError::Creation("rejected".to_string()));
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.transport.clone())
        }
    }

    struct MockSynthesizer {
        readiness: Mutex<SynthesizerReadiness>,
        speak_calls: Mutex<Vec<String>>,
        fail_close: bool,
        fail_speak: bool,
    }

    impl MockSynthesizer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                readiness: Mutex::new(SynthesizerReadiness::NotStarted),
                speak_calls: Mutex::new(Vec::new()),
                fail_close: false,
                fail_speak: false,
            })
        }

        fn failing_close() -> Arc<Self> {
            Arc::new(Self {
                readiness: Mutex::new(SynthesizerReadiness::NotStarted),
                speak_calls: Mutex::new(Vec::new()),
                fail_close: true,
                fail_speak: false,
            })
        }

        fn failing_speak() -> Arc<Self> {
            Arc::new(Self {
                readiness: Mutex::new(SynthesizerReadiness::NotStarted),
                speak_calls: Mutex::new(Vec::new()),
                fail_close: false,
                fail_speak: true,
            })
        }
    }

    #[async_trait]
    impl Synthesizer for MockSynthesizer {
        async fn start_avatar(
            &self,
            _transport: Arc<dyn MediaTransport>,
        ) -> Result<(), SynthesisError> {
            *self.readiness.lock() = SynthesizerReadiness::Started;
            Ok(())
        }

        async fn speak(&self, text: &str) -> Result<SpeakOutcome, SynthesisError> {
            if self.fail_speak {
                return Err(SynthesisError::Speak("connection dropped".to_string()));
            }
            self.speak_calls.lock().push(text.to_string());
            Ok(SpeakOutcome::Completed)
        }

        async fn stop_speaking(&self) -> Result<(), SynthesisError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), SynthesisError> {
            *self.readiness.lock() = SynthesizerReadiness::Closed;
            if self.fail_close {
                return Err(SynthesisError::Speak("engine already gone".to_string()));
            }
            Ok(())
        }

        fn readiness(&self) -> SynthesizerReadiness {
            *self.readiness.lock()
        }
    }

    struct MockSynthesizerFactory {
        synthesizer: Arc<MockSynthesizer>,
    }

    impl SynthesizerFactory for MockSynthesizerFactory {
        fn create_synthesizer(
            &self,
            _voice: &VoiceSettings,
            _avatar: &AvatarSettings,
        ) -> Result<Arc<dyn Synthesizer>, SynthesisError> {
            Ok(self.synthesizer.clone())
        }
    }

    struct MockBackend {
        responses: Mutex<VecDeque<Result<serde_json::Value, BackendError>>>,
        calls: Mutex<Vec<Vec<Message>>>,
        /// When set, `send` waits here before responding
        gate: Option<Arc<Notify>>,
    }

    impl MockBackend {
        fn replying(response: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from([Ok(response)])),
                calls: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from([Err(BackendError::Http(
                    "connection refused".to_string(),
                ))])),
                calls: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(response: serde_json::Value, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from([Ok(response)])),
                calls: Mutex::new(Vec::new()),
                gate: Some(gate),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn send(&self, messages: &[Message]) -> Result<serde_json::Value, BackendError> {
            self.calls.lock().push(messages.to_vec());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"response": "fallback"})))
        }
    }

    struct MockRecognizer {
        stopped: Notify,
    }

    #[async_trait]
    impl SpeechRecognizer for MockRecognizer {
        async fn recognize_once(&self) -> Result<String, RecognitionError> {
            self.stopped.notified().await;
            Ok("book a flight".to_string())
        }

        fn stop(&self) {
            self.stopped.notify_one();
        }

        fn language(&self) -> &str {
            "en-US"
        }
    }

    struct Harness {
        controller: Arc<SessionController>,
        transport: Arc<MockTransport>,
        synthesizer: Arc<MockSynthesizer>,
        backend: Arc<MockBackend>,
    }

    fn harness(backend: Arc<MockBackend>) -> Harness {
        harness_with(backend, MockSynthesizer::new(), false, None)
    }

    fn harness_with(
        backend: Arc<MockBackend>,
        synthesizer: Arc<MockSynthesizer>,
        fail_transport: bool,
        transport_gate: Option<Arc<Notify>>,
    ) -> Harness {
        let transport = MockTransport::new();
        let controller = SessionController::with_recognizer_factory(
            Settings::default(),
            Arc::new(MockTransportFactory {
                transport: transport.clone(),
                fail: fail_transport,
                gate: transport_gate,
            }),
            Arc::new(MockSynthesizerFactory {
                synthesizer: synthesizer.clone(),
            }),
            backend.clone(),
            Box::new(|| {
                Ok(Arc::new(MockRecognizer {
                    stopped: Notify::new(),
                }) as Arc<dyn SpeechRecognizer>)
            }),
        );
        Harness {
            controller,
            transport,
            synthesizer,
            backend,
        }
    }

    #[tokio::test]
    async fn test_start_ends_active() {
        let h = harness(MockBackend::replying(json!({"response": "hi"})));
        h.controller.start().await.unwrap();
        assert_eq!(h.controller.state(), SessionState::Active);
        assert!(h.controller.session_id().is_some());
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back_to_idle() {
        let h = harness_with(
            MockBackend::replying(json!({"response": "hi"})),
            MockSynthesizer::new(),
            true,
            None,
        );
        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.session_id().is_none());
    }

    #[tokio::test]
    async fn test_start_while_active_rejected() {
        let h = harness(MockBackend::replying(json!({"response": "hi"})));
        h.controller.start().await.unwrap();
        assert!(matches!(
            h.controller.start().await,
            Err(SessionError::InvalidState(SessionState::Active))
        ));
    }

    #[tokio::test]
    async fn test_submit_when_idle_never_reaches_backend() {
        let h = harness(MockBackend::replying(json!({"response": "hi"})));
        assert!(matches!(
            h.controller.submit("hello").await,
            Err(SessionError::NotActive)
        ));
        assert!(h.backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_submit_appends_entry_and_speaks_reply() {
        let h = harness(MockBackend::replying(json!({"response": "Hi there"})));
        h.controller.start().await.unwrap();
        h.controller.submit("hello").await.unwrap();

        let history = h.controller.history();
        assert_eq!(history, vec![ChatEntry::new("hello", "Hi there")]);
        assert_eq!(*h.synthesizer.speak_calls.lock(), vec!["Hi there"]);

        let calls = h.backend.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].content, "hello");
    }

    #[tokio::test]
    async fn test_non_string_reply_falls_back_without_speaking() {
        let h = harness(MockBackend::replying(json!({"response": 42})));
        h.controller.start().await.unwrap();
        h.controller.submit("x").await.unwrap();

        assert_eq!(
            h.controller.history(),
            vec![ChatEntry::new("x", replies::NOT_UNDERSTOOD)]
        );
        assert!(h.synthesizer.speak_calls.lock().is_empty());
        assert_eq!(h.controller.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_and_stays_active() {
        let h = harness(MockBackend::failing());
        h.controller.start().await.unwrap();
        h.controller.submit("hello").await.unwrap();

        assert_eq!(
            h.controller.history(),
            vec![ChatEntry::new("hello", replies::BACKEND_UNREACHABLE)]
        );
        assert!(h.synthesizer.speak_calls.lock().is_empty());
        assert_eq!(h.controller.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_sensitive_reply_clears_pending_input_but_not_entry() {
        let reply = "Please never share your OTP with anyone.";
        let h = harness(MockBackend::replying(json!({"response": reply})));
        h.controller.start().await.unwrap();
        h.controller.set_pending_input("my otp is 4242");

        h.controller.submit("is this safe?").await.unwrap();

        assert!(h.controller.pending_input().is_empty());
        assert_eq!(
            h.controller.history(),
            vec![ChatEntry::new("is this safe?", reply)]
        );
        assert_eq!(*h.synthesizer.speak_calls.lock(), vec![reply]);
    }

    #[tokio::test]
    async fn test_stop_always_ends_idle_with_empty_history() {
        let h = harness_with(
            MockBackend::replying(json!({"response": "Hi there"})),
            MockSynthesizer::failing_close(),
            false,
            None,
        );
        h.controller.start().await.unwrap();
        h.controller.submit("hello").await.unwrap();
        assert_eq!(h.controller.history().len(), 1);

        h.controller.stop().await;

        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.history().is_empty());
        assert_eq!(*h.transport.close_count.lock(), 1);
    }

    #[tokio::test]
    async fn test_stop_during_start_is_not_undone() {
        let gate = Arc::new(Notify::new());
        let h = harness_with(
            MockBackend::replying(json!({"response": "hi"})),
            MockSynthesizer::new(),
            false,
            Some(gate.clone()),
        );

        let starting = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.start().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.controller.state(), SessionState::Starting);

        h.controller.stop().await;
        assert_eq!(h.controller.state(), SessionState::Idle);

        // Startup finishes after the stop; the session must not come back
        gate.notify_one();
        let result = starting.await.unwrap();
        assert!(matches!(result, Err(SessionError::StoppedWhileStarting)));
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert!(h.controller.session_id().is_none());
        assert_eq!(*h.transport.close_count.lock(), 1);
    }

    #[tokio::test]
    async fn test_speak_error_still_clears_pending_input() {
        let h = harness_with(
            MockBackend::replying(json!({"response": "hi"})),
            MockSynthesizer::failing_speak(),
            false,
            None,
        );
        h.controller.start().await.unwrap();
        h.controller.set_pending_input("draft text");

        let result = h.controller.speak("hello").await;
        assert!(matches!(result, Err(SessionError::Synthesis(_))));
        assert!(h.controller.pending_input().is_empty());
    }

    #[tokio::test]
    async fn test_stop_from_idle_is_inert() {
        let h = harness(MockBackend::replying(json!({"response": "hi"})));
        h.controller.stop().await;
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_overlapping_submit_rejected() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockBackend::gated(json!({"response": "hi"}), gate.clone()));
        h.controller.start().await.unwrap();

        let first = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.submit("first").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            h.controller.submit("second").await,
            Err(SessionError::RequestInFlight)
        ));

        gate.notify_waiters();
        first.await.unwrap().unwrap();
        assert_eq!(h.controller.history().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_response_after_stop_has_no_effect() {
        let gate = Arc::new(Notify::new());
        let h = harness(MockBackend::gated(
            json!({"response": "too late"}),
            gate.clone(),
        ));
        h.controller.start().await.unwrap();

        let pending = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.submit("hello").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.controller.stop().await;
        gate.notify_waiters();
        pending.await.unwrap().unwrap();

        assert!(h.controller.history().is_empty());
        assert!(h.synthesizer.speak_calls.lock().is_empty());
        assert_eq!(h.controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_toggle_twice_submits_one_transcript() {
        let h = harness(MockBackend::replying(json!({"response": "Booking it"})));
        h.controller.start().await.unwrap();

        assert!(h.controller.toggle_listening().unwrap());
        assert!(!h.controller.toggle_listening().unwrap());

        // the transcript travels recognizer -> pump -> submit
        for _ in 0..50 {
            if !h.backend.calls.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let calls = h.backend.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].content, "book a flight");
    }

    #[tokio::test]
    async fn test_toggle_requires_active_session() {
        let h = harness(MockBackend::replying(json!({"response": "hi"})));
        assert!(matches!(
            h.controller.toggle_listening(),
            Err(SessionError::NotActive)
        ));
    }
}
