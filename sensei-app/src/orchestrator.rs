//! Dialogue orchestration: utterance in, model call, reply routing, calendar
//! side effects.
//!
//! Phase machine: `Idle → AwaitingModel → (ExecutingAction | Idle)`. At most
//! one submission is in flight; a submit while not `Idle` is a no-op rather
//! than a queued call, so the transcript cannot interleave. Ordering the
//! orchestrator enforces: the user message is appended before the model call
//! starts, the announcement is appended before the remote write is issued, and
//! the confirmation/failure is appended only after the write settles.

use crate::intent::{self, ModelReply};
use crate::prompt;
use crate::session::Credentials;
use crate::state::{AppState, Phase};
use crate::weather::CurrentWeather;
use anyhow::Result;
use chrono::{Duration, Local, NaiveDate, NaiveTime, Utc};
use sensei_calendar::CalendarGateway;
use sensei_channels::SpeechChannel;
use sensei_llm::{ChatMessage, ModelBackend};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Upcoming-events window used by snapshot refreshes.
const SNAPSHOT_WINDOW_HOURS: i64 = 48;

#[derive(Clone)]
pub struct Orchestrator {
    assistant_name: String,
    backend: Option<Arc<dyn ModelBackend>>,
    gateway: Arc<dyn CalendarGateway>,
    speech: Arc<dyn SpeechChannel>,
    credentials: Credentials,
    weather: Option<CurrentWeather>,
    state: Arc<Mutex<AppState>>,
}

impl Orchestrator {
    pub fn new(
        assistant_name: impl Into<String>,
        backend: Option<Arc<dyn ModelBackend>>,
        gateway: Arc<dyn CalendarGateway>,
        speech: Arc<dyn SpeechChannel>,
        credentials: Credentials,
        weather: Option<CurrentWeather>,
        state: Arc<Mutex<AppState>>,
    ) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            backend,
            gateway,
            speech,
            credentials,
            weather,
            state,
        }
    }

    /// One orchestration cycle for one utterance. Empty input and input while
    /// a cycle is already in flight are no-ops.
    #[tracing::instrument(level = "info", skip_all, fields(utterance_len = utterance.len()))]
    pub async fn submit(&self, utterance: &str) -> Result<()> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            tracing::debug!("empty utterance ignored");
            return Ok(());
        }

        let (backend, messages) = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Idle {
                tracing::debug!(phase = ?state.phase, "submission rejected: cycle in flight");
                return Ok(());
            }
            state.push_user(utterance);

            let Some(backend) = self.backend.clone() else {
                state.push_assistant(
                    "Pas de clé API configurée. Renseigne-la dans la configuration (clé OpenRouter).",
                );
                tracing::warn!("model call skipped: no API key");
                return Ok(());
            };

            state.phase = Phase::AwaitingModel;
            let system = prompt::build_system_prompt(
                &self.assistant_name,
                Local::now().date_naive(),
                &state.snapshot,
                self.weather.as_ref(),
            );
            let messages = vec![ChatMessage::system(system), ChatMessage::user(utterance)];
            (backend, messages)
        };
        let reply = match backend.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "model call failed");
                let mut state = self.state.lock().await;
                state.push_assistant(format!("Le moteur de langage n'a pas répondu : {e}"));
                state.phase = Phase::Idle;
                return Ok(());
            }
        };

        match intent::classify(&reply) {
            ModelReply::FreeText(text) => {
                {
                    let mut state = self.state.lock().await;
                    state.push_assistant(text.clone());
                    state.phase = Phase::Idle;
                }
                self.spawn_speak(text);
            }
            ModelReply::CalendarAction { title, date, time } => {
                self.execute_action(&title, date, time).await;
            }
        }
        Ok(())
    }

    /// Runs the calendar side of a `CalendarAction`. Executed at most once per
    /// model reply; both outcomes end back in `Idle`.
    async fn execute_action(&self, title: &str, date: NaiveDate, time: NaiveTime) {
        {
            let mut state = self.state.lock().await;
            state.push_assistant(format!(
                "Ajout de l'événement « {title} » le {date} à {}…",
                time.format("%H:%M")
            ));
            state.phase = Phase::ExecutingAction;
        }

        let outcome = self
            .gateway
            .create_event(
                self.credentials.calendar_token.as_deref(),
                title,
                date,
                Some(time),
            )
            .await;

        match outcome {
            Ok(()) => {
                tracing::info!(%date, "calendar action executed");
                {
                    let mut state = self.state.lock().await;
                    state.push_assistant("Événement ajouté à ton Google Calendar !");
                    state.phase = Phase::Idle;
                }
                self.spawn_refresh();
                self.spawn_speak("Événement ajouté à ton agenda.".to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "calendar action failed");
                let mut state = self.state.lock().await;
                state.push_assistant(format!("Impossible d'ajouter l'événement : {e}"));
                state.phase = Phase::Idle;
            }
        }
    }

    /// Fire-and-forget snapshot refresh; never blocks the phase machine.
    pub fn spawn_refresh(&self) {
        spawn_snapshot_refresh(
            self.gateway.clone(),
            self.credentials.calendar_token.clone(),
            self.state.clone(),
        );
    }

    pub async fn refresh_snapshot(&self) {
        refresh_snapshot(
            self.gateway.as_ref(),
            self.credentials.calendar_token.as_deref(),
            &self.state,
        )
        .await;
    }

    fn spawn_speak(&self, text: String) {
        let speech = self.speech.clone();
        tokio::spawn(async move {
            if let Err(e) = speech.speak(&text).await {
                tracing::warn!(error = %e, "speech synthesis failed");
            }
        });
    }
}

pub(crate) fn spawn_snapshot_refresh(
    gateway: Arc<dyn CalendarGateway>,
    token: Option<String>,
    state: Arc<Mutex<AppState>>,
) {
    tokio::spawn(async move {
        refresh_snapshot(gateway.as_ref(), token.as_deref(), &state).await;
    });
}

/// Replaces the snapshot wholesale with a fresh remote fetch. Failures are
/// logged and leave the previous snapshot in place.
pub(crate) async fn refresh_snapshot(
    gateway: &dyn CalendarGateway,
    token: Option<&str>,
    state: &Mutex<AppState>,
) {
    let window_start = Utc::now();
    let window_end = window_start + Duration::hours(SNAPSHOT_WINDOW_HOURS);
    match gateway.list_upcoming(token, window_start, window_end).await {
        Ok(events) => {
            tracing::info!(events = events.len(), "calendar snapshot refreshed");
            state.lock().await.snapshot = events;
        }
        Err(e) => {
            tracing::warn!(error = %e, "calendar snapshot refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Message, Sender};
    use chrono::DateTime;
    use sensei_calendar::{CalendarError, CalendarEvent};
    use sensei_channels::NullSpeech;
    use sensei_llm::LlmError;
    use tokio::sync::{Notify, Semaphore};

    struct StubBackend {
        reply: std::result::Result<String, String>,
        observed_transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
        state: Arc<Mutex<AppState>>,
    }

    #[async_trait::async_trait]
    impl ModelBackend for StubBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> sensei_llm::Result<String> {
            let transcript = self.state.lock().await.transcript.clone();
            self.observed_transcripts.lock().await.push(transcript);
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(LlmError::Backend(e.clone())),
            }
        }
    }

    struct GatedBackend {
        entered: Arc<Notify>,
        release: Arc<Semaphore>,
    }

    #[async_trait::async_trait]
    impl ModelBackend for GatedBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> sensei_llm::Result<String> {
            self.entered.notify_one();
            let _permit = self.release.acquire().await.expect("semaphore open");
            Ok("D'accord.".to_string())
        }
    }

    #[derive(Default)]
    struct StubGateway {
        reject_creates: bool,
        creates: Arc<Mutex<Vec<(bool, String, NaiveDate, Option<NaiveTime>)>>>,
        listed: Arc<Mutex<usize>>,
        events: Vec<CalendarEvent>,
    }

    #[async_trait::async_trait]
    impl CalendarGateway for StubGateway {
        async fn list_upcoming(
            &self,
            token: Option<&str>,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
        ) -> sensei_calendar::Result<Vec<CalendarEvent>> {
            if token.is_none() {
                return Err(CalendarError::Unauthenticated);
            }
            *self.listed.lock().await += 1;
            Ok(self.events.clone())
        }

        async fn create_event(
            &self,
            token: Option<&str>,
            title: &str,
            date: NaiveDate,
            time: Option<NaiveTime>,
        ) -> sensei_calendar::Result<()> {
            if token.is_none() {
                return Err(CalendarError::Unauthenticated);
            }
            self.creates
                .lock()
                .await
                .push((token.is_some(), title.to_string(), date, time));
            if self.reject_creates {
                return Err(CalendarError::RemoteRejected("quota".to_string()));
            }
            Ok(())
        }
    }

    fn credentials(calendar: bool) -> Credentials {
        Credentials {
            model_api_key: Some("sk-or-test".to_string()),
            calendar_token: calendar.then(|| "ya29.test".to_string()),
        }
    }

    fn orchestrator(
        backend: Option<Arc<dyn ModelBackend>>,
        gateway: Arc<StubGateway>,
        creds: Credentials,
        state: Arc<Mutex<AppState>>,
    ) -> Orchestrator {
        Orchestrator::new(
            "Senseï",
            backend,
            gateway,
            Arc::new(NullSpeech),
            creds,
            None,
            state,
        )
    }

    fn texts(transcript: &[Message]) -> Vec<(Sender, String)> {
        transcript
            .iter()
            .map(|m| (m.sender, m.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn user_message_lands_before_the_model_call() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(StubBackend {
            reply: Ok("Bonne idée.".to_string()),
            observed_transcripts: observed.clone(),
            state: state.clone(),
        });
        let orch = orchestrator(
            Some(backend),
            Arc::new(StubGateway::default()),
            credentials(true),
            state.clone(),
        );

        orch.submit("organise ma semaine").await.expect("submit");

        let observed = observed.lock().await;
        assert_eq!(observed.len(), 1);
        let at_call = texts(&observed[0]);
        assert_eq!(
            at_call.last().expect("non-empty"),
            &(Sender::User, "organise ma semaine".to_string())
        );

        let state = state.lock().await;
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(
            texts(&state.transcript).last().expect("non-empty"),
            &(Sender::Assistant, "Bonne idée.".to_string())
        );
    }

    #[tokio::test]
    async fn empty_utterance_is_a_no_op() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(StubBackend {
            reply: Ok("jamais".to_string()),
            observed_transcripts: observed.clone(),
            state: state.clone(),
        });
        let orch = orchestrator(
            Some(backend),
            Arc::new(StubGateway::default()),
            credentials(true),
            state.clone(),
        );

        orch.submit("   \n\t ").await.expect("submit");

        assert!(observed.lock().await.is_empty());
        assert_eq!(state.lock().await.transcript.len(), 1);
    }

    #[tokio::test]
    async fn resubmit_while_awaiting_model_is_a_no_op() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Semaphore::new(0));
        let backend = Arc::new(GatedBackend {
            entered: entered.clone(),
            release: release.clone(),
        });
        let orch = orchestrator(
            Some(backend),
            Arc::new(StubGateway::default()),
            credentials(true),
            state.clone(),
        );

        let in_flight = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.submit("première demande").await })
        };
        entered.notified().await;

        orch.submit("deuxième demande").await.expect("submit");
        {
            let state = state.lock().await;
            assert_eq!(state.phase, Phase::AwaitingModel);
            // Greeting + first user message only: the second submit left no trace.
            assert_eq!(state.transcript.len(), 2);
        }

        release.add_permits(1);
        in_flight.await.expect("join").expect("submit");
        let state = state.lock().await;
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.transcript.len(), 3);
    }

    #[tokio::test]
    async fn missing_model_key_short_circuits_with_a_notice() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let orch = orchestrator(
            None,
            Arc::new(StubGateway::default()),
            Credentials::default(),
            state.clone(),
        );

        orch.submit("bonjour").await.expect("submit");

        let state = state.lock().await;
        assert_eq!(state.phase, Phase::Idle);
        let last = texts(&state.transcript);
        let last = last.last().expect("non-empty");
        assert_eq!(last.0, Sender::Assistant);
        assert!(last.1.contains("Pas de clé API"));
    }

    #[tokio::test]
    async fn backend_failure_becomes_a_transcript_message() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(StubBackend {
            reply: Err("timeout".to_string()),
            observed_transcripts: observed,
            state: state.clone(),
        });
        let gateway = Arc::new(StubGateway::default());
        let orch = orchestrator(Some(backend), gateway.clone(), credentials(true), state.clone());

        orch.submit("bonjour").await.expect("submit");

        let state = state.lock().await;
        assert_eq!(state.phase, Phase::Idle);
        let last = texts(&state.transcript);
        let last = last.last().expect("non-empty");
        assert!(last.1.contains("n'a pas répondu"));
        assert!(gateway.creates.try_lock().expect("unlocked").is_empty());
    }

    #[tokio::test]
    async fn calendar_action_announces_then_confirms() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(StubBackend {
            reply: Ok(
                r#"{"action":"add_event","title":"Dentiste","date":"2025-03-01","time":"09:00"}"#
                    .to_string(),
            ),
            observed_transcripts: observed,
            state: state.clone(),
        });
        let gateway = Arc::new(StubGateway::default());
        let orch = orchestrator(Some(backend), gateway.clone(), credentials(true), state.clone());

        orch.submit("ajoute un rendez-vous dentiste").await.expect("submit");

        let creates = gateway.creates.lock().await;
        assert_eq!(creates.len(), 1, "the action executes exactly once");
        assert_eq!(creates[0].1, "Dentiste");
        assert_eq!(creates[0].3, NaiveTime::from_hms_opt(9, 0, 0));

        let state = state.lock().await;
        assert_eq!(state.phase, Phase::Idle);
        let all = texts(&state.transcript);
        assert!(all[2].1.contains("Ajout de l'événement « Dentiste »"));
        assert!(all[3].1.contains("Événement ajouté à ton Google Calendar"));
    }

    #[tokio::test]
    async fn unauthenticated_action_fails_without_touching_the_snapshot() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(StubBackend {
            reply: Ok(
                r#"{"action":"add_event","title":"Rendez-vous","date":"2025-03-02","time":"09:00"}"#
                    .to_string(),
            ),
            observed_transcripts: observed,
            state: state.clone(),
        });
        let gateway = Arc::new(StubGateway::default());
        let orch = orchestrator(Some(backend), gateway.clone(), credentials(false), state.clone());

        orch.submit("ajoute un rendez-vous demain à 9h")
            .await
            .expect("submit");

        let state = state.lock().await;
        assert_eq!(state.phase, Phase::Idle);
        let all = texts(&state.transcript);
        assert!(all[2].1.contains("Ajout de l'événement"));
        assert!(all[3].1.contains("Impossible d'ajouter l'événement"));
        assert!(all[3].1.contains("jeton Google Calendar absent"));
        assert!(state.snapshot.is_empty(), "snapshot must stay untouched");
        assert_eq!(*gateway.listed.try_lock().expect("unlocked"), 0);
    }

    #[tokio::test]
    async fn rejected_create_leaves_a_failure_message_and_no_local_event() {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(StubBackend {
            reply: Ok(
                r#"{"action":"add_event","title":"Dojo","date":"2025-03-03"}"#.to_string(),
            ),
            observed_transcripts: observed,
            state: state.clone(),
        });
        let gateway = Arc::new(StubGateway {
            reject_creates: true,
            ..StubGateway::default()
        });
        let orch = orchestrator(Some(backend), gateway.clone(), credentials(true), state.clone());

        orch.submit("planifie le dojo").await.expect("submit");

        let state = state.lock().await;
        let all = texts(&state.transcript);
        assert!(all.last().expect("non-empty").1.contains("Impossible d'ajouter"));
        assert!(state.snapshot.is_empty());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn refresh_replaces_the_snapshot_wholesale() {
        let stale = CalendarEvent {
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            time: None,
            title: "périmé".to_string(),
        };
        let fresh = CalendarEvent {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0),
            title: "Dentiste".to_string(),
        };
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        state.lock().await.snapshot.push(stale);
        let gateway = Arc::new(StubGateway {
            events: vec![fresh.clone()],
            ..StubGateway::default()
        });
        let orch = orchestrator(None, gateway, credentials(true), state.clone());

        orch.refresh_snapshot().await;

        assert_eq!(state.lock().await.snapshot, vec![fresh]);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_the_previous_snapshot() {
        let stale = CalendarEvent {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: None,
            title: "connu".to_string(),
        };
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        state.lock().await.snapshot.push(stale.clone());
        let orch = orchestrator(
            None,
            Arc::new(StubGateway::default()),
            credentials(false),
            state.clone(),
        );

        orch.refresh_snapshot().await;

        assert_eq!(state.lock().await.snapshot, vec![stale]);
    }
}
