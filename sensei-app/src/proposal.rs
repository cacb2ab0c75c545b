//! Pending-proposal lifecycle: open, edit, approve, discard.
//!
//! A proposal is a reviewable suggestion (training plan or idea) held outside
//! the dialogue loop. At most one is pending; opening a new one overwrites the
//! previous. Approval applies it to the local lists and, when it carries a
//! calendar slot and a calendar capability exists, writes it to the remote
//! calendar with a local-first optimistic snapshot append, reconciled on the
//! next explicit refresh.

use crate::orchestrator::spawn_snapshot_refresh;
use crate::state::{AppState, PlanEntry};
use chrono::{NaiveDate, NaiveTime};
use sensei_calendar::{CalendarEvent, CalendarGateway};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    Plan,
    Idea,
}

/// Calendar slot attached to a proposal. Unlike the orchestrator path the time
/// is always known here, proposals are built locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub kind: ProposalKind,
    pub title: String,
    pub items: Vec<String>,
    pub calendar: Option<ProposedSlot>,
    pub notes: Option<String>,
}

impl Proposal {
    /// Built-in karate training-cycle seed, scheduled the same day at 19:00.
    pub fn training_cycle(today: NaiveDate) -> Self {
        Self {
            kind: ProposalKind::Plan,
            title: "Cycle Kicks & Cardio (45 min)".to_string(),
            items: vec![
                "Échauffement (10min): corde + mobilité hanches".to_string(),
                "Technique (15min): Mae Geri / Yoko Geri – 5 x 10 reps par jambe".to_string(),
                "Puissance (10min): enchaînements 1-2-3 coups, chrono 30/30".to_string(),
                "Finisher (10min): Tabata squats + burpees".to_string(),
            ],
            calendar: Some(ProposedSlot {
                date: today,
                time: NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"),
                title: "Entraînement Karaté – Kicks".to_string(),
            }),
            notes: Some("Objectif: précision + explosivité; RPE 7-8.".to_string()),
        }
    }

    pub fn idea(title: impl Into<String>) -> Self {
        Self {
            kind: ProposalKind::Idea,
            title: title.into(),
            items: Vec::new(),
            calendar: None,
            notes: None,
        }
    }
}

pub struct ProposalEngine {
    state: Arc<Mutex<AppState>>,
    gateway: Arc<dyn CalendarGateway>,
    calendar_token: Option<String>,
}

impl ProposalEngine {
    pub fn new(
        state: Arc<Mutex<AppState>>,
        gateway: Arc<dyn CalendarGateway>,
        calendar_token: Option<String>,
    ) -> Self {
        Self {
            state,
            gateway,
            calendar_token,
        }
    }

    /// Replaces any pending proposal. No side effects beyond holding state.
    pub async fn open(&self, proposal: Proposal) {
        tracing::info!(kind = ?proposal.kind, title = %proposal.title, "proposal opened");
        self.state.lock().await.pending_proposal = Some(proposal);
    }

    pub async fn pending(&self) -> Option<Proposal> {
        self.state.lock().await.pending_proposal.clone()
    }

    /// Rewrites the pending proposal's title. Returns false when nothing is
    /// pending; the proposal stays pending either way.
    pub async fn edit(&self, transform: impl FnOnce(String) -> String) -> bool {
        let mut state = self.state.lock().await;
        let Some(proposal) = state.pending_proposal.as_mut() else {
            return false;
        };
        proposal.title = transform(std::mem::take(&mut proposal.title));
        true
    }

    /// Clears the pending proposal. Safe to call with nothing pending.
    pub async fn discard(&self) {
        self.state.lock().await.pending_proposal = None;
    }

    /// Applies the pending proposal and clears it unconditionally. Plan
    /// proposals land in the plan list (day taken from the slot, or `today`
    /// when there is none), ideas in the idea list. With both a slot and a
    /// calendar capability the event is written remotely; the local snapshot
    /// gets the entry either way once the write settles. Returns false when
    /// nothing was pending.
    pub async fn approve(&self, today: NaiveDate) -> bool {
        let proposal = {
            let mut state = self.state.lock().await;
            let Some(proposal) = state.pending_proposal.take() else {
                return false;
            };
            match proposal.kind {
                ProposalKind::Plan => {
                    let day = proposal.calendar.as_ref().map(|s| s.date).unwrap_or(today);
                    state.plan.push(PlanEntry {
                        day,
                        theme: proposal.title.clone(),
                    });
                }
                ProposalKind::Idea => state.ideas.push(proposal.title.clone()),
            }
            proposal
        };

        let (Some(slot), Some(token)) = (&proposal.calendar, self.calendar_token.as_deref())
        else {
            return true;
        };

        let outcome = self
            .gateway
            .create_event(Some(token), &slot.title, slot.date, Some(slot.time))
            .await;
        match &outcome {
            Ok(()) => tracing::info!(date = %slot.date, "proposal event created"),
            Err(e) => tracing::warn!(error = %e, "proposal event creation failed"),
        }

        self.state.lock().await.snapshot.push(CalendarEvent {
            date: slot.date,
            time: Some(slot.time),
            title: slot.title.clone(),
        });
        if outcome.is_ok() {
            spawn_snapshot_refresh(
                self.gateway.clone(),
                self.calendar_token.clone(),
                self.state.clone(),
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use sensei_calendar::CalendarError;

    #[derive(Default)]
    struct RecordingGateway {
        fail_creates: bool,
        creates: Arc<Mutex<Vec<(String, NaiveDate, Option<NaiveTime>)>>>,
    }

    #[async_trait::async_trait]
    impl CalendarGateway for RecordingGateway {
        async fn list_upcoming(
            &self,
            _token: Option<&str>,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
        ) -> sensei_calendar::Result<Vec<CalendarEvent>> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            _token: Option<&str>,
            title: &str,
            date: NaiveDate,
            time: Option<NaiveTime>,
        ) -> sensei_calendar::Result<()> {
            self.creates
                .lock()
                .await
                .push((title.to_string(), date, time));
            if self.fail_creates {
                return Err(CalendarError::RemoteRejected("quota".to_string()));
            }
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn engine(
        gateway: Arc<RecordingGateway>,
        token: Option<&str>,
    ) -> (ProposalEngine, Arc<Mutex<AppState>>) {
        let state = Arc::new(Mutex::new(AppState::new("salut")));
        let engine = ProposalEngine::new(state.clone(), gateway, token.map(str::to_string));
        (engine, state)
    }

    #[tokio::test]
    async fn open_replaces_the_pending_proposal() {
        let (engine, _) = engine(Arc::new(RecordingGateway::default()), None);
        engine.open(Proposal::training_cycle(today())).await;
        engine.open(Proposal::idea("Idée: série de vidéos Karaté")).await;
        let pending = engine.pending().await.expect("pending");
        assert_eq!(pending.kind, ProposalKind::Idea);
        assert_eq!(pending.title, "Idée: série de vidéos Karaté");
    }

    #[tokio::test]
    async fn edit_rewrites_the_title_and_stays_pending() {
        let (engine, _) = engine(Arc::new(RecordingGateway::default()), None);
        engine.open(Proposal::training_cycle(today())).await;
        assert!(engine.edit(|t| format!("{t} (modifié)")).await);
        let pending = engine.pending().await.expect("still pending");
        assert_eq!(pending.title, "Cycle Kicks & Cardio (45 min) (modifié)");
    }

    #[tokio::test]
    async fn edit_without_pending_is_a_no_op() {
        let (engine, _) = engine(Arc::new(RecordingGateway::default()), None);
        assert!(!engine.edit(|t| t).await);
    }

    #[tokio::test]
    async fn discard_twice_is_idempotent() {
        let (engine, _) = engine(Arc::new(RecordingGateway::default()), None);
        engine.open(Proposal::training_cycle(today())).await;
        engine.discard().await;
        assert!(engine.pending().await.is_none());
        engine.discard().await;
        assert!(engine.pending().await.is_none());
    }

    #[tokio::test]
    async fn plan_without_slot_never_touches_the_gateway() {
        let gateway = Arc::new(RecordingGateway::default());
        let (engine, state) = engine(gateway.clone(), Some("ya29.test"));
        let mut proposal = Proposal::training_cycle(today());
        proposal.calendar = None;
        engine.open(proposal).await;

        assert!(engine.approve(today()).await);

        assert!(gateway.creates.lock().await.is_empty());
        let state = state.lock().await;
        assert_eq!(state.plan.len(), 1);
        assert_eq!(state.plan[0].day, today());
        assert!(state.snapshot.is_empty());
        assert!(state.pending_proposal.is_none());
    }

    #[tokio::test]
    async fn slot_without_capability_skips_the_remote_write() {
        let gateway = Arc::new(RecordingGateway::default());
        let (engine, state) = engine(gateway.clone(), None);
        engine.open(Proposal::training_cycle(today())).await;

        assert!(engine.approve(today()).await);

        assert!(gateway.creates.lock().await.is_empty());
        let state = state.lock().await;
        assert_eq!(state.plan.len(), 1);
        assert!(state.snapshot.is_empty());
    }

    #[tokio::test]
    async fn approved_slot_is_appended_optimistically_even_on_failure() {
        let gateway = Arc::new(RecordingGateway {
            fail_creates: true,
            ..RecordingGateway::default()
        });
        let (engine, state) = engine(gateway.clone(), Some("ya29.test"));
        engine.open(Proposal::training_cycle(today())).await;

        assert!(engine.approve(today()).await);

        assert_eq!(gateway.creates.lock().await.len(), 1);
        let state = state.lock().await;
        assert_eq!(state.snapshot.len(), 1);
        assert_eq!(state.snapshot[0].title, "Entraînement Karaté – Kicks");
        assert_eq!(state.snapshot[0].time, NaiveTime::from_hms_opt(19, 0, 0));
    }

    #[tokio::test]
    async fn approving_an_idea_lands_in_the_idea_list() {
        let (engine, state) = engine(Arc::new(RecordingGateway::default()), None);
        engine.open(Proposal::idea("Idée: série de vidéos Karaté")).await;

        assert!(engine.approve(today()).await);
        assert!(!engine.approve(today()).await, "nothing pending afterwards");

        let state = state.lock().await;
        assert_eq!(state.ideas, vec!["Idée: série de vidéos Karaté".to_string()]);
        assert!(state.plan.is_empty());
    }
}
