//! Shared application state: transcript, calendar snapshot, lists, pending
//! proposal and the orchestration phase.
//!
//! One controller owns the state; the orchestrator, the proposal engine and
//! the snapshot-refresh routine are the only mutators. Everything lives behind
//! a single `Arc<tokio::sync::Mutex<_>>`, so ordering is whatever the holders
//! enforce explicitly.

use crate::proposal::Proposal;
use chrono::NaiveDate;
use sensei_calendar::CalendarEvent;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended; the transcript is an
/// append-only log and insertion order is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingModel,
    ExecutingAction,
}

/// Training-plan entry derived from an approved proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub day: NaiveDate,
    pub theme: String,
}

pub struct AppState {
    pub session_id: Uuid,
    pub transcript: Vec<Message>,
    /// Locally held copy of upcoming events. Authoritative on last fetch;
    /// only ever replaced wholesale, never merged field-by-field.
    pub snapshot: Vec<CalendarEvent>,
    pub ideas: Vec<String>,
    pub plan: Vec<PlanEntry>,
    pub pending_proposal: Option<Proposal>,
    pub phase: Phase,
}

impl AppState {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            transcript: vec![Message {
                sender: Sender::Assistant,
                text: greeting.into(),
            }],
            snapshot: Vec::new(),
            ideas: Vec::new(),
            plan: Vec::new(),
            pending_proposal: None,
            phase: Phase::Idle,
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(Message {
            sender: Sender::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.transcript.push(Message {
            sender: Sender::Assistant,
            text: text.into(),
        });
    }

    pub fn events_on(&self, day: NaiveDate) -> Vec<&CalendarEvent> {
        self.snapshot.iter().filter(|e| e.date == day).collect()
    }
}
