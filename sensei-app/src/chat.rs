//! Interactive chat session over stdin/stdout, the one-shot `ask` path and the
//! `doctor` health report.
//!
//! The REPL mixes free-form utterances (forwarded to the orchestrator) with
//! slash commands for the agenda and the proposal workflow. Speech capture
//! runs as a background task cancelled by toggling `/micro` again.

use crate::config::SenseiConfig;
use crate::orchestrator::Orchestrator;
use crate::proposal::{Proposal, ProposalEngine};
use crate::session::Credentials;
use crate::state::{AppState, Sender};
use crate::weather;
use anyhow::Result;
use chrono::Local;
use sensei_calendar::{CalendarGateway, GoogleCalendar};
use sensei_channels::{NullSpeech, ProcessSpeech, SpeechChannel};
use sensei_llm::{LlmClient, ModelBackend};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct App {
    pub orchestrator: Orchestrator,
    pub engine: ProposalEngine,
    speech: Arc<dyn SpeechChannel>,
    state: Arc<Mutex<AppState>>,
    credentials: Credentials,
    assistant_name: String,
}

/// Wires the whole application from a loaded config: credentials, model
/// backend, calendar gateway, speech channel, optional weather enrichment.
pub async fn build(cfg: &SenseiConfig) -> Result<App> {
    let credentials = Credentials::acquire(cfg);

    let backend: Option<Arc<dyn ModelBackend>> = credentials
        .model_api_key
        .as_deref()
        .map(|key| Arc::new(LlmClient::new(key, &cfg.general.model)) as Arc<dyn ModelBackend>);

    let gateway: Arc<dyn CalendarGateway> = Arc::new(GoogleCalendar::new());

    let speech: Arc<dyn SpeechChannel> = if cfg.speech.enabled {
        Arc::new(ProcessSpeech::new(
            cfg.speech.capture_command.as_deref(),
            cfg.speech.speak_command.as_deref(),
        )?)
    } else {
        Arc::new(NullSpeech)
    };

    let current_weather = if cfg.weather.enabled {
        weather::fetch_current(cfg.weather.latitude, cfg.weather.longitude).await
    } else {
        None
    };

    let assistant_name = cfg.general.assistant_name.clone();
    let state = Arc::new(Mutex::new(AppState::new(format!(
        "Bonjour, je suis {assistant_name}. Que veux-tu organiser aujourd'hui ?"
    ))));

    let orchestrator = Orchestrator::new(
        assistant_name.clone(),
        backend,
        gateway.clone(),
        speech.clone(),
        credentials.clone(),
        current_weather,
        state.clone(),
    );
    let engine = ProposalEngine::new(state.clone(), gateway, credentials.calendar_token.clone());

    Ok(App {
        orchestrator,
        engine,
        speech,
        state,
        credentials,
        assistant_name,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatCommand {
    Agenda,
    Proposition,
    Idee(Option<String>),
    Listes,
    Valider,
    Modifier(Option<String>),
    Annuler,
    Micro,
    Aide,
    Quitter,
    Inconnue(String),
}

/// `None` means the line is a plain utterance, not a command.
fn parse_command(line: &str) -> Option<ChatCommand> {
    let line = line.trim();
    if !line.starts_with('/') {
        return None;
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).filter(|r| !r.is_empty());
    Some(match head {
        "/agenda" => ChatCommand::Agenda,
        "/proposition" => ChatCommand::Proposition,
        "/idee" | "/idée" => ChatCommand::Idee(rest.map(str::to_string)),
        "/listes" => ChatCommand::Listes,
        "/valider" => ChatCommand::Valider,
        "/modifier" => ChatCommand::Modifier(rest.map(str::to_string)),
        "/annuler" => ChatCommand::Annuler,
        "/micro" => ChatCommand::Micro,
        "/aide" => ChatCommand::Aide,
        "/quitter" => ChatCommand::Quitter,
        other => ChatCommand::Inconnue(other.to_string()),
    })
}

pub async fn run_chat(cfg: SenseiConfig) -> Result<()> {
    let app = build(&cfg).await?;
    if app.credentials.has_calendar() {
        app.orchestrator.spawn_refresh();
    }

    let mut printed = 0usize;
    flush_transcript(&app, &mut printed).await;
    println!("(/aide pour la liste des commandes)");

    let mut mic: Option<CancellationToken> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("› ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            None => {
                app.orchestrator.submit(&line).await?;
            }
            Some(ChatCommand::Agenda) => {
                if app.credentials.has_calendar() {
                    app.orchestrator.refresh_snapshot().await;
                }
                print_agenda(&app).await;
            }
            Some(ChatCommand::Proposition) => {
                let proposal = Proposal::training_cycle(Local::now().date_naive());
                print_proposal(&proposal);
                app.engine.open(proposal).await;
                speak_in_background(&app, "Proposition d'entraînement prête.");
            }
            Some(ChatCommand::Idee(text)) => {
                let title = text.unwrap_or_else(|| "Idée: série de vidéos Karaté".to_string());
                let proposal = Proposal::idea(title);
                print_proposal(&proposal);
                app.engine.open(proposal).await;
            }
            Some(ChatCommand::Listes) => {
                print_lists(&app).await;
            }
            Some(ChatCommand::Valider) => {
                if app.engine.approve(Local::now().date_naive()).await {
                    println!("Proposition validée ✅");
                } else {
                    println!("Aucune proposition en attente.");
                }
            }
            Some(ChatCommand::Modifier(text)) => {
                let applied = match text {
                    Some(title) => app.engine.edit(move |_| title).await,
                    None => app.engine.edit(|t| format!("{t} (modifié)")).await,
                };
                if applied {
                    let pending = app.engine.pending().await.expect("edited proposal pending");
                    println!("Proposition modifiée ✏️  {}", pending.title);
                } else {
                    println!("Aucune proposition en attente.");
                }
            }
            Some(ChatCommand::Annuler) => {
                app.engine.discard().await;
                println!("Proposition annulée.");
            }
            Some(ChatCommand::Micro) => {
                toggle_microphone(&app, &mut mic);
            }
            Some(ChatCommand::Aide) => {
                print_help();
            }
            Some(ChatCommand::Quitter) => {
                break;
            }
            Some(ChatCommand::Inconnue(cmd)) => {
                println!("Commande inconnue : {cmd} (essaie /aide)");
            }
        }

        flush_transcript(&app, &mut printed).await;
    }

    if let Some(token) = mic.take() {
        token.cancel();
    }
    Ok(())
}

/// One utterance, full cycle, assistant replies on stdout. Used by `ask`.
pub async fn run_ask(cfg: SenseiConfig, utterance: &str) -> Result<()> {
    let app = build(&cfg).await?;
    if app.credentials.has_calendar() {
        app.orchestrator.refresh_snapshot().await;
    }

    let before = app.state.lock().await.transcript.len();
    app.orchestrator.submit(utterance).await?;

    let state = app.state.lock().await;
    for message in &state.transcript[before..] {
        if message.sender == Sender::Assistant {
            println!("{}", message.text);
        }
    }
    Ok(())
}

/// Capability report: which backends are configured and whether the calendar
/// actually answers.
pub async fn doctor(cfg: SenseiConfig) -> Result<()> {
    let app = build(&cfg).await?;
    println!("assistant : {}", app.assistant_name);
    println!("modèle    : {}", cfg.general.model);
    println!(
        "clé API   : {}",
        if app.credentials.has_model() { "présente" } else { "absente" }
    );
    println!(
        "micro     : {}",
        if app.speech.supports_capture() { "configuré" } else { "non configuré" }
    );
    println!(
        "synthèse  : {}",
        if app.speech.supports_synthesis() { "configurée" } else { "non configurée" }
    );
    println!(
        "météo     : {}",
        if cfg.weather.enabled { "activée" } else { "désactivée" }
    );

    if app.credentials.has_calendar() {
        app.orchestrator.refresh_snapshot().await;
        let state = app.state.lock().await;
        println!("agenda    : joignable ({} événement(s) sous 48h)", state.snapshot.len());
    } else {
        println!("agenda    : jeton absent");
    }
    Ok(())
}

async fn flush_transcript(app: &App, printed: &mut usize) {
    let state = app.state.lock().await;
    for message in &state.transcript[*printed..] {
        match message.sender {
            Sender::User => println!("toi › {}", message.text),
            Sender::Assistant => println!("{} › {}", app.assistant_name, message.text),
        }
    }
    *printed = state.transcript.len();
}

async fn print_agenda(app: &App) {
    let state = app.state.lock().await;
    if state.snapshot.is_empty() {
        println!("Aucun événement à venir.");
        return;
    }
    for event in &state.snapshot {
        let time = event.time_label();
        if time.is_empty() {
            println!("  {} — {}", event.date, event.title);
        } else {
            println!("  {} {time} — {}", event.date, event.title);
        }
    }
}

fn print_proposal(proposal: &Proposal) {
    println!("Proposition : {}", proposal.title);
    for item in &proposal.items {
        println!("  • {item}");
    }
    if let Some(slot) = &proposal.calendar {
        println!("  Agenda : {} à {} — {}", slot.date, slot.time.format("%H:%M"), slot.title);
    }
    if let Some(notes) = &proposal.notes {
        println!("  Notes : {notes}");
    }
    println!("(/valider, /modifier [titre], /annuler)");
}

async fn print_lists(app: &App) {
    let state = app.state.lock().await;
    println!("💡 Idées ({})", state.ideas.len());
    for idea in &state.ideas {
        println!("  • {idea}");
    }
    println!("🥋 Plan ({})", state.plan.len());
    for entry in &state.plan {
        println!("  • {} – {}", entry.day, entry.theme);
    }
}

fn toggle_microphone(app: &App, mic: &mut Option<CancellationToken>) {
    if let Some(token) = mic.take() {
        token.cancel();
        println!("Micro coupé.");
        return;
    }
    if !app.speech.supports_capture() {
        println!("Aucune commande de capture configurée.");
        return;
    }

    let token = CancellationToken::new();
    let child = token.clone();
    let speech = app.speech.clone();
    let orchestrator = app.orchestrator.clone();
    tokio::spawn(async move {
        match speech.capture(&child).await {
            Ok(Some(text)) => {
                println!("(micro) {text}");
                if let Err(e) = orchestrator.submit(&text).await {
                    tracing::warn!(error = %e, "captured utterance failed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "speech capture failed"),
        }
    });
    *mic = Some(token);
    println!("Micro ouvert… (/micro pour couper)");
}

fn speak_in_background(app: &App, text: &str) {
    let speech = app.speech.clone();
    let text = text.to_string();
    tokio::spawn(async move {
        if let Err(e) = speech.speak(&text).await {
            tracing::warn!(error = %e, "speech synthesis failed");
        }
    });
}

fn print_help() {
    println!("/agenda               rafraîchit et affiche les événements à venir");
    println!("/proposition          ouvre la proposition d'entraînement");
    println!("/idee [texte]         ouvre une proposition d'idée");
    println!("/listes               affiche les idées et le plan d'entraînement");
    println!("/valider              applique la proposition en attente");
    println!("/modifier [titre]     renomme la proposition (sans titre : suffixe « (modifié) »)");
    println!("/annuler              abandonne la proposition en attente");
    println!("/micro                ouvre ou coupe la capture vocale");
    println!("/quitter              quitte la session");
}
