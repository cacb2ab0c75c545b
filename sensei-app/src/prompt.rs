//! Outbound prompt assembly.
//!
//! The prompt carries the assistant's persona, today's date, what the
//! assistant already knows of the agenda for today and tomorrow, and the JSON
//! instruction that makes calendar intents machine-readable. `today` is a
//! parameter so rendering stays deterministic under test.

use crate::weather::CurrentWeather;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use sensei_calendar::CalendarEvent;

pub fn build_system_prompt(
    assistant_name: &str,
    today: NaiveDate,
    snapshot: &[CalendarEvent],
    weather: Option<&CurrentWeather>,
) -> String {
    let tomorrow = today + Days::new(1);
    let today_line = day_summary(snapshot, today, "aucun événement aujourd'hui");
    let tomorrow_line = day_summary(snapshot, tomorrow, "aucun événement demain");

    let mut prompt = format!(
        "Tu es {assistant_name}, assistant personnel francophone relié à Google Calendar.\n\
         Nous sommes le {}.\n\
         Voici les événements connus :\n\
         • Aujourd'hui : {today_line}\n\
         • Demain : {tomorrow_line}\n",
        french_long_date(today),
    );
    if let Some(w) = weather {
        prompt.push_str(&format!(
            "• Météo actuelle : {:.0}°C, vent {:.0} km/h\n",
            w.temperature, w.windspeed
        ));
    }
    prompt.push_str(
        "\nSi l'utilisateur te demande d'ajouter un événement, \
         tu dois répondre uniquement sous forme JSON à la ligne suivante :\n\
         {\"action\":\"add_event\",\"title\":\"Titre\",\"date\":\"YYYY-MM-DD\",\"time\":\"HH:MM\"}\n\
         Sinon, réponds normalement en texte.",
    );
    prompt
}

/// Joins a day's events into a readable sentence. A day without events renders
/// as the explicit "none" phrase, never an empty string.
fn day_summary(snapshot: &[CalendarEvent], day: NaiveDate, none_phrase: &str) -> String {
    let parts: Vec<String> = snapshot
        .iter()
        .filter(|e| e.date == day)
        .map(|e| match e.time {
            Some(t) => format!("{} → {}", t.format("%H:%M"), e.title),
            None => e.title.clone(),
        })
        .collect();
    if parts.is_empty() {
        none_phrase.to_string()
    } else {
        parts.join("; ")
    }
}

/// "samedi 1 mars 2025". chrono carries no locale tables, so the French names
/// live here.
pub fn french_long_date(d: NaiveDate) -> String {
    let weekday = match d.weekday() {
        Weekday::Mon => "lundi",
        Weekday::Tue => "mardi",
        Weekday::Wed => "mercredi",
        Weekday::Thu => "jeudi",
        Weekday::Fri => "vendredi",
        Weekday::Sat => "samedi",
        Weekday::Sun => "dimanche",
    };
    let month = match d.month() {
        1 => "janvier",
        2 => "février",
        3 => "mars",
        4 => "avril",
        5 => "mai",
        6 => "juin",
        7 => "juillet",
        8 => "août",
        9 => "septembre",
        10 => "octobre",
        11 => "novembre",
        _ => "décembre",
    };
    format!("{weekday} {} {month} {}", d.day(), d.year())
}
