//! Sensei configuration loader.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct SenseiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_assistant_name() -> String {
    "Senseï".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub openrouter_api_key: Option<String>,
    pub google_calendar_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Prints one recognized utterance on stdout, then exits.
    #[serde(default)]
    pub capture_command: Option<String>,
    /// Reads the text to synthesize on stdin.
    #[serde(default)]
    pub speak_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

// Terrebonne, QC.
fn default_latitude() -> f64 {
    45.7
}

fn default_longitude() -> f64 {
    -73.6
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

impl SenseiConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(default_config_path);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                String::new()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        let mut cfg: SenseiConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?;

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Injectable so override precedence is testable without touching the
    /// process environment.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("SENSEI_MODEL") {
            self.general.model = v;
        }
        if let Some(v) = get("SENSEI_ASSISTANT_NAME") {
            self.general.assistant_name = v;
        }
        if let Some(v) = get("OPENROUTER_API_KEY") {
            self.keys.openrouter_api_key = Some(v);
        }
        if let Some(v) = get("GOOGLE_CALENDAR_TOKEN") {
            self.keys.google_calendar_token = Some(v);
        }
        if let Some(v) = get("SENSEI_CAPTURE_COMMAND") {
            self.speech.capture_command = Some(v);
            self.speech.enabled = true;
        }
        if let Some(v) = get("SENSEI_SPEAK_COMMAND") {
            self.speech.speak_command = Some(v);
            self.speech.enabled = true;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.general.model.trim().is_empty() {
            return Err(anyhow::anyhow!("general.model is required"));
        }
        if self.general.assistant_name.trim().is_empty() {
            return Err(anyhow::anyhow!("general.assistant_name is required"));
        }
        if self.speech.enabled
            && self.speech.capture_command.is_none()
            && self.speech.speak_command.is_none()
        {
            return Err(anyhow::anyhow!(
                "speech.enabled=true requires capture_command and/or speak_command"
            ));
        }
        if self.weather.enabled
            && (!(-90.0..=90.0).contains(&self.weather.latitude)
                || !(-180.0..=180.0).contains(&self.weather.longitude))
        {
            return Err(anyhow::anyhow!(
                "weather.latitude/longitude out of range"
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".sensei").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let mut cfg: SenseiConfig = toml::from_str("").expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.general.assistant_name, "Senseï");
        assert_eq!(cfg.general.model, "gpt-4.1-mini");
        assert!(cfg.keys.openrouter_api_key.is_none());
        assert!(!cfg.speech.enabled);
        assert!(!cfg.weather.enabled);
    }

    #[test]
    fn sections_parse() {
        let cfg: SenseiConfig = toml::from_str(
            r#"
[general]
assistant_name = "Jarvis"
model = "gpt-4.1"

[keys]
openrouter_api_key = "sk-or-xxx"
google_calendar_token = "ya29.xxx"

[speech]
enabled = true
speak_command = "say -f -"

[weather]
enabled = true
latitude = 45.7
longitude = -73.6
"#,
        )
        .expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.general.assistant_name, "Jarvis");
        assert_eq!(cfg.keys.openrouter_api_key.as_deref(), Some("sk-or-xxx"));
        assert!(cfg.speech.enabled);
        assert!(cfg.weather.enabled);
    }

    #[test]
    fn env_overrides_beat_the_file_but_blank_values_do_not() {
        let mut cfg: SenseiConfig = toml::from_str(
            "[general]\nmodel = \"gpt-4.1\"\n\n[keys]\nopenrouter_api_key = \"sk-or-file\"\n",
        )
        .expect("parse");
        cfg.apply_overrides(|key| match key {
            "SENSEI_MODEL" => Some("gpt-5-mini".to_string()),
            "OPENROUTER_API_KEY" => Some("   ".to_string()),
            "SENSEI_SPEAK_COMMAND" => Some("say -f -".to_string()),
            _ => None,
        });
        assert_eq!(cfg.general.model, "gpt-5-mini");
        assert_eq!(cfg.keys.openrouter_api_key.as_deref(), Some("sk-or-file"));
        assert!(cfg.speech.enabled);
        assert_eq!(cfg.speech.speak_command.as_deref(), Some("say -f -"));
    }

    #[test]
    fn speech_enabled_without_commands_is_rejected() {
        let cfg: SenseiConfig = toml::from_str("[speech]\nenabled = true\n").expect("parse");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let cfg: SenseiConfig =
            toml::from_str("[weather]\nenabled = true\nlatitude = 300.0\n").expect("parse");
        assert!(cfg.validate().is_err());
    }
}
