use log::warn;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Simple,
    Professional,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseSettingError {
    message: String,
}

impl fmt::Display for ParseSettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseSettingError {}

impl FromStr for Language {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "hi" => Ok(Language::Hi),
            _ =>
                Err(ParseSettingError {
                    message: format!("Invalid language: '{}' (expected en or hi)", s),
                }),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(ResponseMode::Simple),
            "professional" => Ok(ResponseMode::Professional),
            _ =>
                Err(ParseSettingError {
                    message: format!("Invalid mode: '{}' (expected simple or professional)", s),
                }),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::En => write!(f, "en"),
            Language::Hi => write!(f, "hi"),
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Simple => write!(f, "simple"),
            ResponseMode::Professional => write!(f, "professional"),
        }
    }
}

/// Conversation display settings.
///
/// Keys that are not recognized are carried in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub language: Language,
    pub mode: ResponseMode,
    pub theme: Theme,
    pub text_size: TextSize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    /// Shallow-merges `partial` into a copy of the current settings.
    pub fn update(&self, partial: &Map<String, Value>) -> Settings {
        let mut next = self.clone();
        for (key, value) in partial {
            match key.as_str() {
                "language" => assign(&mut next.language, key, value),
                "mode" => assign(&mut next.mode, key, value),
                "theme" => assign(&mut next.theme, key, value),
                "textSize" => assign(&mut next.text_size, key, value),
                _ => {
                    next.extra.insert(key.clone(), value.clone());
                }
            }
        }
        next
    }
}

fn assign<T: for<'de> Deserialize<'de>>(slot: &mut T, key: &str, value: &Value) {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => {
            *slot = parsed;
        }
        Err(_) => warn!("Ignoring unsupported value {} for setting '{}'", value, key),
    }
}
