use std::env;
use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;
use url::Url;

use crate::studio::model::AspectRatio;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub logs_dir: PathBuf,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub default_aspect_ratio: AspectRatio,
    pub output_dir: PathBuf,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_first_non_empty(names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn normalize_base_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_GEMINI_BASE_URL.to_string();
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => trimmed.to_string(),
        _ => {
            warn!(
                "Invalid GEMINI_BASE_URL value '{}'; using {}.",
                value, DEFAULT_GEMINI_BASE_URL
            );
            DEFAULT_GEMINI_BASE_URL.to_string()
        }
    }
}

fn normalize_aspect_ratio(value: String) -> AspectRatio {
    match value.trim().parse::<AspectRatio>() {
        Ok(ratio) => ratio,
        Err(_) => {
            warn!(
                "Unknown DEFAULT_ASPECT_RATIO value '{}'; defaulting to 16:9.",
                value
            );
            AspectRatio::Landscape
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            logs_dir: PathBuf::from(env_string("LOGS_DIR", "logs")),
            gemini_api_key: env_first_non_empty(&["GEMINI_API_KEY", "API_KEY"]),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_BASE_URL,
            )),
            gemini_text_model: env_string("GEMINI_TEXT_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            default_aspect_ratio: normalize_aspect_ratio(env_string(
                "DEFAULT_ASPECT_RATIO",
                "16:9",
            )),
            output_dir: PathBuf::from(env_string("OUTPUT_DIR", "renders")),
        })
    }

    /// The process-wide default credential, if one is configured.
    pub fn default_api_key(&self) -> Option<&str> {
        let key = self.gemini_api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_valid_values_without_trailing_slash() {
        let url = normalize_base_url("http://127.0.0.1:8080/v1beta/".to_string());
        assert_eq!(url, "http://127.0.0.1:8080/v1beta");
    }

    #[test]
    fn base_url_falls_back_on_garbage() {
        assert_eq!(
            normalize_base_url("not a url".to_string()),
            DEFAULT_GEMINI_BASE_URL
        );
        assert_eq!(normalize_base_url("  ".to_string()), DEFAULT_GEMINI_BASE_URL);
    }

    #[test]
    fn aspect_ratio_falls_back_to_landscape() {
        assert_eq!(normalize_aspect_ratio("9:16".to_string()), AspectRatio::Portrait);
        assert_eq!(normalize_aspect_ratio("4:3".to_string()), AspectRatio::Landscape);
    }
}
