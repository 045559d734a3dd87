use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
    pub uploadthing_token: String,
    pub uploadthing_api_base: String,
    pub allowed_image_hosts: Vec<String>,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_csv_lowercase(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

impl Config {
    /// Loaded once in `main` and threaded through `AppState`; missing API
    /// credentials are reported per-request, not at startup.
    pub fn load() -> Result<Self> {
        let uploadthing_api_base = env_string("UPLOADTHING_API_BASE", "https://api.uploadthing.com");
        url::Url::parse(&uploadthing_api_base)
            .with_context(|| format!("Invalid UPLOADTHING_API_BASE: {uploadthing_api_base}"))?;
        let uploadthing_api_base = uploadthing_api_base.trim_end_matches('/').to_string();

        Ok(Config {
            host: env_string("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8787),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash-exp"),
            gemini_api_base: env_string("GEMINI_API_BASE", crate::llm::gemini::DEFAULT_API_BASE),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 8192),
            gemini_safety_settings: env_string("GEMINI_SAFETY_SETTINGS", "standard").to_lowercase(),
            uploadthing_token: env_string("UPLOADTHING_TOKEN", ""),
            uploadthing_api_base,
            allowed_image_hosts: env_csv_lowercase("ALLOWED_IMAGE_HOSTS", ""),
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "info".to_string(),
            gemini_api_key: "test-key".to_string(),
            gemini_model: "gemini-2.0-flash-exp".to_string(),
            gemini_api_base: crate::llm::gemini::DEFAULT_API_BASE.to_string(),
            gemini_temperature: 0.7,
            gemini_top_k: 40,
            gemini_top_p: 0.95,
            gemini_max_output_tokens: 8192,
            gemini_safety_settings: "standard".to_string(),
            uploadthing_token: "test-token".to_string(),
            uploadthing_api_base: "https://api.uploadthing.com".to_string(),
            allowed_image_hosts: Vec::new(),
        }
    }
}
