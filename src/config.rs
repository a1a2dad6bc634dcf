//! Runtime settings. The API key is resolved once at startup and handed to
//! the Gemini client; a missing or placeholder key disables model calls but
//! never the server itself.

use std::path::{Path, PathBuf};

use tracing::{error, info};

/// Environment variable consulted first (populated from `.env` by the
/// binary before settings are loaded).
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const KEY_PLACEHOLDER: &str = "YOUR_GOOGLE_API_KEY_HERE";

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub api_key: Option<String>,
}

impl Settings {
    /// Resolve the API key: environment first, then a key file. With an
    /// explicit path only that file is tried; otherwise `./key` and the
    /// user config directory are searched.
    pub fn load(key_file: Option<&Path>) -> Self {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .and_then(validate_key)
            .or_else(|| {
                key_file_candidates(key_file)
                    .iter()
                    .find_map(|path| read_key_file(path))
            });

        match &api_key {
            Some(_) => info!("Gemini API configured successfully."),
            None => error!(
                "API key is missing or is a placeholder; model calls are disabled. \
                 Set {API_KEY_ENV} or provide a key file."
            ),
        }

        Settings { api_key }
    }
}

fn key_file_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut candidates = vec![PathBuf::from("key")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("page-copilot").join("key"));
    }
    candidates
}

fn read_key_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().and_then(validate_key)
}

fn validate_key(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(KEY_PLACEHOLDER) {
        return None;
    }
    Some(trimmed.to_string())
}
