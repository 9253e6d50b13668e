use std::path::PathBuf;
use voicechat_core::config::AppConfig;

pub const ENV_CONFIG: &str = "VOICECHAT_CONFIG";
pub const ENV_BIND: &str = "VOICECHAT_BIND";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_ASSISTANT_ID: &str = "VOICECHAT_ASSISTANT_ID";
pub const ENV_SERVER_URL: &str = "VOICECHAT_SERVER_URL";
pub const ENV_STATE: &str = "VOICECHAT_STATE";

const DEFAULT_CONFIG_FILE: &str = "voicechat.json";
const DEFAULT_STATE_FILE: &str = "voicechat-state.json";

pub fn default_app_config() -> AppConfig {
    AppConfig::default()
}

pub fn config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    non_empty(env(ENV_CONFIG))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn state_path(cfg: &AppConfig) -> PathBuf {
    cfg.client
        .state_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}

/// Environment wins over the config file. The API key is only ever read from the environment.
pub fn apply_env_overrides(cfg: &mut AppConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = non_empty(env(ENV_BIND)) {
        cfg.server.bind_addr = v;
    }
    if let Some(v) = non_empty(env(ENV_BASE_URL)) {
        cfg.assistant.base_url = v;
    }
    if let Some(v) = non_empty(env(ENV_ASSISTANT_ID)) {
        cfg.assistant.assistant_id = v;
    }
    if let Some(v) = non_empty(env(ENV_SERVER_URL)) {
        cfg.client.server_url = v;
    }
    if let Some(v) = non_empty(env(ENV_STATE)) {
        cfg.client.state_path = Some(v);
    }
    cfg.assistant.api_key_present = non_empty(env(ENV_API_KEY)).is_some();
}

pub fn api_key(env: impl Fn(&str) -> Option<String>) -> Option<String> {
    non_empty(env(ENV_API_KEY))
}

pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
