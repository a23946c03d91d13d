//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "reverie".to_string()
}

pub fn default_data_dir() -> String {
    "~/.reverie".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

/// One day.
pub fn default_idle_timeout() -> u64 {
    86_400
}

pub fn default_poll_interval() -> u64 {
    60
}

pub fn default_plugin_root() -> String {
    "/usr/share/reverie/plugins".to_string()
}

pub fn default_plugin_dev_root() -> String {
    "plugins".to_string()
}

pub fn default_model_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

pub fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_context_messages() -> usize {
    20
}

pub fn default_max_invalid_replies() -> u32 {
    3
}

pub fn default_dream_log_secs() -> u64 {
    20
}

pub fn default_matrix_server() -> String {
    "https://matrix.org".to_string()
}

pub fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_web_port() -> u16 {
    5000
}
