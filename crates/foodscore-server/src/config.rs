use std::env;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    /// 0 disables the request timeout.
    pub timeout_ms: u64,
    pub max_body_bytes: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            timeout_ms: 0,
            max_body_bytes: 64 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Unparsable values are ignored and the default kept.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = get("FOODSCORE_BIND") {
            if !v.trim().is_empty() {
                cfg.bind = v;
            }
        }
        if let Some(v) = get("FOODSCORE_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.timeout_ms = n;
            }
        }
        if let Some(v) = get("FOODSCORE_MAX_BODY_BYTES") {
            if let Ok(n) = v.parse() {
                cfg.max_body_bytes = n;
            }
        }
        if let Some(v) = get("FOODSCORE_LOG") {
            cfg.log_level = v;
        }
        cfg
    }
}
