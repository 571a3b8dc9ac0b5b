use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root holding `briefs/` and `hallucinations/`.
    pub data_dir: PathBuf,
    pub sqlite_path: String,
    pub default_brief: String,
    pub default_swap_count: usize,
    pub fabrication_minutes: i64,
    pub verification_minutes: i64,
    /// Fixed seed for the balanced selector; thread rng when unset.
    pub select_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "game.db".to_string()),
            default_brief: std::env::var("DEFAULT_BRIEF").unwrap_or_else(|_| "brief_rosario".to_string()),
            default_swap_count: std::env::var("DEFAULT_SWAP_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(6),
            fabrication_minutes: std::env::var("FABRICATION_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(20),
            verification_minutes: std::env::var("VERIFICATION_MINUTES").ok().and_then(|v| v.parse().ok()).unwrap_or(15),
            select_seed: std::env::var("SELECT_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }
}
