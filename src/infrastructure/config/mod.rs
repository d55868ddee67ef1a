use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Voices exposed by the speech endpoint (prefixed: af = American Female,
/// am = American Male, bf = British Female, bm = British Male)
pub const VOICES: [&str; 10] = [
    "af_alloy", "af_nova", "af_bella", "af_sarah", "af_sky", "am_echo", "am_onyx", "am_adam",
    "bm_fable", "bm_george",
];

/// Playback speeds offered by the UI
pub const SPEEDS: [f64; 8] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0, 4.0];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub speech_base_url: String,
    pub speech_api_key: String,
    pub tts_model: String,
    pub default_voice: String,
    pub default_speed: f64,
    pub max_storage_bytes: u64,
    pub initial_chunk_size: usize,
    pub min_chunk_size: usize,
    pub large_input_warning: usize,
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let max_storage_gb: f64 = env::var("MAX_STORAGE_GB")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let config = Config {
            speech_base_url: env::var("SPEECH_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            speech_api_key: env::var("SPEECH_API_KEY").unwrap_or_default(),
            tts_model: env::var("TTS_MODEL").unwrap_or_else(|_| "tts-kokoro".to_string()),
            default_voice: env::var("DEFAULT_VOICE").unwrap_or_else(|_| "af_alloy".to_string()),
            default_speed: env::var("DEFAULT_SPEED")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()?,
            max_storage_bytes: (max_storage_gb * (1u64 << 30) as f64) as u64,
            initial_chunk_size: env::var("INITIAL_CHUNK_SIZE")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()?,
            min_chunk_size: env::var("MIN_CHUNK_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,
            large_input_warning: env::var("LARGE_INPUT_WARNING")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()?,
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "/data".to_string())),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "4040".to_string())
                .parse()?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
        };

        Ok(config)
    }

    /// Directory that holds synthesized audio files
    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    /// Directory that archives uploaded/pasted source documents
    pub fn sources_dir(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    /// Path of the sqlite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docutape.db")
    }

    pub fn is_known_voice(&self, voice: &str) -> bool {
        VOICES.contains(&voice)
    }

    /// Test configuration rooted at a throwaway data directory
    pub fn for_tests(data_dir: &Path) -> Self {
        Config {
            speech_base_url: "http://localhost:4000".to_string(),
            speech_api_key: "test-key".to_string(),
            tts_model: "tts-kokoro".to_string(),
            default_voice: "af_alloy".to_string(),
            default_speed: 1.0,
            max_storage_bytes: 10 * (1u64 << 30),
            initial_chunk_size: 4000,
            min_chunk_size: 500,
            large_input_warning: 100_000,
            data_dir: data_dir.to_path_buf(),
            host: "127.0.0.1".to_string(),
            port: 0,
            log_format: LogFormat::Pretty,
        }
    }
}
