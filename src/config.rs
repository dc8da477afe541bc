use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// Unset means the in-memory store; meant for local runs only.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub public_rps: u32,
    pub teacher_rps: u32,
    pub max_draft_questions: usize,
    pub max_draft_images: usize,
    pub generation_cooldown_seconds: u64,
    pub submission_grace_seconds: i64,
    pub clamp_duration_to_window: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            jwt_secret: get_env("JWT_SECRET")?,
            openai_api_key: get_env("OPENAI_API_KEY")?,
            openai_base_url: get_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1".to_string())?,
            openai_model: get_env_or("OPENAI_MODEL", "gpt-4o".to_string())?,
            public_rps: get_env_or("PUBLIC_RPS", 50)?,
            teacher_rps: get_env_or("TEACHER_RPS", 20)?,
            max_draft_questions: get_env_or("MAX_DRAFT_QUESTIONS", 20)?,
            max_draft_images: get_env_or("MAX_DRAFT_IMAGES", 4)?,
            generation_cooldown_seconds: get_env_or("GENERATION_COOLDOWN_SECONDS", 60)?,
            submission_grace_seconds: get_env_or("SUBMISSION_GRACE_SECONDS", 300)?,
            clamp_duration_to_window: get_env_or("CLAMP_DURATION_TO_WINDOW", false)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(_) => get_env_parse(name),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}
