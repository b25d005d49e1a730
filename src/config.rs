use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// LexMedica CLI Client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the LexMedica API
    #[arg(short = 'u', long, env = "LEXMEDICA_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Path to the credentials database
    #[arg(short = 'c', long, env = "LEXMEDICA_CREDENTIALS_FILE")]
    pub credentials_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "120")]
    pub request_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the LexMedica API, normalized without a trailing slash
    pub api_base_url: String,

    /// Where the credential key/value store lives on disk
    pub credentials_file: PathBuf,

    // Timeouts
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Parse CLI arguments
        let args = CliArgs::parse();

        Self::from_args(args)
    }

    fn from_args(args: CliArgs) -> Result<Self> {
        let credentials_file = args
            .credentials_file
            .map(|s| expand_tilde(&s))
            .or_else(default_credentials_file)
            .context("Could not determine a credentials file path (set LEXMEDICA_CREDENTIALS_FILE)")?;

        Ok(Config {
            api_base_url: normalize_base_url(&args.api_url),
            credentials_file,
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.request_timeout,
            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("API base URL must be http or https: {}", self.api_base_url);
        }

        Ok(())
    }
}

/// Default credentials location under the user's home directory
fn default_credentials_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lexmedica/credentials.sqlite3"))
}

/// Strip trailing slashes so endpoint paths can be joined with a plain format
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_relative_path() {
        let path = expand_tilde("relative/path");
        assert_eq!(path, PathBuf::from("relative/path"));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://api.local/"), "http://api.local");
        assert_eq!(normalize_base_url("http://api.local///"), "http://api.local");
        assert_eq!(normalize_base_url("http://api.local"), "http://api.local");
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = Config {
            api_base_url: "not a url".to_string(),
            credentials_file: PathBuf::from("/tmp/creds.sqlite3"),
            http_connect_timeout: 10,
            http_request_timeout: 120,
            log_level: "info".to_string(),
        };
        assert!(config.validate().is_err());

        let config = Config {
            api_base_url: "ftp://api.local".to_string(),
            ..config
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_http_urls() {
        let config = Config {
            api_base_url: "https://api.lexmedica.example".to_string(),
            credentials_file: PathBuf::from("/tmp/creds.sqlite3"),
            http_connect_timeout: 10,
            http_request_timeout: 120,
            log_level: "info".to_string(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_args_normalizes_url() {
        let args = CliArgs {
            api_url: "http://localhost:8000/".to_string(),
            credentials_file: Some("/tmp/creds.sqlite3".to_string()),
            log_level: "debug".to_string(),
            connect_timeout: 5,
            request_timeout: 60,
        };
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.credentials_file, PathBuf::from("/tmp/creds.sqlite3"));
        assert_eq!(config.log_level, "debug");
    }
}
