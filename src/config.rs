use clap::{Args, Parser, Subcommand};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::hf_engine::HfConfig;

pub const DEFAULT_MODEL_ID: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the relay in front of the inference endpoint
    Serve(ServeConfig),
    /// Interactive analysis console with session history
    Console(ConsoleConfig),
    /// Analyze a single text and exit
    Analyze(AnalyzeConfig),
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Access token for the inference endpoint
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<ApiToken>,

    /// Model ID on the hosted inference router
    #[arg(long, env = "MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Base URL of the hosted inference router
    #[arg(
        long,
        env = "HF_INFERENCE_URL",
        default_value = "https://router.huggingface.co/hf-inference/models"
    )]
    pub inference_url: String,

    /// Deadline for a single inference call, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "25000")]
    pub request_timeout_ms: u64,

    /// Requests allowed per client per minute
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value = "30")]
    pub rate_limit_per_minute: u32,

    /// Origins allowed to call the relay, comma separated
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000,http://localhost:5000,http://127.0.0.1:5000,http://localhost:5500,http://127.0.0.1:5500"
    )]
    pub allowed_origins: Vec<String>,

    /// Return sanitized `{label, score}` records instead of the raw payload
    #[arg(long, env = "NORMALIZE_RESPONSE")]
    pub normalize_response: bool,
}

impl ServeConfig {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn hf_config(&self) -> HfConfig {
        HfConfig {
            inference_url: self.inference_url.clone(),
            model_id: self.model_id.clone(),
            token: self.hf_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RelayTarget {
    /// Base URL of a running relay
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:8080")]
    pub relay_url: String,
}

#[derive(Debug, Clone, Args)]
pub struct ConsoleConfig {
    #[command(flatten)]
    pub relay: RelayTarget,

    /// Speech-to-text command; its first non-empty output line is used as dictated text
    #[arg(long, env = "TRANSCRIBE_CMD")]
    pub transcribe_cmd: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeConfig {
    #[command(flatten)]
    pub relay: RelayTarget,

    /// Display name recorded with the analysis
    #[arg(long)]
    pub name: String,

    /// Text to analyze
    #[arg(long)]
    pub text: String,
}

/// Credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApiToken {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("moodrelay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_serve_defaults() {
        let Command::Serve(config) = parse(&["serve", "--hf-token", "abc"]).command else {
            panic!("expected serve");
        };

        assert_eq!(config.server_address(), "127.0.0.1:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(25));
        assert_eq!(config.rate_limit_per_minute, 30);
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.allowed_origins.len(), 6);
        assert!(!config.normalize_response);
    }

    #[test]
    fn test_origins_split_on_comma() {
        let Command::Serve(config) = parse(&[
            "serve",
            "--allowed-origins",
            "http://a.test,http://b.test",
        ])
        .command
        else {
            panic!("expected serve");
        };
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_token_is_redacted() {
        let token: ApiToken = "hf_supersecret".parse().unwrap();
        assert_eq!(format!("{token:?}"), "ApiToken(***)");
        assert_eq!(token.expose(), "hf_supersecret");
    }

    #[test]
    fn test_analyze_args() {
        let Command::Analyze(config) =
            parse(&["analyze", "--name", "Ada", "--text", "lovely"]).command
        else {
            panic!("expected analyze");
        };
        assert_eq!(config.name, "Ada");
        assert_eq!(config.relay.relay_url, "http://127.0.0.1:8080");
    }
}
