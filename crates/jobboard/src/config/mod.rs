use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub public_url: String,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub billing: BillingConfig,
    pub admin: AdminConfig,
    pub workflow: WorkflowConfig,
    pub email: EmailConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let public_url = env::var("APP_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        if !(public_url.starts_with("http://") || public_url.starts_with("https://")) {
            return Err(ConfigError::InvalidPublicUrl(public_url));
        }

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::from_str(&raw),
            Err(_) if environment.is_production() => LogFormat::Json,
            Err(_) => LogFormat::Compact,
        };

        let webhook_secret = non_empty_var("PAYMENTS_WEBHOOK_SECRET");
        if environment.is_production() && webhook_secret.is_none() {
            return Err(ConfigError::MissingVar("PAYMENTS_WEBHOOK_SECRET"));
        }

        let admin = AdminConfig {
            emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
        };

        let workflow = WorkflowConfig {
            expiration_in_dev: flag_var("ENABLE_JOB_EXPIRATION_IN_DEV"),
            poll_interval: Duration::from_millis(parse_var(
                "WORKFLOW_POLL_INTERVAL_MS",
                1_000,
                ConfigError::InvalidNumber("WORKFLOW_POLL_INTERVAL_MS"),
            )?),
            max_attempts: parse_var(
                "WORKFLOW_MAX_ATTEMPTS",
                5,
                ConfigError::InvalidNumber("WORKFLOW_MAX_ATTEMPTS"),
            )?,
        };

        let email = EmailConfig {
            from_address: non_empty_var("EMAIL_FROM")
                .unwrap_or_else(|| "JobBoard <onboarding@jobboard.dev>".to_string()),
        };

        let rate_limit = RateLimitConfig {
            max_requests: parse_var(
                "RATE_LIMIT_MAX_REQUESTS",
                30,
                ConfigError::InvalidNumber("RATE_LIMIT_MAX_REQUESTS"),
            )?,
            window: Duration::from_secs(parse_var(
                "RATE_LIMIT_WINDOW_SECS",
                60,
                ConfigError::InvalidNumber("RATE_LIMIT_WINDOW_SECS"),
            )?),
        };

        Ok(Self {
            environment,
            public_url,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            billing: BillingConfig {
                webhook_secret,
                signature_tolerance_secs: 300,
            },
            admin,
            workflow,
            email,
            rate_limit,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag_var(key: &str) -> bool {
    non_empty_var(key)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_var<T: std::str::FromStr>(
    key: &str,
    default: T,
    error: ConfigError,
) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| error),
        None => Ok(default),
    }
}

/// Split a comma separated admin list, lowercasing entries and dropping blanks.
pub fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Output shape for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Payment processor settings.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub webhook_secret: Option<String>,
    pub signature_tolerance_secs: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    pub emails: Vec<String>,
}

/// Background step runner settings.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Run the expiration schedule outside production, compressed to minutes.
    pub expiration_in_dev: bool,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            expiration_in_dev: false,
            poll_interval: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPublicUrl(String),
    InvalidNumber(&'static str),
    MissingVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPublicUrl(value) => {
                write!(f, "APP_PUBLIC_URL must be an http(s) URL, found '{value}'")
            }
            ConfigError::InvalidNumber(key) => write!(f, "{key} must be a positive integer"),
            ConfigError::MissingVar(key) => write!(f, "{key} is required in production"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_PUBLIC_URL",
            "PAYMENTS_WEBHOOK_SECRET",
            "ADMIN_EMAILS",
            "ENABLE_JOB_EXPIRATION_IN_DEV",
            "WORKFLOW_POLL_INTERVAL_MS",
            "WORKFLOW_MAX_ATTEMPTS",
            "EMAIL_FROM",
            "RATE_LIMIT_MAX_REQUESTS",
            "RATE_LIMIT_WINDOW_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.public_url, "http://localhost:3000");
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert!(config.billing.webhook_secret.is_none());
        assert!(config.admin.emails.is_empty());
        assert!(!config.workflow.expiration_in_dev);
        assert_eq!(config.rate_limit.max_requests, 30);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn production_requires_webhook_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        match AppConfig::load() {
            Err(ConfigError::MissingVar("PAYMENTS_WEBHOOK_SECRET")) => {}
            other => panic!("expected missing webhook secret, got {other:?}"),
        }

        env::set_var("PAYMENTS_WEBHOOK_SECRET", "whsec_test");
        let config = AppConfig::load().expect("config loads with secret");
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(config.billing.webhook_secret.as_deref(), Some("whsec_test"));
    }

    #[test]
    fn rejects_non_http_public_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PUBLIC_URL", "ftp://jobs.example.com");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidPublicUrl(_))
        ));
    }

    #[test]
    fn admin_emails_are_normalized() {
        let emails = parse_admin_emails(" Ops@Example.com, ,boss@example.com ,");
        assert_eq!(emails, vec!["ops@example.com", "boss@example.com"]);
        assert!(parse_admin_emails("").is_empty());
    }
}
