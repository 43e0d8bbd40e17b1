//! Stand-alone wsgate server backed by SQLite.
//!
//! Every setting comes from a `WSGATE_*` environment variable, durations are
//! given in seconds and lists are comma separated.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use wsgate::app_store::{AppStatus, Application};
use wsgate::auth::TokenConfig;
use wsgate::error::GwResult;
use wsgate::rate_limit::{BanConfig, RateLimitConfig};
use wsgate::{AppBuilder, ServerMode};
use wsgate_app_adapter_sqlite::AppAdapterSqlite;

/// Application registered at startup, if configured
struct BootstrapApp {
	client_id: String,
	client_secret: String,
	name: String,
	scope: i64,
}

struct Config {
	listen: String,
	mode: ServerMode,
	db_path: PathBuf,

	rate_limit: RateLimitConfig,
	fail2ban_enabled: bool,
	ban: BanConfig,

	token: TokenConfig,

	max_body_size: usize,
	request_timeout: Duration,
	tls_enabled: bool,
	cors_allowed_origins: Vec<String>,

	bootstrap_app: Option<BootstrapApp>,
}

struct Vars<F> {
	lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
	fn string(&self, name: &str) -> Option<String> {
		(self.lookup)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
	}

	fn parse<T: FromStr>(&self, name: &str, default: T) -> T {
		match self.string(name) {
			Some(raw) => raw.parse().unwrap_or_else(|_| {
				warn!("Invalid value for {}: {:?}, using default", name, raw);
				default
			}),
			None => default,
		}
	}

	fn flag(&self, name: &str, default: bool) -> bool {
		match self.string(name).map(|v| v.to_ascii_lowercase()) {
			Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
			Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
			Some(v) => {
				warn!("Invalid value for {}: {:?}, using default", name, v);
				default
			}
			None => default,
		}
	}

	fn secs(&self, name: &str, default: Duration) -> Duration {
		Duration::from_secs(self.parse(name, default.as_secs()))
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.string(name).map(|raw| {
			raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
		})
	}
}

impl Config {
	fn from_env() -> Self {
		Self::from_lookup(|name| env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let vars = Vars { lookup };

		let rate_defaults = RateLimitConfig::default();
		let rate_limit = RateLimitConfig {
			per_minute: vars.parse("WSGATE_RATE_LIMIT_PER_MIN", rate_defaults.per_minute),
			per_hour: vars.parse("WSGATE_RATE_LIMIT_PER_HOUR", rate_defaults.per_hour),
			enabled: vars.flag("WSGATE_RATE_LIMIT_ENABLED", rate_defaults.enabled),
			..rate_defaults
		};

		let ban_defaults = BanConfig::default();
		let mut ban = BanConfig::new(
			vars.parse("WSGATE_MAX_ATTEMPTS", ban_defaults.max_attempts),
			vars.secs("WSGATE_BAN_DURATION", ban_defaults.ban_duration),
			vars.secs("WSGATE_WINDOW_DURATION", ban_defaults.window_duration),
		);
		ban.cleanup_interval = vars.secs("WSGATE_CLEANUP_INTERVAL", ban_defaults.cleanup_interval);
		if let Some(whitelist) = vars.list("WSGATE_WHITELIST_IPS") {
			ban = ban.with_whitelist(whitelist);
		}

		let token_defaults = TokenConfig::default();
		let token = TokenConfig {
			secret: vars.string("WSGATE_JWT_SECRET_KEY").unwrap_or_default().into(),
			issuer: vars.string("WSGATE_JWT_ISSUER").map_or(token_defaults.issuer.clone(), Into::into),
			timezone_hours: vars.parse("WSGATE_JWT_TIMEZONE_HOURS", token_defaults.timezone_hours),
			default_lifetime: vars.parse("WSGATE_TOKEN_LIFETIME", token_defaults.default_lifetime),
			modules: vars.parse("WSGATE_MODULES", token_defaults.modules),
		};

		let bootstrap_app = match (
			vars.string("WSGATE_APP_CLIENT_ID"),
			vars.string("WSGATE_APP_CLIENT_SECRET"),
		) {
			(Some(client_id), Some(client_secret)) => Some(BootstrapApp {
				name: vars.string("WSGATE_APP_NAME").unwrap_or_else(|| client_id.clone()),
				scope: vars.parse("WSGATE_APP_SCOPE", 0),
				client_id,
				client_secret,
			}),
			(Some(_), None) | (None, Some(_)) => {
				warn!("WSGATE_APP_CLIENT_ID and WSGATE_APP_CLIENT_SECRET must be set together");
				None
			}
			(None, None) => None,
		};

		Config {
			listen: vars.string("WSGATE_LISTEN").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
			mode: vars.parse("WSGATE_MODE", ServerMode::Standalone),
			db_path: PathBuf::from(
				vars.string("WSGATE_DB_PATH").unwrap_or_else(|| "./data/wsgate.db".to_string()),
			),
			rate_limit,
			fail2ban_enabled: vars.flag("WSGATE_FAIL2BAN_ENABLED", true),
			ban,
			token,
			max_body_size: vars.parse("WSGATE_MAX_BODY_SIZE", 1024 * 1024),
			request_timeout: vars.secs("WSGATE_REQUEST_TIMEOUT", Duration::from_secs(30)),
			tls_enabled: vars.flag("WSGATE_TLS_ENABLED", false),
			cors_allowed_origins: vars.list("WSGATE_CORS_ALLOWED_ORIGINS").unwrap_or_default(),
			bootstrap_app,
		}
	}
}

async fn open_store(config: &Config) -> GwResult<Arc<AppAdapterSqlite>> {
	if let Some(dir) = config.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(dir).await?;
	}
	let store = Arc::new(AppAdapterSqlite::new(&config.db_path).await?);
	info!("Application store opened at {}", config.db_path.display());

	if let Some(boot) = &config.bootstrap_app {
		store
			.create_application(&Application {
				client_id: boot.client_id.as_str().into(),
				client_secret: boot.client_secret.as_str().into(),
				status: AppStatus::Enabled,
				scope: boot.scope,
				token_lifetime_secs: 0,
				name: boot.name.as_str().into(),
			})
			.await?;
		info!(client_id = %boot.client_id, "Bootstrap application registered");
	}

	Ok(store)
}

async fn run(mut builder: AppBuilder) -> GwResult<()> {
	let config = Config::from_env();
	let store = open_store(&config).await?;

	builder
		.mode(config.mode)
		.listen(config.listen)
		.max_body_size(config.max_body_size)
		.request_timeout(config.request_timeout)
		.tls_enabled(config.tls_enabled)
		.cors_allowed_origins(config.cors_allowed_origins)
		.rate_limit(config.rate_limit)
		.token(config.token)
		.app_store(store.clone())
		.audit_log(store);
	if config.fail2ban_enabled {
		builder.fail2ban(config.ban);
	} else {
		builder.disable_fail2ban();
	}

	builder.run().await
}

#[tokio::main]
async fn main() {
	// Installs the tracing subscriber before the configuration is read
	let builder = AppBuilder::new();

	if let Err(err) = run(builder).await {
		error!("FATAL: {}", err);
		std::process::exit(1);
	}
}


// vim: ts=4
