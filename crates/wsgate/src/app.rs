//! App builder - constructs and runs the wsgate application

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::cors::CorsConfig;
use crate::prelude::*;
use crate::routes;
use wsgate_auth::TokenConfig;
use wsgate_core::extensions::Extensions;
use wsgate_core::rate_limit::{AttemptPolicy, BanConfig, BanEngine, RateLimitConfig, RateLimiter};
use wsgate_types::app_store::ApplicationStore;
use wsgate_types::audit::{AuditLog, TracingAuditLog};
use wsgate_types::clock::{Clock, SystemClock};

pub use wsgate_core::app::{App, AppBuilderOpts, AppState, ServerMode, VERSION};

pub struct AppBuilder {
	opts: AppBuilderOpts,
	rate_limit: RateLimitConfig,
	/// None disables the ban engine
	ban: Option<BanConfig>,
	attempt_policy: AttemptPolicy,
	token: TokenConfig,
	cors: CorsConfig,
	clock: Arc<dyn Clock>,
	app_store: Option<Arc<dyn ApplicationStore>>,
	audit: Option<Arc<dyn AuditLog>>,
}

impl AppBuilder {
	pub fn new() -> Self {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		AppBuilder {
			opts: AppBuilderOpts::default(),
			rate_limit: RateLimitConfig::default(),
			ban: Some(BanConfig::default()),
			attempt_policy: AttemptPolicy::default(),
			token: TokenConfig::default(),
			cors: CorsConfig::default(),
			clock: Arc::new(SystemClock),
			app_store: None,
			audit: None,
		}
	}

	// Opts
	pub fn mode(&mut self, mode: ServerMode) -> &mut Self {
		self.opts.mode = mode;
		self
	}
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.opts.listen = listen.into();
		self
	}
	pub fn max_body_size(&mut self, max_body_size: usize) -> &mut Self {
		self.opts.guard.max_body_size = max_body_size;
		self
	}
	pub fn request_timeout(&mut self, request_timeout: Duration) -> &mut Self {
		self.opts.guard.request_timeout = request_timeout;
		self
	}
	pub fn tls_enabled(&mut self, tls_enabled: bool) -> &mut Self {
		self.opts.guard.tls_enabled = tls_enabled;
		self
	}
	pub fn cors_allowed_origins(
		&mut self,
		origins: impl IntoIterator<Item = impl Into<Box<str>>>,
	) -> &mut Self {
		self.cors.allowed_origins = origins.into_iter().map(Into::into).collect();
		self
	}
	pub fn cors(&mut self, cors: CorsConfig) -> &mut Self {
		self.cors = cors;
		self
	}

	// Throttling
	pub fn rate_limit(&mut self, rate_limit: RateLimitConfig) -> &mut Self {
		self.rate_limit = rate_limit;
		self
	}
	pub fn fail2ban(&mut self, ban: BanConfig) -> &mut Self {
		self.ban = Some(ban);
		self
	}
	pub fn disable_fail2ban(&mut self) -> &mut Self {
		self.ban = None;
		self
	}
	pub fn attempt_policy(&mut self, policy: AttemptPolicy) -> &mut Self {
		self.attempt_policy = policy;
		self
	}

	// Token issuance
	pub fn token(&mut self, token: TokenConfig) -> &mut Self {
		self.token = token;
		self
	}
	pub fn jwt_secret(&mut self, secret: impl Into<Box<str>>) -> &mut Self {
		self.token.secret = secret.into();
		self
	}

	// Collaborators
	pub fn clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
		self.clock = clock;
		self
	}
	pub fn app_store(&mut self, app_store: Arc<dyn ApplicationStore>) -> &mut Self {
		self.app_store = Some(app_store);
		self
	}
	pub fn audit_log(&mut self, audit: Arc<dyn AuditLog>) -> &mut Self {
		self.audit = Some(audit);
		self
	}

	/// Assembles the app state and the router without binding a socket
	pub fn build(self) -> GwResult<(App, Router)> {
		let Some(app_store) = self.app_store else {
			error!("FATAL: No application store configured");
			return Err(Error::Internal("No application store configured".to_string()));
		};
		let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditLog));

		let rate_limiter = Arc::new(RateLimiter::new(self.rate_limit, self.clock.clone()));
		let ban_engine = self.ban.map(|config| Arc::new(BanEngine::new(config, self.clock.clone())));

		let mut state = AppState {
			opts: self.opts,
			clock: self.clock,
			app_store,
			audit,
			rate_limiter,
			ban_engine,
			attempt_policy: self.attempt_policy,
			extensions: Extensions::new(),
		};

		// Init modules
		wsgate_auth::init(&mut state, self.token)?;

		let app: App = Arc::new(state);
		let router = routes::init(app.clone(), &self.cors);
		Ok((app, router))
	}

	pub async fn run(self) -> GwResult<()> {
		info!("                            _");
		info!(" __      _____  __ _  __ _| |_ ___");
		info!(" \\ \\ /\\ / / __|/ _` |/ _` | __/ _ \\");
		info!("  \\ V  V /\\__ \\ (_| | (_| | ||  __/");
		info!("   \\_/\\_/ |___/\\__, |\\__,_|\\__\\___|");
		info!("               |___/");
		info!("V{}", VERSION);
		info!("");

		log_settings(&self);
		let (app, router) = self.build()?;

		if let Err(err) = app.app_store.check_connection().await {
			warn!("Application store is not reachable: {}", err);
		}

		let cleanup = app.start_cleanup();

		let listener = tokio::net::TcpListener::bind(&*app.opts.listen).await.map_err(|e| {
			error!("FATAL: Cannot bind {}: {}", app.opts.listen, e);
			Error::Io(e)
		})?;
		info!("Listening on HTTP {}", app.opts.listen);
		if app.opts.guard.tls_enabled {
			info!("TLS is terminated upstream, HSTS enabled");
		} else {
			warn!("TLS disabled, traffic is not encrypted");
		}

		let res = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
			.with_graceful_shutdown(shutdown_signal())
			.await;

		for task in cleanup {
			task.shutdown().await;
		}
		info!("Server stopped");

		res?;
		Ok(())
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn log_settings(builder: &AppBuilder) {
	let rate = &builder.rate_limit;
	if rate.enabled {
		info!(per_min = rate.per_minute, per_hour = rate.per_hour, "Rate limiting enabled");
	} else {
		warn!("Rate limiting disabled");
	}

	match &builder.ban {
		Some(ban) => info!(
			max_attempts = ban.max_attempts,
			ban_duration_secs = ban.ban_duration.as_secs(),
			window_secs = ban.window_duration.as_secs(),
			whitelist = ban.whitelist.len(),
			"Fail2ban enabled"
		),
		None => warn!("Fail2ban disabled"),
	}

	if builder.cors.allowed_origins.is_empty() {
		info!("CORS allows any origin");
	} else {
		info!(origins = ?builder.cors.allowed_origins, "CORS restricted to listed origins");
	}

	info!(
		max_body_size = builder.opts.guard.max_body_size,
		request_timeout_secs = builder.opts.guard.request_timeout.as_secs(),
		mode = ?builder.opts.mode,
		"Request guard configured"
	);
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!("Cannot listen for shutdown signal: {}", err);
		std::future::pending::<()>().await;
	}
	info!("Shutdown signal received");
}


// vim: ts=4
