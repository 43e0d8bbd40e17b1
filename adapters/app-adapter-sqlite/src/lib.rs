//! SQLite application store and audit log.
//!
//! Implements both [`ApplicationStore`] and [`AuditLog`] over one pool.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod schema;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{self, SqlitePool, SqliteRow};
use sqlx::Row;

use wsgate_types::app_store::{AppStatus, Application, ApplicationStore};
use wsgate_types::audit::{AuditLog, BanEvent, RequestLogEntry, TokenLogEntry};
use wsgate_types::prelude::*;

use crate::schema::init_db;

fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> GwResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

fn to_i64(n: impl TryInto<i64>) -> i64 {
	n.try_into().unwrap_or(i64::MAX)
}

fn row_to_application(row: SqliteRow) -> Result<Application, sqlx::Error> {
	Ok(Application {
		client_id: row.try_get::<String, _>("client_id")?.into(),
		client_secret: row.try_get::<String, _>("client_secret")?.into(),
		status: AppStatus::from_code(row.try_get("status")?),
		scope: row.try_get("scope")?,
		token_lifetime_secs: row.try_get("token_lifetime")?,
		name: row.try_get::<String, _>("name")?.into(),
	})
}

#[derive(Debug)]
pub struct AppAdapterSqlite {
	db: SqlitePool,
}

impl AppAdapterSqlite {
	/// Opens (or creates) the database file at `path`
	pub async fn new(path: impl AsRef<Path>) -> GwResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}

	/// Inserts or replaces an application
	pub async fn create_application(&self, app: &Application) -> GwResult<()> {
		sqlx::query(
			"INSERT INTO applications (client_id, client_secret, status, scope, token_lifetime, name)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6)
			ON CONFLICT(client_id) DO UPDATE SET
				client_secret = excluded.client_secret,
				status = excluded.status,
				scope = excluded.scope,
				token_lifetime = excluded.token_lifetime,
				name = excluded.name",
		)
		.bind(&*app.client_id)
		.bind(&*app.client_secret)
		.bind(app.status.code())
		.bind(app.scope)
		.bind(app.token_lifetime_secs)
		.bind(&*app.name)
		.execute(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(())
	}

	pub async fn update_application_status(
		&self,
		client_id: &str,
		status: AppStatus,
	) -> GwResult<()> {
		let res = sqlx::query("UPDATE applications SET status = ?1 WHERE client_id = ?2")
			.bind(status.code())
			.bind(client_id)
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

		if res.rows_affected() == 0 { Err(Error::NotFound) } else { Ok(()) }
	}

	/// Issued tokens of one client, newest first
	pub async fn list_token_log(&self, client_id: &str) -> GwResult<Vec<TokenLogEntry>> {
		let rows = sqlx::query(
			"SELECT client_id, token, host, not_before, expires_at FROM token_log
			WHERE client_id = ?1 ORDER BY log_id DESC",
		)
		.bind(client_id)
		.fetch_all(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		rows.into_iter()
			.map(|row| {
				Ok(TokenLogEntry {
					client_id: row.try_get::<String, _>("client_id")?.into(),
					token: row.try_get::<String, _>("token")?.into(),
					host: row.try_get::<Option<String>, _>("host")?.map(Into::into),
					not_before: row.try_get("not_before")?,
					expires_at: row.try_get("expires_at")?,
				})
			})
			.collect::<Result<Vec<_>, sqlx::Error>>()
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)
	}

	/// Ban events of one identity, oldest first
	pub async fn list_ban_log(&self, identity: &str) -> GwResult<Vec<BanEvent>> {
		let rows = sqlx::query(
			"SELECT identity, path, status, attempts_in_window, total_attempts, ban_duration, ban_expiry
			FROM ban_log WHERE identity = ?1 ORDER BY log_id",
		)
		.bind(identity)
		.fetch_all(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		rows.into_iter()
			.map(|row| {
				Ok(BanEvent {
					identity: row.try_get::<String, _>("identity")?.into(),
					path: row.try_get::<String, _>("path")?.into(),
					status: row.try_get("status")?,
					attempts_in_window: row.try_get::<i64, _>("attempts_in_window")? as usize,
					total_attempts: row.try_get::<i64, _>("total_attempts")? as u64,
					ban_duration: Duration::from_secs(row.try_get::<i64, _>("ban_duration")? as u64),
					ban_expiry: DateTime::from_timestamp(row.try_get("ban_expiry")?, 0)
						.unwrap_or_default(),
				})
			})
			.collect::<Result<Vec<_>, sqlx::Error>>()
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)
	}

	/// Status code recorded for a request id
	pub async fn read_request_status(&self, request_id: &str) -> GwResult<u16> {
		let res = sqlx::query("SELECT status FROM request_log WHERE request_id = ?1")
			.bind(request_id)
			.fetch_one(&self.db)
			.await;
		map_res(res, |row| row.try_get("status"))
	}
}

#[async_trait]
impl ApplicationStore for AppAdapterSqlite {
	async fn read_application(&self, client_id: &str) -> GwResult<Application> {
		let res = sqlx::query(
			"SELECT client_id, client_secret, status, scope, token_lifetime, name
			FROM applications WHERE client_id = ?1",
		)
		.bind(client_id)
		.fetch_one(&self.db)
		.await;

		map_res(res, row_to_application)
	}

	async fn check_connection(&self) -> GwResult<()> {
		sqlx::query("SELECT 1")
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::ServiceUnavailable("database unreachable".into()))?;
		Ok(())
	}
}

#[async_trait]
impl AuditLog for AppAdapterSqlite {
	async fn log_token(&self, entry: &TokenLogEntry) -> GwResult<()> {
		sqlx::query(
			"INSERT INTO token_log (client_id, token, host, not_before, expires_at)
			VALUES (?1, ?2, ?3, ?4, ?5)",
		)
		.bind(&*entry.client_id)
		.bind(&*entry.token)
		.bind(entry.host.as_deref())
		.bind(entry.not_before)
		.bind(entry.expires_at)
		.execute(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(())
	}

	async fn log_ban(&self, event: &BanEvent) -> GwResult<()> {
		sqlx::query(
			"INSERT INTO ban_log (identity, path, status, attempts_in_window, total_attempts,
				ban_duration, ban_expiry)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
		)
		.bind(&*event.identity)
		.bind(&*event.path)
		.bind(i64::from(event.status))
		.bind(to_i64(event.attempts_in_window))
		.bind(to_i64(event.total_attempts))
		.bind(to_i64(event.ban_duration.as_secs()))
		.bind(event.ban_expiry.timestamp())
		.execute(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(())
	}

	async fn log_request(&self, entry: &RequestLogEntry) -> GwResult<()> {
		sqlx::query(
			"INSERT INTO request_log (request_id, method, endpoint, status, client_id,
				application_name, client_ip, started_at, duration_ms, response)
			VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
		)
		.bind(&*entry.request_id)
		.bind(&*entry.method)
		.bind(&*entry.endpoint)
		.bind(i64::from(entry.status))
		.bind(entry.client_id.as_deref())
		.bind(entry.application_name.as_deref())
		.bind(&*entry.client_ip)
		.bind(entry.started_at.timestamp())
		.bind(entry.duration_ms)
		.bind(&*entry.response)
		.execute(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(())
	}
}

// vim: ts=4
