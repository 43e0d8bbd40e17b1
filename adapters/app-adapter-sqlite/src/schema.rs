//! Database schema initialization
//!
//! Creates the application table and the three audit tables when missing.

use sqlx::SqlitePool;

/// Initialize the database schema with all required tables and indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Applications
	//**************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS applications (
		client_id text NOT NULL,
		client_secret text NOT NULL,
		status integer NOT NULL DEFAULT 1,
		scope integer NOT NULL DEFAULT 0,
		token_lifetime integer NOT NULL DEFAULT 0,
		name text NOT NULL DEFAULT '',
		created_at datetime DEFAULT (unixepoch()),
		PRIMARY KEY(client_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Audit
	//*******
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS token_log (
		log_id integer PRIMARY KEY AUTOINCREMENT,
		client_id text NOT NULL,
		token text NOT NULL,
		host text,
		not_before integer NOT NULL,
		expires_at integer NOT NULL
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_token_log_client ON token_log(client_id)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS ban_log (
		log_id integer PRIMARY KEY AUTOINCREMENT,
		identity text NOT NULL,
		path text NOT NULL,
		status integer NOT NULL,
		attempts_in_window integer NOT NULL,
		total_attempts integer NOT NULL,
		ban_duration integer NOT NULL,
		ban_expiry integer NOT NULL,
		created_at datetime DEFAULT (unixepoch())
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS request_log (
		request_id text NOT NULL,
		method text NOT NULL,
		endpoint text NOT NULL,
		status integer NOT NULL,
		client_id text,
		application_name text,
		client_ip text NOT NULL,
		started_at integer NOT NULL,
		duration_ms integer NOT NULL,
		response text,
		PRIMARY KEY(request_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
