use std::future::Future;
use std::time::Duration;

use migration::{migrate, MigrationCommand};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{info, warn};

use crate::config::db::{DbKind, DbSettings};
use crate::error::DbInfraError;

async fn retry_connection<T, F, Fut>(
    mut connect_fn: F,
    max_attempts: u32,
    interval: Duration,
) -> Result<T, DbInfraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbInfraError>>,
{
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match connect_fn().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        "connection_retry=success attempts={} interval_ms={}",
                        attempt,
                        interval.as_millis()
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < max_attempts {
                    warn!(
                        "connection_retry=failed attempt={} max_attempts={} interval_ms={}",
                        attempt,
                        max_attempts,
                        interval.as_millis()
                    );
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| DbInfraError::Connect {
        message: "no error recorded after max attempts".to_string(),
    }))
}

/// Open a connection pool. Postgres connections are retried since the
/// database commonly starts alongside the server.
pub async fn connect_db(settings: &DbSettings) -> Result<DatabaseConnection, DbInfraError> {
    let mut opt = ConnectOptions::new(settings.url.clone());
    opt.min_connections(settings.min_connections)
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .sqlx_logging(false);

    info!(
        db_kind = ?settings.kind,
        url = %sanitize_db_url(&settings.url),
        "connecting to word database"
    );

    let connect = || {
        let opt = opt.clone();
        async move {
            Database::connect(opt)
                .await
                .map_err(|e| DbInfraError::Connect {
                    message: format!("failed to connect to database: {e}"),
                })
        }
    };

    match settings.kind {
        DbKind::Postgres => {
            retry_connection(connect, settings.connect_attempts, settings.retry_interval).await
        }
        DbKind::SqliteFile | DbKind::SqliteMemory => connect().await,
    }
}

/// Run one migration command and log its outcome.
pub async fn orchestrate_migration(
    conn: &DatabaseConnection,
    command: MigrationCommand,
) -> Result<(), DbInfraError> {
    info!(?command, "migrate=start");
    migrate(conn, command)
        .await
        .map_err(|e| DbInfraError::Migration {
            message: format!("migration execution failed: {e}"),
        })?;
    info!("migrate=done");
    Ok(())
}

/// Single entrypoint for consumers: connect, then bring the schema up to date.
pub async fn bootstrap_db(settings: &DbSettings) -> Result<DatabaseConnection, DbInfraError> {
    let conn = connect_db(settings).await?;
    orchestrate_migration(&conn, MigrationCommand::Up).await?;
    Ok(conn)
}

/// Sanitize database URL by masking the password. Used for logging.
pub fn sanitize_db_url(url: &str) -> String {
    let Some((auth_part, host_part)) = url.split_once('@') else {
        return url.to_string();
    };
    match auth_part.rfind(':') {
        // "postgres://user:pass" has a colon after the scheme's "//"
        Some(colon_pos) if auth_part[..colon_pos].contains("//") => {
            format!("{}:***@{}", &auth_part[..colon_pos], host_part)
        }
        _ => url.to_string(),
    }
}
