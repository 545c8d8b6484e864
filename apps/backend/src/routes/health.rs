use actix_web::{web, HttpResponse};
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::AppError;
use crate::state::app_state::AppState;

#[derive(Debug, Serialize)]
struct ProbeStatus {
    backend: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProbeStatus {
    fn from_result<E: std::fmt::Display>(backend: &'static str, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                backend,
                status: "ok",
                error: None,
            },
            Err(e) => Self {
                backend,
                status: "error",
                error: Some(e.to_string()),
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_version: &'static str,
    store: ProbeStatus,
    words: ProbeStatus,
    time: String,
}

async fn health(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let time = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    let store = ProbeStatus::from_result(app_state.store_backend(), app_state.store().ping().await);
    let words = ProbeStatus::from_result(app_state.words().backend(), app_state.words().ping().await);

    let healthy = store.is_ok() && words.is_ok();
    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        app_version: env!("CARGO_PKG_VERSION"),
        store,
        words,
        time,
    };

    if healthy {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(response))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
