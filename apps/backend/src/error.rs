use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::words::WordError;
use crate::ws::protocol::ProtocolError;

#[derive(Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {detail}")]
    Config { detail: String },
    #[error("Coordination store error: {0}")]
    Store(#[from] StoreError),
    #[error("Word service error: {0}")]
    Words(#[from] WordError),
    #[error("Bad request: {detail}")]
    BadRequest { code: &'static str, detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: &'static str, detail: String },
    #[error("Internal error: {detail}")]
    Internal { detail: String },
}

impl AppError {
    fn code(&self) -> String {
        match self {
            AppError::Config { .. } => "CONFIG_ERROR".to_string(),
            AppError::Store(_) => "STORE_UNAVAILABLE".to_string(),
            AppError::Words(WordError::EmptyCorpus) => "WORDS_EMPTY".to_string(),
            AppError::Words(_) => "WORDS_UNAVAILABLE".to_string(),
            AppError::BadRequest { code, .. } => code.to_string(),
            AppError::Conflict { code, .. } => code.to_string(),
            AppError::Internal { .. } => "INTERNAL".to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::Config { detail } => detail.clone(),
            AppError::Store(err) => err.to_string(),
            AppError::Words(err) => err.to_string(),
            AppError::BadRequest { detail, .. } => detail.clone(),
            AppError::Conflict { detail, .. } => detail.clone(),
            AppError::Internal { detail } => detail.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) | AppError::Words(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    pub fn bad_request(code: &'static str, detail: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            detail: detail.into(),
        }
    }

    pub fn conflict(code: &'static str, detail: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// A room torn down between directory lookup and join.
    pub fn room_closed(room: &str) -> Self {
        Self::conflict("ROOM_CLOSED", format!("room '{room}' is shutting down"))
    }

    pub fn is_room_closed(&self) -> bool {
        matches!(self, AppError::Conflict { code: "ROOM_CLOSED", .. })
    }

    fn humanize_code(code: &str) -> String {
        code.split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<ProtocolError> for AppError {
    fn from(e: ProtocolError) -> Self {
        AppError::bad_request("BAD_MESSAGE", e.to_string())
    }
}

impl From<db_infra::DbInfraError> for AppError {
    fn from(e: db_infra::DbInfraError) -> Self {
        AppError::config(format!("word database: {e}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::internal(format!("io error: {e}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status();
        let code = self.code();

        let problem_details = ProblemDetails {
            type_: format!("https://sketchwith.us/errors/{code}"),
            title: Self::humanize_code(&code),
            status: status.as_u16(),
            detail: self.detail(),
            code,
        };

        HttpResponse::build(status)
            .content_type("application/problem+json")
            .json(problem_details)
    }
}
