use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;

pub enum AppError {
    InternalServerError(anyhow::Error),
    ResponseStatusError(StatusCode, Cow<'static, str>),
    ValidationError {
        field: &'static str,
        message: Cow<'static, str>,
    },
    /// The caller may not touch the resource; send them somewhere safe instead.
    Redirect(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// An input error that can be pinned on one request field.
pub trait FieldError: std::error::Error {
    fn field(&self) -> &'static str;
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            message: Cow<'static, str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            field: Option<&'static str>,
        }

        match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "request failed");
                AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response()
            }
            AppError::ResponseStatusError(code, s) => (
                code,
                Json(AppErrorResponse {
                    status: code.as_u16(),
                    message: s,
                    field: None,
                }),
            )
                .into_response(),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                Json(AppErrorResponse {
                    status: StatusCode::BAD_REQUEST.as_u16(),
                    message,
                    field: Some(field),
                }),
            )
                .into_response(),
            AppError::Redirect(to) => Redirect::to(&to).into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    pub fn validation(field: &'static str, message: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ValidationError {
            field,
            message: message.into(),
        }
    }

    pub fn invalid(err: impl FieldError) -> AppError {
        AppError::validation(err.field(), err.to_string())
    }

    pub fn not_found(what: &'static str) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, format!("the {what} does not exist"))
    }

    pub fn redirect(to: impl Into<String>) -> AppError {
        AppError::Redirect(to.into())
    }
}
