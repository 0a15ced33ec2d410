/*
 * Copyright (C) 2020 Oakes, Gregory <gregoryoakes@fastmail.com>
 * Author: Oakes, Gregory <gregory.oakes@fastmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use std::{collections::BTreeMap, convert::Infallible, fmt};

use mobc_postgres::tokio_postgres::error::SqlState;
use serde::Serialize;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_status, Response},
    Rejection, Reply,
};

use crate::{auth::LOGIN_PATH, models::UnknownMeal, util};

/// Per-field validation messages of a rejected form.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Yields `value` when no field failed.
    pub fn or_value<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().copied().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    DBPoolError(#[from] mobc::Error<mobc_postgres::tokio_postgres::Error>),
    #[error(transparent)]
    DBError(#[from] mobc_postgres::tokio_postgres::Error),
    #[error("authentication required for {next}")]
    Unauthenticated { next: String },
    #[error("not found")]
    NotFound,
    #[error("resource already exists")]
    Conflict,
    #[error("{0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    JWTError(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(argon2::password_hash::Error),
    #[error(transparent)]
    UnknownMeal(#[from] UnknownMeal),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<FieldErrors> for Error {
    fn from(item: FieldErrors) -> Error {
        Error::Validation(item)
    }
}

impl reject::Reject for Error {}

impl From<Error> for Rejection {
    fn from(item: Error) -> Rejection {
        reject::custom(item)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn error_reply(message: &str, code: StatusCode) -> Response {
    with_status(json(&ErrorBody { error: message }), code).into_response()
}

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::Conflict => StatusCode::CONFLICT,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Unauthenticated { .. } => StatusCode::SEE_OTHER,
        Error::DBError(e) => match e.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_rejects(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<Error>() {
        let code = error_status(e);
        let res = match e {
            Error::Unauthenticated { next } => util::see_other(format!(
                "{}?next={}",
                LOGIN_PATH,
                urlencoding::encode(next)
            )),
            Error::Validation(errors) => with_status(
                json(&serde_json::json!({ "errors": errors })),
                code,
            )
            .into_response(),
            _ if code == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "request failed");
                error_reply("internal server error", code)
            }
            _ => error_reply(&e.to_string(), code),
        };
        return Ok(res);
    }

    let res = if err.is_not_found() {
        error_reply("not found", StatusCode::NOT_FOUND)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply("payload too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        error_reply("length required", StatusCode::LENGTH_REQUIRED)
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        error_reply("malformed request", StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply("method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        error_reply("internal server error", StatusCode::INTERNAL_SERVER_ERROR)
    };
    Ok(res)
}
