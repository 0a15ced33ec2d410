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

use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use warp::{path::FullPath, Filter, Rejection};

use crate::{
    auth::{BearerToken, SessionKeys, SESSION_COOKIE},
    store::SharedStore,
    Error,
};

/// Largest urlencoded form body accepted.
const FORM_LIMIT_BYTES: u64 = 16 * 1024;

/// The user a request acts on behalf of.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
}

impl From<BearerToken> for Identity {
    fn from(item: BearerToken) -> Self {
        Identity {
            user_id: item.sub,
            username: item.username,
        }
    }
}

pub fn with_store(
    store: SharedStore,
) -> impl Filter<Extract = (SharedStore,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

pub fn with_keys(
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Arc<SessionKeys>,), Error = Infallible> + Clone {
    warp::any().map(move || keys.clone())
}

pub fn form<T: DeserializeOwned + Send + 'static>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(FORM_LIMIT_BYTES).and(warp::body::form())
}

/// Like [`form`], but a body that does not decode yields an empty form.
pub fn lenient_form<T: DeserializeOwned + Default + Send + 'static>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(FORM_LIMIT_BYTES).and(warp::body::form::<T>().or_else(
        |rejection: Rejection| async move {
            tracing::debug!(?rejection, "discarding undecodable form");
            Ok::<_, Rejection>((T::default(),))
        },
    ))
}

fn bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_at(header.find(' ')?);
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

fn verify(keys: &SessionKeys, token: &str) -> Option<Identity> {
    match BearerToken::verify_token(keys, token) {
        Ok(claims) => Some(Identity::from(claims)),
        Err(e) => {
            tracing::debug!(error = %e, "discarding invalid session token");
            None
        }
    }
}

/// The bearer header wins over the cookie, unless it does not verify.
fn resolve_identity(
    keys: &SessionKeys,
    cookie: Option<String>,
    authorization: Option<String>,
) -> Option<Identity> {
    authorization
        .as_deref()
        .and_then(bearer)
        .and_then(|token| verify(keys, token))
        .or_else(|| cookie.and_then(|token| verify(keys, &token)))
}

/// The path and query the client asked for.
fn requested(path: &FullPath, query: Option<String>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{}?{}", path.as_str(), query),
        _ => path.as_str().to_string(),
    }
}

/// Resolves the session of the request, rejecting with
/// [`Error::Unauthenticated`] when there is none.
pub fn authenticated(
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    let query = warp::query::raw()
        .map(|query: String| Some(query))
        .or(warp::any().map(|| None::<String>))
        .unify();
    warp::path::full()
        .and(query)
        .and(warp::cookie::optional(SESSION_COOKIE))
        .and(warp::header::optional::<String>("authorization"))
        .and_then(
            move |path: FullPath,
                  query: Option<String>,
                  cookie: Option<String>,
                  authorization: Option<String>| {
                let keys = keys.clone();
                async move {
                    resolve_identity(&keys, cookie, authorization).ok_or_else(|| {
                        Rejection::from(Error::Unauthenticated {
                            next: requested(&path, query),
                        })
                    })
                }
            },
        )
}
