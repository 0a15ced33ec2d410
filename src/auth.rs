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

use std::{
    fs,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{
    decode as jwt_decode, encode as jwt_encode, Algorithm, DecodingKey, EncodingKey,
    Header as JWTHeader, Validation,
};
use serde::{Deserialize, Serialize};
use warp::{
    http::header,
    reply::{json, with_header, Response},
    Filter, Rejection, Reply,
};

use crate::{
    config::{Config, JWTConfig},
    forms::{safe_next, FormDescriptor, LoginForm, SignupForm},
    guard,
    models::{Credentials, User},
    store::SharedStore,
    util, Error,
};

pub const SESSION_COOKIE: &str = "auth-jwt";
pub const LOGIN_PATH: &str = "/accounts/login/";

const GENERATED_SECRET_LENGTH: usize = 32;
const JWT_LEEWAY_SECONDS: u64 = 60;
const SIGNUP_ERROR: &str = "Invalid sign up - try again";
const LOGIN_ERROR: &str = "Please enter a correct username and password.";
const LOGIN_REDIRECT: &str = "/cats/";

/// The keys for encoding and decoding session tokens.
pub struct SessionKeys {
    pub encoder: EncodingKey,
    pub decoder: DecodingKey,
    pub algorithm: Algorithm,
    /// Token lifetime in seconds.
    pub ttl: u64,
}

impl SessionKeys {
    pub fn from_secret(secret: &[u8], ttl: u64) -> SessionKeys {
        SessionKeys {
            encoder: EncodingKey::from_secret(secret),
            decoder: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Result<SessionKeys, Error> {
        let ttl = config.session_ttl.as_secs();
        match &config.jwt {
            Some(JWTConfig::Secret(secret)) => Ok(SessionKeys::from_secret(secret.as_bytes(), ttl)),
            Some(JWTConfig::Rsa { private, public }) => Ok(SessionKeys {
                encoder: EncodingKey::from_rsa_pem(fs::read(private)?.as_ref())?,
                decoder: DecodingKey::from_rsa_pem(fs::read(public)?.as_ref())?,
                algorithm: Algorithm::RS256,
                ttl,
            }),
            None => {
                tracing::warn!("no JWT key configured, sessions will not survive a restart");
                let secret = util::random_string(GENERATED_SECRET_LENGTH);
                Ok(SessionKeys::from_secret(secret.as_bytes(), ttl))
            }
        }
    }
}

/// The claims of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerToken {
    pub iat: u64,
    pub exp: u64,
    pub sub: i32,
    pub username: String,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl BearerToken {
    pub fn issue(keys: &SessionKeys, user: &User) -> Result<String, Error> {
        let iat = now();
        let payload = BearerToken {
            iat,
            exp: iat + keys.ttl,
            sub: user.id,
            username: user.username.clone(),
        };
        Ok(jwt_encode(
            &JWTHeader::new(keys.algorithm),
            &payload,
            &keys.encoder,
        )?)
    }

    pub fn verify_token(keys: &SessionKeys, token: &str) -> Result<BearerToken, Error> {
        let mut validation = Validation::new(keys.algorithm);
        validation.leeway = JWT_LEEWAY_SECONDS;
        Ok(jwt_decode::<BearerToken>(token, &keys.decoder, &validation)?.claims)
    }
}

fn session_cookie(token: &str, ttl: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, ttl
    )
}

fn expired_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Hashes `password` with Argon2id under a fresh random salt.
pub fn new_credentials(password: &str) -> Result<Credentials, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(Error::PasswordHash)?
        .to_string();
    Ok(Credentials { password_hash })
}

pub fn check_password(credentials: &Credentials, password: &str) -> bool {
    let parsed = match PasswordHash::new(&credentials.password_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Logs `user` in and sends the client on to `location`.
fn start_session(keys: &SessionKeys, user: &User, location: &str) -> Result<Response, Error> {
    let token = BearerToken::issue(keys, user)?;
    Ok(with_header(
        util::see_other(location),
        header::SET_COOKIE,
        session_cookie(&token, keys.ttl),
    )
    .into_response())
}

pub fn api(
    store: SharedStore,
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let signup_form = warp::path("accounts")
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::get())
        .and_then(signup_form);

    let signup = warp::path("accounts")
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::form())
        .and(guard::with_store(store.clone()))
        .and(guard::with_keys(keys.clone()))
        .and_then(signup);

    let login_form = warp::path("accounts")
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<LoginForm>())
        .and_then(login_form);

    let login = warp::path("accounts")
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::form())
        .and(guard::with_store(store))
        .and(guard::with_keys(keys))
        .and_then(login);

    let logout = warp::path("accounts")
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::get().or(warp::post()).unify())
        .and_then(logout);

    signup_form
        .or(signup)
        .unify()
        .or(login_form)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
}

async fn signup_form() -> Result<Response, Rejection> {
    Ok(json(&FormDescriptor::signup()).into_response())
}

async fn signup(
    form: SignupForm,
    store: SharedStore,
    keys: Arc<SessionKeys>,
) -> Result<Response, Rejection> {
    let rejected = || json(&FormDescriptor::signup().with_message(SIGNUP_ERROR)).into_response();

    let new_user = match form.validate() {
        Ok(new_user) => new_user,
        Err(errors) => {
            tracing::debug!(%errors, "signup rejected");
            return Ok(rejected());
        }
    };

    let credentials = new_credentials(&new_user.password)?;
    let user = match store.create_user(&new_user.username, &credentials).await {
        Ok(user) => user,
        Err(Error::Conflict) => {
            tracing::debug!(username = %new_user.username, "signup rejected, username taken");
            return Ok(rejected());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, username = %user.username, "user signed up");
    Ok(start_session(&keys, &user, "/")?)
}

async fn login_form(query: LoginForm) -> Result<Response, Rejection> {
    Ok(json(&FormDescriptor::login(query.next.as_deref())).into_response())
}

async fn login(
    form: LoginForm,
    store: SharedStore,
    keys: Arc<SessionKeys>,
) -> Result<Response, Rejection> {
    let username = form.username.as_deref().unwrap_or_default();
    let password = form.password.as_deref().unwrap_or_default();

    let user = match store.find_credentials(username).await? {
        Some((user, credentials)) if check_password(&credentials, password) => user,
        _ => {
            tracing::debug!(username, "login rejected");
            let descriptor = FormDescriptor::login(form.next.as_deref()).with_message(LOGIN_ERROR);
            return Ok(json(&descriptor).into_response());
        }
    };

    tracing::info!(user_id = user.id, "user logged in");
    let location = safe_next(form.next.as_deref()).unwrap_or(LOGIN_REDIRECT);
    Ok(start_session(&keys, &user, location)?)
}

async fn logout() -> Result<Response, Rejection> {
    Ok(with_header(util::see_other("/"), header::SET_COOKIE, expired_session_cookie()).into_response())
}
