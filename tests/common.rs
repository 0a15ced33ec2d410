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

#![allow(dead_code)]

use std::{env, sync::Arc};

use serde_json::Value;
use warp::{
    http::{header, Response, StatusCode},
    hyper::body::Bytes,
    Filter, Reply,
};

use cat_collector::{app, memory::MemStore, SessionKeys, SharedStore};

pub const PASSWORD: &str = "whiskers123";

pub fn secret() -> String {
    "test-secret".to_string()
}

pub fn store() -> SharedStore {
    Arc::new(MemStore::new())
}

pub fn api(
    store: SharedStore,
) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone + 'static {
    app(store, SessionKeys::from_secret(secret().as_bytes(), 3600))
}

/// The database used by the PostgreSQL tests, when one is provided.
pub fn pg_url() -> Option<String> {
    env::var("TEST_DATABASE_URL").ok()
}

pub fn location(res: &Response<Bytes>) -> String {
    res.headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}

/// The `name=value` pair of the session cookie a response sets.
pub fn session_cookie(res: &Response<Bytes>) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn body_json(res: &Response<Bytes>) -> Value {
    serde_json::from_slice(res.body()).expect("json body")
}

/// The id at the end of a `/cats/{id}` or `/toys/{id}` location.
pub fn id_from_location(res: &Response<Bytes>) -> i64 {
    location(res)
        .rsplit('/')
        .next()
        .and_then(|id| id.parse().ok())
        .expect("id in location")
}

pub async fn get<F>(api: &F, path: &str, cookie: Option<&str>) -> Response<Bytes>
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let mut req = warp::test::request().method("GET").path(path);
    if let Some(cookie) = cookie {
        req = req.header("cookie", cookie);
    }
    req.reply(api).await
}

pub async fn post<F>(api: &F, path: &str, body: &str, cookie: Option<&str>) -> Response<Bytes>
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let mut req = warp::test::request()
        .method("POST")
        .path(path)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(body.to_string());
    if let Some(cookie) = cookie {
        req = req.header("cookie", cookie);
    }
    req.reply(api).await
}

/// Registers `username` and returns the session cookie to send back.
pub async fn signup<F>(api: &F, username: &str) -> String
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let res = post(
        api,
        "/accounts/signup",
        &format!(
            "username={}&password1={}&password2={}",
            username, PASSWORD, PASSWORD
        ),
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER, "signup redirects");
    session_cookie(&res).expect("signup sets a session cookie")
}

pub async fn create_cat<F>(api: &F, cookie: &str, name: &str, age: i32) -> i64
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let res = post(
        api,
        "/cats/new",
        &format!(
            "name={}&breed=Tabby&description=Likes+boxes&age={}",
            name, age
        ),
        Some(cookie),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER, "cat created");
    id_from_location(&res)
}

pub async fn create_toy<F>(api: &F, cookie: &str, name: &str, color: &str) -> i64
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let res = post(
        api,
        "/toys/new",
        &format!("name={}&color={}", name, color),
        Some(cookie),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER, "toy created");
    id_from_location(&res)
}

/// The ids of the objects in a JSON array.
pub fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .expect("json array")
        .iter()
        .map(|v| v["id"].as_i64().expect("id"))
        .collect()
}
