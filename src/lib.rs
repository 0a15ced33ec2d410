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

use warp::{Filter, Reply};

pub mod guard;

pub mod auth;
pub mod cat;
pub mod pages;
pub mod toy;

pub mod config;
pub mod db;
pub mod forms;
pub mod memory;
pub mod models;
pub mod store;
pub mod util;

mod error;
pub use error::{handle_rejects, Error, FieldErrors};

pub use auth::SessionKeys;
pub use config::{Config, JWTConfig};
pub use store::{SharedStore, Store};

/// Assembles every route of the service on top of `store`.
pub fn app(
    store: SharedStore,
    keys: SessionKeys,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let keys = Arc::new(keys);

    let pages_api = pages::api();
    let auth_api = auth::api(store.clone(), keys.clone());
    let cat_api = cat::api(store.clone(), keys.clone());
    let toy_api = toy::api(store, keys);

    pages_api
        .or(auth_api)
        .unify()
        .or(cat_api)
        .unify()
        .or(toy_api)
        .unify()
        .with(warp::filters::trace::request())
        .recover(handle_rejects)
}
