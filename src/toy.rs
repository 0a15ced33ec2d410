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

use std::sync::Arc;

use warp::{
    reply::{json, Response},
    Filter, Rejection, Reply,
};

use crate::{
    auth::SessionKeys,
    forms::{FormDescriptor, ToyForm},
    guard::{self, Identity},
    models::Toy,
    store::SharedStore,
    util, Error,
};

pub const TOYS_PATH: &str = "/toys/";

#[inline(always)]
pub fn detail_path(id: i32) -> String {
    format!("/toys/{}", id)
}

pub fn api(
    store: SharedStore,
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list_toys = warp::path("toys")
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(list_toys);

    let new_toy_form = warp::path("toys")
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and_then(new_toy_form);

    let create_toy = warp::path("toys")
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::form())
        .and(guard::with_store(store.clone()))
        .and_then(create_toy);

    let toy_detail = warp::path("toys")
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(toy_detail);

    let edit_toy_form = warp::path("toys")
        .and(warp::path::param::<i32>())
        .and(warp::path("edit"))
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(edit_toy_form);

    let update_toy = warp::path("toys")
        .and(warp::path::param::<i32>())
        .and(warp::path("edit"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::form())
        .and(guard::with_store(store.clone()))
        .and_then(update_toy);

    let confirm_delete_toy = warp::path("toys")
        .and(warp::path::param::<i32>())
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(confirm_delete_toy);

    let delete_toy = warp::path("toys")
        .and(warp::path::param::<i32>())
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys))
        .and(guard::with_store(store))
        .and_then(delete_toy);

    list_toys
        .or(new_toy_form)
        .unify()
        .or(create_toy)
        .unify()
        .or(toy_detail)
        .unify()
        .or(edit_toy_form)
        .unify()
        .or(update_toy)
        .unify()
        .or(confirm_delete_toy)
        .unify()
        .or(delete_toy)
        .unify()
}

async fn find_toy(store: &SharedStore, id: i32) -> Result<Toy, Error> {
    store.toy(id).await?.ok_or(Error::NotFound)
}

pub async fn list_toys(_identity: Identity, store: SharedStore) -> Result<Response, Rejection> {
    Ok(json(&store.toys().await?).into_response())
}

pub async fn new_toy_form(_identity: Identity) -> Result<Response, Rejection> {
    Ok(json(&FormDescriptor::new_toy()).into_response())
}

pub async fn create_toy(
    identity: Identity,
    form: ToyForm,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let input = form.validate().map_err(Error::Validation)?;
    let toy = store.create_toy(&input).await?;
    tracing::info!(toy_id = toy.id, user_id = identity.user_id, "toy created");
    Ok(util::see_other(detail_path(toy.id)))
}

pub async fn toy_detail(
    id: i32,
    _identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    Ok(json(&find_toy(&store, id).await?).into_response())
}

pub async fn edit_toy_form(
    id: i32,
    _identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let toy = find_toy(&store, id).await?;
    Ok(json(&FormDescriptor::edit_toy(&toy)).into_response())
}

pub async fn update_toy(
    id: i32,
    identity: Identity,
    form: ToyForm,
    store: SharedStore,
) -> Result<Response, Rejection> {
    find_toy(&store, id).await?;
    let input = form.validate().map_err(Error::Validation)?;
    let toy = store
        .update_toy(id, &input)
        .await?
        .ok_or(Error::NotFound)?;
    tracing::info!(toy_id = toy.id, user_id = identity.user_id, "toy updated");
    Ok(util::see_other(detail_path(toy.id)))
}

pub async fn confirm_delete_toy(
    id: i32,
    _identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let toy = find_toy(&store, id).await?;
    let form = FormDescriptor::confirm_delete(format!("{}/delete", detail_path(toy.id)));
    Ok(json(&serde_json::json!({ "toy": toy, "form": form })).into_response())
}

pub async fn delete_toy(
    id: i32,
    identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    if !store.delete_toy(id).await? {
        return Err(Error::NotFound.into());
    }
    tracing::info!(toy_id = id, user_id = identity.user_id, "toy deleted");
    Ok(util::see_other(TOYS_PATH))
}
