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

use chrono::Local;
use serde::Serialize;
use warp::{
    reply::{json, Response},
    Filter, Rejection, Reply,
};

use crate::{
    auth::SessionKeys,
    forms::{CatForm, FeedingForm, FormDescriptor},
    guard::{self, Identity},
    models::{fed_for_today, Cat, Feeding, Toy},
    store::SharedStore,
    util, Error,
};

pub const CATS_PATH: &str = "/cats/";

#[inline(always)]
pub fn detail_path(id: i32) -> String {
    format!("/cats/{}", id)
}

pub fn api(
    store: SharedStore,
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let list_cats = warp::path("cats")
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(list_cats);

    let new_cat_form = warp::path("cats")
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and_then(new_cat_form);

    let create_cat = warp::path("cats")
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::form())
        .and(guard::with_store(store.clone()))
        .and_then(create_cat);

    let cat_detail = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(cat_detail);

    let edit_cat_form = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path("edit"))
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(edit_cat_form);

    let update_cat = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path("edit"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::form())
        .and(guard::with_store(store.clone()))
        .and_then(update_cat);

    let confirm_delete_cat = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(confirm_delete_cat);

    let delete_cat = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path("delete"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_store(store.clone()))
        .and_then(delete_cat);

    let add_feeding = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path("add_feeding"))
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::lenient_form())
        .and(guard::with_store(store.clone()))
        .and_then(add_feeding);

    let assoc_toy = warp::path("cats")
        .and(warp::path::param::<i32>())
        .and(warp::path("assoc_toy"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys))
        .and(guard::with_store(store))
        .and_then(assoc_toy);

    list_cats
        .or(new_cat_form)
        .unify()
        .or(create_cat)
        .unify()
        .or(cat_detail)
        .unify()
        .or(edit_cat_form)
        .unify()
        .or(update_cat)
        .unify()
        .or(confirm_delete_cat)
        .unify()
        .or(delete_cat)
        .unify()
        .or(add_feeding)
        .unify()
        .or(assoc_toy)
        .unify()
}

/// Everything the detail view of a cat shows.
#[derive(Debug, Serialize)]
pub struct CatDetail {
    pub cat: Cat,
    pub toys: Vec<Toy>,
    pub feedings: Vec<Feeding>,
    pub fed_for_today: bool,
    /// Toys the cat does not have yet.
    pub available_toys: Vec<Toy>,
    pub feeding_form: FormDescriptor,
}

async fn owned_cat(store: &SharedStore, identity: &Identity, id: i32) -> Result<Cat, Error> {
    store
        .cat(identity.user_id, id)
        .await?
        .ok_or(Error::NotFound)
}

pub async fn list_cats(identity: Identity, store: SharedStore) -> Result<Response, Rejection> {
    let cats = store.cats_for_owner(identity.user_id).await?;
    Ok(json(&cats).into_response())
}

pub async fn new_cat_form(_identity: Identity) -> Result<Response, Rejection> {
    Ok(json(&FormDescriptor::new_cat()).into_response())
}

pub async fn create_cat(
    identity: Identity,
    form: CatForm,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let new_cat = form.validate_new().map_err(Error::Validation)?;
    let cat = store.create_cat(identity.user_id, &new_cat).await?;
    tracing::info!(cat_id = cat.id, user_id = identity.user_id, "cat created");
    Ok(util::see_other(detail_path(cat.id)))
}

pub async fn cat_detail(
    id: i32,
    identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let cat = owned_cat(&store, &identity, id).await?;
    let (toys, available_toys, feedings) = futures::try_join!(
        store.toys_for_cat(cat.id),
        store.toys_not_for_cat(cat.id),
        store.feedings_for_cat(cat.id)
    )?;
    let detail = CatDetail {
        fed_for_today: fed_for_today(&feedings, Local::now().date_naive()),
        feeding_form: FormDescriptor::feeding(cat.id),
        cat,
        toys,
        feedings,
        available_toys,
    };
    Ok(json(&detail).into_response())
}

pub async fn edit_cat_form(
    id: i32,
    identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let cat = owned_cat(&store, &identity, id).await?;
    Ok(json(&FormDescriptor::edit_cat(&cat)).into_response())
}

pub async fn update_cat(
    id: i32,
    identity: Identity,
    form: CatForm,
    store: SharedStore,
) -> Result<Response, Rejection> {
    owned_cat(&store, &identity, id).await?;
    let changes = form.validate_changes().map_err(Error::Validation)?;
    let cat = store
        .update_cat(identity.user_id, id, &changes)
        .await?
        .ok_or(Error::NotFound)?;
    tracing::info!(cat_id = cat.id, "cat updated");
    Ok(util::see_other(detail_path(cat.id)))
}

pub async fn confirm_delete_cat(
    id: i32,
    identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let cat = owned_cat(&store, &identity, id).await?;
    let form = FormDescriptor::confirm_delete(format!("{}/delete", detail_path(cat.id)));
    Ok(json(&serde_json::json!({ "cat": cat, "form": form })).into_response())
}

pub async fn delete_cat(
    id: i32,
    identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    if !store.delete_cat(identity.user_id, id).await? {
        return Err(Error::NotFound.into());
    }
    tracing::info!(cat_id = id, user_id = identity.user_id, "cat deleted");
    Ok(util::see_other(CATS_PATH))
}

/// Records a feeding. Invalid input is dropped without telling the client.
pub async fn add_feeding(
    id: i32,
    identity: Identity,
    form: FeedingForm,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let cat = owned_cat(&store, &identity, id).await?;
    match form.validate() {
        Ok(input) => {
            let feeding = store.add_feeding(cat.id, &input).await?;
            tracing::info!(cat_id = cat.id, feeding_id = feeding.id, "feeding added");
        }
        Err(errors) => {
            tracing::debug!(cat_id = cat.id, %errors, "discarding invalid feeding");
        }
    }
    Ok(util::see_other(detail_path(cat.id)))
}

pub async fn assoc_toy(
    id: i32,
    toy_id: i32,
    identity: Identity,
    store: SharedStore,
) -> Result<Response, Rejection> {
    let cat = owned_cat(&store, &identity, id).await?;
    store.toy(toy_id).await?.ok_or(Error::NotFound)?;
    store.associate_toy(cat.id, toy_id).await?;
    tracing::info!(cat_id = cat.id, toy_id, "toy associated");
    Ok(util::see_other(detail_path(cat.id)))
}
