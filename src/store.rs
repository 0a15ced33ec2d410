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

use async_trait::async_trait;

use crate::{
    config::{Config, Storage},
    db,
    memory::MemStore,
    models::*,
    Error,
};

/// The persistence operations the request handlers rely on.
///
/// Cat lookups take the requesting user's id and only see that user's cats;
/// an id owned by someone else behaves exactly like a missing one.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with [`Error::Conflict`] when the username is taken.
    async fn create_user(&self, username: &str, credentials: &Credentials) -> Result<User, Error>;

    async fn find_credentials(&self, username: &str) -> Result<Option<(User, Credentials)>, Error>;

    /// The owner's cats by age, eldest first.
    async fn cats_for_owner(&self, owner: i32) -> Result<Vec<Cat>, Error>;

    async fn cat(&self, owner: i32, id: i32) -> Result<Option<Cat>, Error>;

    async fn create_cat(&self, owner: i32, cat: &NewCat) -> Result<Cat, Error>;

    async fn update_cat(
        &self,
        owner: i32,
        id: i32,
        changes: &CatChanges,
    ) -> Result<Option<Cat>, Error>;

    /// Removes the cat together with its feedings and toy associations.
    async fn delete_cat(&self, owner: i32, id: i32) -> Result<bool, Error>;

    async fn toys_for_cat(&self, cat: i32) -> Result<Vec<Toy>, Error>;

    /// Every toy not associated with the cat.
    async fn toys_not_for_cat(&self, cat: i32) -> Result<Vec<Toy>, Error>;

    /// Associating an already associated toy is a no-op.
    async fn associate_toy(&self, cat: i32, toy: i32) -> Result<(), Error>;

    /// Newest first.
    async fn feedings_for_cat(&self, cat: i32) -> Result<Vec<Feeding>, Error>;

    async fn add_feeding(&self, cat: i32, feeding: &FeedingInput) -> Result<Feeding, Error>;

    async fn toys(&self) -> Result<Vec<Toy>, Error>;

    async fn toy(&self, id: i32) -> Result<Option<Toy>, Error>;

    async fn create_toy(&self, toy: &ToyInput) -> Result<Toy, Error>;

    async fn update_toy(&self, id: i32, toy: &ToyInput) -> Result<Option<Toy>, Error>;

    /// Removes the toy and its associations. Cats are untouched.
    async fn delete_toy(&self, id: i32) -> Result<bool, Error>;
}

pub type SharedStore = Arc<dyn Store>;

/// Opens the store selected by the configuration, creating the schema when
/// backed by PostgreSQL.
pub async fn open(config: &Config) -> Result<SharedStore, Error> {
    match config.storage {
        Storage::Memory => {
            tracing::warn!("using in-memory storage, data is lost on exit");
            Ok(Arc::new(MemStore::new()))
        }
        Storage::Postgres => {
            let pool = db::create_pool(config.database_url.as_str())?;
            db::init_db(&pool).await?;
            tracing::info!("database schema ready");
            Ok(Arc::new(db::PgStore::new(pool)))
        }
    }
}
