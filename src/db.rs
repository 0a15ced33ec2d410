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

use std::{convert::TryFrom, str::FromStr, time::Duration};

use async_trait::async_trait;
use mobc::Connection;
use mobc_postgres::{
    tokio_postgres::{error::SqlState, Config, NoTls},
    PgConnectionManager,
};

use crate::{models::*, store::Store, Error};

pub type Conn = Connection<PgConnectionManager<NoTls>>;
pub type Pool = mobc::Pool<PgConnectionManager<NoTls>>;

const DB_POOL_MAX_OPEN: u64 = 32;
const DB_POOL_MAX_IDLE: u64 = 8;
const DB_POOL_TIMEOUT_SECONDS: u64 = 15;

pub fn create_pool<'a>(db_url: &'a str) -> Result<Pool, Error> {
    let config = Config::from_str(db_url)?;

    let manager = PgConnectionManager::new(config, NoTls);
    Ok(mobc::Pool::builder()
        .max_open(DB_POOL_MAX_OPEN)
        .max_idle(DB_POOL_MAX_IDLE)
        .get_timeout(Some(Duration::from_secs(DB_POOL_TIMEOUT_SECONDS)))
        .build(manager))
}

pub async fn get_db_conn(db_pool: &Pool) -> Result<Conn, Error> {
    Ok(db_pool.get().await?)
}

pub async fn init_db(db_pool: &Pool) -> Result<(), Error> {
    let init_sql = include_str!("init.sql");
    let conn = get_db_conn(db_pool).await?;
    conn.batch_execute(init_sql).await.map_err(Error::DBError)?;
    Ok(())
}

pub async fn uninit_db(db_pool: &Pool) -> Result<(), Error> {
    let uninit_sql = include_str!("uninit.sql");
    let conn = get_db_conn(db_pool).await?;
    conn.batch_execute(uninit_sql)
        .await
        .map_err(Error::DBError)?;
    Ok(())
}

const CAT_COLUMNS: &str = "id, user_id, name, breed, description, age";

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        PgStore { pool }
    }

    async fn conn(&self) -> Result<Conn, Error> {
        get_db_conn(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, username: &str, credentials: &Credentials) -> Result<User, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let row = tx
            .query_one(
                "INSERT INTO users (username) VALUES ($1) RETURNING id, username",
                &[&username],
            )
            .await
            .map_err(|e| match e.code() {
                Some(code) if *code == SqlState::UNIQUE_VIOLATION => Error::Conflict,
                _ => Error::DBError(e),
            })?;
        let user = User::from(&row);
        tx.execute(
            "INSERT INTO user_auths (user_id, password_hash) VALUES ($1, $2)",
            &[&user.id, &credentials.password_hash],
        )
        .await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<(User, Credentials)>, Error> {
        let row = self
            .conn()
            .await?
            .query_opt(
                r#"
                SELECT users.id, users.username, user_auths.password_hash
                FROM users JOIN user_auths ON user_auths.user_id = users.id
                WHERE users.username = $1
                "#,
                &[&username],
            )
            .await?;
        Ok(row.map(|row| {
            (
                User::from(&row),
                Credentials {
                    password_hash: row.get("password_hash"),
                },
            )
        }))
    }

    async fn cats_for_owner(&self, owner: i32) -> Result<Vec<Cat>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                format!(
                    "SELECT {} FROM cats WHERE user_id = $1 ORDER BY age DESC, id",
                    CAT_COLUMNS
                )
                .as_str(),
                &[&owner],
            )
            .await?;
        Ok(rows.iter().map(Cat::from).collect())
    }

    async fn cat(&self, owner: i32, id: i32) -> Result<Option<Cat>, Error> {
        let row = self
            .conn()
            .await?
            .query_opt(
                format!(
                    "SELECT {} FROM cats WHERE id = $1 AND user_id = $2",
                    CAT_COLUMNS
                )
                .as_str(),
                &[&id, &owner],
            )
            .await?;
        Ok(row.as_ref().map(Cat::from))
    }

    async fn create_cat(&self, owner: i32, cat: &NewCat) -> Result<Cat, Error> {
        let row = self
            .conn()
            .await?
            .query_one(
                format!(
                    r#"
                    INSERT INTO cats (user_id, name, breed, description, age)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {}
                    "#,
                    CAT_COLUMNS
                )
                .as_str(),
                &[&owner, &cat.name, &cat.breed, &cat.description, &cat.age],
            )
            .await?;
        Ok(Cat::from(&row))
    }

    async fn update_cat(
        &self,
        owner: i32,
        id: i32,
        changes: &CatChanges,
    ) -> Result<Option<Cat>, Error> {
        let row = self
            .conn()
            .await?
            .query_opt(
                format!(
                    r#"
                    UPDATE cats
                    SET breed = $1, description = $2, age = $3
                    WHERE id = $4 AND user_id = $5
                    RETURNING {}
                    "#,
                    CAT_COLUMNS
                )
                .as_str(),
                &[
                    &changes.breed,
                    &changes.description,
                    &changes.age,
                    &id,
                    &owner,
                ],
            )
            .await?;
        Ok(row.as_ref().map(Cat::from))
    }

    async fn delete_cat(&self, owner: i32, id: i32) -> Result<bool, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let owned = tx
            .query_opt(
                "SELECT id FROM cats WHERE id = $1 AND user_id = $2 FOR UPDATE",
                &[&id, &owner],
            )
            .await?
            .is_some();
        if !owned {
            return Ok(false);
        }
        tx.execute("DELETE FROM feedings WHERE cat_id = $1", &[&id])
            .await?;
        tx.execute("DELETE FROM cat_toys WHERE cat_id = $1", &[&id])
            .await?;
        tx.execute("DELETE FROM cats WHERE id = $1", &[&id]).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn toys_for_cat(&self, cat: i32) -> Result<Vec<Toy>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                r#"
                SELECT toys.id, toys.name, toys.color
                FROM toys JOIN cat_toys ON cat_toys.toy_id = toys.id
                WHERE cat_toys.cat_id = $1
                ORDER BY toys.id
                "#,
                &[&cat],
            )
            .await?;
        Ok(rows.iter().map(Toy::from).collect())
    }

    async fn toys_not_for_cat(&self, cat: i32) -> Result<Vec<Toy>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                r#"
                SELECT id, name, color FROM toys
                WHERE id NOT IN (SELECT toy_id FROM cat_toys WHERE cat_id = $1)
                ORDER BY id
                "#,
                &[&cat],
            )
            .await?;
        Ok(rows.iter().map(Toy::from).collect())
    }

    async fn associate_toy(&self, cat: i32, toy: i32) -> Result<(), Error> {
        self.conn()
            .await?
            .execute(
                r#"
                INSERT INTO cat_toys (cat_id, toy_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
                &[&cat, &toy],
            )
            .await
            .map_err(|e| match e.code() {
                Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => Error::NotFound,
                _ => Error::DBError(e),
            })?;
        Ok(())
    }

    async fn feedings_for_cat(&self, cat: i32) -> Result<Vec<Feeding>, Error> {
        let rows = self
            .conn()
            .await?
            .query(
                r#"
                SELECT id, cat_id, date, meal FROM feedings
                WHERE cat_id = $1
                ORDER BY date DESC, id
                "#,
                &[&cat],
            )
            .await?;
        rows.iter().map(Feeding::try_from).collect()
    }

    async fn add_feeding(&self, cat: i32, feeding: &FeedingInput) -> Result<Feeding, Error> {
        let row = self
            .conn()
            .await?
            .query_one(
                r#"
                INSERT INTO feedings (cat_id, date, meal)
                VALUES ($1, $2, $3)
                RETURNING id, cat_id, date, meal
                "#,
                &[&cat, &feeding.date, &feeding.meal.code()],
            )
            .await
            .map_err(|e| match e.code() {
                Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => Error::NotFound,
                _ => Error::DBError(e),
            })?;
        Feeding::try_from(&row)
    }

    async fn toys(&self) -> Result<Vec<Toy>, Error> {
        let rows = self
            .conn()
            .await?
            .query("SELECT id, name, color FROM toys ORDER BY id", &[])
            .await?;
        Ok(rows.iter().map(Toy::from).collect())
    }

    async fn toy(&self, id: i32) -> Result<Option<Toy>, Error> {
        let row = self
            .conn()
            .await?
            .query_opt("SELECT id, name, color FROM toys WHERE id = $1", &[&id])
            .await?;
        Ok(row.as_ref().map(Toy::from))
    }

    async fn create_toy(&self, toy: &ToyInput) -> Result<Toy, Error> {
        let row = self
            .conn()
            .await?
            .query_one(
                "INSERT INTO toys (name, color) VALUES ($1, $2) RETURNING id, name, color",
                &[&toy.name, &toy.color],
            )
            .await?;
        Ok(Toy::from(&row))
    }

    async fn update_toy(&self, id: i32, toy: &ToyInput) -> Result<Option<Toy>, Error> {
        let row = self
            .conn()
            .await?
            .query_opt(
                r#"
                UPDATE toys SET name = $1, color = $2
                WHERE id = $3
                RETURNING id, name, color
                "#,
                &[&toy.name, &toy.color, &id],
            )
            .await?;
        Ok(row.as_ref().map(Toy::from))
    }

    async fn delete_toy(&self, id: i32) -> Result<bool, Error> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        tx.execute("DELETE FROM cat_toys WHERE toy_id = $1", &[&id])
            .await?;
        let deleted = tx.execute("DELETE FROM toys WHERE id = $1", &[&id]).await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }
}
