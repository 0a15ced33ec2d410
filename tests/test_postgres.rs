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

use chrono::NaiveDate;
use warp::http::StatusCode;

use cat_collector::{
    auth,
    db::{self, PgStore},
    models::{CatChanges, FeedingInput, Meal, NewCat, ToyInput},
    Error, SharedStore, Store,
};

mod common;

/// Runs against the database named by `TEST_DATABASE_URL`, and is skipped
/// when none is given. The schema is dropped and recreated.
#[tokio::test]
async fn postgres_store() {
    let url = match common::pg_url() {
        Some(url) => url,
        None => return,
    };
    let pool = db::create_pool(&url).expect("pool created");
    db::uninit_db(&pool).await.expect("schema dropped");
    db::init_db(&pool).await.expect("schema created");
    // A second init is harmless.
    db::init_db(&pool).await.expect("schema kept");
    let store: SharedStore = Arc::new(PgStore::new(pool));

    // Users.
    let alice = store
        .create_user("alice", &auth::new_credentials(common::PASSWORD).unwrap())
        .await
        .expect("user created");
    assert!(matches!(
        store
            .create_user("alice", &auth::new_credentials(common::PASSWORD).unwrap())
            .await,
        Err(Error::Conflict)
    ));
    let (found, credentials) = store
        .find_credentials("alice")
        .await
        .unwrap()
        .expect("credentials stored");
    assert_eq!(found, alice);
    assert!(auth::check_password(&credentials, common::PASSWORD));
    assert!(store.find_credentials("nobody").await.unwrap().is_none());
    let bob = store
        .create_user("bob", &auth::new_credentials(common::PASSWORD).unwrap())
        .await
        .unwrap();

    // Cats.
    let new_cat = |name: &str, age| NewCat {
        name: name.to_string(),
        breed: "Tabby".to_string(),
        description: "Likes boxes".to_string(),
        age,
    };
    let kit = store.create_cat(alice.id, &new_cat("Kit", 1)).await.unwrap();
    let milo = store.create_cat(alice.id, &new_cat("Milo", 3)).await.unwrap();
    let ids: Vec<i32> = store
        .cats_for_owner(alice.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![milo.id, kit.id]);
    assert!(store.cats_for_owner(bob.id).await.unwrap().is_empty());
    assert!(store.cat(bob.id, milo.id).await.unwrap().is_none());

    let changes = CatChanges {
        breed: "Siamese".to_string(),
        description: "Vocal".to_string(),
        age: 4,
    };
    assert!(store
        .update_cat(bob.id, milo.id, &changes)
        .await
        .unwrap()
        .is_none());
    let updated = store
        .update_cat(alice.id, milo.id, &changes)
        .await
        .unwrap()
        .expect("owner can update");
    assert_eq!(updated.name, "Milo");
    assert_eq!(updated.breed, "Siamese");
    assert_eq!(updated.age, 4);

    // Toys and associations.
    let ball = store
        .create_toy(&ToyInput {
            name: "Ball".to_string(),
            color: "red".to_string(),
        })
        .await
        .unwrap();
    let mouse = store
        .create_toy(&ToyInput {
            name: "Mouse".to_string(),
            color: "grey".to_string(),
        })
        .await
        .unwrap();
    store.associate_toy(milo.id, ball.id).await.unwrap();
    store.associate_toy(milo.id, ball.id).await.unwrap();
    assert_eq!(store.toys_for_cat(milo.id).await.unwrap(), vec![ball.clone()]);
    assert_eq!(
        store.toys_not_for_cat(milo.id).await.unwrap(),
        vec![mouse.clone()]
    );
    assert!(matches!(
        store.associate_toy(milo.id, 999_999).await,
        Err(Error::NotFound)
    ));

    // Feedings.
    let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
    for (d, meal) in &[(1, Meal::Breakfast), (3, Meal::Dinner), (2, Meal::Lunch)] {
        store
            .add_feeding(
                milo.id,
                &FeedingInput {
                    date: day(*d),
                    meal: *meal,
                },
            )
            .await
            .unwrap();
    }
    let feedings = store.feedings_for_cat(milo.id).await.unwrap();
    let dates: Vec<NaiveDate> = feedings.iter().map(|f| f.date).collect();
    assert_eq!(dates, vec![day(3), day(2), day(1)]);
    assert_eq!(feedings[0].meal, Meal::Dinner);

    // Deleting a toy leaves the cat; deleting a cat leaves the toys.
    assert!(store.delete_toy(mouse.id).await.unwrap());
    assert!(!store.delete_toy(mouse.id).await.unwrap());
    assert!(!store.delete_cat(bob.id, milo.id).await.unwrap());
    assert!(store.delete_cat(alice.id, milo.id).await.unwrap());
    assert!(store.feedings_for_cat(milo.id).await.unwrap().is_empty());
    assert!(store.toys_for_cat(milo.id).await.unwrap().is_empty());
    assert_eq!(store.toys().await.unwrap(), vec![ball]);

    // The routes work the same over PostgreSQL.
    let api = common::api(store.clone());
    let cookie = common::signup(&api, "carol").await;
    let cat = common::create_cat(&api, &cookie, "Luna", 2).await;
    let res = common::get(&api, &format!("/cats/{}", cat), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(common::body_json(&res)["cat"]["name"], "Luna");
    let res = common::get(&api, &format!("/cats/{}", kit.id), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
