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

//! In-memory storage.
//!
//! Suitable for development and tests. Everything is lost when the process
//! exits.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{models::*, store::Store, Error};

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<i32, (User, Credentials)>,
    cats: BTreeMap<i32, Cat>,
    toys: BTreeMap<i32, Toy>,
    cat_toys: BTreeSet<(i32, i32)>,
    feedings: BTreeMap<i32, Feeding>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn owned_cat(&self, owner: i32, id: i32) -> Option<&Cat> {
        self.cats.get(&id).filter(|cat| cat.user_id == owner)
    }
}

#[derive(Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, username: &str, credentials: &Credentials) -> Result<User, Error> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|(u, _)| u.username == username) {
            return Err(Error::Conflict);
        }
        let user = User {
            id: tables.next_id(),
            username: username.to_string(),
        };
        tables
            .users
            .insert(user.id, (user.clone(), credentials.clone()));
        Ok(user)
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<(User, Credentials)>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|(u, _)| u.username == username)
            .cloned())
    }

    async fn cats_for_owner(&self, owner: i32) -> Result<Vec<Cat>, Error> {
        let tables = self.tables.read().await;
        let mut cats: Vec<Cat> = tables
            .cats
            .values()
            .filter(|cat| cat.user_id == owner)
            .cloned()
            .collect();
        cats.sort_by(|a, b| b.age.cmp(&a.age));
        Ok(cats)
    }

    async fn cat(&self, owner: i32, id: i32) -> Result<Option<Cat>, Error> {
        Ok(self.tables.read().await.owned_cat(owner, id).cloned())
    }

    async fn create_cat(&self, owner: i32, cat: &NewCat) -> Result<Cat, Error> {
        let mut tables = self.tables.write().await;
        let cat = Cat {
            id: tables.next_id(),
            user_id: owner,
            name: cat.name.clone(),
            breed: cat.breed.clone(),
            description: cat.description.clone(),
            age: cat.age,
        };
        tables.cats.insert(cat.id, cat.clone());
        Ok(cat)
    }

    async fn update_cat(
        &self,
        owner: i32,
        id: i32,
        changes: &CatChanges,
    ) -> Result<Option<Cat>, Error> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .cats
            .get_mut(&id)
            .filter(|cat| cat.user_id == owner)
            .map(|cat| {
                cat.breed = changes.breed.clone();
                cat.description = changes.description.clone();
                cat.age = changes.age;
                cat.clone()
            }))
    }

    async fn delete_cat(&self, owner: i32, id: i32) -> Result<bool, Error> {
        let mut tables = self.tables.write().await;
        if tables.owned_cat(owner, id).is_none() {
            return Ok(false);
        }
        tables.feedings.retain(|_, f| f.cat_id != id);
        tables.cat_toys.retain(|(cat, _)| *cat != id);
        tables.cats.remove(&id);
        Ok(true)
    }

    async fn toys_for_cat(&self, cat: i32) -> Result<Vec<Toy>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .cat_toys
            .range((cat, i32::MIN)..=(cat, i32::MAX))
            .filter_map(|(_, toy)| tables.toys.get(toy).cloned())
            .collect())
    }

    async fn toys_not_for_cat(&self, cat: i32) -> Result<Vec<Toy>, Error> {
        let tables = self.tables.read().await;
        Ok(tables
            .toys
            .values()
            .filter(|toy| !tables.cat_toys.contains(&(cat, toy.id)))
            .cloned()
            .collect())
    }

    async fn associate_toy(&self, cat: i32, toy: i32) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        if !tables.cats.contains_key(&cat) || !tables.toys.contains_key(&toy) {
            return Err(Error::NotFound);
        }
        tables.cat_toys.insert((cat, toy));
        Ok(())
    }

    async fn feedings_for_cat(&self, cat: i32) -> Result<Vec<Feeding>, Error> {
        let tables = self.tables.read().await;
        let mut feedings: Vec<Feeding> = tables
            .feedings
            .values()
            .filter(|f| f.cat_id == cat)
            .cloned()
            .collect();
        feedings.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(feedings)
    }

    async fn add_feeding(&self, cat: i32, feeding: &FeedingInput) -> Result<Feeding, Error> {
        let mut tables = self.tables.write().await;
        if !tables.cats.contains_key(&cat) {
            return Err(Error::NotFound);
        }
        let feeding = Feeding {
            id: tables.next_id(),
            cat_id: cat,
            date: feeding.date,
            meal: feeding.meal,
        };
        tables.feedings.insert(feeding.id, feeding.clone());
        Ok(feeding)
    }

    async fn toys(&self) -> Result<Vec<Toy>, Error> {
        Ok(self.tables.read().await.toys.values().cloned().collect())
    }

    async fn toy(&self, id: i32) -> Result<Option<Toy>, Error> {
        Ok(self.tables.read().await.toys.get(&id).cloned())
    }

    async fn create_toy(&self, toy: &ToyInput) -> Result<Toy, Error> {
        let mut tables = self.tables.write().await;
        let toy = Toy {
            id: tables.next_id(),
            name: toy.name.clone(),
            color: toy.color.clone(),
        };
        tables.toys.insert(toy.id, toy.clone());
        Ok(toy)
    }

    async fn update_toy(&self, id: i32, input: &ToyInput) -> Result<Option<Toy>, Error> {
        let mut tables = self.tables.write().await;
        Ok(tables.toys.get_mut(&id).map(|toy| {
            toy.name = input.name.clone();
            toy.color = input.color.clone();
            toy.clone()
        }))
    }

    async fn delete_toy(&self, id: i32) -> Result<bool, Error> {
        let mut tables = self.tables.write().await;
        if tables.toys.remove(&id).is_none() {
            return Ok(false);
        }
        tables.cat_toys.retain(|(_, toy)| *toy != id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        }
    }

    fn new_cat(name: &str, age: i32) -> NewCat {
        NewCat {
            name: name.to_string(),
            breed: "Tabby".to_string(),
            description: "".to_string(),
            age,
        }
    }

    fn new_toy(name: &str) -> ToyInput {
        ToyInput {
            name: name.to_string(),
            color: "red".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemStore::new();
        store.create_user("alice", &credentials()).await.unwrap();
        assert!(matches!(
            store.create_user("alice", &credentials()).await,
            Err(Error::Conflict)
        ));
        let (user, creds) = store.find_credentials("alice").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(creds, credentials());
        assert!(store.find_credentials("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cats_are_scoped_and_ordered_by_age() {
        let store = MemStore::new();
        let alice = store.create_user("alice", &credentials()).await.unwrap();
        let bob = store.create_user("bob", &credentials()).await.unwrap();

        let kitten = store.create_cat(alice.id, &new_cat("Kit", 1)).await.unwrap();
        let milo = store.create_cat(alice.id, &new_cat("Milo", 3)).await.unwrap();
        let twin = store.create_cat(alice.id, &new_cat("Twin", 3)).await.unwrap();
        store.create_cat(bob.id, &new_cat("Rex", 9)).await.unwrap();

        let ids: Vec<i32> = store
            .cats_for_owner(alice.id)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![milo.id, twin.id, kitten.id]);

        assert!(store.cat(bob.id, milo.id).await.unwrap().is_none());
        assert!(!store.delete_cat(bob.id, milo.id).await.unwrap());
        let changes = CatChanges {
            breed: "Persian".to_string(),
            description: "".to_string(),
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
            .unwrap();
        assert_eq!(updated.name, "Milo");
        assert_eq!(updated.breed, "Persian");
    }

    #[tokio::test]
    async fn association_is_idempotent_and_excluded() {
        let store = MemStore::new();
        let alice = store.create_user("alice", &credentials()).await.unwrap();
        let cat = store.create_cat(alice.id, &new_cat("Milo", 3)).await.unwrap();
        let ball = store.create_toy(&new_toy("ball")).await.unwrap();
        let mouse = store.create_toy(&new_toy("mouse")).await.unwrap();

        store.associate_toy(cat.id, ball.id).await.unwrap();
        store.associate_toy(cat.id, ball.id).await.unwrap();

        assert_eq!(store.toys_for_cat(cat.id).await.unwrap(), vec![ball.clone()]);
        assert_eq!(store.toys_not_for_cat(cat.id).await.unwrap(), vec![mouse]);
        assert!(matches!(
            store.associate_toy(cat.id, 999).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn deleting_a_cat_cascades_to_feedings_and_associations() {
        let store = MemStore::new();
        let alice = store.create_user("alice", &credentials()).await.unwrap();
        let cat = store.create_cat(alice.id, &new_cat("Milo", 3)).await.unwrap();
        let ball = store.create_toy(&new_toy("ball")).await.unwrap();
        store.associate_toy(cat.id, ball.id).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        store
            .add_feeding(
                cat.id,
                &FeedingInput {
                    date,
                    meal: Meal::Lunch,
                },
            )
            .await
            .unwrap();

        assert!(store.delete_cat(alice.id, cat.id).await.unwrap());
        assert!(store.feedings_for_cat(cat.id).await.unwrap().is_empty());
        assert!(store.toys_for_cat(cat.id).await.unwrap().is_empty());
        assert_eq!(store.toys().await.unwrap(), vec![ball]);
    }

    #[tokio::test]
    async fn feedings_are_newest_first() {
        let store = MemStore::new();
        let alice = store.create_user("alice", &credentials()).await.unwrap();
        let cat = store.create_cat(alice.id, &new_cat("Milo", 3)).await.unwrap();
        for day in &[3, 1, 2] {
            let date = NaiveDate::from_ymd_opt(2024, 5, *day).unwrap();
            store
                .add_feeding(
                    cat.id,
                    &FeedingInput {
                        date,
                        meal: Meal::Breakfast,
                    },
                )
                .await
                .unwrap();
        }
        let days: Vec<u32> = store
            .feedings_for_cat(cat.id)
            .await
            .unwrap()
            .iter()
            .map(|f| chrono::Datelike::day(&f.date))
            .collect();
        assert_eq!(days, vec![3, 2, 1]);
        assert!(matches!(
            store
                .add_feeding(
                    999,
                    &FeedingInput {
                        date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                        meal: Meal::Dinner,
                    }
                )
                .await,
            Err(Error::NotFound)
        ));
    }
}
