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

use std::{convert::TryFrom, fmt, str::FromStr};

use chrono::NaiveDate;
use mobc_postgres::tokio_postgres::row::Row;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The query type of a user entry.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
}

impl<'a> From<&'a Row> for User {
    fn from(item: &'a Row) -> Self {
        User {
            id: item.get("id"),
            username: item.get("username"),
        }
    }
}

/// The stored password material of a user.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Argon2 hash in PHC string format, salt included.
    pub password_hash: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub breed: String,
    pub description: String,
    pub age: i32,
}

impl<'a> From<&'a Row> for Cat {
    fn from(item: &'a Row) -> Self {
        Cat {
            id: item.get("id"),
            user_id: item.get("user_id"),
            name: item.get("name"),
            breed: item.get("breed"),
            description: item.get("description"),
            age: item.get("age"),
        }
    }
}

/// The insertion type of a new cat. The owner is supplied separately.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewCat {
    pub name: String,
    pub breed: String,
    pub description: String,
    pub age: i32,
}

/// An update to a cat entry. The name cannot change once created.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CatChanges {
    pub breed: String,
    pub description: String,
    pub age: i32,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Toy {
    pub id: i32,
    pub name: String,
    pub color: String,
}

impl<'a> From<&'a Row> for Toy {
    fn from(item: &'a Row) -> Self {
        Toy {
            id: item.get("id"),
            name: item.get("name"),
            color: item.get("color"),
        }
    }
}

/// The insertion and update type of a toy.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ToyInput {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Meal {
    #[serde(rename = "B")]
    Breakfast,
    #[serde(rename = "L")]
    Lunch,
    #[serde(rename = "D")]
    Dinner,
}

impl Meal {
    pub const ALL: [Meal; 3] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner];

    pub fn code(self) -> &'static str {
        match self {
            Meal::Breakfast => "B",
            Meal::Lunch => "L",
            Meal::Dinner => "D",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Meal::Breakfast => "Breakfast",
            Meal::Lunch => "Lunch",
            Meal::Dinner => "Dinner",
        }
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
#[error("unknown meal code `{0}`")]
pub struct UnknownMeal(pub String);

impl FromStr for Meal {
    type Err = UnknownMeal;

    fn from_str(s: &str) -> Result<Meal, UnknownMeal> {
        Meal::ALL
            .iter()
            .copied()
            .find(|meal| meal.code() == s)
            .ok_or_else(|| UnknownMeal(s.to_string()))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Feeding {
    pub id: i32,
    pub cat_id: i32,
    pub date: NaiveDate,
    pub meal: Meal,
}

impl<'a> TryFrom<&'a Row> for Feeding {
    type Error = Error;

    fn try_from(item: &'a Row) -> Result<Self, Error> {
        let meal: String = item.try_get("meal")?;
        Ok(Feeding {
            id: item.try_get("id")?,
            cat_id: item.try_get("cat_id")?,
            date: item.try_get("date")?,
            meal: meal.parse()?,
        })
    }
}

/// A validated feeding submission, not yet bound to a cat.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FeedingInput {
    pub date: NaiveDate,
    pub meal: Meal,
}

/// Whether every meal of `today` has been recorded among `feedings`.
pub fn fed_for_today(feedings: &[Feeding], today: NaiveDate) -> bool {
    feedings.iter().filter(|f| f.date == today).count() >= Meal::ALL.len()
}
