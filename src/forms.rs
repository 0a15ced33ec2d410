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

//! Typed form submissions and their validation.
//!
//! Every mutating operation receives one of the raw `*Form` structs decoded
//! from an urlencoded body. Validation is a pure function from the raw form to
//! a model input, collecting one message per failing field.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::FieldErrors,
    models::{Cat, CatChanges, FeedingInput, Meal, NewCat, Toy, ToyInput},
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const CAT_NAME_MAX: usize = 100;
const CAT_BREED_MAX: usize = 100;
const CAT_DESCRIPTION_MAX: usize = 250;
const TOY_NAME_MAX: usize = 50;
const TOY_COLOR_MAX: usize = 20;
const USERNAME_MAX: usize = 150;
const PASSWORD_MIN: usize = 8;

fn required_text(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &Option<String>,
    max: usize,
) -> String {
    let value = value.as_deref().map(str::trim).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters.", max),
        );
    }
    value.to_string()
}

fn required_age(errors: &mut FieldErrors, value: &Option<String>) -> i32 {
    match value.as_deref().map(str::trim) {
        None | Some("") => {
            errors.add("age", "This field is required.");
            0
        }
        Some(raw) => match raw.parse::<i32>() {
            Ok(age) if age >= 0 => age,
            Ok(_) => {
                errors.add("age", "Ensure this value is greater than or equal to 0.");
                0
            }
            Err(_) => {
                errors.add("age", "Enter a whole number.");
                0
            }
        },
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatForm {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub description: Option<String>,
    pub age: Option<String>,
}

impl CatForm {
    pub fn validate_new(&self) -> Result<NewCat, FieldErrors> {
        let mut errors = FieldErrors::default();
        let cat = NewCat {
            name: required_text(&mut errors, "name", &self.name, CAT_NAME_MAX),
            breed: required_text(&mut errors, "breed", &self.breed, CAT_BREED_MAX),
            description: required_text(
                &mut errors,
                "description",
                &self.description,
                CAT_DESCRIPTION_MAX,
            ),
            age: required_age(&mut errors, &self.age),
        };
        errors.or_value(cat)
    }

    /// Validates an edit. A submitted name is ignored.
    pub fn validate_changes(&self) -> Result<CatChanges, FieldErrors> {
        let mut errors = FieldErrors::default();
        let changes = CatChanges {
            breed: required_text(&mut errors, "breed", &self.breed, CAT_BREED_MAX),
            description: required_text(
                &mut errors,
                "description",
                &self.description,
                CAT_DESCRIPTION_MAX,
            ),
            age: required_age(&mut errors, &self.age),
        };
        errors.or_value(changes)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ToyForm {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl ToyForm {
    pub fn validate(&self) -> Result<ToyInput, FieldErrors> {
        let mut errors = FieldErrors::default();
        let toy = ToyInput {
            name: required_text(&mut errors, "name", &self.name, TOY_NAME_MAX),
            color: required_text(&mut errors, "color", &self.color, TOY_COLOR_MAX),
        };
        errors.or_value(toy)
    }
}

/// The feeding form. Any `cat` field a client sends is not part of it.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FeedingForm {
    pub date: Option<String>,
    pub meal: Option<String>,
}

impl FeedingForm {
    pub fn validate(&self) -> Result<FeedingInput, FieldErrors> {
        let mut errors = FieldErrors::default();
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("date", "This field is required.");
                None
            }
            Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| errors.add("date", "Enter a valid date."))
                .ok(),
        };
        let meal = match self.meal.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("meal", "This field is required.");
                None
            }
            Some(raw) => raw
                .parse::<Meal>()
                .map_err(|_| {
                    errors.add(
                        "meal",
                        "Select a valid choice. That choice is not one of the available choices.",
                    )
                })
                .ok(),
        };
        match (date, meal) {
            (Some(date), Some(meal)) => Ok(FeedingInput { date, meal }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SignupForm {
    pub username: Option<String>,
    pub password1: Option<String>,
    pub password2: Option<String>,
}

/// A validated registration request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signup {
    pub username: String,
    pub password: String,
}

fn valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || "@.+-_".contains(c)
}

impl SignupForm {
    pub fn validate(&self) -> Result<Signup, FieldErrors> {
        let mut errors = FieldErrors::default();
        let username = self.username.as_deref().unwrap_or_default().trim();
        if username.is_empty() {
            errors.add("username", "This field is required.");
        } else if username.chars().count() > USERNAME_MAX
            || !username.chars().all(valid_username_char)
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let password1 = self.password1.as_deref().unwrap_or_default();
        let password2 = self.password2.as_deref().unwrap_or_default();
        if password1.is_empty() {
            errors.add("password1", "This field is required.");
        } else if password1.chars().count() < PASSWORD_MIN {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {} characters.",
                    PASSWORD_MIN
                ),
            );
        } else if password1.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password1", "This password is entirely numeric.");
        }
        if password1 != password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.or_value(Signup {
            username: username.to_string(),
            password: password1.to_string(),
        })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub input: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl Field {
    fn new(name: &'static str, input: &'static str) -> Field {
        Field {
            name,
            input,
            value: None,
            choices: Vec::new(),
        }
    }

    fn value<T: ToString>(mut self, value: T) -> Field {
        self.value = Some(value.to_string());
        self
    }
}

/// The description of a form a client should present and submit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormDescriptor {
    pub action: String,
    pub method: &'static str,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl FormDescriptor {
    fn post<T: Into<String>>(action: T, fields: Vec<Field>) -> FormDescriptor {
        FormDescriptor {
            action: action.into(),
            method: "post",
            fields,
            error_message: None,
        }
    }

    pub fn with_message<T: Into<String>>(mut self, message: T) -> FormDescriptor {
        self.error_message = Some(message.into());
        self
    }

    pub fn new_cat() -> FormDescriptor {
        FormDescriptor::post(
            "/cats/new",
            vec![
                Field::new("name", "text"),
                Field::new("breed", "text"),
                Field::new("description", "textarea"),
                Field::new("age", "number"),
            ],
        )
    }

    pub fn edit_cat(cat: &Cat) -> FormDescriptor {
        FormDescriptor::post(
            format!("/cats/{}/edit", cat.id),
            vec![
                Field::new("breed", "text").value(&cat.breed),
                Field::new("description", "textarea").value(&cat.description),
                Field::new("age", "number").value(cat.age),
            ],
        )
    }

    pub fn feeding(cat_id: i32) -> FormDescriptor {
        let mut meal = Field::new("meal", "select").value(Meal::Breakfast.code());
        meal.choices = Meal::ALL
            .iter()
            .map(|m| Choice {
                value: m.code(),
                label: m.label(),
            })
            .collect();
        FormDescriptor::post(
            format!("/cats/{}/add_feeding", cat_id),
            vec![Field::new("date", "date"), meal],
        )
    }

    /// A field-less form confirming a deletion.
    pub fn confirm_delete<T: Into<String>>(action: T) -> FormDescriptor {
        FormDescriptor::post(action, Vec::new())
    }

    pub fn new_toy() -> FormDescriptor {
        FormDescriptor::post(
            "/toys/new",
            vec![Field::new("name", "text"), Field::new("color", "text")],
        )
    }

    pub fn edit_toy(toy: &Toy) -> FormDescriptor {
        FormDescriptor::post(
            format!("/toys/{}/edit", toy.id),
            vec![
                Field::new("name", "text").value(&toy.name),
                Field::new("color", "text").value(&toy.color),
            ],
        )
    }

    pub fn signup() -> FormDescriptor {
        FormDescriptor::post(
            "/accounts/signup",
            vec![
                Field::new("username", "text"),
                Field::new("password1", "password"),
                Field::new("password2", "password"),
            ],
        )
    }

    pub fn login(next: Option<&str>) -> FormDescriptor {
        let mut fields = vec![
            Field::new("username", "text"),
            Field::new("password", "password"),
        ];
        if let Some(next) = safe_next(next) {
            fields.push(Field::new("next", "hidden").value(next));
        }
        FormDescriptor::post(crate::auth::LOGIN_PATH, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn cat_form_accepts_complete_input() {
        let form = CatForm {
            name: some("Milo"),
            breed: some(" Tabby "),
            description: some("Loves boxes"),
            age: some("3"),
        };
        assert_eq!(
            form.validate_new(),
            Ok(NewCat {
                name: "Milo".to_string(),
                breed: "Tabby".to_string(),
                description: "Loves boxes".to_string(),
                age: 3,
            })
        );
    }

    #[test]
    fn cat_form_reports_each_bad_field() {
        let form = CatForm {
            name: None,
            breed: some(&"x".repeat(CAT_BREED_MAX + 1)),
            description: some("ok"),
            age: some("three"),
        };
        let errors = form.validate_new().unwrap_err();
        assert!(errors.contains("name"));
        assert!(errors.contains("breed"));
        assert!(errors.contains("age"));
        assert!(!errors.contains("description"));
    }

    #[test]
    fn cat_changes_ignore_name() {
        let form = CatForm {
            name: None,
            breed: some("Siamese"),
            description: some("Vocal"),
            age: some("5"),
        };
        let changes = form.validate_changes().unwrap();
        assert_eq!(changes.breed, "Siamese");
        assert_eq!(changes.age, 5);
    }

    #[test]
    fn negative_age_is_rejected() {
        let form = CatForm {
            name: some("Milo"),
            breed: some("Tabby"),
            description: some("-"),
            age: some("-1"),
        };
        assert!(form.validate_new().unwrap_err().contains("age"));
    }

    #[test]
    fn feeding_form_parses_date_and_meal() {
        let form = FeedingForm {
            date: some("2024-05-01"),
            meal: some("D"),
        };
        assert_eq!(
            form.validate(),
            Ok(FeedingInput {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                meal: Meal::Dinner,
            })
        );
    }

    #[test]
    fn feeding_form_rejects_unknown_meal_and_bad_date() {
        let form = FeedingForm {
            date: some("2024-13-01"),
            meal: some("S"),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains("date"));
        assert!(errors.contains("meal"));

        let errors = FeedingForm::default().validate().unwrap_err();
        assert!(errors.contains("date"));
        assert!(errors.contains("meal"));
    }

    #[test]
    fn toy_form_requires_both_fields() {
        let form = ToyForm {
            name: some("Feather wand"),
            color: None,
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains("color"));
        assert!(!errors.contains("name"));
    }

    #[test]
    fn signup_checks_username_and_passwords() {
        let ok = SignupForm {
            username: some("cat.lady+1"),
            password1: some("whiskers123"),
            password2: some("whiskers123"),
        };
        assert_eq!(
            ok.validate(),
            Ok(Signup {
                username: "cat.lady+1".to_string(),
                password: "whiskers123".to_string(),
            })
        );

        let mismatch = SignupForm {
            password2: some("whiskers124"),
            ..ok.clone()
        };
        assert!(mismatch.validate().unwrap_err().contains("password2"));

        let bad_name = SignupForm {
            username: some("cat lady"),
            ..ok.clone()
        };
        assert!(bad_name.validate().unwrap_err().contains("username"));

        let short = SignupForm {
            password1: some("meow"),
            password2: some("meow"),
            ..ok.clone()
        };
        assert!(short.validate().unwrap_err().contains("password1"));

        let numeric = SignupForm {
            password1: some("12345678"),
            password2: some("12345678"),
            ..ok
        };
        assert!(numeric.validate().unwrap_err().contains("password1"));
    }

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next(Some("/cats/1")), Some("/cats/1"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn feeding_descriptor_lists_meal_choices() {
        let form = FormDescriptor::feeding(7);
        assert_eq!(form.action, "/cats/7/add_feeding");
        let meal = form.fields.iter().find(|f| f.name == "meal").unwrap();
        let codes: Vec<&str> = meal.choices.iter().map(|c| c.value).collect();
        assert_eq!(codes, vec!["B", "L", "D"]);
    }
}
