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

use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_DATABASE_URL: &str = "postgres://postgres@0.0.0.0:5432";
const DEFAULT_SESSION_TTL_SECONDS: u64 = 604800;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Storage {
    Postgres,
    Memory,
}

impl FromStr for Storage {
    type Err = String;

    fn from_str(s: &str) -> Result<Storage, String> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Storage::Postgres),
            "memory" => Ok(Storage::Memory),
            other => Err(format!("unknown storage backend `{}`", other)),
        }
    }
}

/// How session tokens are signed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum JWTConfig {
    Secret(String),
    Rsa { private: PathBuf, public: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage: Storage,
    pub database_url: String,
    /// `None` signs with a secret generated at startup.
    pub jwt: Option<JWTConfig>,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt = match lookup("JWT_SECRET") {
            Some(secret) => Some(JWTConfig::Secret(secret)),
            None => match (lookup("JWT_PRIVATE_KEY"), lookup("JWT_PUBLIC_KEY")) {
                (Some(private), Some(public)) => Some(JWTConfig::Rsa {
                    private: PathBuf::from(private),
                    public: PathBuf::from(public),
                }),
                (None, None) => None,
                _ => {
                    return Err(Error::Config(
                        "JWT_PRIVATE_KEY and JWT_PUBLIC_KEY must be set together".to_string(),
                    ))
                }
            },
        };

        Ok(Config {
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?,
            storage: parse_or(&lookup, "STORAGE", "postgres")?,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt,
            session_ttl: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_TTL_SECONDS",
                &DEFAULT_SESSION_TTL_SECONDS.to_string(),
            )?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        tracing::debug!("{} not set, using default: {}", key, default);
        default.to_string()
    });
    raw.parse()
        .map_err(|e| Error::Config(format!("invalid {} value `{}`: {}", key, raw, e)))
}
