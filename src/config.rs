//! Server configuration loaded from environment variables
//!
//! | Env Var           | Default     |
//! |-------------------|-------------|
//! | `PORT`            | `8080`      |
//! | `DATABASE_URL`    | `data.db`   |
//! | `AUCTION_OVERHEAD`| `500`       |
//! | `ADMIN_EMAIL`     | unset       |
//! | `ADMIN_USERNAME`  | `admin`     |
//! | `ADMIN_TOKEN`     | unset       |
//!
//! When both `ADMIN_EMAIL` and `ADMIN_TOKEN` are set, that admin is seeded
//! at startup.

use std::env;

use crate::calculator::DEFAULT_AUCTION_OVERHEAD;
use crate::database::Settings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

/// Bootstrap administrator seeded at startup
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub auction_overhead: f64,
    pub admin: Option<AdminSeed>,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(var)
    }

    /// Reads configuration through `lookup`, which returns a value for a set variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                expected: "a valid port number",
                value: raw,
            })?,
            None => 8080,
        };

        let database_path = lookup("DATABASE_URL").unwrap_or_else(|| "data.db".to_string());

        let auction_overhead = match lookup("AUCTION_OVERHEAD") {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => v,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "AUCTION_OVERHEAD",
                        expected: "a non-negative number",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_AUCTION_OVERHEAD,
        };

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_TOKEN")) {
            (Some(email), Some(token)) => Some(AdminSeed {
                username: lookup("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                email,
                token,
            }),
            (Some(_), None) => return Err(ConfigError::Incomplete("ADMIN_EMAIL", "ADMIN_TOKEN")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("ADMIN_TOKEN", "ADMIN_EMAIL")),
            (None, None) => None,
        };

        Ok(Self {
            port,
            database_path,
            auction_overhead,
            admin,
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            auction_overhead: self.auction_overhead,
        }
    }
}
