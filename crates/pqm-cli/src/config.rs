//! Connection settings, read from flags or the environment.
//!
//! `.env` is loaded before argument parsing, so `DATABASE_URL` and
//! `PQM_IDENTITY_COLUMN` may live there.

use clap::Args;
use pqm::ReconcileOptions;
use tokio_postgres::{Client, NoTls};

#[derive(Debug, Args)]
pub struct DbArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Generated primary-key column, skipped when reading tables
    #[arg(long, env = "PQM_IDENTITY_COLUMN", default_value = "id")]
    pub identity_column: String,
}

impl DbArgs {
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions::default().identity_column(&self.identity_column)
    }

    /// Connect and spawn the connection driver.
    pub async fn connect(&self) -> Result<Client, CliError> {
        let (client, connection) = tokio_postgres::connect(&self.database_url, NoTls)
            .await
            .map_err(|source| CliError::Connect {
                url: mask_password(&self.database_url),
                source,
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("connection error: {}", e);
            }
        });

        tracing::debug!(url = %mask_password(&self.database_url), "connected");
        Ok(client)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        source: tokio_postgres::Error,
    },

    #[error("table {0} has no columns besides the identity column (or does not exist)")]
    TableNotFound(String),

    #[error(transparent)]
    Pqm(#[from] pqm::Error),
}

/// Mask password in database URL for display
///
/// Handles both the URL form and the `key=value` form.
pub fn mask_password(url: &str) -> String {
    let Some(start) = url.find("://") else {
        return mask_keyword_password(url);
    };
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    if at < start {
        return url.to_string();
    }
    let userinfo = &url[start + 3..at];
    match userinfo.find(':') {
        Some(colon) => format!("{}{}:***{}", &url[..start + 3], &userinfo[..colon], &url[at..]),
        None => url.to_string(),
    }
}

/// `password=secret` and `password = 'it''s'` both become `password=***`.
fn mask_keyword_password(conninfo: &str) -> String {
    let mut out = String::with_capacity(conninfo.len());
    let mut rest = conninfo;

    while let Some(pos) = find_password_key(rest) {
        let (before, after) = rest.split_at(pos);
        out.push_str(before);
        out.push_str("password=***");

        let value = after["password".len()..].trim_start();
        let value = value.strip_prefix('=').unwrap_or(value).trim_start();
        rest = &value[value_len(value)..];
    }
    out.push_str(rest);
    out
}

/// Byte offset of a `password` key that is followed by `=`.
fn find_password_key(s: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = s[from..].find("password") {
        let pos = from + found;
        let at_word_start = s[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace());
        let followed_by_eq = s[pos + "password".len()..].trim_start().starts_with('=');
        if at_word_start && followed_by_eq {
            return Some(pos);
        }
        from = pos + "password".len();
    }
    None
}

/// Length of a conninfo value: quoted with `''` or `\'` escapes, or up to whitespace.
fn value_len(value: &str) -> usize {
    let Some(quoted) = value.strip_prefix('\'') else {
        return value.find(char::is_whitespace).unwrap_or(value.len());
    };
    let mut chars = quoted.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\'' if chars.peek().is_some_and(|&(_, n)| n == '\'') => {
                chars.next();
            }
            '\'' => return i + 2,
            _ => {}
        }
    }
    value.len()
}
