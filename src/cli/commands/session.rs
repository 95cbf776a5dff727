//! Session cookie and credential hashing arguments.

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_INSECURE_COOKIES: &str = "insecure-cookies";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

/// Placeholder secret shipped by older deployments; never accepted.
const PLACEHOLDER_SECRET: &str = "change-me-in-production";
const RECOMMENDED_SECRET_LEN: usize = 32;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session cookies")
                .long_help(
                    "Secret used to sign session cookies. It must stay stable across restarts; changing it logs every user out.",
                )
                .env("HOSTELRY_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("HOSTELRY_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Name of the session cookie")
                .env("HOSTELRY_SESSION_COOKIE_NAME")
                .default_value("hostelry_session"),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIES)
                .long(ARG_INSECURE_COOKIES)
                .help("Omit the Secure cookie attribute (plain HTTP local development only)")
                .env("HOSTELRY_INSECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt work factor for new password digests")
                .env("HOSTELRY_BCRYPT_COST")
                .default_value("12")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub ttl_seconds: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if the secret is missing, empty or the known placeholder.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .context("missing required argument: --session-secret")?;
        let secret = validate_secret(SecretString::from(secret))?;

        let cookie_name = matches
            .get_one::<String>(ARG_SESSION_COOKIE_NAME)
            .cloned()
            .unwrap_or_else(|| "hostelry_session".to_string());
        if !valid_cookie_name(&cookie_name) {
            return Err(anyhow!("invalid session cookie name: {cookie_name}"));
        }

        let cookie_secure = !matches.get_flag(ARG_INSECURE_COOKIES);
        if !cookie_secure {
            warn!("Session cookies are issued without the Secure attribute");
        }

        Ok(Self {
            secret,
            ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            cookie_name,
            cookie_secure,
            bcrypt_cost: matches
                .get_one::<u32>(ARG_BCRYPT_COST)
                .copied()
                .unwrap_or(bcrypt::DEFAULT_COST),
        })
    }
}

fn validate_secret(secret: SecretString) -> Result<SecretString> {
    let value = secret.expose_secret().trim();
    if value.is_empty() {
        return Err(anyhow!("session secret must not be empty"));
    }
    if value == PLACEHOLDER_SECRET {
        return Err(anyhow!("session secret is the well-known placeholder, set a real secret"));
    }
    if value.len() < RECOMMENDED_SECRET_LEN {
        warn!(
            "Session secret is shorter than {} bytes, consider a longer random value",
            RECOMMENDED_SECRET_LEN
        );
    }
    Ok(secret)
}

// RFC 6265 token characters.
fn valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_secret_rejects_empty_and_placeholder() {
        assert!(validate_secret(SecretString::from("  ")).is_err());
        assert!(validate_secret(SecretString::from(PLACEHOLDER_SECRET)).is_err());
        assert!(validate_secret(SecretString::from("short-but-accepted")).is_ok());
    }

    #[test]
    fn cookie_name_must_be_a_token() {
        assert!(valid_cookie_name("hostelry_session"));
        assert!(!valid_cookie_name(""));
        assert!(!valid_cookie_name("bad name"));
        assert!(!valid_cookie_name("bad;name"));
    }
}
