//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, currently only the HTTP
//! server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::session;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_secret: session_opts.secret,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_cookie_name: session_opts.cookie_name,
        session_cookie_secure: session_opts.cookie_secure,
        bcrypt_cost: session_opts.bcrypt_cost,
    }))
}
