//! Auth handlers and the session subsystem.
//!
//! - `password`: bcrypt digests.
//! - `token`: HMAC-signed, stateless session tokens.
//! - `session`: the session cookie (issue, clear, read).
//! - `principal`: the access guard, exposed as the `Identity` and `Owner`
//!   extractors.
//!
//! ## Secret
//!
//! All instances must share the same session secret. Rotating it invalidates
//! every issued cookie.

pub mod login;
pub mod password;
pub mod principal;
pub mod register;
pub mod session;
mod state;
mod storage;
pub mod token;
mod utils;

pub use principal::{Identity, Owner};
pub use state::{AuthConfig, AuthState};
