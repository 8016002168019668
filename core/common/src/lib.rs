//! Common utilities and types shared across IronVault modules.
//!
//! This module provides the error taxonomy used by every crate in the
//! workspace and the identity types handed to the vault engine by the
//! authentication layer.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FileId, Principal, Role, SensitiveBytes, UserId};
