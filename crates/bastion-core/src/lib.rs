//! Core of the bastion Discord bot: command routing, the dispatch loop, member
//! resolution and the fit plugin.

pub mod bastion;
pub mod chat;
pub mod christmas;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fit;
pub mod logging;
pub mod member;
pub mod recent;
pub mod request;
pub mod router;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::{Error, Result};
