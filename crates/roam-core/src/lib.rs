//! Core value types for the roam token crates.
//!
//! This crate holds validated identifier newtypes, the protocol enums, and
//! the shared error taxonomy. It is deliberately free of codec logic;
//! `roam-token` builds the entity and its JSON handling on top of these
//! primitives.

pub mod error;
pub mod party;
pub mod types;

pub use error::{Error, Result};
pub use party::{CountryCode, PartyId};
pub use types::{AuthId, Language, TokenType, TokenUid, WhitelistType};
