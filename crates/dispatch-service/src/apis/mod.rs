//! HTTP handlers for the dispatch workflow API.

pub mod auth;
pub mod order;
pub mod verification;
pub mod wallet;
