//! Classroom game core for spotting fabricated legal citations.
//!
//! Teams rewrite a shared brief with hallucinated citations, swap briefs,
//! flag what looks fake, and are scored on both sides of the exchange.

pub mod brief;
pub mod catalog;
pub mod config;
pub mod game;
pub mod logging;
pub mod mutate;
pub mod offsets;
pub mod records;
pub mod score;
pub mod select;
pub mod storage;
pub mod store;
pub mod validate;
