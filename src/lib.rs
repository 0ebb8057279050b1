//! Content distribution core for a social publishing platform.
//!
//! Articles, engagement counters, the follow graph, and a hybrid push/pull
//! feed built on Postgres with Redis in front. Serving layers (HTTP, RPC)
//! sit on top of [`context::AppContext`].

pub mod article;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod domain;
pub mod error;
pub mod feed;
pub mod follow;
pub mod interaction;
pub mod tasks;

#[cfg(test)]
mod testutil;
