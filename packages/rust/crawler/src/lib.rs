//! Knowledge-base API client, local metadata store, and crawl engine.
//!
//! This crate provides:
//! - [`client`]: authenticated client for the `/api/v2` endpoints
//! - [`store`]: the on-disk mirror of users, repos and raw documents
//! - [`engine`]: incremental account crawler

pub mod client;
pub mod engine;
pub mod store;

pub use client::ApiClient;
pub use engine::{CrawlOptions, CrawlResult, Crawler};
pub use store::{META_DIR_NAME, MetaStore};
