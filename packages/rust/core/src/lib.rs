//! Core workflows for lakeexport.
//!
//! This crate ties the crawler and the Markdown converter together into the
//! `crawl`, `build` and `convert` workflows.

pub mod build;
pub mod convert;
pub mod manifest;
pub mod pipeline;
pub mod toc;

pub use build::{BuildOptions, BuildResult, build};
pub use convert::convert_file;
pub use pipeline::crawl;
