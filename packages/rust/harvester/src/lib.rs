//! Document downloads for the Oireachtas corpus.
//!
//! This crate provides:
//! - [`Downloader`]: bounded-concurrency fetch of listed documents to disk
//! - [`file_name`]: deterministic local names derived from reference metadata
//! - [`ensure_cached`]: one-shot fetch of a prebuilt corpus file

pub mod cache;
pub mod engine;

pub use cache::ensure_cached;
pub use engine::{DownloadFailure, DownloadReport, Downloader, compute_hash, file_name};
