//! newswire fetches a remote news feed, stores per-item metadata, and
//! concurrently archives each article's full text into SQLite.
//!
//! The interesting part is the fetch pipeline: a [`net::Transport`] with
//! per-host concurrency caps, a retrying [`net::Requester`] on top of it,
//! and the [`crawler::Crawler`] that fans out one body fetch per newly
//! discovered article. [`lifecycle`] bounds one crawl's resource lifetime.

pub mod config;
pub mod crawler;
pub mod export;
pub mod extract;
pub mod lifecycle;
pub mod net;
pub mod storage;
