//! # Artwork Module
//!
//! Fetches, decodes and caches cover art for the now-playing item.
//!
//! ## Overview
//!
//! This module handles:
//! - Request coalescing (one backend fetch per URI, any number of waiters)
//! - Decoding and downscaling with the `image` crate
//! - Dominant colour extraction for notification tinting
//! - An in-memory cache keyed by URI

pub mod artwork;
pub mod error;

pub use artwork::{Artwork, ArtworkFetcher, ArtworkRequest, ArtworkResult, ArtworkWaiter};
pub use error::{MetadataError, Result};
