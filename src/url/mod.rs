//! URL handling module for Sitedex
//!
//! This module provides URL normalization for the visited set, host
//! extraction for politeness bookkeeping, and host scoping for link following.

mod domain;
mod matcher;
mod normalize;

pub use domain::extract_host;
pub use matcher::{matches_wildcard, HostScope};
pub use normalize::{normalize_url, strip_fragment};
