//! Core domain types and shared logic for the ibed media store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content fingerprints (the identity and dedup key of every payload)
//! - Media type detection for accepted image formats
//! - Image and user records in their persisted encoding
//! - Configuration

pub mod config;
pub mod content_key;
pub mod error;
pub mod fingerprint;
pub mod image;
pub mod media;
pub mod user;

pub use content_key::ContentKey;
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FingerprintHasher, fingerprint_async_reader, fingerprint_reader};
pub use image::{ImageRecord, normalize_tags};
pub use media::{MediaType, extension_from_filename, normalize_extension};
pub use user::{ADMIN_USERNAME, UserId, UserRecord, validate_username};
