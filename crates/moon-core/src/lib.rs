#![deny(missing_docs)]

//! # moon-core: Foundational Types for the Moon Agent Tracker
//!
//! Shared primitives used by the ingestion pipeline, the aggregation job,
//! and the agent API. No internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** An [`ObjectKey`] is not a
//!    [`Fingerprint`] is not a [`SqlIdentifier`]; each is validated or derived
//!    at construction time.
//!
//! 2. **Fingerprints are name-derived.** [`Fingerprint::of_key`] hashes the
//!    base name of an object key, never its content. Two files with the same
//!    base name share a fingerprint.
//!
//! 3. **Structured errors.** [`ValidationError`] via `thiserror`; no
//!    `.unwrap()` outside tests.

pub mod contact;
pub mod error;
pub mod fingerprint;
pub mod ident;

pub use contact::{EmailAddress, PhoneNumber};
pub use error::ValidationError;
pub use fingerprint::{Fingerprint, ObjectKey};
pub use ident::SqlIdentifier;
