//! # API Route Modules
//!
//! - `agents`: sales agent CRUD.
//! - `products`: product CRUD.
//! - `ingestion`: on-demand sales file ingestion.

pub mod agents;
pub mod ingestion;
pub mod products;
