//! # Write-Through Persistence
//!
//! Free functions over `&PgPool` for the `agent` and `product` tables. The
//! pool itself comes from [`moon_db::init_pool`].

pub mod agents;
pub mod products;
