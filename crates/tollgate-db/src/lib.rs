//! Tollgate DB - Database abstractions
//!
//! SQLx-based database layer for Tollgate services.
//!
//! # Example
//!
//! ```rust,ignore
//! use tollgate_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/tollgate").await?;
//! let repos = Repositories::new(pool);
//!
//! // Use repositories
//! let profile = repos.profiles.find_by_subscriber_id(subscriber_id).await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, DbPool};
pub use repo::*;
