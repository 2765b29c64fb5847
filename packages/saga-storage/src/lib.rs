//! Read-only access to the library collaborator's interaction records.
//!
//! The library service owns `user_comics` and `comics`; the recommender only
//! ever reads them — per-user rows for profile construction, the full join
//! for collaborative filtering, and two scalars for cache gating.

pub mod db;
pub mod models;
pub mod queries;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
