//! In-memory [`ProjectStore`](cadence_store::ProjectStore) backed by
//! [`DashMap`](dashmap::DashMap) tables.
//!
//! The reference backend for tests and single-process deployments. Unique
//! constraints are enforced the way the production backend's indexes would
//! be; constraint violations surface as
//! [`StoreError::UniqueViolation`](cadence_store::StoreError).

mod store;

pub use store::MemoryStore;
