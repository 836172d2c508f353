//! Repository layer over the `users`/`children` tables.
//!
//! # Responsibility
//! - Keep SQL details inside the persistence boundary.
//! - Return plain rows; identity tracking and notifications belong to `orm`.
//!
//! # Invariants
//! - Child rows are always returned ordered by id.
//! - Pending graphs are written atomically.

pub mod entity_repo;
