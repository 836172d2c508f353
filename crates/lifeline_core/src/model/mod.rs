//! Entity graph model.
//!
//! # Responsibility
//! - Define the parent (`User`) and child (`Child`) records materialized by
//!   the entity manager.
//!
//! # Invariants
//! - Ids are assigned by the store on flush and never reused.
//! - Every child in a user's collection points back at that user.

pub mod user;
