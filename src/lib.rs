//! A fixed-capacity generational object pool.
//!
//! [`Pool`] pre-allocates a bounded set of reusable slots and hands out
//! [`Handle`]s - indirect, validity-checked references - instead of raw
//! indices, so long-running frame-stepped systems can allocate and release
//! objects at high frequency without allocator churn and without a handle to
//! a freed slot ever aliasing the slot's next occupant.
//!
//! Allocate and free are O(1) through an intrusive free list threaded over
//! the free slots; staleness detection needs no bookkeeping because every
//! allocation stamps the slot with a fresh generation and handles carry the
//! stamp they were issued under.
//!
//! On every allocation the pool runs a [`ResetStrategy`] over the reused
//! payload before the caller's initializer, so state from the previous
//! occupant never leaks into the new logical object. [`RegistryReset`] is the
//! batteries-included strategy: payload types declare which fields
//! participate via [`Resettable`], and a [`ResetRegistry`] maps field types
//! to canonical fresh values or in-place reset procedures.
//!
//! The pool is single-threaded by design: it is meant to be driven once per
//! simulation step from one logical thread, and mutating operations take
//! `&mut self` so iteration and mutation cannot overlap.

mod handle;
mod pool;
mod reset;

#[cfg(test)]
mod testing;

pub use handle::Handle;
pub use pool::{BuildError, Handles, Iter, IterMut, Pool, PoolError};
pub use reset::{NoReset, RegistryReset, Resettable, ResetError, ResetPass, ResetRegistry, ResetStrategy};
