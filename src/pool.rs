use std::convert::Infallible;
use std::iter::Enumerate;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use thiserror::Error;

use crate::handle::Handle;
use crate::reset::{NoReset, ResetStrategy};

// Reserved generation for a slot that's free for reuse
const FREE_GENERATION: u64 = 0;

// Sentinel terminating the intrusive free list
const NO_FREE_SLOT: u32 = u32::MAX;

// Source of per-pool identities, so a handle can tell which pool issued it
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid pool capacity: {capacity}")]
    InvalidCapacity { capacity: usize },

    #[error("requested too many items from this pool (capacity: {capacity}) - are you forgetting to free some?")]
    Exhausted { capacity: usize },

    #[error("using a handle with the wrong pool")]
    WrongPool,
}

/// Construction error for the fallible-factory constructor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError<E> {
    #[error("invalid pool capacity: {capacity}")]
    InvalidCapacity { capacity: usize },

    #[error("pool item factory failed: {0}")]
    Factory(E),
}

struct Slot<T> {
    payload: T,
    generation: u64,
    next_free: u32,
}

/// A fixed-capacity pool of pre-allocated objects, so high-frequency
/// allocate/release cycles (particles, transient entities) never touch the
/// allocator after construction.
///
/// The pool never hands out its items directly; it hands out [`Handle`]s.
/// This roundabout surface encourages callers to access an item temporarily
/// rather than holding onto it. A handle stops working the moment its item is
/// freed - each slot carries a generation stamp, a fresh one is assigned on
/// every allocation, and every access compares the handle's stamp against the
/// slot's current one. Stale access is therefore safe to express: [`get`] on
/// a stale handle yields `None`, [`free_item`] on one is a no-op.
///
/// ```
/// use handle_pool::Pool;
///
/// let mut pool = Pool::new(16, String::new).unwrap();
/// let handle = pool.new_item_with(|s| s.push_str("hello")).unwrap();
/// assert_eq!(pool.get(handle).unwrap().map(String::as_str), Some("hello"));
/// pool.free_item(handle).unwrap();
/// assert!(pool.get(handle).unwrap().is_none());
/// ```
///
/// Every allocation runs the pool's [`ResetStrategy`] over the reused payload
/// before the caller's initializer, so leftover state from the previous
/// occupant never leaks into the new logical object. See
/// [`RegistryReset`](crate::RegistryReset) for the rule-table strategy.
///
/// [`get`]: Pool::get
/// [`free_item`]: Pool::free_item
pub struct Pool<T, R: ResetStrategy<T> = NoReset> {
    slots: Vec<Slot<T>>,
    free_head: u32,
    live: usize,
    next_generation: u64,
    id: u64,
    reset: R,
}

impl <T> Pool<T, NoReset> {
    /// A pool whose reset strategy is a no-op. `factory` is invoked exactly
    /// `capacity` times to populate the slots.
    pub fn new(capacity: usize, factory: impl FnMut() -> T) -> Result<Self, PoolError> {
        return Self::with_reset(capacity, factory, NoReset)
    }
}

impl <T, R: ResetStrategy<T>> Pool<T, R> {
    pub fn with_reset(capacity: usize, mut factory: impl FnMut() -> T, reset: R) -> Result<Self, PoolError> {
        let result = Self::try_with_reset(capacity, || Ok::<T, Infallible>(factory()), reset);
        return result.map_err(|error| {
            match error {
                BuildError::InvalidCapacity { capacity } => PoolError::InvalidCapacity { capacity },
                BuildError::Factory(never) => match never {},
            }
        })
    }

    /// Like [`with_reset`](Pool::with_reset), for factories that can fail.
    /// A factory error aborts construction; no partial pool is returned.
    pub fn try_with_reset<E>(
        capacity: usize,
        mut factory: impl FnMut() -> Result<T, E>,
        reset: R,
    ) -> Result<Self, BuildError<E>> {
        // The index space is u32 with u32::MAX reserved as the sentinel
        if capacity == 0 || capacity >= NO_FREE_SLOT as usize {
            return Err(BuildError::InvalidCapacity { capacity })
        }

        let mut slots: Vec<Slot<T>> = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let payload: T = factory().map_err(BuildError::Factory)?;
            let next_free: u32 = if index + 1 == capacity { NO_FREE_SLOT } else { (index + 1) as u32 };
            slots.push(Slot {
                payload,
                generation: FREE_GENERATION,
                next_free,
            });
        }

        let id: u64 = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        debug!("pool {id}: created with capacity {capacity}");

        return Ok(Self {
            slots,
            free_head: 0,
            live: 0,
            next_generation: 1,
            id,
            reset,
        })
    }

    pub fn capacity(&self) -> usize {
        return self.slots.len()
    }

    pub fn len(&self) -> usize {
        return self.live
    }

    pub fn is_empty(&self) -> bool {
        return self.live == 0
    }

    /// Reserves a free slot and returns a handle to it. The slot's payload is
    /// run through the reset strategy but otherwise untouched.
    pub fn new_item(&mut self) -> Result<Handle<T>, PoolError> {
        return self.new_item_with(|_| {})
    }

    /// Reserves a free slot, resets its payload, then runs `init` over it.
    pub fn new_item_with(&mut self, init: impl FnOnce(&mut T)) -> Result<Handle<T>, PoolError> {
        if self.live == self.slots.len() {
            return Err(PoolError::Exhausted { capacity: self.slots.len() })
        }

        let index: u32 = self.free_head;
        let generation: u64 = self.next_generation;
        self.next_generation += 1;

        let slot: &mut Slot<T> = &mut self.slots[index as usize];
        self.free_head = slot.next_free;
        slot.generation = generation;
        self.reset.reset(&mut slot.payload);
        init(&mut slot.payload);
        self.live += 1;

        trace!("pool {}: allocated slot {index} (generation {generation})", self.id);
        return Ok(Handle::new(index, generation, self.id))
    }

    /// Returns the item's slot to the free list and invalidates every handle
    /// to it. Freeing through a stale handle is a harmless no-op, so "I might
    /// have already freed this" needs no bookkeeping on the caller's side.
    pub fn free_item(&mut self, handle: Handle<T>) -> Result<(), PoolError> {
        self.verify_pool(handle)?;

        let index: u32 = handle.index();
        let slot: &mut Slot<T> = &mut self.slots[index as usize];
        if slot.generation != handle.generation() {
            debug!("pool {}: ignoring free of stale {handle:?}", self.id);
            return Ok(())
        }

        slot.generation = FREE_GENERATION;
        slot.next_free = self.free_head;
        self.free_head = index;
        self.live -= 1;

        trace!("pool {}: freed slot {index}", self.id);
        return Ok(())
    }

    /// A reference to the handle's item, `None` if the handle has gone stale.
    /// Presenting a handle issued by a different pool is a caller bug and is
    /// surfaced as [`PoolError::WrongPool`].
    pub fn get(&self, handle: Handle<T>) -> Result<Option<&T>, PoolError> {
        self.verify_pool(handle)?;

        let slot: &Slot<T> = &self.slots[handle.index() as usize];
        if slot.generation != handle.generation() {
            return Ok(None)
        }
        return Ok(Some(&slot.payload))
    }

    /// Mutable counterpart of [`get`](Pool::get). There is exactly one
    /// payload per slot, so mutations made here are visible through any other
    /// still-valid handle to the same slot.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<Option<&mut T>, PoolError> {
        self.verify_pool(handle)?;

        let slot: &mut Slot<T> = &mut self.slots[handle.index() as usize];
        if slot.generation != handle.generation() {
            return Ok(None)
        }
        return Ok(Some(&mut slot.payload))
    }

    /// Whether the handle was issued by this pool and still points at the
    /// occupant it was issued for.
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        return handle.pool() == self.id
            && self.slots[handle.index() as usize].generation == handle.generation()
    }

    /// Handles for every occupied slot, in slot-index order, each carrying
    /// the slot's current generation. The sequence is a snapshot-at-call-time
    /// view; the supported pattern for bulk removal is to collect it into a
    /// `Vec` first and free from that.
    pub fn live_handles(&self) -> Handles<'_, T> {
        return Handles::new(self.slots.iter().enumerate(), self.id)
    }

    /// References to every occupied slot's payload, in slot-index order.
    pub fn iter(&self) -> Iter<'_, T> {
        return Iter::new(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        return IterMut::new(self.slots.iter_mut())
    }

    fn verify_pool(&self, handle: Handle<T>) -> Result<(), PoolError> {
        if handle.pool() != self.id {
            return Err(PoolError::WrongPool)
        }
        return Ok(())
    }
}

pub struct Iter<'a, T> {
    inner: slice::Iter<'a, Slot<T>>,
}

impl <'a, T> Iter<'a, T> {
    fn new(inner: slice::Iter<'a, Slot<T>>) -> Self {
        return Self { inner }
    }
}

impl <'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next() {
                Some(slot) => {
                    if slot.generation != FREE_GENERATION {
                        return Some(&slot.payload)
                    }
                },

                None => return None,
            }
        }
    }
}

pub struct IterMut<'a, T> {
    inner: slice::IterMut<'a, Slot<T>>,
}

impl <'a, T> IterMut<'a, T> {
    fn new(inner: slice::IterMut<'a, Slot<T>>) -> Self {
        return Self { inner }
    }
}

impl <'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next() {
                Some(slot) => {
                    if slot.generation != FREE_GENERATION {
                        return Some(&mut slot.payload)
                    }
                },

                None => return None,
            }
        }
    }
}

pub struct Handles<'a, T> {
    inner: Enumerate<slice::Iter<'a, Slot<T>>>,
    pool: u64,
}

impl <'a, T> Handles<'a, T> {
    fn new(inner: Enumerate<slice::Iter<'a, Slot<T>>>, pool: u64) -> Self {
        return Self { inner, pool }
    }
}

impl <'a, T> Iterator for Handles<'a, T> {
    type Item = Handle<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next() {
                Some((index, slot)) => {
                    if slot.generation != FREE_GENERATION {
                        return Some(Handle::new(index as u32, slot.generation, self.pool))
                    }
                },

                None => return None,
            }
        }
    }
}
