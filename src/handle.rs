use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A copyable token granting validity-checked access to one slot of a
/// [`Pool`](crate::Pool).
///
/// A handle remembers the slot index, the generation the slot carried when
/// the handle was issued, and the identity of the issuing pool. It never owns
/// the payload; the pool checks the stored generation against the slot's
/// current one on every access, so a handle to a freed (or freed-and-reused)
/// slot simply stops working instead of aliasing the new occupant.
pub struct Handle<T> {
    index: u32,
    generation: u64,
    pool: u64,
    marker: PhantomData<fn() -> T>,
}

impl <T> Handle<T> {
    pub(crate) fn new(index: u32, generation: u64, pool: u64) -> Self {
        return Self {
            index,
            generation,
            pool,
            marker: PhantomData,
        }
    }

    /// The raw slot index. Stable for the pool's lifetime, but meaningless
    /// without the generation check the pool performs on access.
    pub fn index(&self) -> u32 {
        return self.index
    }

    /// The generation stamp the slot carried when this handle was issued.
    pub fn generation(&self) -> u64 {
        return self.generation
    }

    pub(crate) fn pool(&self) -> u64 {
        return self.pool
    }
}

// Manual impls so handles stay Copy/Eq/Hash regardless of T's bounds
impl <T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        return *self
    }
}

impl <T> Copy for Handle<T> {}

impl <T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        return self.index == other.index
            && self.generation == other.generation
            && self.pool == other.pool
    }
}

impl <T> Eq for Handle<T> {}

impl <T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.index);
        state.write_u64(self.generation);
        state.write_u64(self.pool);
    }
}

impl <T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "Handle({}v{})", self.index, self.generation)
    }
}
