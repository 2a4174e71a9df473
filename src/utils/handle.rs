use std::hash::Hash;
use std::marker::PhantomData;

/// A small typed index into a [`Pool`].
///
/// Handles are cheap to copy and carry a generation counter so that a
/// handle to a released slot can be detected instead of silently
/// aliasing whatever got allocated there next.
#[derive(Debug)]
pub struct Handle<T> {
    pub slot: u16,
    pub generation: u16,
    phantom: PhantomData<T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(slot: u16, generation: u16) -> Self {
        Self {
            slot,
            generation,
            phantom: PhantomData,
        }
    }

    /// A default handle has generation 0, which a pool never hands out.
    pub fn valid(&self) -> bool {
        self.generation != 0
    }

    /// Reinterpret this handle as indexing a pool of a different item type.
    pub(crate) fn retag<U>(self) -> Handle<U> {
        Handle::new(self.slot, self.generation)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self {
            slot: 0,
            generation: 0,
            phantom: PhantomData,
        }
    }
}

/// Generational arena of `T` addressed by [`Handle<T>`].
pub struct Pool<T> {
    items: Vec<Option<T>>,
    empty: Vec<usize>,
    generation: Vec<u16>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        const INITIAL_SIZE: usize = 1024;
        Self::new(INITIAL_SIZE)
    }
}

impl<T> Pool<T> {
    pub fn new(initial_size: usize) -> Self {
        let mut p = Pool {
            items: Vec::with_capacity(initial_size),
            empty: Vec::with_capacity(initial_size),
            // Generation 0 is reserved for the default (invalid) handle.
            generation: vec![1; initial_size],
        };

        p.empty = (0..initial_size).rev().collect();
        p.items.resize_with(initial_size, || None);
        p
    }

    pub fn insert(&mut self, item: T) -> Option<Handle<T>> {
        let empty_slot = self.empty.pop()?;
        self.items[empty_slot] = Some(item);

        Some(Handle::new(empty_slot as u16, self.generation[empty_slot]))
    }

    /// Drop the item behind `handle` and recycle its slot. Stale handles
    /// are ignored so release is idempotent.
    pub fn release(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = handle.slot as usize;
        if slot >= self.items.len() || self.generation[slot] != handle.generation {
            return None;
        }

        let item = self.items[slot].take()?;
        self.generation[slot] = self.generation[slot].wrapping_add(1).max(1);
        self.empty.push(slot);
        Some(item)
    }

    pub fn get_ref(&self, handle: Handle<T>) -> Option<&T> {
        let slot = handle.slot as usize;
        if slot < self.items.len() && self.generation[slot] == handle.generation {
            self.items[slot].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut_ref(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = handle.slot as usize;
        if slot < self.items.len() && self.generation[slot] == handle.generation {
            self.items[slot].as_mut()
        } else {
            None
        }
    }
}
