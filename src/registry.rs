//! Database/statement registry: dense, id-indexed slabs. Ids are assigned
//! sequentially and never reused within a registry's lifetime, matching the
//! original core's "dense vector indexed by id" policy rather than a
//! generation-checked slot allocator that would let ids come back.

use crate::error::{Error, Result};

/// A dense, append-only, id-indexed collection. `open` hands out the next
/// id; `close` vacates a slot without shifting any other entry, so ids
/// already handed out stay valid.
pub struct Registry<T> {
    slots: Vec<Option<T>>,
    kind: &'static str,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self { slots: Vec::new(), kind }
    }

    pub fn open(&mut self, value: T) -> u32 {
        let id = u32::try_from(self.slots.len()).expect("registry id overflowed u32");
        self.slots.push(Some(value));
        id
    }

    pub fn get(&self, id: u32) -> Result<&T> {
        self.slots
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::NotFound(format!("no {} with id {id}", self.kind)))
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut T> {
        self.slots
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::NotFound(format!("no {} with id {id}", self.kind)))
    }

    /// Remove and return the entry at `id`, vacating but not shrinking the
    /// slab.
    pub fn close(&mut self, id: u32) -> Result<T> {
        self.slots
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or_else(|| Error::NotFound(format!("no {} with id {id}", self.kind)))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.slots.get(id as usize).is_some_and(Option::is_some)
    }
}
