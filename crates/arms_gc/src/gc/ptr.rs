use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

/// Identifies the heap that handed out a handle, so handles of one heap are never mistaken for
/// handles of another.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub(crate) struct HeapId(u32);

impl HeapId {
    /// Returns an id that differs from every id returned before.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU32 = AtomicU32::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HeapId {
    fn default() -> Self {
        Self::next()
    }
}

/// A `GcPtr` is what you interact with outside of the collector. It identifies an allocation by
/// the index of its tag in the heap's arena together with the generation of that arena slot.
///
/// When an object is swept its slot is recycled with a bumped generation, so a `GcPtr` that
/// outlived its object never refers to whatever was allocated in its place. A `GcPtr` also
/// remembers the heap it was allocated in and is rejected by every other heap.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(C)]
pub struct GcPtr {
    heap: HeapId,
    index: u32,
    generation: u32,
}

impl GcPtr {
    pub(crate) fn new(heap: HeapId, index: u32, generation: u32) -> Self {
        Self {
            heap,
            index,
            generation,
        }
    }

    pub(crate) fn heap(self) -> HeapId {
        self.heap
    }

    /// Returns the index of the arena slot that holds the tag of this object.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the arena slot at the time the object was allocated.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for GcPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GcPtr({}v{}@{})",
            self.index, self.generation, self.heap.0
        )
    }
}
