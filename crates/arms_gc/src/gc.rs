mod mark_sweep;
mod options;
mod ptr;
mod tag;

use std::marker::PhantomData;

pub use mark_sweep::{AllocError, Heap, MarkSweep, Tracer, PAYLOAD_ALIGNMENT};
pub use options::HeapOptions;
pub(crate) use ptr::HeapId;
pub use ptr::GcPtr;

/// Contains stats about the live allocations of a heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// The number of live allocations
    pub number_of_blocks: usize,
    /// The sum of the sizes requested for all live allocations
    pub number_of_bytes: usize,
}

/// Contains stats about a single collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// The number of objects reclaimed by the cycle
    pub destroyed_blocks: usize,
    /// The sum of the sizes of the objects reclaimed by the cycle
    pub destroyed_bytes: usize,
    /// The number of objects found reachable by the cycle
    pub marked_blocks: usize,
    /// The live allocations after the cycle completed
    pub live: Stats,
}

/// The `Observer` trait allows receiving of `Event`s.
pub trait Observer {
    type Event;

    fn event(&self, _event: Self::Event) {}
}

/// An `Event` is an event that can be emitted by a heap through the use of an `Observer`. This
/// enables tracking of the heap's behavior which is useful for testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The GC performed an allocation
    Allocation(GcPtr),

    /// A GC cycle started
    Start,

    /// A deallocation took place
    Deallocation(GcPtr),

    /// A GC cycle ended
    End,
}

/// A default implementation of an `Observer` which ensures that the compiler does not generate
/// code for event handling.
#[derive(Clone, Debug)]
pub struct NoopObserver<T> {
    data: PhantomData<T>,
}

impl<T> Observer for NoopObserver<T> {
    type Event = T;
}

impl<T> Default for NoopObserver<T> {
    fn default() -> Self {
        NoopObserver { data: PhantomData }
    }
}
