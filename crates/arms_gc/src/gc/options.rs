/// Options for the construction of a [`MarkSweep`](super::MarkSweep) heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapOptions {
    /// The number of tags to reserve room for up front
    pub initial_capacity: usize,
    /// The maximum number of payload bytes the heap may hold at once. Allocations that would exceed
    /// it fail with [`AllocError::AllocationFailed`](super::AllocError::AllocationFailed).
    pub memory_limit: Option<usize>,
    /// Whether new payloads are zeroed. If not, their contents are uninitialized.
    pub zero_memory: bool,
}

impl Default for HeapOptions {
    fn default() -> Self {
        HeapOptions {
            initial_capacity: 0,
            memory_limit: None,
            zero_memory: true,
        }
    }
}

impl HeapOptions {
    /// Sets the number of tags to reserve room for up front.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Limits the number of payload bytes the heap may hold at once.
    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = Some(memory_limit);
        self
    }

    /// Sets whether new payloads are zeroed.
    pub fn with_zero_memory(mut self, zero_memory: bool) -> Self {
        self.zero_memory = zero_memory;
        self
    }
}
