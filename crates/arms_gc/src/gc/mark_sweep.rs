use super::{
    options::HeapOptions,
    tag::{Color, TagArena},
    Event, GcPtr, HeapId, NoopObserver, Observer, RunStats, Stats,
};
use crate::{
    type_table::{Type, TypeBuilder, TypeId, TypeTable, TypeTableError},
    Object,
};
use log::{debug, trace};
use std::{alloc::Layout, fmt, ptr::NonNull};

/// The minimum alignment of every payload, so any payload can hold pointer-sized and 64-bit
/// fields on all targets.
pub const PAYLOAD_ALIGNMENT: usize = 8;

/// An error that can occur when allocating an object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no type named '{0}' is registered")]
    UnknownType(String),
    #[error("unable to allocate {size} bytes")]
    AllocationFailed { size: usize },
}

/// A [`MarkSweep`] heap that doesn't report events.
pub type Heap = MarkSweep<NoopObserver<Event>>;

/// Implements a simple stop-the-world, tricolor mark-sweep garbage collector.
///
/// Objects are allocated with [`alloc`](Self::alloc), kept alive by locking them with
/// [`lock`](Self::lock) (or by being reachable from a locked object) and reclaimed by
/// [`collect`](Self::collect) once they are no longer reachable. Reachability is discovered through
/// the visit callback of each object's [`Type`].
///
/// Dropping the heap (or calling [`shutdown`](Self::shutdown)) releases every remaining object,
/// locked or not, invoking their finalizers.
pub struct MarkSweep<O>
where
    O: Observer<Event = Event>,
{
    types: TypeTable,
    tags: TagArena,
    stats: Stats,
    options: HeapOptions,
    observer: O,
}

impl<O> Default for MarkSweep<O>
where
    O: Observer<Event = Event> + Default,
{
    fn default() -> Self {
        Self::with_observer(HeapOptions::default(), O::default())
    }
}

impl<O> MarkSweep<O>
where
    O: Observer<Event = Event> + Default,
{
    /// Creates an empty heap with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty heap with the specified options.
    pub fn with_options(options: HeapOptions) -> Self {
        Self::with_observer(options, O::default())
    }
}

impl<O> MarkSweep<O>
where
    O: Observer<Event = Event>,
{
    /// Creates an empty heap with the specified options that reports to `observer`.
    pub fn with_observer(options: HeapOptions, observer: O) -> Self {
        debug!("starting heap with {options:?}");
        let id = HeapId::next();
        Self {
            types: TypeTable::with_id(id),
            tags: TagArena::with_capacity(id, options.initial_capacity),
            stats: Stats::default(),
            options,
            observer,
        }
    }

    /// Returns the observer
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Returns the options this heap was created with
    pub fn options(&self) -> &HeapOptions {
        &self.options
    }

    /// Returns the table of registered types
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Registers a new type. The name of the type must be unique within this heap.
    pub fn add_type(&mut self, builder: TypeBuilder) -> Result<TypeId, TypeTableError> {
        let id = self.types.insert(builder)?;
        if let Some(ty) = self.types.get(id) {
            debug!("registered {ty:?} as {id:?}");
        }
        Ok(id)
    }

    /// Returns the id of the type registered as `name`.
    pub fn find_type<N: AsRef<[u8]>>(&self, name: N) -> Result<TypeId, TypeTableError> {
        self.types.find_type_by_name(name)
    }

    /// Returns the type registered with the given id.
    pub fn type_info(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id)
    }

    /// Returns stats about the live allocations of this heap.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Allocates `size` bytes for an object of type `ty`. The payload is aligned to
    /// [`PAYLOAD_ALIGNMENT`].
    pub fn alloc(&mut self, ty: TypeId, size: usize) -> Result<GcPtr, AllocError> {
        let layout = Layout::from_size_align(size, PAYLOAD_ALIGNMENT).map_err(|err| {
            AllocError::InvalidArgument(format!("allocation of {size} bytes is invalid: {err}"))
        })?;
        self.alloc_with_layout(ty, layout)
    }

    /// Allocates `size` bytes for an object of the type registered as `name`.
    pub fn alloc_by_name<N: AsRef<[u8]>>(
        &mut self,
        name: N,
        size: usize,
    ) -> Result<GcPtr, AllocError> {
        let name = name.as_ref();
        let ty = self
            .types
            .find_type_by_name(name)
            .map_err(|err| match err {
                TypeTableError::NotFound(name) => AllocError::UnknownType(name),
                err => AllocError::InvalidArgument(err.to_string()),
            })?;
        self.alloc(ty, size)
    }

    /// Allocates memory described by `layout` for an object of type `ty`. The alignment of the
    /// payload is at least [`PAYLOAD_ALIGNMENT`].
    ///
    /// On failure the heap is left unchanged.
    pub fn alloc_with_layout(&mut self, ty: TypeId, layout: Layout) -> Result<GcPtr, AllocError> {
        if self.types.get(ty).is_none() {
            return Err(AllocError::InvalidArgument(format!(
                "{ty:?} is not registered with this heap"
            )));
        }

        let size = layout.size();
        let number_of_bytes = self.stats.number_of_bytes.checked_add(size).ok_or_else(|| {
            AllocError::InvalidArgument(format!("allocation of {size} bytes overflows the heap"))
        })?;
        if self
            .options
            .memory_limit
            .is_some_and(|limit| number_of_bytes > limit)
        {
            return Err(AllocError::AllocationFailed { size });
        }
        if !self.tags.has_room() {
            return Err(AllocError::AllocationFailed { size });
        }

        // Zero-sized payloads still get a unique address
        let memory_layout =
            Layout::from_size_align(size.max(1), layout.align().max(PAYLOAD_ALIGNMENT)).map_err(
                |err| {
                    AllocError::InvalidArgument(format!(
                        "allocation of {size} bytes is invalid: {err}"
                    ))
                },
            )?;
        // SAFETY: `memory_layout` has a non-zero size and a valid power-of-two alignment.
        let data = unsafe {
            if self.options.zero_memory {
                std::alloc::alloc_zeroed(memory_layout)
            } else {
                std::alloc::alloc(memory_layout)
            }
        };
        let data = NonNull::new(data).ok_or(AllocError::AllocationFailed { size })?;

        let ptr = self.tags.insert(ty, size, memory_layout, data);
        self.stats.number_of_blocks += 1;
        self.stats.number_of_bytes = number_of_bytes;

        trace!("allocated {ptr:?} ({size} bytes)");
        self.observer.event(Event::Allocation(ptr));
        Ok(ptr)
    }

    /// Locks the specified `obj`, which keeps it and objects it references alive. Objects that
    /// are locked must be unlocked before they can be collected. An object can be locked multiple
    /// times, but you must make sure to call `unlock` an equal number of times before the object
    /// can be collected.
    ///
    /// # Panics
    ///
    /// Panics if `obj` does not refer to a live object of this heap.
    pub fn lock(&mut self, obj: GcPtr) {
        let tag = self
            .tags
            .get_mut(obj)
            .unwrap_or_else(|| panic!("Object with handle '{obj:?}' does not exist."));
        tag.roots = tag
            .roots
            .checked_add(1)
            .unwrap_or_else(|| panic!("Object with handle '{obj:?}' is locked too many times."));
    }

    /// Unlocks the specified `obj`, potentially allowing it and objects it references to be
    /// collected. An object can be locked multiple times, so you must make sure to call `unlock`
    /// the same number of times as `lock` was called before the object can be collected.
    ///
    /// # Panics
    ///
    /// Panics if `obj` does not refer to a live object of this heap or if it isn't locked.
    pub fn unlock(&mut self, obj: GcPtr) {
        let tag = self
            .tags
            .get_mut(obj)
            .unwrap_or_else(|| panic!("Object with handle '{obj:?}' does not exist."));
        tag.roots = tag
            .roots
            .checked_sub(1)
            .unwrap_or_else(|| panic!("Object with handle '{obj:?}' is not locked."));
    }

    /// Returns how many times `obj` is currently locked, or `None` if it doesn't exist.
    pub fn lock_count(&self, obj: GcPtr) -> Option<u32> {
        self.tags.get(obj).map(|tag| tag.roots)
    }

    /// Returns true if `obj` refers to a live object of this heap.
    pub fn contains(&self, obj: GcPtr) -> bool {
        self.tags.get(obj).is_some()
    }

    /// Returns the type of the specified `obj`, or `None` if it doesn't exist.
    pub fn ptr_type(&self, obj: GcPtr) -> Option<TypeId> {
        self.tags.get(obj).map(|tag| tag.ty)
    }

    /// Returns a view of the payload of `obj`, or `None` if it doesn't exist.
    pub fn object(&self, obj: GcPtr) -> Option<Object<'_>> {
        self.tags
            .get(obj)
            .map(|tag| Object::new(obj, tag.data, tag.size))
    }

    /// Finds the live object whose payload starts at `ptr`.
    pub fn find_object(&self, ptr: *const u8) -> Option<GcPtr> {
        self.tags.find(ptr as usize)
    }

    /// Collects all objects that are not reachable from a locked object, invoking their
    /// finalizers.
    pub fn collect(&mut self) -> RunStats {
        self.observer.event(Event::Start);

        let roots = self.reset();
        let marked_blocks = self.mark();
        let (destroyed_blocks, destroyed_bytes) = self.sweep(false);

        self.observer.event(Event::End);

        debug!(
            "collected {} objects ({} bytes); {} roots, {} reachable, {} live",
            destroyed_blocks, destroyed_bytes, roots, marked_blocks, self.stats.number_of_blocks
        );

        RunStats {
            destroyed_blocks,
            destroyed_bytes,
            marked_blocks,
            live: self.stats,
        }
    }

    /// Releases every object in the heap regardless of locks, invoking their finalizers, and
    /// tears the heap down.
    pub fn shutdown(mut self) -> RunStats {
        self.release_all()
    }

    /// Colors every object white and pushes locked objects on the gray worklist. Returns the
    /// number of roots.
    fn reset(&mut self) -> usize {
        // Left over from a cycle that was aborted by a panicking callback
        while self.tags.pop_gray().is_some() {}

        let mut roots = 0;
        let mut cursor = self.tags.all_head();
        while let Some(index) = cursor {
            let tag = self.tags.tag_mut(index);
            cursor = tag.all_next;
            tag.color = Color::White;
            if tag.roots > 0 {
                self.tags.push_gray(index);
                roots += 1;
            }
        }
        roots
    }

    /// Drains the gray worklist, blackening each object and graying the white objects it
    /// references. Returns the number of objects that were blackened.
    fn mark(&mut self) -> usize {
        let mut marked = 0;
        while let Some(index) = self.tags.pop_gray() {
            let handle = self.tags.ptr(index);
            let tag = self.tags.tag_mut(index);
            tag.color = Color::Black;
            let ty = tag.ty;
            let object = Object::new(handle, tag.data, tag.size);
            marked += 1;

            let visit = self
                .types
                .get(ty)
                .unwrap_or_else(|| panic!("{object:?} has unregistered type {ty:?}"))
                .visit_fn();
            if let Some(visit) = visit {
                let mut tracer = Tracer {
                    tags: &mut self.tags,
                };
                visit(object, &mut tracer);
            }
        }
        marked
    }

    /// Walks the allocation list once, releasing white objects and flipping black objects back
    /// to white. With `everything` set, every object is released.
    fn sweep(&mut self, everything: bool) -> (usize, usize) {
        let mut destroyed_blocks = 0;
        let mut destroyed_bytes = 0;

        let mut prev = None;
        let mut cursor = self.tags.all_head();
        while let Some(index) = cursor {
            let tag = self.tags.tag(index);
            cursor = tag.all_next;
            match tag.color {
                Color::Black if !everything => {
                    self.tags.tag_mut(index).color = Color::White;
                    prev = Some(index);
                }
                Color::Gray if !everything => {
                    panic!("object in slot {index} is still gray after marking")
                }
                _ => {
                    destroyed_bytes += self.release(prev, index);
                    destroyed_blocks += 1;
                }
            }
        }

        (destroyed_blocks, destroyed_bytes)
    }

    /// Unlinks the object at `index`, finalizes it and returns its memory. Returns the size that
    /// was accounted for the object.
    ///
    /// The object is gone from the heap before its finalizer runs, so a panicking finalizer is
    /// never invoked twice for the same object.
    fn release(&mut self, prev: Option<u32>, index: u32) -> usize {
        let handle = self.tags.ptr(index);
        let tag = self.tags.remove(prev, index);
        self.stats.number_of_blocks -= 1;
        self.stats.number_of_bytes -= tag.size;

        let payload = Payload {
            data: tag.data,
            layout: tag.layout,
        };
        let ty = self
            .types
            .get(tag.ty)
            .unwrap_or_else(|| panic!("{handle:?} has unregistered type {:?}", tag.ty));
        if let Some(finalize) = ty.finalize_fn() {
            finalize(Object::new(handle, tag.data, tag.size));
        }
        drop(payload);

        trace!("deallocated {:?} ({} bytes)", handle, tag.size);
        self.observer.event(Event::Deallocation(handle));
        tag.size
    }

    fn release_all(&mut self) -> RunStats {
        if self.tags.len() == 0 {
            return RunStats {
                live: self.stats,
                ..RunStats::default()
            };
        }

        self.observer.event(Event::Start);
        while self.tags.pop_gray().is_some() {}
        let (destroyed_blocks, destroyed_bytes) = self.sweep(true);
        self.observer.event(Event::End);

        debug!(
            "released {} objects ({} bytes) on shutdown",
            destroyed_blocks, destroyed_bytes
        );

        RunStats {
            destroyed_blocks,
            destroyed_bytes,
            marked_blocks: 0,
            live: self.stats,
        }
    }
}

/// Owns the payload of a released object and returns it to the global allocator when dropped,
/// also when a finalizer unwinds.
struct Payload {
    data: NonNull<u8>,
    layout: Layout,
}

impl Drop for Payload {
    fn drop(&mut self) {
        // SAFETY: `data` was allocated with `layout` in `alloc_with_layout`, and its tag was
        // removed from the arena before the `Payload` was created, so it is released exactly once.
        unsafe { std::alloc::dealloc(self.data.as_ptr(), self.layout) };
    }
}

impl<O> Drop for MarkSweep<O>
where
    O: Observer<Event = Event>,
{
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<O> fmt::Debug for MarkSweep<O>
where
    O: Observer<Event = Event>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkSweep")
            .field("types", &self.types)
            .field("stats", &self.stats)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The context handed to visit callbacks while the collector marks reachable objects.
///
/// A `Tracer` only exists for the duration of a [`MarkSweep::collect`] call, so references can
/// only be reported while marking is in progress.
pub struct Tracer<'heap> {
    tags: &'heap mut TagArena,
}

impl Tracer<'_> {
    /// Marks `obj` as reachable. Objects that were already reached are left as they are, so
    /// every object is scanned at most once per cycle.
    ///
    /// # Panics
    ///
    /// Panics if `obj` does not refer to a live object of the heap being collected.
    pub fn mark_reachable(&mut self, obj: GcPtr) {
        let color = self
            .tags
            .get(obj)
            .unwrap_or_else(|| panic!("found invalid reference '{obj:?}'"))
            .color;
        if color == Color::White {
            self.tags.push_gray(obj.index());
        }
    }

    /// Finds the live object whose payload starts at `ptr`.
    pub fn find_object(&self, ptr: *const u8) -> Option<GcPtr> {
        self.tags.find(ptr as usize)
    }
}
