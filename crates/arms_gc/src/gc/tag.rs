use super::{GcPtr, HeapId};
use crate::type_table::TypeId;
use rustc_hash::FxHashMap;
use std::{alloc::Layout, hash::BuildHasherDefault, ptr::NonNull};

/// The tricolor state of a tag during a collection cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Color {
    /// Not (yet) reached; candidate garbage.
    White,
    /// Reached and queued on the gray worklist, but not yet scanned.
    Gray,
    /// Reached and scanned.
    Black,
}

/// The bookkeeping the collector keeps for every live allocation. Tags live in a [`TagArena`]
/// separate from the payload they describe.
#[derive(Debug)]
pub(crate) struct Tag {
    pub color: Color,
    pub roots: u32,
    pub ty: TypeId,
    /// The size in bytes the caller asked for. This is what the statistics account for.
    pub size: usize,
    /// The layout `data` was obtained with.
    pub layout: Layout,
    pub data: NonNull<u8>,
    pub generation: u32,
    /// Next tag in the list of all allocations
    pub all_next: Option<u32>,
    /// Next tag on the gray worklist, only meaningful while the tag is gray
    pub gray_next: Option<u32>,
}

#[derive(Debug)]
enum Slot {
    Occupied(Tag),
    Vacant {
        generation: u32,
        next_free: Option<u32>,
    },
}

/// A growable arena of [`Tag`]s addressed by index.
///
/// Besides storage the arena threads two singly-linked lists through its tags: the list of all
/// allocations (`all_next`), which the sweep walks, and the gray worklist (`gray_next`), which the
/// mark phase drains. Vacant slots form a third list that is used to recycle indices.
#[derive(Debug, Default)]
pub(crate) struct TagArena {
    heap: HeapId,
    slots: Vec<Slot>,
    free_head: Option<u32>,
    all_head: Option<u32>,
    gray_head: Option<u32>,
    addresses: FxHashMap<usize, u32>,
    len: usize,
}

impl TagArena {
    pub fn with_capacity(heap: HeapId, capacity: usize) -> Self {
        Self {
            heap,
            slots: Vec::with_capacity(capacity),
            addresses: FxHashMap::with_capacity_and_hasher(capacity, BuildHasherDefault::default()),
            ..Self::default()
        }
    }

    /// Returns the number of live tags.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if another tag can be inserted without running out of indices.
    pub fn has_room(&self) -> bool {
        self.free_head.is_some() || self.slots.len() < u32::MAX as usize
    }

    /// Inserts a new white, unrooted tag and links it at the head of the allocation list.
    pub fn insert(&mut self, ty: TypeId, size: usize, layout: Layout, data: NonNull<u8>) -> GcPtr {
        debug_assert!(self.has_room(), "tag arena is out of indices");

        let (index, generation) = match self.free_head {
            Some(index) => match self.slots[index as usize] {
                Slot::Vacant {
                    generation,
                    next_free,
                } => {
                    self.free_head = next_free;
                    (index, generation)
                }
                Slot::Occupied(_) => panic!("free list points at occupied slot {index}"),
            },
            None => {
                self.slots.push(Slot::Vacant {
                    generation: 0,
                    next_free: None,
                });
                ((self.slots.len() - 1) as u32, 0)
            }
        };

        self.slots[index as usize] = Slot::Occupied(Tag {
            color: Color::White,
            roots: 0,
            ty,
            size,
            layout,
            data,
            generation,
            all_next: self.all_head,
            gray_next: None,
        });
        self.all_head = Some(index);
        self.addresses.insert(data.as_ptr() as usize, index);
        self.len += 1;

        GcPtr::new(self.heap, index, generation)
    }

    /// Returns the tag referred to by `ptr`, or `None` if `ptr` is stale or belongs to another
    /// arena.
    pub fn get(&self, ptr: GcPtr) -> Option<&Tag> {
        if ptr.heap() != self.heap {
            return None;
        }
        match self.slots.get(ptr.index() as usize) {
            Some(Slot::Occupied(tag)) if tag.generation == ptr.generation() => Some(tag),
            _ => None,
        }
    }

    /// Returns the tag referred to by `ptr`, or `None` if `ptr` is stale or belongs to another
    /// arena.
    pub fn get_mut(&mut self, ptr: GcPtr) -> Option<&mut Tag> {
        if ptr.heap() != self.heap {
            return None;
        }
        match self.slots.get_mut(ptr.index() as usize) {
            Some(Slot::Occupied(tag)) if tag.generation == ptr.generation() => Some(tag),
            _ => None,
        }
    }

    /// Returns the live tag at `index`. The index must come from one of the arena's own lists.
    pub fn tag(&self, index: u32) -> &Tag {
        match self.slots.get(index as usize) {
            Some(Slot::Occupied(tag)) => tag,
            _ => panic!("allocation list is corrupted: slot {index} is not a live tag"),
        }
    }

    /// Returns the live tag at `index`. The index must come from one of the arena's own lists.
    pub fn tag_mut(&mut self, index: u32) -> &mut Tag {
        match self.slots.get_mut(index as usize) {
            Some(Slot::Occupied(tag)) => tag,
            _ => panic!("allocation list is corrupted: slot {index} is not a live tag"),
        }
    }

    /// Returns the handle of the live tag at `index`.
    pub fn ptr(&self, index: u32) -> GcPtr {
        GcPtr::new(self.heap, index, self.tag(index).generation)
    }

    /// Finds the tag whose payload starts at `address`.
    pub fn find(&self, address: usize) -> Option<GcPtr> {
        self.addresses
            .get(&address)
            .map(|&index| self.ptr(index))
    }

    /// Returns the first tag of the allocation list.
    pub fn all_head(&self) -> Option<u32> {
        self.all_head
    }

    /// Colors the tag at `index` gray and pushes it on the worklist.
    pub fn push_gray(&mut self, index: u32) {
        let head = self.gray_head;
        let tag = self.tag_mut(index);
        debug_assert_ne!(tag.color, Color::Gray, "tag {index} is already on the worklist");
        tag.color = Color::Gray;
        tag.gray_next = head;
        self.gray_head = Some(index);
    }

    /// Pops the most recently pushed gray tag from the worklist.
    pub fn pop_gray(&mut self) -> Option<u32> {
        let index = self.gray_head?;
        let tag = self.tag_mut(index);
        let next = tag.gray_next.take();
        self.gray_head = next;
        Some(index)
    }

    /// Unlinks the tag at `index` from the allocation list and vacates its slot. `prev` must be
    /// the tag that precedes `index` in the allocation list, or `None` if `index` is the head.
    ///
    /// Returns the removed tag; releasing its payload is up to the caller.
    pub fn remove(&mut self, prev: Option<u32>, index: u32) -> Tag {
        let next = self.tag(index).all_next;
        match prev {
            Some(prev) => self.tag_mut(prev).all_next = next,
            None => {
                debug_assert_eq!(self.all_head, Some(index));
                self.all_head = next;
            }
        }

        let Slot::Occupied(tag) = std::mem::replace(
            &mut self.slots[index as usize],
            Slot::Vacant {
                generation: 0,
                next_free: None,
            },
        ) else {
            unreachable!("slot {index} was checked to be occupied");
        };

        // A slot whose generation would wrap is retired instead of recycled, so stale handles
        // can never match a new occupant.
        if let Some(generation) = tag.generation.checked_add(1) {
            self.slots[index as usize] = Slot::Vacant {
                generation,
                next_free: self.free_head,
            };
            self.free_head = Some(index);
        }

        self.addresses.remove(&(tag.data.as_ptr() as usize));
        self.len -= 1;
        tag
    }
}
