use super::util::{heap, heap_with_options};
use arms_gc::{
    gc::{AllocError, Event, HeapOptions, PAYLOAD_ALIGNMENT},
    TypeBuilder,
};
use std::{cell::Cell, rc::Rc};

#[test]
fn alloc() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("core::i64")).unwrap();
    let handle = heap.alloc(ty, 8).unwrap();

    assert_eq!(heap.ptr_type(handle), Some(ty));
    assert!(heap.contains(handle));
    assert_eq!(heap.lock_count(handle), Some(0));

    let obj = heap.object(handle).unwrap();
    assert_eq!(obj.handle(), handle);
    assert_eq!(obj.size(), 8);
    assert_eq!(unsafe { obj.bytes() }, &[0u8; 8]);

    let mut events = heap.observer().take_all().into_iter();
    assert_eq!(events.next(), Some(Event::Allocation(handle)));
    assert_eq!(events.next(), None);
}

#[test]
fn alloc_by_name() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("Node")).unwrap();

    let handle = heap.alloc_by_name("Node", 24).unwrap();
    assert_eq!(heap.ptr_type(handle), Some(ty));

    assert_eq!(
        heap.alloc_by_name("Missing", 24),
        Err(AllocError::UnknownType(String::from("Missing")))
    );
    assert_eq!(heap.stats().number_of_blocks, 1);
}

#[test]
fn alloc_foreign_type_fails() {
    let finalized = Rc::new(Cell::new(0));
    let counter = finalized.clone();

    let mut other = heap();
    let foreign = other.add_type(TypeBuilder::new("Foreign")).unwrap();
    let mut heap = heap();
    let local = heap
        .add_type(TypeBuilder::new("Local").finalize(move |_| counter.set(counter.get() + 1)))
        .unwrap();

    // Both ids refer to the first type of their heap
    assert_eq!(local.index(), foreign.index());
    assert!(heap.type_info(foreign).is_none());
    assert!(other.type_info(local).is_none());

    assert!(matches!(
        heap.alloc(foreign, 8),
        Err(AllocError::InvalidArgument(_))
    ));
    assert_eq!(heap.stats().number_of_blocks, 0);
    assert!(heap.observer().take_all().is_empty());

    drop(heap);
    assert_eq!(finalized.get(), 0);
}

#[test]
fn alloc_too_large_fails() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("Blob")).unwrap();

    assert!(matches!(
        heap.alloc(ty, usize::MAX),
        Err(AllocError::InvalidArgument(_))
    ));
    assert_eq!(heap.stats().number_of_bytes, 0);
}

#[test]
fn alloc_zero_sized() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("Unit")).unwrap();

    let a = heap.alloc(ty, 0).unwrap();
    let b = heap.alloc(ty, 0).unwrap();
    assert_ne!(a, b);

    let a_ptr = heap.object(a).unwrap().as_ptr();
    let b_ptr = heap.object(b).unwrap().as_ptr();
    assert_ne!(a_ptr, b_ptr);
    assert_eq!(heap.find_object(a_ptr), Some(a));
    assert_eq!(heap.find_object(b_ptr), Some(b));

    assert_eq!(heap.stats().number_of_blocks, 2);
    assert_eq!(heap.stats().number_of_bytes, 0);
}

#[test]
fn alloc_with_layout() {
    #[repr(align(64))]
    struct CacheLine([u8; 64]);

    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("CacheLine")).unwrap();

    let handle = heap
        .alloc_with_layout(ty, std::alloc::Layout::new::<CacheLine>())
        .unwrap();
    let ptr = heap.object(handle).unwrap().as_ptr();
    assert_eq!(ptr as usize % 64, 0);
    assert_eq!(heap.stats().number_of_bytes, 64);
}

#[test]
fn alloc_uninitialized() {
    let mut heap = heap_with_options(HeapOptions::default().with_zero_memory(false));
    let ty = heap.add_type(TypeBuilder::new("Raw")).unwrap();

    let handle = heap.alloc(ty, 32).unwrap();
    assert_eq!(heap.object(handle).unwrap().size(), 32);
}

macro_rules! test_payload_alignment {
    ($($size:literal),+) => {
        $(
            paste::item! {
                #[test]
                fn [<payload_alignment_ $size>]() {
                    let mut heap = heap();
                    let ty = heap.add_type(TypeBuilder::new("Bytes")).unwrap();

                    let handle = heap.alloc(ty, $size).unwrap();
                    let ptr = heap.object(handle).unwrap().as_ptr();
                    assert_eq!(ptr as usize % PAYLOAD_ALIGNMENT, 0);
                    assert_eq!(heap.stats().number_of_bytes, $size);
                }
            }
        )+
    };
}

test_payload_alignment!(1, 3, 8, 13, 4096);

#[test]
fn collect_simple() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("core::i64")).unwrap();
    let handle = heap.alloc(ty, 8).unwrap();

    heap.collect();
    assert!(!heap.contains(handle));

    let mut events = heap.observer().take_all().into_iter();
    assert_eq!(events.next(), Some(Event::Allocation(handle)));
    assert_eq!(events.next(), Some(Event::Start));
    assert_eq!(events.next(), Some(Event::Deallocation(handle)));
    assert_eq!(events.next(), Some(Event::End));
    assert_eq!(events.next(), None);
}

#[test]
fn stale_handle_is_not_reused() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("core::i64")).unwrap();

    let stale = heap.alloc(ty, 8).unwrap();
    heap.collect();

    let fresh = heap.alloc(ty, 8).unwrap();
    assert_eq!(fresh.index(), stale.index());
    assert_ne!(fresh, stale);
    assert!(!heap.contains(stale));
    assert!(heap.object(stale).is_none());
    assert!(heap.contains(fresh));
}

#[test]
fn shutdown_releases_everything() {
    let mut heap = heap();
    let ty = heap.add_type(TypeBuilder::new("core::i64")).unwrap();

    let locked = heap.alloc(ty, 8).unwrap();
    heap.lock(locked);
    heap.alloc(ty, 16).unwrap();

    let run = heap.shutdown();
    assert_eq!(run.destroyed_blocks, 2);
    assert_eq!(run.destroyed_bytes, 24);
    assert_eq!(run.live.number_of_blocks, 0);
}
