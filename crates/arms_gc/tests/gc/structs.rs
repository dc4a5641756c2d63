use super::util::{add_counted_type, add_traced_type, alloc_value, heap, write, Trace};
use crate::assert_variant;
use arms_gc::{
    gc::{Event, GcPtr, Stats, Tracer},
    TypeBuilder,
};
use std::{
    cell::{Cell, RefCell},
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

struct Sender {
    name: String,
}

struct Message {
    sender: GcPtr,
    text: String,
}

#[derive(Clone, Copy)]
struct Node {
    next: Option<GcPtr>,
}

impl Trace for Node {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        self.next.trace(tracer);
    }
}

#[derive(Clone, Copy)]
struct Pair {
    left: GcPtr,
    right: GcPtr,
}

impl Trace for Pair {
    fn trace(&self, tracer: &mut Tracer<'_>) {
        self.left.trace(tracer);
        self.right.trace(tracer);
    }
}

#[test]
fn sender_and_message() {
    let finalized = Rc::new(RefCell::new(Vec::new()));

    let mut heap = heap();
    let sender_ty = {
        let finalized = finalized.clone();
        heap.add_type(TypeBuilder::new("Sender").finalize(move |obj| {
            let sender = unsafe { obj.as_ptr().cast::<Sender>().read() };
            finalized.borrow_mut().push(sender.name);
        }))
        .unwrap()
    };
    let message_ty = {
        let finalized = finalized.clone();
        heap.add_type(
            TypeBuilder::new("Message")
                .visit(|obj, tracer| tracer.mark_reachable(unsafe { obj.deref::<Message>() }.sender))
                .finalize(move |obj| {
                    let message = unsafe { obj.as_ptr().cast::<Message>().read() };
                    finalized.borrow_mut().push(message.text);
                }),
        )
        .unwrap()
    };

    let sender = alloc_value(
        &mut heap,
        sender_ty,
        Sender {
            name: String::from("alice"),
        },
    );
    let message = alloc_value(
        &mut heap,
        message_ty,
        Message {
            sender,
            text: String::from("hello"),
        },
    );
    heap.lock(message);

    let run = heap.collect();
    assert_eq!(run.destroyed_blocks, 0);
    assert_eq!(run.marked_blocks, 2);
    assert!(finalized.borrow().is_empty());

    heap.unlock(message);
    let run = heap.collect();
    assert_eq!(run.destroyed_blocks, 2);
    assert_eq!(heap.stats().number_of_blocks, 0);

    let mut names = finalized.borrow().clone();
    names.sort();
    assert_eq!(names, vec![String::from("alice"), String::from("hello")]);

    // Nothing left to finalize
    heap.collect();
    assert_eq!(finalized.borrow().len(), 2);
}

#[test]
fn trace_collect() {
    let mut heap = heap();
    let leaf_ty = add_traced_type::<i64>(&mut heap, "Leaf");
    let node_ty = add_traced_type::<Node>(&mut heap, "Node");

    let leaf = alloc_value(&mut heap, leaf_ty, 42i64);
    let node = alloc_value(&mut heap, node_ty, Node { next: Some(leaf) });
    heap.lock(node);

    // Collect garbage, leaf should not be collected
    heap.collect();
    assert!(heap.contains(leaf));

    heap.unlock(node);

    // Collect garbage, both node and leaf should be collected
    heap.collect();

    let mut events = heap.observer().take_all().into_iter();
    assert_eq!(events.next(), Some(Event::Allocation(leaf)));
    assert_eq!(events.next(), Some(Event::Allocation(node)));
    assert_eq!(events.next(), Some(Event::Start));
    assert_eq!(events.next(), Some(Event::End));
    assert_eq!(events.next(), Some(Event::Start));
    assert_variant!(events.next(), Some(Event::Deallocation(..))); // Don't care about the order
    assert_variant!(events.next(), Some(Event::Deallocation(..)));
    assert_eq!(events.next(), Some(Event::End));
    assert_eq!(events.next(), None);
}

#[test]
fn trace_cycle() {
    let mut heap = heap();
    let node_ty = add_traced_type::<Node>(&mut heap, "Node");

    let node = alloc_value(&mut heap, node_ty, Node { next: None });
    unsafe { write(&heap, node, Node { next: Some(node) }) };
    heap.lock(node);

    // Collect garbage, nothing should be collected since node is locked
    heap.collect();

    heap.unlock(node);

    // Collect garbage, node should be collected
    heap.collect();

    let mut events = heap.observer().take_all().into_iter();
    assert_eq!(events.next(), Some(Event::Allocation(node)));
    assert_eq!(events.next(), Some(Event::Start));
    assert_eq!(events.next(), Some(Event::End));
    assert_eq!(events.next(), Some(Event::Start));
    assert_eq!(events.next(), Some(Event::Deallocation(node)));
    assert_eq!(events.next(), Some(Event::End));
    assert_eq!(events.next(), None);
}

#[test]
fn unreachable_cycle_is_finalized_once() {
    let mut heap = heap();
    let (node_ty, finalized) = add_counted_type::<Node>(&mut heap, "Node");

    let a = alloc_value(&mut heap, node_ty, Node { next: None });
    let b = alloc_value(&mut heap, node_ty, Node { next: Some(a) });
    unsafe { write(&heap, a, Node { next: Some(b) }) };

    heap.lock(a);
    let run = heap.collect();
    assert_eq!(run.marked_blocks, 2);
    assert_eq!(finalized.get(), 0);

    heap.unlock(a);
    let run = heap.collect();
    assert_eq!(run.destroyed_blocks, 2);
    assert_eq!(finalized.get(), 2);

    heap.collect();
    assert_eq!(finalized.get(), 2);
}

#[test]
fn shared_child_is_scanned_once() {
    let mut heap = heap();
    let leaf_ty = add_traced_type::<u64>(&mut heap, "Leaf");
    let pair_ty = add_traced_type::<Pair>(&mut heap, "Pair");

    let leaf = alloc_value(&mut heap, leaf_ty, 7u64);
    let pair = alloc_value(
        &mut heap,
        pair_ty,
        Pair {
            left: leaf,
            right: leaf,
        },
    );
    heap.lock(pair);

    let run = heap.collect();
    assert_eq!(run.marked_blocks, 2);
    assert_eq!(run.destroyed_blocks, 0);
}

#[test]
fn deep_chain() {
    const LENGTH: usize = 100_000;

    let mut heap = heap();
    let node_ty = add_traced_type::<Node>(&mut heap, "Node");

    let mut head = None;
    for _ in 0..LENGTH {
        head = Some(alloc_value(&mut heap, node_ty, Node { next: head }));
    }
    let head = head.unwrap();
    heap.lock(head);

    let run = heap.collect();
    assert_eq!(run.marked_blocks, LENGTH);
    assert_eq!(run.destroyed_blocks, 0);

    heap.unlock(head);
    let run = heap.collect();
    assert_eq!(run.destroyed_blocks, LENGTH);
    assert_eq!(heap.stats().number_of_blocks, 0);
}

#[test]
fn reachable_from_any_root() {
    let mut heap = heap();
    let leaf_ty = add_traced_type::<u8>(&mut heap, "Leaf");
    let node_ty = add_traced_type::<Node>(&mut heap, "Node");

    let leaf = alloc_value(&mut heap, leaf_ty, 1u8);
    let first = alloc_value(&mut heap, node_ty, Node { next: Some(leaf) });
    let second = alloc_value(&mut heap, node_ty, Node { next: Some(leaf) });
    heap.lock(first);
    heap.lock(second);

    heap.unlock(first);
    heap.collect();
    assert!(!heap.contains(first));
    assert!(heap.contains(second));
    assert!(heap.contains(leaf));
}

#[test]
#[should_panic(expected = "found invalid reference")]
fn stale_reference_panics() {
    let mut heap = heap();
    let node_ty = add_traced_type::<Node>(&mut heap, "Node");

    let stale = alloc_value(&mut heap, node_ty, Node { next: None });
    heap.collect();

    let holder = alloc_value(&mut heap, node_ty, Node { next: Some(stale) });
    heap.lock(holder);
    heap.collect();
}

#[test]
#[should_panic(expected = "found invalid reference")]
fn foreign_reference_panics() {
    let mut other = heap();
    let other_ty = add_traced_type::<Node>(&mut other, "Node");
    let foreign = alloc_value(&mut other, other_ty, Node { next: None });

    let mut heap = heap();
    let node_ty = add_traced_type::<Node>(&mut heap, "Node");
    let holder = alloc_value(
        &mut heap,
        node_ty,
        Node {
            next: Some(foreign),
        },
    );
    assert_eq!(holder.index(), foreign.index());

    heap.lock(holder);
    heap.collect();
}

#[test]
fn panicking_finalizer_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();

    let mut heap = heap();
    let ty = heap
        .add_type(TypeBuilder::new("Fragile").finalize(move |_| {
            counter.set(counter.get() + 1);
            assert_ne!(counter.get(), 1, "first finalizer call fails");
        }))
        .unwrap();
    let first = heap.alloc(ty, 8).unwrap();
    let second = heap.alloc(ty, 8).unwrap();

    let aborted = panic::catch_unwind(AssertUnwindSafe(|| heap.collect()));
    assert!(aborted.is_err());
    assert_eq!(calls.get(), 1);

    // The object whose finalizer failed is gone; only the other one is left to sweep
    assert_eq!(heap.stats().number_of_blocks, 1);
    let run = heap.collect();
    assert_eq!(run.destroyed_blocks, 1);
    assert_eq!(calls.get(), 2);

    assert!(!heap.contains(first));
    assert!(!heap.contains(second));
    assert_eq!(heap.stats(), Stats::default());

    heap.collect();
    drop(heap);
    assert_eq!(calls.get(), 2);
}
