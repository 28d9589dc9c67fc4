use hazel_collections::OrderedList;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Dropped exactly once per node, no matter how many clones a `get` made:
/// the counter lives behind an `Arc`.
struct Probe {
    drops: Arc<AtomicUsize>,
    value: usize,
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn probe(drops: &Arc<AtomicUsize>, value: usize) -> Arc<Probe> {
    Arc::new(Probe {
        drops: drops.clone(),
        value,
    })
}

fn flush_until(drops: &AtomicUsize, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while drops.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
        hazel::flush();
        thread::yield_now();
    }
}

#[test]
fn round_trip() {
    let list = OrderedList::new();

    for i in 0..50usize {
        assert!(list.insert(0x1000 + i, i as u64));
    }
    for i in 0..50usize {
        assert_eq!(list.get(0x1000 + i), Some(i as u64));
    }
    for i in 0..50usize {
        assert_eq!(list.remove(0x1000 + i), Some(i as u64));
    }
    for i in 0..50usize {
        assert_eq!(list.get(0x1000 + i), None);
    }
    assert!(list.is_empty());
}

#[test]
fn erase_on_empty_list_returns_false() {
    let list: OrderedList<u64> = OrderedList::new();
    assert_eq!(list.remove(7), None);
    assert!(list.is_empty());
}

#[test]
fn out_of_order_inserts_observe_sorted() {
    let list = OrderedList::new();
    for key in [40usize, 10, 30, 50, 20] {
        list.insert(key, ());
    }
    assert_eq!(list.keys(), vec![10, 20, 30, 40, 50]);
}

#[test]
fn removed_nodes_are_reclaimed() {
    let drops = Arc::new(AtomicUsize::new(0));
    let list = OrderedList::new();

    for i in 0..50usize {
        list.insert(i, probe(&drops, i));
    }
    for i in 0..50usize {
        let got = list.remove(i).expect("key must be present");
        assert_eq!(got.value, i);
        drop(got);
    }

    // Everything is unlinked and retired on this thread; a scan must free it.
    flush_until(&drops, 50);
    assert_eq!(drops.load(Ordering::SeqCst), 50);
    assert!(list.is_empty());
}

#[test]
fn dropping_the_list_frees_live_nodes() {
    let drops = Arc::new(AtomicUsize::new(0));

    {
        let list = OrderedList::new();
        for i in 0..32usize {
            list.insert(i, probe(&drops, i));
        }
    }

    assert_eq!(drops.load(Ordering::SeqCst), 32);
}

#[test]
fn reads_see_value_while_concurrent_remove_runs() {
    // A reader holding a clone keeps the payload usable even after the node
    // itself has been retired and freed.
    let drops = Arc::new(AtomicUsize::new(0));
    let list = Arc::new(OrderedList::new());
    list.insert(1, probe(&drops, 41));

    let value = list.get(1).unwrap();
    assert_eq!(list.remove(1).map(|p| p.value), Some(41));

    hazel::flush(); // the node itself may be freed now; `value` is a clone
    assert_eq!(value.value, 41);
    assert_eq!(drops.load(Ordering::SeqCst), 0, "payload alive via the clone");
}
