//! Cross-check against a mutex-protected reference map.
//!
//! Each thread performs the same operation on the lock-free table and on a
//! `Mutex<BTreeMap>`, holding the mutex across the pair. The lock serializes
//! the pairs, so the two structures must agree on every single result.

use hazel_collections::HashTable;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
#[cfg_attr(miri, ignore)]
fn agrees_with_reference_map() {
    const THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 20_000;
    const KEY_SPACE: usize = 64;

    let table = Arc::new(HashTable::with_capacity(16));
    let reference = Arc::new(Mutex::new(BTreeMap::<usize, u64>::new()));

    let mut handles = vec![];
    for t in 0..THREADS {
        let table = table.clone();
        let reference = reference.clone();
        handles.push(thread::spawn(move || {
            let mut rng = SmallRng::seed_from_u64(0xC0FFEE + t as u64);
            for op in 0..OPS_PER_THREAD {
                let key = rng.gen_range(0..KEY_SPACE);
                let mut model = reference.lock().unwrap();
                match rng.gen_range(0..3) {
                    0 => {
                        let value = (t * OPS_PER_THREAD + op) as u64;
                        let expect_new = !model.contains_key(&key);
                        if expect_new {
                            model.insert(key, value);
                        }
                        assert_eq!(
                            table.insert(key, value),
                            expect_new,
                            "insert({key}) disagreed with the model"
                        );
                    }
                    1 => {
                        assert_eq!(
                            table.get(key),
                            model.get(&key).copied(),
                            "get({key}) disagreed with the model"
                        );
                    }
                    _ => {
                        assert_eq!(
                            table.remove(key),
                            model.remove(&key),
                            "remove({key}) disagreed with the model"
                        );
                    }
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // Final states must be identical.
    let model = reference.lock().unwrap();
    assert_eq!(table.len(), model.len());
    for (&key, &value) in model.iter() {
        assert_eq!(table.get(key), Some(value));
    }
}
