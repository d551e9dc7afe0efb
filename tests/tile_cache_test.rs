use denguemap::{TileCache, TileKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Disk cache behaviour under the access patterns of a grid load
#[cfg(test)]
mod tile_cache_tests {
    use super::*;

    fn payload(byte: u8, len: usize) -> Vec<u8> {
        // Mix in the index so compression is not trivial
        (0..len).map(|i| byte ^ (i % 7) as u8).collect()
    }

    /// Readers racing a writer only ever see a miss or a complete payload
    #[test]
    fn test_concurrent_put_and_get_never_tears() {
        println!("🧪 [TEST] Testing concurrent put/get on one key");

        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        let key = TileKey::new(25837, 16267, 15);

        let a = Arc::new(payload(0xAA, 64 * 1024));
        let b = Arc::new(payload(0xBB, 96 * 1024));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let cache = cache.clone();
            let (a, b, done) = (a.clone(), b.clone(), done.clone());
            thread::spawn(move || {
                for round in 0..60 {
                    let data = if round % 2 == 0 { &a } else { &b };
                    assert!(cache.put(key, data));
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let (a, b, done) = (a.clone(), b.clone(), done.clone());
                thread::spawn(move || {
                    let mut seen = 0usize;
                    while !done.load(Ordering::SeqCst) {
                        if let Some(bytes) = cache.get(&key) {
                            assert!(
                                bytes.as_slice() == a.as_slice() || bytes.as_slice() == b.as_slice(),
                                "read a torn payload of {} bytes",
                                bytes.len()
                            );
                            seen += 1;
                        }
                    }
                    seen
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        // The final write wins once nothing is pending
        assert!(!cache.is_pending(&key));
        assert_eq!(cache.get(&key).as_deref(), Some(&*b));
        println!("✅ [TEST] Concurrent put/get test passed");
    }

    /// Many keys written in parallel all land intact
    #[test]
    fn test_parallel_writes_of_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();

        let handles: Vec<_> = (0..8u32)
            .map(|x| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for y in 0..16u32 {
                        cache.put(TileKey::new(x, y, 15), &payload((x * 16 + y) as u8, 2048));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for x in 0..8u32 {
            for y in 0..16u32 {
                let expected = payload((x * 16 + y) as u8, 2048);
                assert_eq!(cache.get(&TileKey::new(x, y, 15)).as_deref(), Some(&expected));
            }
        }
        assert_eq!(cache.stats().writes, 128);
        assert_eq!(cache.pending_count(), 0);
    }

    /// A cache reopened on the same root sees earlier entries
    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = TileKey::new(10, 20, 15);
        {
            let cache = TileCache::open(dir.path()).unwrap();
            cache.put(key, b"persisted tile");
        }
        let reopened = TileCache::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(&key).as_deref().map(Vec::as_slice),
            Some(&b"persisted tile"[..])
        );
    }

    /// Same x/y at different zooms are different entries
    #[test]
    fn test_zoom_levels_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileCache::open(dir.path()).unwrap();
        cache.put(TileKey::new(1, 1, 14), b"z14");
        cache.put(TileKey::new(1, 1, 15), b"z15");

        assert_eq!(cache.get(&TileKey::new(1, 1, 14)).as_deref().map(Vec::as_slice), Some(&b"z14"[..]));
        assert_eq!(cache.get(&TileKey::new(1, 1, 15)).as_deref().map(Vec::as_slice), Some(&b"z15"[..]));
    }
}
