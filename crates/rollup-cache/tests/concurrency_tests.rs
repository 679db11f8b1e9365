use rayon::prelude::*;
use rollup_cache::{CacheKey, ValueCache};
use rollup_model::{FieldId, RecordId, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

const FIELD: FieldId = FieldId(1);

#[test]
fn test_parallel_readers_and_writers_keep_entries_intact() {
    let cache = ValueCache::new(10_000);

    (0..2_000u64).into_par_iter().for_each(|i| {
        let record = RecordId(i % 50);
        // every writer of a key writes the same value
        let value = Some((i % 50) as f64);
        cache.put(record, FIELD, Some(Timestamp(1)), value);
        if let Some(read) = cache.get(record, FIELD, Some(Timestamp(1))) {
            assert_eq!(read, value);
        }
    });

    for r in 0..50u64 {
        assert_eq!(cache.get(RecordId(r), FIELD, Some(Timestamp(1))), Some(Some(r as f64)));
    }
}

#[test]
#[allow(clippy::cast_precision_loss)]
fn test_values_resolved_before_invalidation_are_never_read_after_it() {
    let cache = ValueCache::new(10_000);
    // data version per record, bumped by writers before they invalidate
    let versions: Vec<AtomicU64> = (0..8).map(|_| AtomicU64::new(0)).collect();

    (0..4_000u64).into_par_iter().for_each(|i| {
        let slot = (i % 8) as usize;
        let record = RecordId(i % 8);
        if i % 7 == 0 {
            versions[slot].fetch_add(1, Ordering::SeqCst);
            cache.invalidate(record, FIELD);
            return;
        }
        let _ = cache.get_or_resolve(record, FIELD, None, || {
            Ok::<_, ()>(Some(versions[slot].load(Ordering::SeqCst) as f64))
        });
    });

    // Whatever is still readable was resolved after the last invalidation.
    for (slot, version) in versions.iter().enumerate() {
        let latest = version.load(Ordering::SeqCst) as f64;
        if let Some(cached) = cache.get(RecordId(slot as u64), FIELD, None) {
            assert_eq!(cached, Some(latest));
        }
    }
}

#[test]
fn test_stale_tickets_from_many_threads_are_dropped() {
    let cache = ValueCache::new(1_000);
    let tickets: Vec<_> = (0..100u64)
        .map(|r| cache.ticket(CacheKey::latest(RecordId(r), FIELD)))
        .collect();

    (0..100u64).into_par_iter().for_each(|r| cache.invalidate(RecordId(r), FIELD));

    let stored = tickets
        .into_par_iter()
        .filter(|ticket| cache.put_if_current(*ticket, Some(1.0)))
        .count();
    assert_eq!(stored, 0);
    assert_eq!(cache.stats().stale_puts, 100);
}
