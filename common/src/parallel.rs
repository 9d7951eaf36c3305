//! Concurrency-limited parallel iteration utilities.
//!
//! Wraps rayon's `par_iter` to process items in parallel while limiting
//! the number of items in flight at once (caps memory held by tile buffers).

use rayon::prelude::*;

/// Runs `f` over `items` in chunks of `max_concurrent`, handing each chunk's
/// results to `consume` in input order before the next chunk starts.
///
/// Lets a sequential fold (a running label offset, say) follow a parallel map
/// without holding every result in memory at once.
pub fn try_par_for_each_chunk<T, R, E, F, C>(
    items: &[T],
    max_concurrent: usize,
    f: F,
    mut consume: C,
) -> Result<(), E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
    C: FnMut(&T, R) -> Result<(), E>,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    for chunk in items.chunks(max_concurrent) {
        let chunk_results: Vec<R> = chunk
            .par_iter()
            .map(&f)
            .collect::<Result<Vec<R>, E>>()?;
        for (item, result) in chunk.iter().zip(chunk_results) {
            consume(item, result)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_try_par_for_each_chunk_consumes_in_order() {
        let items: Vec<u32> = (0..17).collect();
        let mut seen = Vec::new();
        let result: Result<(), String> = try_par_for_each_chunk(
            &items,
            4,
            |&x| Ok(x * 10),
            |&item, value| {
                assert_eq!(value, item * 10);
                seen.push(item);
                Ok(())
            },
        );
        assert!(result.is_ok());
        assert_eq!(seen, items);
    }

    #[test]
    fn test_try_par_for_each_chunk_propagates_consume_error() {
        let items: Vec<u32> = (0..6).collect();
        let mut consumed = 0;
        let result: Result<(), String> = try_par_for_each_chunk(
            &items,
            2,
            |&x| Ok(x),
            |&item, _| {
                if item == 3 {
                    return Err("stop".to_string());
                }
                consumed += 1;
                Ok(())
            },
        );
        assert_eq!(result.unwrap_err(), "stop");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_try_par_for_each_chunk_stops_after_failing_chunk() {
        let items: Vec<u32> = (0..20).collect();
        let processed = AtomicUsize::new(0);
        let result: Result<(), String> = try_par_for_each_chunk(
            &items,
            5,
            |&x| {
                processed.fetch_add(1, Ordering::Relaxed);
                if x == 7 {
                    Err(format!("bad item {x}"))
                } else {
                    Ok(x)
                }
            },
            |_, _| Ok(()),
        );
        assert_eq!(result.unwrap_err(), "bad item 7");
        // Chunks after the failing one (items 10..20) never start.
        assert!(processed.load(Ordering::Relaxed) <= 10);
    }

    #[test]
    #[should_panic(expected = "max_concurrent must be > 0")]
    fn test_try_par_for_each_chunk_zero_concurrency_panics() {
        let items = vec![1u32];
        let _: Result<(), ()> = try_par_for_each_chunk(&items, 0, |&x| Ok(x), |_, _| Ok(()));
    }
}
