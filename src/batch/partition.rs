/// Splits `items` into `pool_count` contiguous slices of at most `pool_size`.
///
/// Slice `i` covers `[i * pool_size, (i + 1) * pool_size)` clamped to the
/// list length, so slices never overlap, keep the original order, and any
/// slice starting past the end is empty. Items beyond
/// `pool_count * pool_size` are not assigned to any pool.
pub fn partition<T>(items: &[T], pool_count: usize, pool_size: usize) -> Vec<&[T]> {
    (0..pool_count)
        .map(|i| {
            let start = i.saturating_mul(pool_size).min(items.len());
            let end = start.saturating_add(pool_size).min(items.len());
            &items[start..end]
        })
        .collect()
}
