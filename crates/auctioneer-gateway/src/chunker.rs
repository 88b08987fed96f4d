//! Order-preserving chunking of oversized request lists.

use std::num::NonZeroUsize;

/// Lazy iterator over at-most-`limit`-sized slices of a list.
///
/// An input at or below the limit, including an empty one, is yielded whole
/// as a single chunk. A longer input never produces an empty chunk.
#[derive(Debug, Clone)]
pub struct Chunks<'a, T> {
    rest: Option<&'a [T]>,
    limit: usize,
}

/// Split `items` into chunks of at most `limit` elements.
pub fn chunks<T>(items: &[T], limit: NonZeroUsize) -> Chunks<'_, T> {
    Chunks {
        rest: Some(items),
        limit: limit.get(),
    }
}

impl<'a, T> Iterator for Chunks<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest.take()?;
        if rest.len() <= self.limit {
            return Some(rest);
        }
        let (head, tail) = rest.split_at(self.limit);
        self.rest = Some(tail);
        Some(head)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.rest {
            None => 0,
            Some(rest) if rest.is_empty() => 1,
            Some(rest) => rest.len().div_ceil(self.limit),
        };
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Chunks<'_, T> {}

/// Compile-time checked chunk limit.
pub const fn limit(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("chunk limit must be positive"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(items: &[u32], n: usize) -> Vec<Vec<u32>> {
        chunks(items, limit(n)).map(<[u32]>::to_vec).collect()
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        for len in [1usize, 2, 9, 10, 11, 25, 100] {
            let items: Vec<u32> = (0..len as u32).collect();
            for n in [1usize, 3, 10, 200] {
                let parts = collect(&items, n);
                assert!(parts.iter().all(|c| !c.is_empty() && c.len() <= n));
                assert_eq!(parts.concat(), items);
                assert_eq!(parts.len(), chunks(&items, limit(n)).len());
            }
        }
    }

    #[test]
    fn test_split_sizes() {
        let items: Vec<u32> = (0..25).collect();
        let sizes: Vec<usize> = chunks(&items, limit(10)).map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_input_at_limit_is_one_chunk() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(collect(&items, 10), vec![items.clone()]);
    }

    #[test]
    fn test_empty_input_yields_one_empty_chunk() {
        let parts = collect(&[], 10);
        assert_eq!(parts, vec![Vec::<u32>::new()]);
    }
}
