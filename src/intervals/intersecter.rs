use super::Interval;
use crate::error::{RangeError, Result};

/// In-memory overlap queries over intervals carrying a value
///
/// Intervals are appended freely; the first query after a change sorts
/// them by `(start, end)` and records, for every position in that order,
/// the largest end seen so far. A query then binary searches the last
/// interval starting before the window and walks backwards until no
/// earlier interval can reach into it.
///
/// ```rust
/// use binspan::intervals::{Intersecter, Interval};
///
/// let mut intersecter = Intersecter::new();
/// for (start, end) in [(0, 10), (3, 7), (3, 40), (10, 50)] {
///     intersecter.add(start, end, ()).unwrap();
/// }
/// let hits: Vec<Interval> = intersecter
///     .find(10, 100)
///     .into_iter()
///     .map(|(iv, _)| iv)
///     .collect();
/// assert_eq!(hits, vec![Interval::new(3, 40), Interval::new(10, 50)]);
/// ```
#[derive(Debug, Clone)]
pub struct Intersecter<V> {
    entries: Vec<(Interval, V)>,

    /// `max_ends[i]` is the largest end among `entries[..=i]`
    max_ends: Vec<usize>,

    /// Whether `entries` changed since `max_ends` was built
    dirty: bool,
}
impl<V> Default for Intersecter<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            max_ends: Vec::new(),
            dirty: false,
        }
    }
}
impl<V> Intersecter<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `[start, end)` with `value`
    ///
    /// # Errors
    ///
    /// * `RangeError::InvalidInterval` - If `start >= end`
    pub fn add(&mut self, start: usize, end: usize, value: V) -> Result<()> {
        self.add_interval(Interval::new(start, end), value)
    }

    pub fn add_interval(&mut self, interval: Interval, value: V) -> Result<()> {
        if interval.is_empty() {
            return Err(RangeError::InvalidInterval {
                start: interval.start,
                end: interval.end,
            }
            .into());
        }
        self.entries.push((interval, value));
        self.dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prepare(&mut self) {
        if !self.dirty {
            return;
        }
        // stable, so equal intervals keep insertion order
        self.entries.sort_by_key(|(iv, _)| *iv);
        self.max_ends.clear();
        let mut reach = 0;
        for (iv, _) in &self.entries {
            reach = reach.max(iv.end);
            self.max_ends.push(reach);
        }
        self.dirty = false;
    }

    /// Stored intervals sharing at least one position with `[start, end)`,
    /// ordered by `(start, end)`
    pub fn find(&mut self, start: usize, end: usize) -> Vec<(Interval, &V)> {
        self.prepare();
        let last = self.entries.partition_point(|(iv, _)| iv.start < end);
        let mut hits = Vec::new();
        for i in (0..last).rev() {
            if self.max_ends[i] <= start {
                break;
            }
            let (iv, value) = &self.entries[i];
            if iv.end > start {
                hits.push((*iv, value));
            }
        }
        hits.reverse();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn spans<V>(hits: &[(Interval, &V)]) -> Vec<(usize, usize)> {
        hits.iter().map(|(iv, _)| (iv.start, iv.end)).collect()
    }

    #[test]
    fn test_window_queries() -> Result<()> {
        let mut intersecter = Intersecter::new();
        for (start, end) in [(0, 10), (3, 7), (3, 40), (10, 50)] {
            intersecter.add(start, end, start * 100 + end)?;
        }
        assert_eq!(
            spans(&intersecter.find(2, 5)),
            vec![(0, 10), (3, 7), (3, 40)]
        );
        assert_eq!(spans(&intersecter.find(10, 100)), vec![(3, 40), (10, 50)]);
        assert!(intersecter.find(100, 200).is_empty());

        let hits = intersecter.find(45, 46);
        assert_eq!(hits.len(), 1);
        assert_eq!(*hits[0].1, 1_050);
        Ok(())
    }

    #[test]
    fn test_adds_after_query() -> Result<()> {
        let mut intersecter = Intersecter::new();
        intersecter.add(100, 200, 'a')?;
        assert!(intersecter.find(0, 50).is_empty());
        intersecter.add(0, 60, 'b')?;
        intersecter.add_interval(Interval::new(10, 20), 'c')?;
        assert_eq!(spans(&intersecter.find(0, 50)), vec![(0, 60), (10, 20)]);
        assert_eq!(intersecter.len(), 3);
        Ok(())
    }

    #[test]
    fn test_rejects_empty_intervals() {
        let mut intersecter = Intersecter::new();
        assert!(intersecter.add(5, 5, ()).is_err());
        assert!(intersecter.add(6, 5, ()).is_err());
        assert!(intersecter.is_empty());
    }

    #[test]
    fn test_matches_brute_force() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut intersecter = Intersecter::new();
        let mut all = Vec::new();
        for id in 0..2_000usize {
            let start = rng.random_range(0..100_000);
            let end = start + rng.random_range(1..2_000);
            intersecter.add(start, end, id)?;
            all.push((start, end, id));
        }
        all.sort_by_key(|&(start, end, id)| (start, end, id));
        for _ in 0..300 {
            let start = rng.random_range(0..101_000);
            let end = start + rng.random_range(0..3_000);
            let expected: Vec<usize> = all
                .iter()
                .filter(|&&(s, e, _)| s < end && e > start)
                .map(|&(_, _, id)| id)
                .collect();
            let found: Vec<usize> = intersecter
                .find(start, end)
                .into_iter()
                .map(|(_, &id)| id)
                .collect();
            assert_eq!(found, expected);
        }
        Ok(())
    }
}
