use std::{collections::BTreeMap, ops::RangeInclusive};

/// A set of non-negative integer offsets, stored as disjoint inclusive intervals.
///
/// Intervals are merged on insertion whenever they overlap or touch each other, so the set is
/// always kept maximally coalesced: `[0, 10]` and `[11, 20]` are stored as `[0, 20]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
	// start -> inclusive end
	intervals: BTreeMap<u64, u64>,
}

impl RangeSet {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, range: RangeInclusive<u64>) {
		let (mut start, mut end) = range.into_inner();
		if start > end {
			return;
		}

		// An interval starting before us may overlap or be adjacent
		if let Some((&prev_start, &prev_end)) = self.intervals.range(..=start).next_back() {
			if prev_end.saturating_add(1) >= start {
				start = prev_start;
				end = end.max(prev_end);
			}
		}

		// Swallow every interval starting inside, or right after, the new one
		let upper = end.saturating_add(1);
		let swallowed = self
			.intervals
			.range(start..=upper)
			.map(|(&s, &e)| (s, e))
			.collect::<Vec<_>>();

		for (s, e) in swallowed {
			self.intervals.remove(&s);
			end = end.max(e);
		}

		self.intervals.insert(start, end);
	}

	/// Whether every offset in `range` is in the set
	#[must_use]
	pub fn encloses(&self, range: RangeInclusive<u64>) -> bool {
		let (start, end) = range.into_inner();
		if start > end {
			return true;
		}

		self.intervals
			.range(..=start)
			.next_back()
			.is_some_and(|(_, &interval_end)| interval_end >= end)
	}

	/// The largest `n` such that `[0, n]` is fully in the set
	#[must_use]
	pub fn contiguous_from_zero(&self) -> Option<u64> {
		self.intervals.get(&0).copied()
	}

	#[must_use]
	pub fn interval_count(&self) -> usize {
		self.intervals.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.intervals.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = RangeInclusive<u64>> + '_ {
		self.intervals.iter().map(|(&start, &end)| start..=end)
	}
}

impl FromIterator<RangeInclusive<u64>> for RangeSet {
	fn from_iter<T: IntoIterator<Item = RangeInclusive<u64>>>(iter: T) -> Self {
		let mut set = Self::new();
		for range in iter {
			set.insert(range);
		}
		set
	}
}
