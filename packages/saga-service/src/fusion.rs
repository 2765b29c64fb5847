//! Linear rank fusion.
//!
//! Weighted score accumulation over ranked candidate lists. Inputs must
//! already carry similarity scores on a comparable scale; this is score
//! fusion, not rank-position fusion.

use std::cmp::Ordering;

use ahash::AHashMap;

use saga_index::SearchHits;

/// Accumulates `weight · score` per row id across all lists, skipping
/// sentinel (negative) ids, and returns the `top_k` rows by accumulated
/// score descending, ties broken by lower id. Folding repeated two-way
/// calls is equivalent to one multi-way accumulation.
pub fn fuse(lists: &[(&SearchHits, f32)], top_k: usize) -> SearchHits {
	let mut score_map: AHashMap<i64, f32> = AHashMap::new();

	for (hits, weight) in lists {
		for (id, score) in hits.ids.iter().zip(hits.scores.iter()) {
			if *id < 0 {
				continue;
			}

			*score_map.entry(*id).or_insert(0.0) += weight * score;
		}
	}

	let mut entries: Vec<(i64, f32)> = score_map.into_iter().collect();

	entries.sort_by(|a, b| {
		b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
	});
	entries.truncate(top_k);

	SearchHits {
		ids: entries.iter().map(|(id, _)| *id).collect(),
		scores: entries.iter().map(|(_, score)| *score).collect(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hits(pairs: &[(i64, f32)]) -> SearchHits {
		SearchHits {
			ids: pairs.iter().map(|(id, _)| *id).collect(),
			scores: pairs.iter().map(|(_, score)| *score).collect(),
		}
	}

	#[test]
	fn duplicate_ids_accumulate_instead_of_overwriting() {
		let a = hits(&[(1, 0.5), (2, 0.4)]);
		let b = hits(&[(1, 0.8), (3, 0.2)]);
		let fused = fuse(&[(&a, 1.0), (&b, 1.0)], 10);

		assert_eq!(fused.ids[0], 1);
		assert!((fused.scores[0] - 1.3).abs() < 1e-6);
	}

	#[test]
	fn sentinel_ids_are_skipped() {
		let a = hits(&[(-1, 0.9), (4, 0.3)]);
		let fused = fuse(&[(&a, 1.0)], 10);

		assert_eq!(fused.ids, vec![4]);
	}

	#[test]
	fn results_are_bounded_and_descending_with_stable_ties() {
		let a = hits(&[(3, 0.5), (1, 0.5), (2, 0.7), (4, 0.1)]);
		let fused = fuse(&[(&a, 1.0)], 3);

		assert_eq!(fused.ids, vec![2, 1, 3]);

		for pair in fused.scores.windows(2) {
			assert!(pair[0] >= pair[1]);
		}
	}

	#[test]
	fn weights_scale_contributions() {
		let a = hits(&[(1, 1.0)]);
		let b = hits(&[(2, 1.0)]);
		let fused = fuse(&[(&a, 0.7), (&b, 0.3)], 10);

		assert_eq!(fused.ids, vec![1, 2]);
		assert!((fused.scores[0] - 0.7).abs() < 1e-6);
		assert!((fused.scores[1] - 0.3).abs() < 1e-6);
	}

	#[test]
	fn folded_two_way_fusion_matches_three_way_accumulation() {
		let a = hits(&[(1, 0.9), (2, 0.5), (3, 0.1)]);
		let b = hits(&[(2, 0.8), (3, 0.6), (4, 0.4)]);
		let c = hits(&[(1, 0.2), (4, 0.9), (5, 0.7)]);

		let three_way = fuse(&[(&a, 0.5), (&b, 0.3), (&c, 0.2)], 10);
		let partial = fuse(&[(&a, 0.5), (&b, 0.3)], 10);
		let folded = fuse(&[(&partial, 1.0), (&c, 0.2)], 10);

		assert_eq!(three_way.ids, folded.ids);

		for (left, right) in three_way.scores.iter().zip(folded.scores.iter()) {
			assert!((left - right).abs() < 1e-5);
		}
	}
}
