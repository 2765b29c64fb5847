//! Personalization profile construction.
//!
//! Collapses a user's implicit library interactions into one dense vector in
//! the catalog embedding space, searchable exactly like a query embedding.

use saga_catalog::Catalog;
use saga_index::Index;
use saga_storage::models::InteractionRow;

const PROFILE_EPSILON: f32 = 1e-6;

/// Signed implicit-feedback weight for profile construction. Unknown
/// statuses carry no signal and are excluded.
pub fn profile_weight(status: &str) -> f32 {
	match status {
		"favorite" => 2.0,
		"completed" => 1.5,
		"reading" => 1.0,
		"trash" => -1.0,
		_ => 0.0,
	}
}

/// Resolves an interaction to a catalog row: source id first, title/author
/// best-effort second. `None` drops the single interaction, never the batch.
pub fn resolve_row_id(catalog: &Catalog, interaction: &InteractionRow) -> Option<usize> {
	if let Some(source_id) = interaction.source_id.as_deref()
		&& let Some(row_id) = catalog.row_id_for_source(source_id)
	{
		return Some(row_id);
	}

	catalog.resolve_by_title(&interaction.title, Some(&interaction.author))
}

/// Weighted average of the resolved items' stored embeddings:
/// `Σ(wᵢ·vᵢ) / (Σ|wᵢ| + ε)`. The epsilon only guards exact zero, so a
/// trash-only (all-negative) profile is still a valid profile. `None` when
/// no interaction resolves or every weight is zero.
pub fn build_profile(
	catalog: &Catalog,
	index: &Index,
	interactions: &[InteractionRow],
) -> Option<Vec<f32>> {
	let dim = index.matrix().dim();
	let mut sum = vec![0.0_f32; dim];
	let mut abs_weight = 0.0_f32;
	let mut resolved = 0_usize;

	for interaction in interactions {
		let weight = profile_weight(&interaction.status);

		if weight == 0.0 {
			continue;
		}

		let Some(row_id) = resolve_row_id(catalog, interaction) else {
			continue;
		};
		let Some(vector) = index.embedding(row_id) else {
			continue;
		};

		for (acc, value) in sum.iter_mut().zip(vector.iter()) {
			*acc += weight * value;
		}

		abs_weight += weight.abs();
		resolved += 1;
	}

	if resolved == 0 {
		return None;
	}

	let denom = abs_weight + PROFILE_EPSILON;

	for value in sum.iter_mut() {
		*value /= denom;
	}

	Some(sum)
}

#[cfg(test)]
mod tests {
	use std::{
		env,
		path::Path,
		sync::atomic::{AtomicU64, Ordering},
		time::{SystemTime, UNIX_EPOCH},
	};

	use time::OffsetDateTime;

	use saga_index::IndexPaths;

	use super::*;

	fn temp_paths() -> IndexPaths {
		static COUNTER: AtomicU64 = AtomicU64::new(0);

		let nanos = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.expect("System time must be valid.")
			.as_nanos();
		let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
		let mut dir = env::temp_dir();

		dir.push(format!("saga_profile_test_{nanos}_{}_{ordinal}", std::process::id()));

		IndexPaths::new(dir)
	}

	fn sample_catalog() -> Catalog {
		let dir = env::temp_dir().join(format!(
			"saga_profile_catalog_{}_{}",
			std::process::id(),
			SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.expect("System time must be valid.")
				.as_nanos()
		));

		std::fs::create_dir_all(&dir).expect("Failed to create catalog dir.");

		let path = dir.join("catalog.csv");

		std::fs::write(&path, "id,title,author\n10,Alpha,Ann\n11,Beta,Bob\n12,Gamma,Cem\n")
			.expect("Failed to write catalog.");

		Catalog::load(Path::new(&path))
	}

	fn sample_index() -> Index {
		Index::build(
			&temp_paths(),
			vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
			"model-a",
			"fp-1",
		)
		.expect("build failed")
	}

	fn interaction(status: &str, source_id: Option<&str>, title: &str) -> InteractionRow {
		InteractionRow {
			user_id: 1,
			status: status.to_string(),
			source_id: source_id.map(str::to_string),
			title: title.to_string(),
			author: String::new(),
			updated_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn profile_averages_resolved_vectors_by_weight() {
		let catalog = sample_catalog();
		let index = sample_index();
		let profile = build_profile(
			&catalog,
			&index,
			&[interaction("favorite", Some("10"), "Alpha")],
		)
		.expect("profile missing");

		// Single favorite: vector scaled by 2.0 / (2.0 + ε), almost itself.
		assert!((profile[0] - 1.0).abs() < 1e-3);
		assert!(profile[1].abs() < 1e-6);
	}

	#[test]
	fn trash_only_profile_is_still_computed() {
		let catalog = sample_catalog();
		let index = sample_index();
		let profile =
			build_profile(&catalog, &index, &[interaction("trash", Some("11"), "Beta")])
				.expect("negative-only profile must exist");

		assert!(profile[1] < 0.0);
	}

	#[test]
	fn unknown_statuses_and_unresolvable_rows_are_dropped() {
		let catalog = sample_catalog();
		let index = sample_index();

		assert!(
			build_profile(
				&catalog,
				&index,
				&[
					interaction("bookmarked", Some("10"), "Alpha"),
					interaction("favorite", None, "No Such Title"),
				],
			)
			.is_none()
		);
	}

	#[test]
	fn title_fallback_resolves_when_source_id_is_unknown() {
		let catalog = sample_catalog();
		let index = sample_index();
		let profile =
			build_profile(&catalog, &index, &[interaction("reading", Some("999"), "Gamma")])
				.expect("profile missing");

		assert!(profile[0] > 0.0 && profile[1] > 0.0);
	}

	#[test]
	fn no_interactions_means_no_profile() {
		let catalog = sample_catalog();
		let index = sample_index();

		assert!(build_profile(&catalog, &index, &[]).is_none());
	}
}
