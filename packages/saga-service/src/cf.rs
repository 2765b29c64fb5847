//! Collaborative-filtering cache.
//!
//! Builds an implicit-feedback factorization snapshot from all users'
//! interactions, lazily and time-boxed. A snapshot is immutable; rebuilds
//! produce a new one and republish it atomically, so concurrent readers
//! never observe a partially constructed model. CF is an optional signal:
//! every failure or unmet threshold degrades to "unavailable", never to a
//! request error.

use std::sync::Arc;

use ahash::AHashMap;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use saga_cf::{CfModel, CfParams, ItemUserMatrix};
use saga_index::SearchHits;

use crate::{RecommenderService, profile};

const CF_SEED: u64 = 42;

/// Positive-only implicit weight for CF training. Trash is excluded from
/// training entirely, not just down-weighted.
pub fn training_weight(status: &str) -> f32 {
	match status {
		"favorite" => 3.0,
		"completed" => 2.0,
		"reading" => 1.0,
		_ => 0.0,
	}
}

pub(crate) struct CfSnapshot {
	model: CfModel,
	matrix: ItemUserMatrix,
	user_cols: AHashMap<i64, usize>,
	built_at: OffsetDateTime,
	source_ts: Option<OffsetDateTime>,
}

#[derive(Default)]
pub(crate) struct CfCache {
	published: RwLock<Option<Arc<CfSnapshot>>>,
	build: Mutex<()>,
}

impl RecommenderService {
	/// Collaborative recommendations for one user, or `None` when the signal
	/// is unavailable (thresholds unmet, user unknown to the model, or any
	/// failure along the way).
	pub(crate) async fn cf_recommend(&self, user_id: i64, top_k: usize) -> Option<SearchHits> {
		let snapshot = match self.cf_snapshot().await {
			Ok(snapshot) => snapshot?,
			Err(err) => {
				warn!(error = %err, "Collaborative signal unavailable.");

				return None;
			},
		};
		let col = snapshot.user_cols.get(&user_id).copied()?;
		let recs = snapshot.model.recommend(col, &snapshot.matrix, top_k, true);

		if recs.is_empty() {
			return None;
		}

		Some(SearchHits {
			ids: recs.iter().map(|(item, _)| *item as i64).collect(),
			scores: recs.iter().map(|(_, score)| *score).collect(),
		})
	}

	async fn cf_snapshot(&self) -> color_eyre::Result<Option<Arc<CfSnapshot>>> {
		let total = self.interactions.count().await?;

		if total < self.cfg.cf.min_interactions as u64 {
			return Ok(None);
		}

		let latest = self.interactions.latest_update().await?;

		if let Some(snapshot) = self.cf.published.read().await.as_ref()
			&& snapshot_is_fresh(snapshot, latest, self.cfg.cf.freshness_secs)
		{
			return Ok(Some(snapshot.clone()));
		}

		let _build = self.cf.build.lock().await;

		// A racing request may have republished while this one waited.
		if let Some(snapshot) = self.cf.published.read().await.as_ref()
			&& snapshot_is_fresh(snapshot, latest, self.cfg.cf.freshness_secs)
		{
			return Ok(Some(snapshot.clone()));
		}

		let snapshot = self.build_cf_snapshot(latest).await?;

		if let Some(snapshot) = snapshot.as_ref() {
			*self.cf.published.write().await = Some(snapshot.clone());
		}

		Ok(snapshot)
	}

	async fn build_cf_snapshot(
		&self,
		source_ts: Option<OffsetDateTime>,
	) -> color_eyre::Result<Option<Arc<CfSnapshot>>> {
		let rows = self.interactions.all().await?;

		if rows.is_empty() {
			return Ok(None);
		}

		// Columns cover every interacting user; the gate below counts only
		// users contributing positive training signal.
		let mut user_ids: Vec<i64> = rows.iter().map(|row| row.user_id).collect();

		user_ids.sort_unstable();
		user_ids.dedup();

		let user_cols: AHashMap<i64, usize> =
			user_ids.iter().enumerate().map(|(col, user_id)| (*user_id, col)).collect();
		let mut triplets = Vec::new();
		let mut positive_users = ahash::AHashSet::new();

		for row in &rows {
			let weight = training_weight(&row.status);

			if weight <= 0.0 {
				continue;
			}

			let Some(row_id) = profile::resolve_row_id(&self.catalog, row) else {
				continue;
			};

			positive_users.insert(row.user_id);
			triplets.push((row_id, user_cols[&row.user_id], weight));
		}

		if positive_users.len() < self.cfg.cf.min_users as usize {
			return Ok(None);
		}
		if (triplets.len() as u64) < self.cfg.cf.min_interactions as u64 {
			return Ok(None);
		}

		let matrix = ItemUserMatrix::from_triplets(self.catalog.len(), user_ids.len(), triplets);
		let params = CfParams {
			factors: self.cfg.cf.factors as usize,
			iterations: self.cfg.cf.iterations as usize,
			regularization: self.cfg.cf.regularization,
			seed: CF_SEED,
		};
		let model = saga_cf::fit(&matrix, &params);

		Ok(Some(Arc::new(CfSnapshot {
			model,
			matrix,
			user_cols,
			built_at: OffsetDateTime::now_utc(),
			source_ts,
		})))
	}
}

/// A snapshot is reused only while its source timestamp is unchanged and it
/// is younger than the freshness window; everything else rebuilds.
fn snapshot_is_fresh(
	snapshot: &CfSnapshot,
	latest: Option<OffsetDateTime>,
	freshness_secs: u64,
) -> bool {
	snapshot.source_ts == latest
		&& (OffsetDateTime::now_utc() - snapshot.built_at).whole_seconds()
			< freshness_secs as i64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn training_weights_exclude_trash_and_unknown() {
		assert_eq!(training_weight("favorite"), 3.0);
		assert_eq!(training_weight("completed"), 2.0);
		assert_eq!(training_weight("reading"), 1.0);
		assert_eq!(training_weight("trash"), 0.0);
		assert_eq!(training_weight("bookmarked"), 0.0);
	}
}
