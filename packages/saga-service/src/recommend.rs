//! Request orchestration.
//!
//! Composes catalog, index, personalization, collaborative filtering, and
//! the optional reranker per request: parse the prompt, retrieve, blend,
//! rerank, shape the response.

use std::{cmp::Ordering, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::warn;

use saga_catalog::CatalogEntry;
use saga_index::{Index, SearchHits};

use crate::{RecommenderService, ServiceError, ServiceResult, fusion, profile, query::parse_query};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatRequest {
	pub prompt: String,
	pub user_id: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Recommendation {
	#[serde(flatten)]
	pub entry: CatalogEntry,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub score: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rerank_score: Option<f32>,
}

impl Recommendation {
	fn scored(entry: CatalogEntry, score: f32) -> Self {
		Self { entry, score: Some(score), rerank_score: None }
	}

	fn unscored(entry: CatalogEntry) -> Self {
		Self { entry, score: None, rerank_score: None }
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatResponse {
	pub keywords: Vec<String>,
	pub recommendations: Vec<Recommendation>,
	pub explanation: String,
}

impl RecommenderService {
	pub async fn process_prompt(&self, req: ChatRequest) -> ServiceResult<ChatResponse> {
		let parsed = parse_query(&req.prompt);
		let (recommendations, explanation) = self.recommend(&parsed.raw, req.user_id).await?;

		Ok(ChatResponse { keywords: parsed.keywords, recommendations, explanation })
	}

	/// Head slice of the catalog, unscored.
	pub fn popular(&self) -> Vec<Recommendation> {
		self.catalog
			.head(self.cfg.recommend.top_k as usize)
			.iter()
			.cloned()
			.map(Recommendation::unscored)
			.collect()
	}

	pub async fn recommend(
		&self,
		prompt: &str,
		user_id: Option<i64>,
	) -> ServiceResult<(Vec<Recommendation>, String)> {
		if self.catalog.is_empty() {
			return Ok((Vec::new(), "Catalog is empty.".to_string()));
		}

		let prompt = prompt.trim();
		let top_k = self.cfg.recommend.top_k as usize;

		if prompt.is_empty() {
			// Personalized feed without a prompt; no retrieval otherwise.
			let recs = self.personalized_only(user_id, top_k).await?;

			if !recs.is_empty() {
				return Ok((recs, "Recommendations based on your library.".to_string()));
			}

			return Ok((self.popular(), "Popular picks from the catalog.".to_string()));
		}

		let prompt_weight = self.cfg.recommend.prompt_weight;
		let profile_weight = self.cfg.recommend.profile_weight;
		let cf_weight = self.cfg.recommend.cf_weight;
		let retrieve_k = self.cfg.recommend.retrieve_k as usize;
		let blend_k = self.cfg.recommend.blend_k as usize;
		let index = self.ensure_index().await?;
		let prompt_vec = self.embed_single(prompt).await?;
		let prompt_hits = index.search(&prompt_vec, retrieve_k)?;

		let mut blended: Option<SearchHits> = None;
		let mut profile_used = false;

		if let Some(user_id) = user_id
			&& profile_weight > 0.0
			&& let Some(profile) = self.user_profile(user_id, &index).await?
		{
			let profile_hits = index.search(&profile, retrieve_k)?;

			blended = Some(fusion::fuse(
				&[(&prompt_hits, prompt_weight), (&profile_hits, profile_weight)],
				blend_k,
			));
			profile_used = true;
		}

		let mut cf_used = false;

		if let Some(user_id) = user_id
			&& cf_weight > 0.0
			&& let Some(cf_hits) = self.cf_recommend(user_id, retrieve_k).await
		{
			// CF fuses against the already-blended base, which keeps its
			// combined weight.
			let base = blended.take().unwrap_or_else(|| prompt_hits.clone());

			blended = Some(fusion::fuse(
				&[(&base, prompt_weight + profile_weight), (&cf_hits, cf_weight)],
				blend_k,
			));
			cf_used = true;
		}

		let mut final_hits = blended.unwrap_or(prompt_hits);

		truncate_hits(&mut final_hits, blend_k);

		let mut candidates = self.materialize(&final_hits);

		if self.cfg.recommend.enable_rerank {
			candidates = self.rerank_candidates(prompt, candidates).await;
		}

		let explanation = if cf_used {
			"Recommendations based on your prompt, your library, and community patterns."
		} else if profile_used {
			"Recommendations based on your prompt and your library."
		} else {
			"Recommendations based on your prompt."
		};

		candidates.truncate(top_k);

		Ok((candidates, explanation.to_string()))
	}

	async fn personalized_only(
		&self,
		user_id: Option<i64>,
		top_k: usize,
	) -> ServiceResult<Vec<Recommendation>> {
		let Some(user_id) = user_id else {
			return Ok(Vec::new());
		};
		let index = self.ensure_index().await?;
		let Some(profile) = self.user_profile(user_id, &index).await? else {
			return Ok(Vec::new());
		};
		let hits = index.search(&profile, top_k)?;

		Ok(self.materialize(&hits))
	}

	async fn user_profile(&self, user_id: i64, index: &Index) -> ServiceResult<Option<Vec<f32>>> {
		let rows = self
			.interactions
			.for_user(user_id)
			.await
			.map_err(|err| ServiceError::Storage { message: err.to_string() })?;

		if rows.is_empty() {
			return Ok(None);
		}

		Ok(profile::build_profile(&self.catalog, index, &rows))
	}

	/// Publishes a usable index, rebuilding first whenever the persisted one
	/// is stale against the current catalog fingerprint or embedding model.
	/// Runs before every retrieval session; rebuilds are serialized and the
	/// fresh index is swapped in whole.
	pub(crate) async fn ensure_index(&self) -> ServiceResult<Arc<Index>> {
		let model = self.cfg.providers.embedding.model.clone();
		let fingerprint = saga_catalog::fingerprint(&self.catalog_path);

		if !saga_index::is_stale(&self.paths, &model, fingerprint.as_deref())
			&& let Some(index) = self.index.read().await.as_ref()
		{
			return Ok(index.clone());
		}

		let _build = self.index_build.lock().await;

		// A racing request may have rebuilt while this one waited; judge
		// freshness again under the lock.
		let fingerprint = saga_catalog::fingerprint(&self.catalog_path);
		let fresh = !saga_index::is_stale(&self.paths, &model, fingerprint.as_deref());

		if fresh && let Some(index) = self.index.read().await.as_ref() {
			return Ok(index.clone());
		}

		if fresh {
			match Index::load(&self.paths) {
				Ok(index) => {
					let index = Arc::new(index);

					*self.index.write().await = Some(index.clone());

					return Ok(index);
				},
				Err(err) => {
					warn!(error = %err, "Persisted index failed to load; rebuilding.");
				},
			}
		}

		self.build_index(fingerprint.as_deref().unwrap_or_default()).await
	}

	/// Embeds the catalog and builds a fresh index. Caller holds the build
	/// lock.
	pub(crate) async fn build_index(&self, fingerprint: &str) -> ServiceResult<Arc<Index>> {
		let texts = self.catalog.search_texts();
		let embeddings =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let index = Arc::new(Index::build(
			&self.paths,
			embeddings,
			&self.cfg.providers.embedding.model,
			fingerprint,
		)?);

		*self.index.write().await = Some(index.clone());

		Ok(index)
	}

	async fn embed_single(&self, text: &str) -> ServiceResult<Vec<f32>> {
		let embeddings = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, std::slice::from_ref(&text.to_string()))
			.await?;
		let vector = embeddings.into_iter().next().ok_or_else(|| ServiceError::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})?;

		if vector.len() != self.cfg.providers.embedding.dimensions as usize {
			return Err(ServiceError::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vector)
	}

	/// Resolves hits into full catalog records with attached scores.
	/// Sentinel ids and rows that fail to resolve are dropped, never fatal.
	fn materialize(&self, hits: &SearchHits) -> Vec<Recommendation> {
		let mut out = Vec::new();

		for (id, score) in hits.ids.iter().zip(hits.scores.iter()) {
			if *id < 0 {
				continue;
			}

			let Some(entry) = self.catalog.get(*id as usize) else {
				continue;
			};

			out.push(Recommendation::scored(entry.clone(), *score));
		}

		out
	}

	/// Reranks the bounded head of the candidate list and appends the
	/// untouched remainder; reordering only, never discarding. Any rerank
	/// failure keeps the retrieval ordering.
	async fn rerank_candidates(
		&self,
		prompt: &str,
		candidates: Vec<Recommendation>,
	) -> Vec<Recommendation> {
		if candidates.is_empty() {
			return candidates;
		}

		let split = candidates.len().min(self.cfg.recommend.rerank_n as usize);
		let docs: Vec<String> = candidates[..split].iter().map(rerank_document).collect();
		let scores = match self
			.providers
			.rerank
			.rerank(&self.cfg.providers.rerank, prompt, &docs)
			.await
		{
			Ok(scores) if scores.len() == split => scores,
			Ok(_) => {
				warn!("Rerank provider returned mismatched score count; keeping retrieval order.");

				return candidates;
			},
			Err(err) => {
				warn!(error = %err, "Rerank failed; keeping retrieval order.");

				return candidates;
			},
		};

		let mut tail = candidates;
		let head: Vec<Recommendation> = tail.drain(..split).collect();
		let mut reranked: Vec<(Recommendation, f32)> = head.into_iter().zip(scores).collect();

		// Stable sort: rerank ties keep their retrieval order.
		reranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

		let mut out: Vec<Recommendation> = reranked
			.into_iter()
			.map(|(mut candidate, score)| {
				candidate.rerank_score = Some(score);

				candidate
			})
			.collect();

		out.append(&mut tail);

		out
	}
}

fn rerank_document(candidate: &Recommendation) -> String {
	let search_text = candidate.entry.search_text.trim();

	if search_text.is_empty() {
		return candidate.entry.title.clone();
	}

	candidate.entry.search_text.clone()
}

fn truncate_hits(hits: &mut SearchHits, limit: usize) {
	hits.ids.truncate(limit);
	hits.scores.truncate(limit);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recommendations_serialize_with_flattened_catalog_fields() {
		let entry = CatalogEntry {
			row_id: 3,
			source_id: Some("103".to_string()),
			title: "Starfall".to_string(),
			author: "Ada Vale".to_string(),
			publisher: "Orbit".to_string(),
			genre: "space opera".to_string(),
			series: String::new(),
			description: "space opera galaxy fleet".to_string(),
			tags: vec!["space".to_string(), "opera".to_string()],
			year: Some(2021),
			rating: None,
			cover_image: None,
			search_text: "Starfall Ada Vale Orbit  space opera space opera space opera galaxy fleet"
				.to_string(),
		};
		let rec = Recommendation::scored(entry, 0.5);
		let json = serde_json::to_value(&rec).expect("serialize failed");

		assert_eq!(json["title"], "Starfall");
		assert_eq!(json["row_id"], 3);
		assert_eq!(json["score"], 0.5);
		assert!(json.get("rerank_score").is_none());
	}
}
