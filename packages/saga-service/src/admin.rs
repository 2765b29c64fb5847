use serde::{Deserialize, Serialize};

use crate::{RecommenderService, ServiceError, ServiceResult};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RebuildReport {
	pub count: usize,
	pub dim: usize,
	pub embedding_model: String,
}

impl RecommenderService {
	/// Forces a rebuild regardless of staleness and republishes the index.
	pub async fn rebuild_index(&self) -> ServiceResult<RebuildReport> {
		if self.catalog.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "Catalog is empty; nothing to index.".to_string(),
			});
		}

		let _build = self.index_build.lock().await;
		let fingerprint = saga_catalog::fingerprint(&self.catalog_path).unwrap_or_default();
		let index = self.build_index(&fingerprint).await?;

		Ok(RebuildReport {
			count: index.matrix().count(),
			dim: index.matrix().dim(),
			embedding_model: self.cfg.providers.embedding.model.clone(),
		})
	}
}
