//! Derived HNSW graph over the persisted matrix.
//!
//! The matrix on disk is the source of truth; the graph is rebuilt from it
//! at load time and never persisted. Distances are cosine distances over
//! already-normalized rows, so `score = 1 − distance`.

use anndists::dist::distances::DistCosine;
use hnsw_rs::prelude::Hnsw;

use crate::matrix::EmbeddingMatrix;

const MAX_NB_CONNECTION: usize = 16;
const NB_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH_MIN: usize = 50;
const EF_SEARCH_MAX: usize = 10_000;

pub(crate) struct AnnGraph {
	hnsw: Hnsw<'static, f32, DistCosine>,
}

impl AnnGraph {
	pub(crate) fn build(matrix: &EmbeddingMatrix) -> Self {
		let hnsw = Hnsw::<f32, DistCosine>::new(
			MAX_NB_CONNECTION,
			matrix.count().max(1024),
			NB_LAYER,
			EF_CONSTRUCTION,
			DistCosine {},
		);

		for (row_id, row) in matrix.rows().enumerate() {
			let row = row.to_vec();

			hnsw.insert((&row, row_id));
		}

		Self { hnsw }
	}

	pub(crate) fn search(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
		let ef_search = top_k.saturating_mul(2).clamp(EF_SEARCH_MIN, EF_SEARCH_MAX);

		self.hnsw
			.search(query, top_k, ef_search)
			.into_iter()
			.map(|neighbour| (neighbour.d_id, 1.0 - neighbour.distance))
			.collect()
	}
}
