//! Vector index over catalog embeddings.
//!
//! Owns the persisted embedding matrix and its metadata record, detects
//! staleness against the catalog fingerprint and the embedding model
//! identity, and answers nearest-neighbor queries. With the `ann` feature a
//! derived HNSW graph accelerates search; without it (or while the graph is
//! unavailable) search degrades to a brute-force scan over the matrix.

#[cfg(feature = "ann")]
mod ann;
mod error;
mod matrix;

pub use error::{Error, Result};
pub use matrix::{EmbeddingMatrix, l2_normalize};

use std::{
	cmp::Ordering,
	fs,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

const EMBEDDINGS_FILE: &str = "catalog_embeddings.bin";
const META_FILE: &str = "catalog_meta.json";

/// Artifact locations for one built index.
#[derive(Clone, Debug)]
pub struct IndexPaths {
	dir: PathBuf,
}

impl IndexPaths {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn embeddings(&self) -> PathBuf {
		self.dir.join(EMBEDDINGS_FILE)
	}

	pub fn meta(&self) -> PathBuf {
		self.dir.join(META_FILE)
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IndexMeta {
	pub embedding_model: String,
	pub catalog_fingerprint: String,
	pub built_at: i64,
	pub dim: usize,
	pub count: usize,
}

/// Ranked hits. Ids are signed so callers can carry sentinel "no match"
/// slots; negative ids must be filtered by consumers, never surfaced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchHits {
	pub ids: Vec<i64>,
	pub scores: Vec<f32>,
}

impl SearchHits {
	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}
}

/// An immutable built index. Rebuilds produce a fresh value that the owner
/// publishes wholesale; readers are never exposed to partial state.
pub struct Index {
	matrix: EmbeddingMatrix,
	#[cfg(feature = "ann")]
	ann: Option<ann::AnnGraph>,
}

impl Index {
	/// Normalizes and persists the embedding batch, writes the metadata
	/// record atomically (temp file + rename), and returns the loaded index.
	pub fn build(
		paths: &IndexPaths,
		embeddings: Vec<Vec<f32>>,
		embedding_model: &str,
		catalog_fingerprint: &str,
	) -> Result<Self> {
		let matrix = EmbeddingMatrix::from_rows(embeddings)?;

		fs::create_dir_all(&paths.dir)?;
		matrix.write(&paths.embeddings())?;

		let meta = IndexMeta {
			embedding_model: embedding_model.to_string(),
			catalog_fingerprint: catalog_fingerprint.to_string(),
			built_at: time::OffsetDateTime::now_utc().unix_timestamp(),
			dim: matrix.dim(),
			count: matrix.count(),
		};

		write_meta(&paths.meta(), &meta)?;
		info!(count = meta.count, dim = meta.dim, "Vector index built.");

		Ok(Self::from_matrix(matrix))
	}

	/// Loads the persisted matrix. Fails with [`Error::MissingArtifact`] when
	/// the embeddings file is absent; the caller must rebuild.
	pub fn load(paths: &IndexPaths) -> Result<Self> {
		let matrix = EmbeddingMatrix::read(&paths.embeddings())?;

		Ok(Self::from_matrix(matrix))
	}

	fn from_matrix(matrix: EmbeddingMatrix) -> Self {
		#[cfg(feature = "ann")]
		let ann = (!matrix.is_empty()).then(|| ann::AnnGraph::build(&matrix));

		Self {
			matrix,
			#[cfg(feature = "ann")]
			ann,
		}
	}

	pub fn matrix(&self) -> &EmbeddingMatrix {
		&self.matrix
	}

	/// Per-row vector access for profile construction.
	pub fn embedding(&self, row_id: usize) -> Option<&[f32]> {
		self.matrix.row(row_id)
	}

	/// Nearest neighbors by cosine similarity: strictly descending scores,
	/// ties broken by lower row id, never more than `top_k` results.
	pub fn search(&self, query: &[f32], top_k: usize) -> Result<SearchHits> {
		if query.len() != self.matrix.dim() && !self.matrix.is_empty() {
			return Err(Error::DimensionMismatch {
				got: query.len(),
				expected: self.matrix.dim(),
			});
		}

		let mut query = query.to_vec();

		l2_normalize(&mut query);

		let mut scored = self.scored_candidates(&query, top_k);

		scored.sort_by(|a, b| cmp_hits(*a, *b));
		scored.truncate(top_k);

		let ids = scored.iter().map(|(row_id, _)| *row_id as i64).collect();
		let scores = scored.iter().map(|(_, score)| *score).collect();

		Ok(SearchHits { ids, scores })
	}

	#[cfg(feature = "ann")]
	fn scored_candidates(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
		match self.ann.as_ref() {
			Some(graph) => graph.search(query, top_k),
			None => self.brute_force(query),
		}
	}

	#[cfg(not(feature = "ann"))]
	fn scored_candidates(&self, query: &[f32], _top_k: usize) -> Vec<(usize, f32)> {
		self.brute_force(query)
	}

	fn brute_force(&self, query: &[f32]) -> Vec<(usize, f32)> {
		self.matrix
			.rows()
			.enumerate()
			.map(|(row_id, row)| (row_id, dot(row, query)))
			.collect()
	}
}

/// True when the persisted index cannot be trusted for the given model and
/// catalog: metadata missing or undecodable, model identity changed, catalog
/// fingerprint changed (or unreadable), or the embeddings artifact gone.
pub fn is_stale(
	paths: &IndexPaths,
	embedding_model: &str,
	catalog_fingerprint: Option<&str>,
) -> bool {
	let Some(meta) = read_meta(&paths.meta()) else {
		return true;
	};

	if meta.embedding_model != embedding_model {
		return true;
	}

	let Some(catalog_fingerprint) = catalog_fingerprint else {
		return true;
	};

	if meta.catalog_fingerprint != catalog_fingerprint {
		return true;
	}

	!paths.embeddings().exists()
}

pub fn read_meta(path: &Path) -> Option<IndexMeta> {
	let raw = fs::read_to_string(path).ok()?;

	serde_json::from_str(&raw).ok()
}

fn write_meta(path: &Path, meta: &IndexMeta) -> Result<()> {
	let payload =
		serde_json::to_string(meta).map_err(|err| Error::EncodeMeta { source: err })?;
	let tmp = path.with_extension("json.tmp");

	fs::write(&tmp, payload)?;
	fs::rename(&tmp, path)?;

	Ok(())
}

fn cmp_hits(a: (usize, f32), b: (usize, f32)) -> Ordering {
	b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
