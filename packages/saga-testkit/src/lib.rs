//! Deterministic test doubles for the recommender service.
//!
//! Everything here runs in process: a hash-based embedder standing in for
//! the embedding capability, keyword/failing rerankers, an in-memory
//! interaction source, and uuid-named scratch workspaces that clean up on
//! drop.

use std::{
	collections::hash_map::DefaultHasher,
	env, fs,
	hash::{Hash, Hasher},
	path::{Path, PathBuf},
};

use time::OffsetDateTime;
use uuid::Uuid;

use saga_config::{
	Catalog, Cf, Config, EmbeddingProviderConfig, Postgres, ProviderConfig,
	Providers as ProvidersConfig, Recommend, Service, Storage,
};
use saga_service::{BoxFuture, EmbeddingProvider, InteractionSource, RerankProvider};
use saga_storage::models::InteractionRow;

/// Scratch directory for catalog and index artifacts, removed on drop.
pub struct TestWorkspace {
	root: PathBuf,
}

impl TestWorkspace {
	pub fn new() -> Self {
		let root = env::temp_dir().join(format!("saga_test_{}", Uuid::new_v4().simple()));

		fs::create_dir_all(&root).expect("Failed to create test workspace.");

		Self { root }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn catalog_path(&self) -> PathBuf {
		self.root.join("catalog.csv")
	}

	pub fn index_dir(&self) -> PathBuf {
		self.root.join("index")
	}

	pub fn write_catalog(&self, csv_text: &str) {
		fs::write(self.catalog_path(), csv_text).expect("Failed to write test catalog.");
	}

	/// A config wired to this workspace and the in-process doubles: hash
	/// embedder dimensions, blending 0.7/0.3, CF off, rerank off.
	pub fn config(&self) -> Config {
		Config {
			service: Service {
				http_bind: "127.0.0.1:0".to_string(),
				admin_bind: "127.0.0.1:0".to_string(),
				log_level: "info".to_string(),
			},
			catalog: Catalog {
				path: self.catalog_path().display().to_string(),
				index_dir: self.index_dir().display().to_string(),
			},
			storage: Storage {
				postgres: Postgres {
					dsn: "postgres://unused".to_string(),
					pool_max_conns: 1,
				},
			},
			providers: ProvidersConfig {
				embedding: EmbeddingProviderConfig {
					provider_id: "testkit".to_string(),
					api_base: "http://127.0.0.1:0".to_string(),
					api_key: "test-key".to_string(),
					path: "/embed".to_string(),
					model: "hash-embedder".to_string(),
					dimensions: HashEmbedder::DIMENSIONS,
					timeout_ms: 1_000,
					default_headers: Default::default(),
				},
				rerank: ProviderConfig {
					provider_id: "testkit".to_string(),
					api_base: "http://127.0.0.1:0".to_string(),
					api_key: "test-key".to_string(),
					path: "/rerank".to_string(),
					model: "keyword-rerank".to_string(),
					timeout_ms: 1_000,
					default_headers: Default::default(),
				},
			},
			recommend: Recommend::default(),
			cf: Cf::default(),
		}
	}
}

impl Default for TestWorkspace {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for TestWorkspace {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.root);
	}
}

/// Deterministic embedding capability: every lowercase whitespace token
/// hashes to a handful of vector positions, so texts sharing tokens land
/// near each other in the embedding space.
pub struct HashEmbedder;

impl HashEmbedder {
	pub const DIMENSIONS: u32 = 64;

	pub fn encode(text: &str) -> Vec<f32> {
		let dim = Self::DIMENSIONS as usize;
		let mut vector = vec![0.0_f32; dim];

		for token in text.to_lowercase().split_whitespace() {
			let mut hasher = DefaultHasher::new();

			token.hash(&mut hasher);

			let hashed = hasher.finish();

			vector[(hashed % dim as u64) as usize] += 1.0;
			vector[((hashed >> 16) % dim as u64) as usize] += 0.5;
		}

		vector
	}
}

impl EmbeddingProvider for HashEmbedder {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|text| Self::encode(text)).collect()) })
	}
}

/// Rerank capability double: score 1.0 for documents containing the
/// keyword, 0.0 otherwise.
pub struct KeywordRerank {
	pub keyword: String,
}

impl RerankProvider for KeywordRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move {
			Ok(docs
				.iter()
				.map(|doc| if doc.to_lowercase().contains(&self.keyword) { 1.0 } else { 0.0 })
				.collect())
		})
	}
}

/// Rerank capability double that always fails the call.
pub struct FailingRerank;

impl RerankProvider for FailingRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Err(color_eyre::eyre::eyre!("rerank backend offline")) })
	}
}

/// In-memory interaction source.
#[derive(Default)]
pub struct MemoryInteractions {
	rows: Vec<InteractionRow>,
}

impl MemoryInteractions {
	pub fn new(rows: Vec<InteractionRow>) -> Self {
		Self { rows }
	}
}

/// Convenience constructor for one interaction row.
pub fn interaction(
	user_id: i64,
	status: &str,
	source_id: Option<&str>,
	title: &str,
	author: &str,
) -> InteractionRow {
	InteractionRow {
		user_id,
		status: status.to_string(),
		source_id: source_id.map(str::to_string),
		title: title.to_string(),
		author: author.to_string(),
		updated_at: OffsetDateTime::UNIX_EPOCH,
	}
}

impl InteractionSource for MemoryInteractions {
	fn for_user<'a>(
		&'a self,
		user_id: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<InteractionRow>>> {
		Box::pin(async move {
			Ok(self.rows.iter().filter(|row| row.user_id == user_id).cloned().collect())
		})
	}

	fn all<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<InteractionRow>>> {
		Box::pin(async move { Ok(self.rows.clone()) })
	}

	fn count<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<u64>> {
		Box::pin(async move { Ok(self.rows.len() as u64) })
	}

	fn latest_update<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Option<OffsetDateTime>>> {
		Box::pin(async move { Ok(self.rows.iter().map(|row| row.updated_at).max()) })
	}
}
