//! Recommendation service.
//!
//! Composes the catalog store, the vector index, the optional collaborative
//! signal, and the external embedding/rerank capabilities into one request
//! path. The service object is constructed explicitly and injected into
//! request handlers; collaborators arrive as trait objects so tests can
//! swap in deterministic doubles.

pub mod admin;
pub mod cf;
pub mod fusion;
pub mod profile;
pub mod query;
pub mod recommend;

mod error;

pub use admin::RebuildReport;
pub use error::{ServiceError, ServiceResult};
pub use query::{ParsedQuery, parse_query};
pub use recommend::{ChatRequest, ChatResponse, Recommendation};

use std::{future::Future, path::PathBuf, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use saga_catalog::Catalog;
use saga_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use saga_index::{Index, IndexPaths};
use saga_providers::{embedding, rerank};
use saga_storage::{db::Db, models::InteractionRow, queries};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

/// Read-only view of the library collaborator's interaction records.
pub trait InteractionSource
where
	Self: Send + Sync,
{
	fn for_user<'a>(
		&'a self,
		user_id: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<InteractionRow>>>;
	fn all<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<InteractionRow>>>;
	fn count<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<u64>>;
	fn latest_update<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Option<OffsetDateTime>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}

pub struct RecommenderService {
	pub cfg: Config,
	pub(crate) catalog: Catalog,
	pub(crate) catalog_path: PathBuf,
	pub(crate) paths: IndexPaths,
	pub(crate) providers: Providers,
	pub(crate) interactions: Arc<dyn InteractionSource>,
	// Last-known-good built index; reads clone the Arc, rebuilds publish a
	// fresh value. The mutex serializes rebuilds only.
	pub(crate) index: RwLock<Option<Arc<Index>>>,
	pub(crate) index_build: Mutex<()>,
	pub(crate) cf: cf::CfCache,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

/// [`InteractionSource`] backed by the library collaborator's database.
pub struct DbInteractions {
	pub db: Db,
}

impl InteractionSource for DbInteractions {
	fn for_user<'a>(
		&'a self,
		user_id: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<InteractionRow>>> {
		Box::pin(async move { Ok(queries::interactions_for_user(&self.db.pool, user_id).await?) })
	}

	fn all<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<InteractionRow>>> {
		Box::pin(async move { Ok(queries::all_interactions(&self.db.pool).await?) })
	}

	fn count<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<u64>> {
		Box::pin(async move {
			Ok(queries::interaction_count(&self.db.pool).await?.max(0) as u64)
		})
	}

	fn latest_update<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Option<OffsetDateTime>>> {
		Box::pin(async move { Ok(queries::latest_interaction_at(&self.db.pool).await?) })
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), rerank: provider }
	}
}

impl RecommenderService {
	pub fn new(cfg: Config, interactions: Arc<dyn InteractionSource>) -> Self {
		Self::with_providers(cfg, interactions, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		interactions: Arc<dyn InteractionSource>,
		providers: Providers,
	) -> Self {
		let catalog_path = PathBuf::from(&cfg.catalog.path);
		let catalog = Catalog::load(&catalog_path);
		let paths = IndexPaths::new(&cfg.catalog.index_dir);

		Self {
			cfg,
			catalog,
			catalog_path,
			paths,
			providers,
			interactions,
			index: RwLock::new(None),
			index_build: Mutex::new(()),
			cf: cf::CfCache::default(),
		}
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}
}
