use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub catalog: Catalog,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub recommend: Recommend,
	#[serde(default)]
	pub cf: Cf,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Catalog {
	pub path: String,
	pub index_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Recommend {
	pub prompt_weight: f32,
	pub profile_weight: f32,
	pub cf_weight: f32,
	pub enable_rerank: bool,
	pub retrieve_k: u32,
	pub blend_k: u32,
	pub rerank_n: u32,
	pub top_k: u32,
}
impl Default for Recommend {
	fn default() -> Self {
		Self {
			prompt_weight: 0.7,
			profile_weight: 0.3,
			cf_weight: 0.0,
			enable_rerank: false,
			retrieve_k: 200,
			blend_k: 100,
			rerank_n: 50,
			top_k: 10,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cf {
	pub factors: u32,
	pub iterations: u32,
	pub regularization: f32,
	pub min_interactions: u32,
	pub min_users: u32,
	pub freshness_secs: u64,
}
impl Default for Cf {
	fn default() -> Self {
		Self {
			factors: 64,
			iterations: 15,
			regularization: 0.01,
			min_interactions: 20,
			min_users: 2,
			freshness_secs: 600,
		}
	}
}
