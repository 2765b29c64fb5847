use std::sync::Arc;

use saga_service::{DbInteractions, RecommenderService};
use saga_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RecommenderService>,
}
impl AppState {
	pub async fn new(config: saga_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;
		let interactions = Arc::new(DbInteractions { db });
		let service = RecommenderService::new(config, interactions);

		Ok(Self { service: Arc::new(service) })
	}
}
