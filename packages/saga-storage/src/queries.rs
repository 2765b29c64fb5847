use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{Result, models::InteractionRow};

const INTERACTION_COLUMNS: &str = "\
uc.user_id, uc.status, c.source_id, c.title, c.author, uc.updated_at";

pub async fn interactions_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<InteractionRow>> {
	let rows = sqlx::query_as(&format!(
		"\
SELECT {INTERACTION_COLUMNS}
FROM user_comics uc
JOIN comics c ON c.id = uc.comic_id
WHERE uc.user_id = $1"
	))
	.bind(user_id)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn all_interactions(pool: &PgPool) -> Result<Vec<InteractionRow>> {
	let rows = sqlx::query_as(&format!(
		"\
SELECT {INTERACTION_COLUMNS}
FROM user_comics uc
JOIN comics c ON c.id = uc.comic_id"
	))
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn interaction_count(pool: &PgPool) -> Result<i64> {
	let count: i64 =
		sqlx::query_scalar("SELECT COUNT(*) FROM user_comics").fetch_one(pool).await?;

	Ok(count)
}

pub async fn latest_interaction_at(pool: &PgPool) -> Result<Option<OffsetDateTime>> {
	let latest: Option<OffsetDateTime> =
		sqlx::query_scalar("SELECT MAX(updated_at) FROM user_comics").fetch_one(pool).await?;

	Ok(latest)
}
