use time::OffsetDateTime;

/// One library interaction joined to its comic's identity columns. The
/// identity fields exist to resolve the row back to a catalog row id:
/// `source_id` first, title/author as the last-resort fallback.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InteractionRow {
	pub user_id: i64,
	pub status: String,
	pub source_id: Option<String>,
	pub title: String,
	pub author: String,
	pub updated_at: OffsetDateTime,
}
