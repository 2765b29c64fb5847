//! Catalog store.
//!
//! Loads a row-oriented catalog file into a fixed schema, assigns dense row
//! ids, and builds the identity mappings the retrieval layer works with.
//! Loading is best-effort by contract: a missing or unreadable source yields
//! an empty catalog, malformed rows are skipped.

use std::{fs, path::Path};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One normalized catalog row. `row_id` is a dense 0-based offset that stays
/// stable for the lifetime of one built index.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CatalogEntry {
	pub row_id: usize,
	pub source_id: Option<String>,
	pub title: String,
	pub author: String,
	pub publisher: String,
	pub genre: String,
	pub series: String,
	pub description: String,
	pub tags: Vec<String>,
	pub year: Option<i32>,
	pub rating: Option<f32>,
	pub cover_image: Option<String>,
	pub search_text: String,
}

#[derive(Debug, Default)]
pub struct Catalog {
	entries: Vec<CatalogEntry>,
	source_ids: AHashMap<String, usize>,
}

/// Column layout resolved from the header row. Aliases apply only when the
/// canonical column is absent.
struct Columns {
	source_id: Option<usize>,
	title: Option<usize>,
	author: Option<usize>,
	publisher: Option<usize>,
	genre: Option<usize>,
	series: Option<usize>,
	description: Option<usize>,
	tags: Option<usize>,
	year: Option<usize>,
	rating: Option<usize>,
	cover_image: Option<usize>,
}

impl Columns {
	fn resolve(headers: &csv::StringRecord) -> Self {
		let index_of = |name: &str| {
			headers.iter().position(|header| header.trim().eq_ignore_ascii_case(name))
		};
		let aliased = |canonical: &str, alias: &str| index_of(canonical).or_else(|| index_of(alias));

		Self {
			source_id: index_of("id").or_else(|| index_of("name")),
			title: aliased("title", "name"),
			author: aliased("author", "authors"),
			publisher: index_of("publisher"),
			genre: aliased("genre", "genres"),
			series: index_of("series"),
			description: aliased("description", "summary"),
			tags: index_of("tags"),
			year: index_of("year"),
			rating: index_of("rating"),
			cover_image: aliased("cover_image", "cover_url"),
		}
	}
}

impl Catalog {
	/// Loads and normalizes the catalog. Never fails the caller: a missing or
	/// unreadable source yields an empty catalog.
	pub fn load(path: &Path) -> Self {
		let reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
			Ok(reader) => reader,
			Err(err) => {
				warn!(path = %path.display(), error = %err, "Catalog source is unreadable.");

				return Self::default();
			},
		};

		Self::from_reader(reader)
	}

	fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Self {
		let headers = match reader.headers() {
			Ok(headers) => headers.clone(),
			Err(err) => {
				warn!(error = %err, "Catalog header row is unreadable.");

				return Self::default();
			},
		};
		let columns = Columns::resolve(&headers);
		let mut entries = Vec::new();
		let mut source_ids = AHashMap::new();

		for record in reader.records() {
			let record = match record {
				Ok(record) => record,
				Err(err) => {
					warn!(error = %err, "Skipping malformed catalog row.");

					continue;
				},
			};
			let row_id = entries.len();
			let entry = normalize_row(row_id, &columns, &record);

			if let Some(source_id) = entry.source_id.as_ref() {
				// First occurrence wins on duplicate source ids.
				source_ids.entry(source_id.clone()).or_insert(row_id);
			}

			entries.push(entry);
		}

		Self { entries, source_ids }
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn entries(&self) -> &[CatalogEntry] {
		&self.entries
	}

	pub fn get(&self, row_id: usize) -> Option<&CatalogEntry> {
		self.entries.get(row_id)
	}

	pub fn head(&self, n: usize) -> &[CatalogEntry] {
		&self.entries[..self.entries.len().min(n)]
	}

	/// The text fed to the embedding capability, one string per row id.
	pub fn search_texts(&self) -> Vec<String> {
		self.entries.iter().map(|entry| entry.search_text.clone()).collect()
	}

	pub fn row_id_for_source(&self, source_id: &str) -> Option<usize> {
		self.source_ids.get(source_id).copied()
	}

	/// Best-effort fallback resolver for interactions without a usable source
	/// id. Matches on lowercased, trimmed title; an author, when given,
	/// narrows the match. First match wins — ambiguity on duplicate titles is
	/// accepted, this is a last resort, not a key.
	pub fn resolve_by_title(&self, title: &str, author: Option<&str>) -> Option<usize> {
		let title = title.trim().to_lowercase();

		if title.is_empty() {
			return None;
		}

		let author = author.map(|author| author.trim().to_lowercase()).filter(|a| !a.is_empty());
		let mut title_match = None;

		for entry in &self.entries {
			if entry.title.trim().to_lowercase() != title {
				continue;
			}
			if title_match.is_none() {
				title_match = Some(entry.row_id);
			}

			match author.as_deref() {
				Some(author) =>
					if entry.author.trim().to_lowercase() == author {
						return Some(entry.row_id);
					},
				None => return Some(entry.row_id),
			}
		}

		title_match
	}
}

/// Content fingerprint of the catalog source, used for index staleness
/// detection. `None` when the file cannot be read.
pub fn fingerprint(path: &Path) -> Option<String> {
	let bytes = fs::read(path).ok()?;

	Some(blake3::hash(&bytes).to_hex().to_string())
}

fn normalize_row(row_id: usize, columns: &Columns, record: &csv::StringRecord) -> CatalogEntry {
	let text = |column: Option<usize>| {
		column.and_then(|idx| record.get(idx)).unwrap_or_default().trim().to_string()
	};
	let optional = |column: Option<usize>| Some(text(column)).filter(|value| !value.is_empty());

	let title = text(columns.title);
	let author = text(columns.author);
	let publisher = text(columns.publisher);
	let genre = text(columns.genre);
	let series = text(columns.series);
	let description = text(columns.description);
	let tags = parse_tags(&text(columns.tags));
	let search_text = build_search_text(SearchTextParts {
		title: &title,
		author: &author,
		publisher: &publisher,
		series: &series,
		genre: &genre,
		tags: &tags,
		description: &description,
	});

	CatalogEntry {
		row_id,
		source_id: optional(columns.source_id),
		year: text(columns.year).parse().ok(),
		rating: text(columns.rating).parse().ok(),
		cover_image: optional(columns.cover_image),
		title,
		author,
		publisher,
		genre,
		series,
		description,
		tags,
		search_text,
	}
}

/// Tags split on comma, trimmed, lowercased, empties dropped, order kept.
/// De-duplication is deliberately not applied.
pub fn parse_tags(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(|tag| tag.trim().to_lowercase())
		.filter(|tag| !tag.is_empty())
		.collect()
}

pub struct SearchTextParts<'a> {
	pub title: &'a str,
	pub author: &'a str,
	pub publisher: &'a str,
	pub series: &'a str,
	pub genre: &'a str,
	pub tags: &'a [String],
	pub description: &'a str,
}

/// The embedding input. The field order is a compatibility contract: this is
/// the literal text the embedding capability sees, so reordering it changes
/// every vector.
pub fn build_search_text(parts: SearchTextParts<'_>) -> String {
	format!(
		"{} {} {} {} {} {} {}",
		parts.title,
		parts.author,
		parts.publisher,
		parts.series,
		parts.genre,
		parts.tags.join(" "),
		parts.description,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn catalog_from(csv_text: &str) -> Catalog {
		let reader = csv::ReaderBuilder::new().flexible(true).from_reader(csv_text.as_bytes());

		Catalog::from_reader(reader)
	}

	#[test]
	fn row_ids_form_a_dense_zero_based_range() {
		let catalog = catalog_from(
			"id,title,author\n1,Saga,Vaughan\n2,Monstress,Liu\n3,Paper Girls,Vaughan\n",
		);

		assert_eq!(catalog.len(), 3);

		for (expected, entry) in catalog.entries().iter().enumerate() {
			assert_eq!(entry.row_id, expected);
		}
	}

	#[test]
	fn column_aliases_apply_when_canonical_is_absent() {
		let catalog = catalog_from(
			"id,name,authors,genres,summary,cover_url\n7,Saga,Vaughan,space opera,Two soldiers.,http://img\n",
		);
		let entry = &catalog.entries()[0];

		assert_eq!(entry.title, "Saga");
		assert_eq!(entry.author, "Vaughan");
		assert_eq!(entry.genre, "space opera");
		assert_eq!(entry.description, "Two soldiers.");
		assert_eq!(entry.cover_image.as_deref(), Some("http://img"));
	}

	#[test]
	fn canonical_column_wins_over_alias() {
		let catalog = catalog_from("id,title,name\n1,Canonical,Alias\n");

		assert_eq!(catalog.entries()[0].title, "Canonical");
	}

	#[test]
	fn tags_are_lowercased_trimmed_and_ordered() {
		let catalog = catalog_from("id,title,tags\n1,Saga,\" Sci-Fi , FANTASY ,, sci-fi \"\n");

		assert_eq!(catalog.entries()[0].tags, vec!["sci-fi", "fantasy", "sci-fi"]);
	}

	#[test]
	fn search_text_is_never_empty_of_structure() {
		let catalog = catalog_from("id,title\n1,\n");
		let entry = &catalog.entries()[0];

		// All fields empty still yields the fixed-order skeleton.
		assert_eq!(entry.search_text, "      ");
	}

	#[test]
	fn search_text_rebuild_is_idempotent() {
		let catalog = catalog_from(
			"id,title,author,publisher,series,genre,tags,description\n\
			 1,Saga,Vaughan,Image,Saga,space opera,\"sci-fi, fantasy\",Two soldiers from warring worlds.\n",
		);
		let entry = &catalog.entries()[0];
		let rebuilt = build_search_text(SearchTextParts {
			title: &entry.title,
			author: &entry.author,
			publisher: &entry.publisher,
			series: &entry.series,
			genre: &entry.genre,
			tags: &entry.tags,
			description: &entry.description,
		});

		assert_eq!(rebuilt, entry.search_text);
	}

	#[test]
	fn first_occurrence_wins_on_duplicate_source_ids() {
		let catalog = catalog_from("id,title\n9,First\n9,Second\n");

		assert_eq!(catalog.row_id_for_source("9"), Some(0));
	}

	#[test]
	fn resolve_by_title_prefers_author_match() {
		let catalog = catalog_from(
			"id,title,author\n1,Saga,Somebody Else\n2,Saga,Vaughan\n3,Other,Vaughan\n",
		);

		assert_eq!(catalog.resolve_by_title("  SAGA ", Some("vaughan")), Some(1));
		assert_eq!(catalog.resolve_by_title("saga", Some("unknown")), Some(0));
		assert_eq!(catalog.resolve_by_title("saga", None), Some(0));
		assert_eq!(catalog.resolve_by_title("missing", None), None);
		assert_eq!(catalog.resolve_by_title("", None), None);
	}

	#[test]
	fn missing_source_yields_empty_catalog() {
		let catalog = Catalog::load(Path::new("/nonexistent/catalog.csv"));

		assert!(catalog.is_empty());
	}

	#[test]
	fn fingerprint_is_none_for_missing_file() {
		assert_eq!(fingerprint(Path::new("/nonexistent/catalog.csv")), None);
	}
}
