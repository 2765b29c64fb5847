pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Index artifact is missing at {path:?}.")]
	MissingArtifact { path: std::path::PathBuf },
	#[error("Index artifact at {path:?} is corrupt: {message}")]
	CorruptArtifact { path: std::path::PathBuf, message: String },
	#[error("Embedding batch is inconsistent: {message}")]
	InvalidEmbeddings { message: String },
	#[error("Query vector has dimension {got}, index expects {expected}.")]
	DimensionMismatch { got: usize, expected: usize },
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("Failed to encode index metadata.")]
	EncodeMeta { source: serde_json::Error },
}
