pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<saga_index::Error> for ServiceError {
	fn from(err: saga_index::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}

impl From<saga_storage::Error> for ServiceError {
	fn from(err: saga_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
