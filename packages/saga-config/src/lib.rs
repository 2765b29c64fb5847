mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Catalog, Cf, Config, EmbeddingProviderConfig, Postgres, ProviderConfig, Providers, Recommend,
	Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.catalog.index_dir.trim().is_empty() {
		return Err(Error::Validation {
			message: "catalog.index_dir must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, weight) in [
		("recommend.prompt_weight", cfg.recommend.prompt_weight),
		("recommend.profile_weight", cfg.recommend.profile_weight),
		("recommend.cf_weight", cfg.recommend.cf_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if cfg.recommend.prompt_weight == 0.0 {
		return Err(Error::Validation {
			message: "recommend.prompt_weight must be greater than zero.".to_string(),
		});
	}
	if cfg.recommend.top_k == 0 {
		return Err(Error::Validation {
			message: "recommend.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.recommend.retrieve_k < cfg.recommend.top_k {
		return Err(Error::Validation {
			message: "recommend.retrieve_k must be at least recommend.top_k.".to_string(),
		});
	}
	if cfg.recommend.blend_k < cfg.recommend.top_k {
		return Err(Error::Validation {
			message: "recommend.blend_k must be at least recommend.top_k.".to_string(),
		});
	}
	if cfg.recommend.rerank_n == 0 {
		return Err(Error::Validation {
			message: "recommend.rerank_n must be greater than zero.".to_string(),
		});
	}

	if cfg.cf.factors == 0 {
		return Err(Error::Validation {
			message: "cf.factors must be greater than zero.".to_string(),
		});
	}
	if cfg.cf.iterations == 0 {
		return Err(Error::Validation {
			message: "cf.iterations must be greater than zero.".to_string(),
		});
	}
	if !cfg.cf.regularization.is_finite() || cfg.cf.regularization < 0.0 {
		return Err(Error::Validation {
			message: "cf.regularization must be a finite number, zero or greater.".to_string(),
		});
	}
	if cfg.cf.min_users < 2 {
		return Err(Error::Validation { message: "cf.min_users must be at least 2.".to_string() });
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
	if cfg.recommend.retrieve_k == 0 {
		cfg.recommend.retrieve_k = Recommend::default().retrieve_k;
	}
	if cfg.recommend.blend_k == 0 {
		cfg.recommend.blend_k = Recommend::default().blend_k;
	}
}
