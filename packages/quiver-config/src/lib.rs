mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Classifier, Config, Expansion, Fusion, GenerationProviderConfig, Providers, Search,
	WeightProfiles,
};

use std::{fs, path::Path};

use quiver_domain::IntentLabel;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn normalize(cfg: &mut Config) {
	cfg.expansion.strategy = cfg.expansion.strategy.trim().to_lowercase();
}

pub fn validate(cfg: &Config) -> Result<()> {
	for intent in IntentLabel::PRIORITY {
		let weights = cfg.weights.lookup(intent);

		if !weights.is_normalized() {
			return Err(Error::WeightProfile {
				intent: intent.as_str(),
				message: format!(
					"weights must be non-negative and sum to 1.0 within ±{} (sum is {}).",
					quiver_domain::WeightVector::SUM_TOLERANCE,
					weights.sum(),
				),
			});
		}
	}

	if cfg.search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.channel_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.channel_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.classifier.cache_capacity == 0 {
		return Err(Error::Validation {
			message: "classifier.cache_capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.classifier.llm_timeout_ms > cfg.search.channel_timeout_ms {
		return Err(Error::Validation {
			message: "classifier.llm_timeout_ms must not exceed search.channel_timeout_ms."
				.to_string(),
		});
	}
	if !matches!(cfg.expansion.strategy.as_str(), "vector_anchor" | "llm_3stage") {
		return Err(Error::Validation {
			message: "expansion.strategy must be one of vector_anchor or llm_3stage.".to_string(),
		});
	}
	if cfg.expansion.anchor_k == 0 {
		return Err(Error::Validation {
			message: "expansion.anchor_k must be greater than zero.".to_string(),
		});
	}
	if cfg.expansion.max_expansion == 0 {
		return Err(Error::Validation {
			message: "expansion.max_expansion must be greater than zero.".to_string(),
		});
	}
	if !cfg.fusion.rrf_k.is_finite() || cfg.fusion.rrf_k <= 0.0 {
		return Err(Error::Validation {
			message: "fusion.rrf_k must be a positive finite number.".to_string(),
		});
	}
	if let Some(generation) = &cfg.providers.generation {
		if generation.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.generation.api_base must be non-empty.".to_string(),
			});
		}
		if generation.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "providers.generation.timeout_ms must be greater than zero.".to_string(),
			});
		}
		if generation.max_tokens == 0 {
			return Err(Error::Validation {
				message: "providers.generation.max_tokens must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}
