pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read retrieval config at {path:?}.")]
	ReadConfig { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse retrieval config at {path:?}.")]
	ParseConfig { path: std::path::PathBuf, source: toml::de::Error },
	#[error("Weight profile weights.{intent} is invalid: {message}")]
	WeightProfile { intent: &'static str, message: String },
	#[error("{message}")]
	Validation { message: String },
}
