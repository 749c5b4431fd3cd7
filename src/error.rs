use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Crate-wide error taxonomy.
///
/// Most of these never escape a worker loop: `ParseFailure`, `TranslateMiss`,
/// and friends are caught, logged, and the offending event is dropped.
/// `RuleLoadError` and `SchemaError` are the only variants meant to abort
/// startup (see `rules::translator::Translator::compile`,
/// `schema::catalog::SchemaCatalog::load`).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid rule document: {0}")]
    RuleLoad(String),

    #[error("invalid schema document: {0}")]
    Schema(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PipelineError::Config(msg.into())
    }

    pub fn rule_load<S: Into<String>>(msg: S) -> Self {
        PipelineError::RuleLoad(msg.into())
    }

    pub fn schema<S: Into<String>>(msg: S) -> Self {
        PipelineError::Schema(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        PipelineError::Parse(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        PipelineError::Internal(msg.into())
    }
}
