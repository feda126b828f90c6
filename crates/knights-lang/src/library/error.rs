use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("Library `{0}` not found")]
    NotFound(String),
}
