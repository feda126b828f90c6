pub mod env;
pub mod error;
pub(crate) mod ops;

pub use env::Env;
pub use error::EvalError;
