pub mod errors;
pub mod id;

pub use errors::{ConfigError, ZeroError};
pub use id::{new_correlation_id, new_id, SessionId};
