pub mod error;
pub mod types;
pub mod config;
pub mod platform;

pub use config::{ArrayIndexOrder, CodecConfig, DEFAULT_MAX_DOCUMENT_SIZE, DEFAULT_MAX_NESTING_DEPTH};
pub use error::{CommonError, CommonResult};
pub use types::{ObjectId, ObjectIdGenerator};
