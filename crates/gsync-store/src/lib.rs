//! gsync-store: OpenDAL storage for both ends of the sync
//!
//! - `local`: the device-local key-value store holding mobile envelopes
//! - `documents`: the cloud document store holding web envelopes
//! - `operator`: backend construction (fs, s3, memory)

pub mod documents;
pub mod health;
pub mod local;
pub mod operator;

pub use documents::DocumentStore;
pub use health::{check_health, is_healthy};
pub use local::{LocalStore, OperatorStore};
pub use operator::build_operator;
