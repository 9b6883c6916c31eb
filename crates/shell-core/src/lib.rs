pub mod constants;
pub mod error;
pub mod policy;
pub mod transaction;
pub mod types;

pub use constants::*;
pub use error::ShellError;
pub use policy::{ChainParams, Policy};
pub use transaction::*;
pub use types::*;
