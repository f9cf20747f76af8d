pub mod chat;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod traits;

pub use chat::*;
pub use config::*;
pub use error::*;
pub use snapshot::*;
pub use traits::*;
