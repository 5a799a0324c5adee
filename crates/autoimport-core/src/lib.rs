pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::AutoImportConfig;
pub use error::{AutoImportError, Result};
pub use events::ConversationEvent;
pub use types::*;
