pub mod config;
pub mod error;
pub mod logging;
pub mod part;
pub mod status;
pub mod turn;

pub use config::{Config, RetryConfig, ScrollConfig};
pub use error::{Error, Result};
pub use part::{DATA_TAG_PREFIX, Part, TOOL_TAG_PREFIX, ToolState};
pub use status::{StreamError, StreamStatus};
pub use turn::{ConversationTurn, Role, TurnId};
