//! Configuration records and the file loader.

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_str};
pub use types::{Config, RuleConfig, TargetConfig, TargetGroupConfig};
