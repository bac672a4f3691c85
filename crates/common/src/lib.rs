pub mod config;
pub mod logging;
pub mod retry;
pub mod span;
pub mod wait;

pub use config::{Environment, env_or};
pub use logging::setup_logging;
pub use retry::retry_with_backoff;
pub use wait::wait_for_resource;
