pub mod api;
pub mod config;
pub mod error;
pub mod state;

pub use config::CadenceConfig;
pub use error::{ErrorResponse, ServerError};
pub use state::{AppState, build_scheduler, build_state};
