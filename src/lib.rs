pub mod cli;
pub mod config;
pub mod debouncer;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

pub use config::*;
pub use debouncer::*;
pub use dispatcher::*;
pub use error::{AutorunError, Result};
pub use events::*;
pub use filter::*;
pub use watcher::*;
