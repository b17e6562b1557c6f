pub mod cli;
pub mod config;
pub mod format;
pub mod handler;
pub mod library;
pub mod logging;
pub mod preprocess;
pub mod render;
pub mod server;
pub mod xml;

pub use config::Config;
pub use format::OutputFormat;
pub use render::{Pipeline, RenderError, RenderOptions, RenderRequest, RenderResult};
