pub mod env;
mod loader;

pub use env::{AppConfig, BackendConfig, DirectoryConfig, PageConfig, ScanConfig};
pub use loader::load_config;
