pub mod args;
pub mod config;
pub mod loader;

pub use args::{Args, Resource};
pub use config::ConfigFile;
pub use loader::RegistryLoader;
