//! Handler implementations for the file watcher.

mod provider;

pub use provider::ProviderFileHandler;
