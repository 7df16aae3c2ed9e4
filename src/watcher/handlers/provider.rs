//! Handler for provider file changes.
//!
//! Re-reads changed provider files into the shared [`ProviderStore`].

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use crate::provider::{ProviderStore, UpdateOutcome};
use crate::watcher::{ChangeEvent, EventHandler};

/// Re-parses provider files into a [`ProviderStore`] on change.
///
/// Only files with a configured extension are read. Failures are logged here
/// and never reach the watcher; the store keeps its previous record.
pub struct ProviderFileHandler {
    store: Arc<ProviderStore>,
    /// Lowercase extensions without the dot. Empty accepts every file.
    extensions: Vec<String>,
}

impl ProviderFileHandler {
    /// Create a handler accepting `.yaml` and `.yml` files.
    pub fn new(store: Arc<ProviderStore>) -> Self {
        Self {
            store,
            extensions: vec!["yaml".to_string(), "yml".to_string()],
        }
    }

    /// Replace the accepted extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Check if this handler should process events for the given path.
    pub fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }

        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

impl EventHandler for ProviderFileHandler {
    fn name(&self) -> &str {
        "provider"
    }

    fn handle(&self, event: &ChangeEvent) {
        if !self.matches(&event.path) {
            crate::debug_event!("provider", "skipped", "{}", event.path.display());
            return;
        }

        match self.store.update_from_file(&event.path) {
            Ok(UpdateOutcome::Published { provider_type, id }) => {
                crate::log_event!(
                    "provider",
                    "updated",
                    "{provider_type} '{id}' from {}",
                    event.path.display()
                );
            }
            Ok(UpdateOutcome::Ignored { kind }) => {
                crate::debug_event!(
                    "provider",
                    "no model",
                    "type '{kind}' in {}",
                    event.path.display()
                );
            }
            Err(e) => {
                crate::warn_event!("provider", "failed updating providers", "{e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::Op;
    use tempfile::TempDir;

    #[test]
    fn test_matches_extensions() {
        let handler = ProviderFileHandler::new(Arc::new(ProviderStore::new()));

        assert!(handler.matches(Path::new("/p/go.yaml")));
        assert!(handler.matches(Path::new("/p/go.YML")));
        assert!(!handler.matches(Path::new("/p/.go.yaml.swp")));
        assert!(!handler.matches(Path::new("/p/README")));
    }

    #[test]
    fn test_custom_extensions() {
        let handler =
            ProviderFileHandler::new(Arc::new(ProviderStore::new())).with_extensions([".lang"]);

        assert!(handler.matches(Path::new("/p/go.lang")));
        assert!(!handler.matches(Path::new("/p/go.yaml")));

        let open = ProviderFileHandler::new(Arc::new(ProviderStore::new()))
            .with_extensions(Vec::<String>::new());
        assert!(open.matches(Path::new("/p/README")));
    }

    #[test]
    fn test_handle_updates_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("go.yaml");
        std::fs::write(&path, "id: go\ntype: language\nname: Go\n").unwrap();
        let store = Arc::new(ProviderStore::new());
        let handler = ProviderFileHandler::new(store.clone());

        handler.handle(&ChangeEvent::new(&path, Op::WRITE));

        assert_eq!(store.language("go").unwrap().name, "Go");
    }

    #[test]
    fn test_handle_swallows_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yaml");
        std::fs::write(&path, "id: go\ntype: language\ndifficulty:\n  scale: hard\n").unwrap();
        let store = Arc::new(ProviderStore::new());
        let handler = ProviderFileHandler::new(store.clone());

        handler.handle(&ChangeEvent::created(&path));
        handler.handle(&ChangeEvent::created(temp.path().join("missing.yaml")));

        assert!(store.is_empty());
    }
}
