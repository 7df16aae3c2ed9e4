//! In-memory provider store, refreshed from provider files.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::{DeserializeOwned, Error as _};

use super::error::{ProviderError, ProviderResult};
use super::models::{BaseModel, LanguageModel, ProviderType, Record};

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A record was decoded and published under `id`.
    Published {
        provider_type: ProviderType,
        id: String,
    },
    /// The discriminator names no decodable category; nothing was published.
    Ignored { kind: String },
}

/// Records keyed by category, then by id.
///
/// Written from the watcher's dispatch thread, read concurrently by the HTTP
/// layer. Records are immutable once published and swapped in whole, so a
/// reader sees either the previous value for an id or the new one.
#[derive(Debug, Default)]
pub struct ProviderStore {
    records: RwLock<HashMap<ProviderType, HashMap<String, Record>>>,
}

impl ProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read `path` and publish the record it describes.
    ///
    /// Decoding happens in two passes over the same file: the common envelope
    /// first, to learn the `type`, then the full model for that type. Any
    /// failure leaves the store unchanged.
    pub fn update_from_file(&self, path: impl AsRef<Path>) -> ProviderResult<UpdateOutcome> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ProviderError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        self.update_from_reader(file, path)
    }

    /// Two-pass decode over any rewindable source. `origin` names the source
    /// in errors.
    pub fn update_from_reader<R: Read + Seek>(
        &self,
        mut reader: R,
        origin: &Path,
    ) -> ProviderResult<UpdateOutcome> {
        let base: BaseModel =
            first_document(&mut reader).map_err(|source| ProviderError::Envelope {
                path: origin.to_path_buf(),
                source,
            })?;

        let Some(provider_type @ ProviderType::Language) = base.provider_type() else {
            crate::debug_event!(
                "provider",
                "ignored",
                "type '{}' in {}",
                base.kind,
                origin.display()
            );
            return Ok(UpdateOutcome::Ignored { kind: base.kind });
        };

        reader
            .seek(SeekFrom::Start(0))
            .map_err(|source| ProviderError::Rewind {
                path: origin.to_path_buf(),
                source,
            })?;

        let lang: LanguageModel =
            first_document(&mut reader).map_err(|source| ProviderError::Payload {
                path: origin.to_path_buf(),
                provider_type,
                source,
            })?;
        let record = Record::from(lang);

        let id = record.id().to_string();
        if self.publish(record).is_some() {
            crate::debug_event!("provider", "replaced", "{provider_type} '{id}'");
        }

        Ok(UpdateOutcome::Published { provider_type, id })
    }

    /// Insert `record`, replacing any record with the same category and id.
    ///
    /// Returns the replaced record.
    pub fn publish(&self, record: Record) -> Option<Record> {
        let provider_type = record.provider_type();
        let id = record.id().to_string();

        self.records
            .write()
            .entry(provider_type)
            .or_default()
            .insert(id, record)
    }

    /// Snapshot of every record in a category.
    pub fn records(&self, provider_type: ProviderType) -> HashMap<String, Record> {
        self.records
            .read()
            .get(&provider_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Look up one record, `None` when absent.
    pub fn record(&self, provider_type: ProviderType, id: &str) -> Option<Record> {
        self.records
            .read()
            .get(&provider_type)
            .and_then(|category| category.get(id))
            .cloned()
    }

    /// Snapshot of all language records.
    pub fn languages(&self) -> HashMap<String, Arc<LanguageModel>> {
        self.records
            .read()
            .get(&ProviderType::Language)
            .map(|category| {
                category
                    .iter()
                    .filter_map(|(id, record)| {
                        record.as_language().map(|lang| (id.clone(), lang.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn language(&self, id: &str) -> Option<Arc<LanguageModel>> {
        self.record(ProviderType::Language, id)
            .and_then(|record| record.as_language().cloned())
    }

    /// Total records across all categories.
    pub fn len(&self) -> usize {
        self.records.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode the first YAML document of `reader`. Later documents are not read.
fn first_document<T: DeserializeOwned>(reader: impl Read) -> Result<T, serde_yaml::Error> {
    match serde_yaml::Deserializer::from_reader(reader).next() {
        Some(document) => T::deserialize(document),
        None => Err(serde_yaml::Error::custom("empty provider file")),
    }
}
