//! Provider models and the in-memory store they are published into.
//!
//! Provider files are YAML documents sharing a common envelope (`id`, `name`,
//! `type`, `website`, `repository`). The `type` field selects the concrete
//! model the rest of the file is decoded into.

mod error;
pub mod models;
mod store;

pub use error::{ProviderError, ProviderResult};
pub use models::{
    BaseModel, CommunityModel, LanguageModel, PackageModel, ProductModel, ProviderType, Record,
    ScaleModel, SnippetModel,
};
pub use store::{ProviderStore, UpdateOutcome};
