//! Provider record models as they appear in provider YAML files.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Category discriminator carried in every provider file's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Language,
    Framework,
    Toolkit,
    Ide,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Language => "language",
            ProviderType::Framework => "framework",
            ProviderType::Toolkit => "toolkit",
            ProviderType::Ide => "ide",
        }
    }

    /// Parse a discriminator, `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "language" => Some(ProviderType::Language),
            "framework" => Some(ProviderType::Framework),
            "toolkit" => Some(ProviderType::Toolkit),
            "ide" => Some(ProviderType::Ide),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields every provider file has in common.
///
/// Only used for the first decode pass, to learn the discriminator. The
/// discriminator stays a plain string here so unknown categories decode
/// fine and can be skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub repository: String,
}

impl BaseModel {
    pub fn provider_type(&self) -> Option<ProviderType> {
        ProviderType::parse(&self.kind)
    }
}

/// Wraps a chart scale value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleModel {
    #[serde(default)]
    pub scale: f32,
}

/// A package, library or dependency of a language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub website: String,
}

/// A product built with a language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub website: String,
}

/// A named source snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityModel {
    #[serde(default)]
    pub scale: f32,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// A `language` provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub repository: String,

    #[serde(default)]
    pub paradigm: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<ScaleModel>,
    #[serde(default)]
    pub popularity: Option<ScaleModel>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub popular_packages: Vec<PackageModel>,
    #[serde(default)]
    pub popular_products: Vec<ProductModel>,
    #[serde(default)]
    pub snippets: Vec<SnippetModel>,
    #[serde(default)]
    pub community: Option<CommunityModel>,
}

/// A fully decoded provider, ready to publish.
///
/// Serializes as the inner model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Language(Arc<LanguageModel>),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Language(lang) => &lang.id,
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        match self {
            Record::Language(_) => ProviderType::Language,
        }
    }

    pub fn as_language(&self) -> Option<&Arc<LanguageModel>> {
        match self {
            Record::Language(lang) => Some(lang),
        }
    }
}

impl From<LanguageModel> for Record {
    fn from(lang: LanguageModel) -> Self {
        Record::Language(Arc::new(lang))
    }
}
