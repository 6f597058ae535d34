use std::collections::BTreeSet;

use serde::Serialize;

use crate::JsonMap;
use crate::normalize::{capabilities_of, family_of, normalize_name, provider_of};

/// An LLM model as published to the catalog.
///
/// Identity is `(provider, name)`. Fields are private so a model can only be
/// built with a normalized name and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    name: String,
    provider: String,
    family: String,
    capabilities: BTreeSet<String>,
    parameters: JsonMap,
    metadata: JsonMap,
}

impl Model {
    /// Builds a model from a raw platform identifier, classifying it with the
    /// normalizer rules.
    #[must_use]
    pub fn from_raw_name(raw_name: &str, parameters: JsonMap, metadata: JsonMap) -> Self {
        let name = normalize_name(raw_name);

        Self {
            provider: provider_of(&name),
            family: family_of(&name),
            capabilities: capabilities_of(&name),
            name,
            parameters,
            metadata,
        }
    }

    /// Canonical model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    #[must_use]
    pub const fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    #[must_use]
    pub const fn parameters(&self) -> &JsonMap {
        &self.parameters
    }

    #[must_use]
    pub const fn metadata(&self) -> &JsonMap {
        &self.metadata
    }

    /// Identity key: `(provider, name)`.
    #[must_use]
    pub fn key(&self) -> (&str, &str) {
        (&self.provider, &self.name)
    }

    /// Catalog name of this model, `provider/name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.provider, self.name)
    }
}
