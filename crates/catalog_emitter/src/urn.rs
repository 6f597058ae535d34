use core::fmt;

use crate::EmitError;

/// Characters that would break the tuple syntax of a URN.
const RESERVED: &[char] = &[',', '(', ')'];

/// Catalog entity kinds this crate emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Models and aggregated pipelines.
    MlModel,
    /// Individual runs.
    Dataset,
}

impl EntityKind {
    /// Entity type name as it appears in URNs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MlModel => "mlModel",
            Self::Dataset => "dataset",
        }
    }

    /// Fully-qualified snapshot type wrapping this kind's aspects.
    #[must_use]
    pub const fn snapshot_type(self) -> &'static str {
        match self {
            Self::MlModel => "com.linkedin.metadata.snapshot.MLModelSnapshot",
            Self::Dataset => "com.linkedin.metadata.snapshot.DatasetSnapshot",
        }
    }

    /// Aspect type carrying this kind's properties.
    #[must_use]
    pub const fn properties_aspect(self) -> &'static str {
        match self {
            Self::MlModel => "com.linkedin.ml.metadata.MLModelProperties",
            Self::Dataset => "com.linkedin.dataset.DatasetProperties",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic catalog identifier,
/// `urn:li:<kind>:(urn:li:dataPlatform:<platform>,<name>,<env>)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Urn {
    kind: EntityKind,
    value: String,
}

impl Urn {
    /// Builds the URN of an entity. The same inputs always produce the same
    /// string.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::InvalidUrn`] if any part is empty or contains one
    /// of `,()`.
    pub fn new(kind: EntityKind, platform: &str, name: &str, env: &str) -> Result<Self, EmitError> {
        for (part, value) in [("platform", platform), ("name", name), ("env", env)] {
            if value.trim().is_empty() {
                return Err(EmitError::InvalidUrn(format!("{part} is empty")));
            }
            if value.contains(RESERVED) {
                return Err(EmitError::InvalidUrn(format!(
                    "{part} {value:?} contains one of {RESERVED:?}"
                )));
            }
        }

        Ok(Self {
            kind,
            value: format!("urn:li:{kind}:(urn:li:dataPlatform:{platform},{name},{env})"),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Urn {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.value
    }
}
