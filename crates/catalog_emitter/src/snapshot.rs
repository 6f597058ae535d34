//! Entity snapshots and their decomposition into staged aspect writes.

use std::collections::BTreeMap;

use chrono::Utc;
use llm_structs::EdgeType;
use serde_json::{Value, json};

use crate::urn::Urn;

pub const STATUS_ASPECT: &str = "com.linkedin.common.Status";
pub const UPSTREAM_LINEAGE_ASPECT: &str = "com.linkedin.dataset.UpstreamLineage";

/// Actor stamped on lineage written by this crate.
const LINEAGE_ACTOR: &str = "urn:li:corpuser:datahub";

/// Write stages, in the order the catalog needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Status aspect only; makes the entity exist.
    Existence,
    /// The bulk properties payload.
    Properties,
    /// Lineage aspects referencing other entities.
    Lineage,
}

/// A named, typed sub-document of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Aspect {
    pub name: &'static str,
    pub value: Value,
}

impl Aspect {
    fn to_json(&self) -> Value {
        json!({ self.name: self.value })
    }
}

/// Human-readable properties of an entity. Custom property values are
/// strings, which is what the catalog stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub name: String,
    pub description: String,
    pub custom: BTreeMap<String, String>,
}

impl Properties {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            custom: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.custom.insert(key.to_string(), value.to_string());
        self
    }
}

/// Full proposed state of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    urn: Urn,
    properties: Option<Aspect>,
    lineage: Vec<(Urn, EdgeType, Aspect)>,
}

impl EntitySnapshot {
    /// An entity with properties.
    #[must_use]
    pub fn entity(urn: Urn, properties: &Properties) -> Self {
        let aspect = Aspect {
            name: urn.kind().properties_aspect(),
            value: json!({
                "name": properties.name,
                "description": properties.description,
                "customProperties": properties.custom,
            }),
        };

        Self {
            urn,
            properties: Some(aspect),
            lineage: Vec::new(),
        }
    }

    /// A lineage-only update of an existing entity.
    #[must_use]
    pub const fn lineage_update(urn: Urn) -> Self {
        Self {
            urn,
            properties: None,
            lineage: Vec::new(),
        }
    }

    /// Adds an aspect naming `upstream` as a lineage neighbour of this entity.
    #[must_use]
    pub fn with_lineage(mut self, upstream: &Urn, edge_type: EdgeType) -> Self {
        let aspect = Aspect {
            name: UPSTREAM_LINEAGE_ASPECT,
            value: json!({
                "upstreams": [{
                    "auditStamp": {
                        "time": Utc::now().timestamp_millis(),
                        "actor": LINEAGE_ACTOR,
                    },
                    "dataset": {
                        "entityType": upstream.kind().as_str(),
                        "urn": upstream.as_str(),
                    },
                    "type": edge_type.as_str(),
                }]
            }),
        };
        self.lineage.push((upstream.clone(), edge_type, aspect));
        self
    }

    #[must_use]
    pub const fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Dedup key: the URN for entities; URN plus edges for lineage updates,
    /// so lineage on an already-emitted entity is still written.
    #[must_use]
    pub fn key(&self) -> String {
        if self.properties.is_some() {
            return self.urn.to_string();
        }

        self.lineage
            .iter()
            .fold(self.urn.to_string(), |key, (upstream, edge_type, _)| {
                format!("{key}|{edge_type}>{upstream}")
            })
    }

    /// All aspects in one ingest payload.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let status = status();
        let lineage = self.lineage.iter().map(|(_, _, aspect)| aspect);

        self.payload(
            core::iter::once(&status)
                .chain(self.properties.as_ref())
                .chain(lineage),
        )
    }

    /// One ingest payload per non-empty stage, in stage order.
    #[must_use]
    pub fn stages(&self) -> Vec<(Stage, Value)> {
        let mut stages = Vec::with_capacity(3);

        stages.push((Stage::Existence, self.payload([&status()])));

        if let Some(properties) = &self.properties {
            stages.push((Stage::Properties, self.payload([properties])));
        }

        if !self.lineage.is_empty() {
            stages.push((
                Stage::Lineage,
                self.payload(self.lineage.iter().map(|(_, _, aspect)| aspect)),
            ));
        }

        stages
    }

    fn payload<'a>(&self, aspects: impl IntoIterator<Item = &'a Aspect>) -> Value {
        let aspects: Vec<Value> = aspects.into_iter().map(Aspect::to_json).collect();

        json!({
            "entity": {
                "value": {
                    self.urn.kind().snapshot_type(): {
                        "urn": self.urn.as_str(),
                        "aspects": aspects,
                    }
                }
            }
        })
    }
}

/// Status aspect marking the entity as present.
fn status() -> Aspect {
    Aspect {
        name: STATUS_ASPECT,
        value: json!({ "removed": false }),
    }
}
