use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::JsonMap;

/// Kind of relationship between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Uses,
    ExecutedBy,
    PartOf,
    Transformed,
}

impl EdgeType {
    /// Returns the catalog's name for this relationship.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uses => "Uses",
            Self::ExecutedBy => "ExecutedBy",
            Self::PartOf => "PartOf",
            Self::Transformed => "Transformed",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "uses" => Ok(Self::Uses),
            "executedby" => Ok(Self::ExecutedBy),
            "partof" => Ok(Self::PartOf),
            "transformed" => Ok(Self::Transformed),
            _ => Err(format!("Invalid edge type: {s}")),
        }
    }
}

/// A directed relationship from `source_id` to `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonMap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_from_str() {
        assert_eq!("Uses".parse::<EdgeType>(), Ok(EdgeType::Uses));
        assert_eq!("PART_OF".parse::<EdgeType>(), Ok(EdgeType::PartOf));
        assert_eq!("executed-by".parse::<EdgeType>(), Ok(EdgeType::ExecutedBy));
        assert!("downstream".parse::<EdgeType>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(EdgeType::Transformed.to_string(), "Transformed");
    }
}
