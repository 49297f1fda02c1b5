use crate::{PlanError, PlannedAction};
use core::fmt;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tutor_core::action::Observation;

/// A learner response as a tree key; `None` is the empty response to an example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResponseKey(pub Option<Observation>);

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("none"),
        }
    }
}

impl FromStr for ResponseKey {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(ResponseKey(None)),
            other => other.parse::<Observation>().map(|v| ResponseKey(Some(v))),
        }
    }
}

impl Serialize for ResponseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResponseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One decision of a preplanned tree and the subtree for every possible response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub action: Option<PlannedAction>,
    pub responses: BTreeMap<ResponseKey, PlanNode>,
}

impl PlanNode {
    /// Follows `path` from this node; `None` once the path leaves the tree.
    pub fn descend(&self, path: &[ResponseKey]) -> Option<&PlanNode> {
        path.iter()
            .try_fold(self, |node, key| node.responses.get(key))
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .responses
            .values()
            .map(PlanNode::node_count)
            .sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        if self.action.is_none() {
            return 0;
        }
        1 + self
            .responses
            .values()
            .map(PlanNode::depth)
            .max()
            .unwrap_or(0)
    }
}

/// A decision tree computed ahead of a session, replayed by descending on each response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreplanTree {
    pub depth: usize,
    pub samples: usize,
    pub root: PlanNode,
}

impl PreplanTree {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn save(&self, path: &Path) -> Result<(), PlanError> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| PlanError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(path, json).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let json = fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json(&json)?)
    }
}
