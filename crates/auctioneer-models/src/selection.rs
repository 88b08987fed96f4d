//! Keyword bid selection criteria.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};

/// Grouping key a keyword bid read can select by.
///
/// The keys are mutually exclusive: one request selects by exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SelectionKey {
    KeywordIds,
    AdGroupIds,
    CampaignIds,
}

impl SelectionKey {
    pub const ALL: [SelectionKey; 3] = [
        SelectionKey::KeywordIds,
        SelectionKey::AdGroupIds,
        SelectionKey::CampaignIds,
    ];

    /// Wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKey::KeywordIds => "KeywordIds",
            SelectionKey::AdGroupIds => "AdGroupIds",
            SelectionKey::CampaignIds => "CampaignIds",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which keyword bids a read targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SelectionCriteria {
    key: SelectionKey,
    ids: Vec<i64>,
}

impl SelectionCriteria {
    pub fn new(key: SelectionKey, ids: Vec<i64>) -> Self {
        Self { key, ids }
    }

    pub fn keyword_ids(ids: Vec<i64>) -> Self {
        Self::new(SelectionKey::KeywordIds, ids)
    }

    pub fn ad_group_ids(ids: Vec<i64>) -> Self {
        Self::new(SelectionKey::AdGroupIds, ids)
    }

    pub fn campaign_ids(ids: Vec<i64>) -> Self {
        Self::new(SelectionKey::CampaignIds, ids)
    }

    /// Parse a wire-shaped mapping such as `{"CampaignIds": [1, 2]}`.
    ///
    /// Exactly one recognized key must be present; unknown keys are rejected
    /// as well so that a typo never silently widens the selection.
    pub fn from_map(map: &Map<String, Value>) -> ModelResult<Self> {
        let mut found: Option<(SelectionKey, &Value)> = None;

        for (name, value) in map {
            let Some(key) = SelectionKey::parse(name) else {
                return Err(ModelError::invalid_selection(format!(
                    "unrecognized selection key '{}'",
                    name
                )));
            };
            if let Some((previous, _)) = found {
                return Err(ModelError::invalid_selection(format!(
                    "selection keys are mutually exclusive, got {} and {}",
                    previous, key
                )));
            }
            found = Some((key, value));
        }

        let Some((key, value)) = found else {
            return Err(ModelError::invalid_selection(format!(
                "one of {} is required",
                SelectionKey::ALL.map(|k| k.as_str()).join(", ")
            )));
        };

        let ids: Vec<i64> = serde_json::from_value(value.clone()).map_err(|e| {
            ModelError::invalid_selection(format!("{} must be a list of ids: {}", key, e))
        })?;

        Ok(Self::new(key, ids))
    }

    pub fn key(&self) -> SelectionKey {
        self.key
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Wire form for a subset of the ids.
    pub fn to_wire(&self, ids: &[i64]) -> Value {
        let mut map = Map::new();
        map.insert(self.key.as_str().to_string(), Value::from(ids.to_vec()));
        Value::Object(map)
    }
}
