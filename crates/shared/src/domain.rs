use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(LevelId);
id_newtype!(StepId);
id_newtype!(ScoreId);

/// Whether a step is a piece the student plays or a drill they practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Song,
    Exercise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    #[serde(rename = "_id")]
    pub id: LevelId,
    pub name: String,
    pub description: String,
    pub index: u32,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "_id")]
    pub id: StepId,
    #[serde(rename = "levelId")]
    pub level_id: LevelId,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "scoreId", default, skip_serializing_if = "Option::is_none")]
    pub score_id: Option<ScoreId>,
}

/// A score attachment. `data` is the base64-encoded MusicXML document.
///
/// Some deployments return the created record under `id` instead of `_id`,
/// hence the alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "_id", alias = "id")]
    pub id: ScoreId,
    #[serde(default)]
    pub data: String,
}
