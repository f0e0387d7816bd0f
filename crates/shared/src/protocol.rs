use serde::{Deserialize, Serialize};

use crate::domain::{LevelId, ScoreId, StepId, StepKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLevelRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLevelRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStepRequest {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "scoreId", default, skip_serializing_if = "Option::is_none")]
    pub score_id: Option<ScoreId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStepRequest {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Full replacement order for the top-level levels collection. The server
/// accepts no partial or delta updates; every reorder retransmits the entire
/// identifier sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderLevelsRequest {
    #[serde(rename = "levelOrder")]
    pub level_order: Vec<LevelId>,
}

/// Full replacement order for the steps of a single level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderStepsRequest {
    #[serde(rename = "stepsOrder")]
    pub steps_order: Vec<StepId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScoreRequest {
    /// Base64-encoded MusicXML.
    pub data: String,
}

/// Associates an uploaded score with a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkScoreRequest {
    #[serde(rename = "scoreId")]
    pub score_id: ScoreId,
}
