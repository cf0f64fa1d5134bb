use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::ProfileFields;

/// Request body for attaching a profile; every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(transparent)]
pub struct AttachRequest(pub ProfileFields);

#[derive(Debug, Deserialize)]
pub struct AddReviewRequest {
    pub project_id: Uuid,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectTransitionRequest {
    #[serde(default)]
    pub project_value: f64,
    pub is_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub account_id: Uuid,
    pub profile_completion: u8,
}
