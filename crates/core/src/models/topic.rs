//! Topic model - a subject under discussion

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A discussion topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display mirror of `TokenState::current_topic_id`
    #[serde(default)]
    pub is_active: bool,
}

impl Topic {
    pub fn new(title: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description: None,
            is_active: false,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}
