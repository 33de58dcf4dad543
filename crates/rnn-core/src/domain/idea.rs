//! Article ideas.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::Result;
use super::status::Status;

/// Category assigned to every parody idea.
pub const PARODY_CATEGORY: &str = "Featured";

/// Where an idea came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IdeaOrigin {
    Original,
    Parody,
}

/// A short premise to be expanded into a full article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Idea {
    pub id: Uuid,
    /// Working title; may be empty when the service only supplied a premise.
    pub title: String,
    pub premise: String,
    pub category: String,
    pub origin: IdeaOrigin,
    /// Source article for parody ideas.
    pub source_url: Option<String>,
    status: Status,
}

impl Idea {
    pub fn original(
        title: impl Into<String>,
        premise: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            premise: premise.into(),
            category: category.into(),
            origin: IdeaOrigin::Original,
            source_url: None,
            status: Status::Pending,
        }
    }

    pub fn parody(premise: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            premise: premise.into(),
            category: PARODY_CATEGORY.to_string(),
            origin: IdeaOrigin::Parody,
            source_url: Some(source_url.into()),
            status: Status::Pending,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_parody(&self) -> bool {
        self.origin == IdeaOrigin::Parody
    }

    /// `pending -> in_progress`
    pub fn start(&mut self) -> Result<()> {
        self.status = self.status.transition(Status::InProgress)?;
        Ok(())
    }

    /// `in_progress -> ready | failed`
    pub fn finish(&mut self, succeeded: bool) -> Result<()> {
        let next = if succeeded { Status::Ready } else { Status::Failed };
        self.status = self.status.transition(next)?;
        Ok(())
    }

    /// Text handed to the outline and body prompts.
    pub fn prompt_text(&self) -> String {
        format!("Title: {}\nDescription: {}", self.title, self.premise)
    }
}
