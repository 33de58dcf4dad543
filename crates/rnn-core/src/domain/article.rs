//! Assembled articles and their on-disk artifact shape.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::Result;
use super::idea::{Idea, IdeaOrigin};
use super::status::Status;

/// Reference from an article back to the idea it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdeaRef {
    pub id: Uuid,
    pub premise: String,
    pub origin: IdeaOrigin,
}

/// One simulated reader comment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    #[serde(alias = "name", alias = "username", alias = "user")]
    pub author: String,
    #[serde(alias = "comment", alias = "content", alias = "body")]
    pub text: String,
}

/// A fully (or partially) assembled article.
///
/// Serialized as one JSON file per article, in the shape the site templates
/// read: `article_id`, `img_path` and a `%Y-%m-%d %H:%M:%S` `timestamp`.
/// Partial artifacts of failed tasks carry `status: failed` and the failure
/// reason in `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "detached_idea")]
    pub idea: IdeaRef,
    /// URL-safe identifier used by the renderer for the page path.
    #[serde(rename = "article_id")]
    pub slug: String,
    pub title: String,
    pub overview: String,
    #[serde(default)]
    pub outline: String,
    pub body: String,
    /// Source of the illustration, usually the generator's URL.
    #[serde(rename = "url", default)]
    pub image_reference: Option<String>,
    /// File name of the local WebP copy, relative to the article directory.
    #[serde(rename = "img_path", default, with = "empty_as_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time_minutes: Option<f64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub parody_src: Option<String>,
    /// Prompt variant that produced the body.
    #[serde(default)]
    pub generator: Option<String>,
    #[serde(rename = "timestamp", with = "timestamp_format")]
    pub created_at: DateTime<Utc>,
    /// Artifacts without a status were only ever written once complete.
    #[serde(default = "complete")]
    status: Status,
    #[serde(default)]
    pub error: Option<String>,
}

fn detached_idea() -> IdeaRef {
    IdeaRef {
        id: Uuid::new_v4(),
        premise: String::new(),
        origin: IdeaOrigin::Original,
    }
}

fn complete() -> Status {
    Status::Ready
}

/// `"%Y-%m-%d %H:%M:%S"` in UTC; RFC 3339 is accepted on input.
mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&at.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, FORMAT) {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

/// `None` is written as `""`, which the templates treat as "no image".
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.filter(|s| !s.is_empty()))
    }
}

impl Article {
    /// Empty in-progress article for `idea`.
    pub fn draft(idea: &Idea) -> Self {
        Self {
            id: Uuid::new_v4(),
            idea: IdeaRef {
                id: idea.id,
                premise: idea.premise.clone(),
                origin: idea.origin,
            },
            slug: String::new(),
            title: idea.title.clone(),
            overview: String::new(),
            outline: String::new(),
            body: String::new(),
            image_reference: None,
            image_path: None,
            comments: None,
            reading_time_minutes: None,
            category: idea.category.clone(),
            parody_src: idea.source_url.clone(),
            generator: None,
            // whole seconds, as stored on disk
            created_at: Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now),
            status: Status::InProgress,
            error: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    pub fn mark_ready(&mut self) -> Result<()> {
        self.status = self.status.transition(Status::Ready)?;
        self.error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        self.status = self.status.transition(Status::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }
}
