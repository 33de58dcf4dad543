//! Parody source records.

use serde::{Deserialize, Serialize};

use super::idea::Idea;

/// Fields pulled out of a third-party article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// A fetched and extracted source article together with the parody idea
/// derived from it. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParodySource {
    url: String,
    raw_content: String,
    normalized_text: String,
    extracted: ExtractedArticle,
    idea: Idea,
}

impl ParodySource {
    pub fn new(
        url: String,
        raw_content: String,
        normalized_text: String,
        extracted: ExtractedArticle,
        idea: Idea,
    ) -> Self {
        Self {
            url,
            raw_content,
            normalized_text,
            extracted,
            idea,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    pub fn extracted(&self) -> &ExtractedArticle {
        &self.extracted
    }

    pub fn idea(&self) -> &Idea {
        &self.idea
    }

    pub fn into_idea(self) -> Idea {
        self.idea
    }
}
