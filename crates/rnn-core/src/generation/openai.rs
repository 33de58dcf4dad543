//! [`GenerationService`] backed by an OpenAI-compatible API.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, info};

use rnn_genai::{extract_json_object, ChatRequest, Message, OpenAiClient};

use super::prompts::{self, render};
use super::{ArticleDraft, BodyRequest, GenerationService, IdeaDraft};
use crate::domain::{Comment, ExtractedArticle, Idea, PipelineError, Result};

#[derive(Debug, Deserialize)]
struct IdeaResponse {
    #[serde(default)]
    ideas: Vec<IdeaDraft>,
}

#[derive(Debug, Deserialize)]
struct ArticleJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct ImageIdea {
    image_idea: String,
}

#[derive(Debug, Deserialize)]
struct CleanArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<String>,
}

/// Prompts + model routing on top of [`OpenAiClient`].
#[derive(Clone)]
pub struct OpenAiGenerationService {
    client: OpenAiClient,
}

impl OpenAiGenerationService {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }

    fn heavy(&self) -> ChatRequest {
        ChatRequest::new(self.client.config().heavy_model.clone())
    }

    fn light(&self) -> ChatRequest {
        ChatRequest::new(self.client.config().light_model.clone())
    }

    /// Second pass that splits raw article text into title/overview/body.
    async fn article_to_json(&self, raw_article: &str) -> Result<ArticleJson> {
        let request = self
            .light()
            .temperature(0.0)
            .message(Message::system(prompts::ARTICLE_TO_JSON_SYSTEM))
            .message(Message::user(render(
                prompts::ARTICLE_TO_JSON,
                &[("article", raw_article)],
            )));
        Ok(self.client.chat_json(request).await?)
    }
}

#[async_trait]
impl GenerationService for OpenAiGenerationService {
    async fn ideas(&self, count: usize) -> Result<Vec<IdeaDraft>> {
        let n = count.to_string();
        let request = self
            .heavy()
            .temperature(1.0)
            .message(Message::system(render(prompts::IDEA_GENERATOR, &[("n", &n)])));
        let response: IdeaResponse = self.client.chat_json(request).await?;
        Ok(response.ideas)
    }

    async fn outline(&self, idea: &Idea) -> Result<String> {
        let idea_text = idea.prompt_text();
        let request = self
            .heavy()
            .temperature(0.2)
            .message(Message::system(render(
                prompts::OUTLINE,
                &[("idea", idea_text.trim())],
            )));
        Ok(self.client.chat(request).await?)
    }

    async fn body(&self, request: BodyRequest<'_>) -> Result<ArticleDraft> {
        let (generator, template) = prompts::ARTICLE_GENERATORS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(prompts::ARTICLE_GENERATORS[0]);

        let idea_text = request.idea.prompt_text();
        let words = request.target_words.to_string();
        let prompt = render(
            template,
            &[
                ("idea", &idea_text),
                ("outline", request.outline),
                ("num_words", &words),
            ],
        );
        let chat = self
            .heavy()
            .message(Message::system(prompts::WHISKER_SYSTEM))
            .message(Message::user(prompt.trim()));
        let raw_article = self.client.chat(chat).await?;

        let parsed = self.article_to_json(raw_article.trim()).await?;
        if parsed.title.trim().is_empty() || parsed.body.trim().is_empty() {
            return Err(PipelineError::generation(
                "article text could not be split into title and body",
            ));
        }
        debug!(generator, words = request.target_words, "article body generated");
        Ok(ArticleDraft {
            title: parsed.title,
            overview: parsed.overview,
            body: parsed.body,
            generator: Some(generator.to_string()),
        })
    }

    async fn image(&self, title: &str, outline: &str) -> Result<String> {
        let brainstorm = Message::user(render(
            prompts::IMAGE_BRAINSTORM,
            &[("title", title), ("overview", outline)],
        ));
        let concepts = self
            .client
            .chat(self.heavy().temperature(0.7).message(brainstorm.clone()))
            .await?;

        let select = self
            .light()
            .temperature(0.0)
            .message(brainstorm)
            .message(Message::assistant(concepts))
            .message(Message::user(prompts::IMAGE_SELECT));
        let selected = self.client.chat(select).await?;
        let image_idea = extract_json_object(&selected)
            .and_then(|json| serde_json::from_str::<ImageIdea>(json).ok())
            .map(|idea| idea.image_idea)
            .unwrap_or(selected);

        let prompt = render(
            prompts::IMAGE_CREATE,
            &[("title", title), ("image_idea", &image_idea)],
        );
        let image = self.client.generate_image(prompt).await?;
        info!(url = %image.url, "image generated");
        Ok(image.url)
    }

    async fn comments(&self, title: &str, body: &str, count: usize) -> Result<Vec<Comment>> {
        let n = count.to_string();
        let request = self
            .light()
            .temperature(1.0)
            .json()
            .message(Message::system(render(
                prompts::COMMENTS,
                &[("title", title), ("body", body), ("num_comments", &n)],
            )));
        let raw = self.client.chat(request).await?;
        let json = extract_json_object(&raw)
            .ok_or_else(|| PipelineError::generation("comments response had no JSON object"))?;
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(comments_from_value(&value))
    }

    async fn extract_article(&self, normalized_text: &str) -> Result<ExtractedArticle> {
        let request = self
            .light()
            .message(Message::system(prompts::CLEAN_ARTICLE))
            .message(Message::user(normalized_text));
        let clean: CleanArticle = self.client.chat_json(request).await?;
        Ok(ExtractedArticle {
            title: clean.title,
            body: clean.body,
            author: clean.author.filter(|a| !a.trim().is_empty()),
        })
    }

    async fn parody_premise(&self, article: &ExtractedArticle) -> Result<String> {
        let request = self
            .heavy()
            .temperature(0.3)
            .message(Message::system(prompts::PARODY_SYSTEM))
            .message(Message::user(render(
                prompts::PARODY_PREMISE,
                &[("title", &article.title), ("article", &article.body)],
            )));
        Ok(self.client.chat(request).await?)
    }
}

/// Comments are the first array of objects found in the response, whatever
/// key the model chose for it. Malformed entries are dropped.
fn comments_from_value(value: &serde_json::Value) -> Vec<Comment> {
    let array = match value {
        serde_json::Value::Array(items) => Some(items),
        serde_json::Value::Object(map) => map.values().find_map(|v| match v {
            serde_json::Value::Array(items) if items.first().is_some_and(|i| i.is_object()) => {
                Some(items)
            }
            _ => None,
        }),
        _ => None,
    };
    array
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<Comment>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
