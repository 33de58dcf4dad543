//! Parody extraction never yields an idea from content that is not an article.

use std::sync::Arc;

use rnn_core::fakes::{FakeArticleFetcher, ScriptedGenerationService};
use rnn_core::{IdeaOrigin, ParodyExtractor, PipelineError, RetryPolicy};
use rnn_genai::FetchedPage;

fn extractor(fetcher: FakeArticleFetcher, service: ScriptedGenerationService) -> ParodyExtractor {
    ParodyExtractor::new(Arc::new(service), Arc::new(fetcher), RetryPolicy::no_retry())
}

#[tokio::test]
async fn test_binary_content_is_conversion_error() {
    let fetcher = FakeArticleFetcher::new();
    fetcher.insert(FetchedPage {
        url: "https://news.example.com/report.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        body: "%PDF-1.7 ...".to_string(),
    });
    let service = ScriptedGenerationService::new();

    let err = extractor(fetcher, service.clone())
        .extract("https://news.example.com/report.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Conversion(_)), "{err}");
    assert_eq!(service.calls("extract_article"), 0);
    assert_eq!(service.calls("parody_premise"), 0);
}

#[tokio::test]
async fn test_html_without_article_text_is_conversion_error() {
    let fetcher = FakeArticleFetcher::new();
    fetcher.insert(FetchedPage {
        url: "https://news.example.com/login".to_string(),
        content_type: Some("text/html; charset=utf-8".to_string()),
        body: "<html><nav>Home | World</nav><form><input name=user></form>\
               <p>Sign in</p></html>"
            .to_string(),
    });
    let service = ScriptedGenerationService::new();

    let err = extractor(fetcher, service.clone())
        .extract("https://news.example.com/login")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Conversion(_)), "{err}");
    assert_eq!(service.calls("extract_article"), 0);
}

#[tokio::test]
async fn test_real_article_becomes_parody_idea() {
    let fetcher = FakeArticleFetcher::new();
    let paragraph = "The city council approved a new budget for subway maintenance \
                     after a lengthy debate that ran well past midnight.";
    fetcher.insert(FetchedPage {
        url: "https://news.example.com/budget".to_string(),
        content_type: Some("text/html".to_string()),
        body: format!(
            "<html><script>var x = 1;</script><h1>Budget Approved</h1><p>{paragraph}</p></html>"
        ),
    });
    let service = ScriptedGenerationService::new();

    let source = extractor(fetcher, service)
        .extract("https://news.example.com/budget")
        .await
        .unwrap();

    assert_eq!(source.extracted().title, "Budget Approved");
    assert!(!source.normalized_text().contains("var x"));
    let idea = source.into_idea();
    assert_eq!(idea.origin, IdeaOrigin::Parody);
    assert_eq!(idea.source_url.as_deref(), Some("https://news.example.com/budget"));
    assert!(idea.premise.contains("Budget Approved"));
}

#[tokio::test]
async fn test_invalid_url_is_validation_error() {
    let err = extractor(FakeArticleFetcher::new(), ScriptedGenerationService::new())
        .extract("ftp://news.example.com/file")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)), "{err}");
}
