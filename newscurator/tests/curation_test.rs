use std::num::NonZeroUsize;
use std::sync::Arc;

use mockito::Matcher;
use newscurator::llm::remote::RemoteLlmProvider;
use newscurator::{Article, FeedCurator, LlmRelevanceScorer, SystemPrompt};

/// Wrap `content` in an OpenAI-compatible chat completion body
fn chat_reply(content: &str) -> String {
    serde_json::json!({
        "model": "test-model",
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 200, "completion_tokens": 40, "total_tokens": 240 }
    })
    .to_string()
}

fn articles() -> Vec<Article> {
    vec![
        Article::new("https://news.test/u1", "Parliament debates emissions cap")
            .with_summary("Lawmakers discussed a new cap on industrial emissions."),
        Article::new("https://news.test/u2", "Transfer window closes"),
        Article::new("https://news.test/u3", "Carbon tax signed into law")
            .with_source("Daily Planet"),
    ]
}

fn curator_for(server: &mockito::ServerGuard) -> FeedCurator {
    let provider = Arc::new(RemoteLlmProvider::new(server.url(), "fake-api-key", "test-model"));
    let scorer = LlmRelevanceScorer::new(provider, Some(SystemPrompt::new("You curate climate news.")));
    FeedCurator::new(Arc::new(scorer))
}

#[tokio::test]
async fn test_curation_over_two_batches() {
    let mut server = mockito::Server::new_async().await;

    let first_batch = server
        .mock("POST", "/")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("https://news.test/u1".to_string()),
            Matcher::Regex("You curate climate news.".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            r#"```json
{"scores": [
  {"index": 0, "url": "https://news.test/u1", "score": 0.8, "reasoning": "Emissions policy"},
  {"index": 1, "url": "https://news.test/u2", "score": 0.3, "reasoning": "Football"}
]}
```"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let second_batch = server
        .mock("POST", "/")
        .match_body(Matcher::Regex("https://news.test/u3".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            r#"{"scores": [{"index": 0, "url": "https://news.test/u3", "score": 0.9, "reasoning": "Climate law"}]}"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let result = curator_for(&server)
        .curate("climate policy", &articles(), 0.5, NonZeroUsize::new(2))
        .await
        .expect("curation succeeds");

    assert_eq!(result.query, "climate policy");
    assert_eq!(
        result.urls(),
        vec!["https://news.test/u3", "https://news.test/u1"]
    );
    let relevance = result.items[0].relevance().unwrap();
    assert_eq!(relevance.reasoning, "Climate law");

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["items"][1]["scores"]["relevance"]["reasoning"], "Emissions policy");

    first_batch.assert_async().await;
    second_batch.assert_async().await;
}

#[tokio::test]
async fn test_model_failure_in_later_batch_fails_whole_curation() {
    let mut server = mockito::Server::new_async().await;

    let _first_batch = server
        .mock("POST", "/")
        .match_body(Matcher::Regex("https://news.test/u1".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            r#"{"scores": [{"score": 0.95, "reasoning": "On topic"}, {"score": 0.9, "reasoning": "Also"}]}"#,
        ))
        .create_async()
        .await;

    let _second_batch = server
        .mock("POST", "/")
        .match_body(Matcher::Regex("https://news.test/u3".to_string()))
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let err = curator_for(&server)
        .curate("climate policy", &articles(), 0.5, NonZeroUsize::new(2))
        .await
        .unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("LLM relevance scoring failed"));
    assert!(message.contains("500"));
}

#[tokio::test]
async fn test_malformed_model_output_fails_curation() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("I'm sorry, I can't rate these articles."))
        .create_async()
        .await;

    let err = curator_for(&server)
        .curate("climate policy", &articles(), 0.5, None)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("No valid JSON"));
}

#[tokio::test]
async fn test_nothing_relevant_is_an_empty_curation() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            r#"{"scores": [
                {"score": 0.1, "reasoning": "a"},
                {"score": 0.0, "reasoning": "b"},
                {"score": 0.2, "reasoning": "c"}
            ]}"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let result = curator_for(&server)
        .curate("deep sea mining", &articles(), 0.5, None)
        .await
        .expect("empty curation is not an error");

    assert!(result.is_empty());
    assert_eq!(result.query, "deep sea mining");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_scoring_requests_use_low_temperature_by_default() {
    let mut server = mockito::Server::new_async().await;

    // Provider default is 0.7; the scorer must override it
    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJsonString(r#"{"temperature": 0.2}"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            r#"{"scores": [
                {"score": 0.6, "reasoning": "a"},
                {"score": 0.1, "reasoning": "b"},
                {"score": 0.2, "reasoning": "c"}
            ]}"#,
        ))
        .expect(1)
        .create_async()
        .await;

    let result = curator_for(&server)
        .curate("climate policy", &articles(), 0.5, None)
        .await
        .expect("scoring request matched");

    assert_eq!(result.urls(), vec!["https://news.test/u1"]);
    mock.assert_async().await;
}
