//! AI task suggestions and subtask decomposition.
//!
//! The text-generation service is a black box: it receives a prompt and
//! replies with text that should contain a JSON array of strings. Failures
//! come back as [`SuggestionOutcome::Failed`], never as a panic.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::SuggestionEndpoint;

const MAX_ITEMS: usize = 10;
const SUGGESTION_COUNT: usize = 5;

#[async_trait]
pub trait Suggester: Send + Sync {
    /// Raw completion text for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum SuggestionOutcome {
    Items(Vec<String>),
    Failed(String),
}

impl SuggestionOutcome {
    pub fn items(&self) -> &[String] {
        match self {
            SuggestionOutcome::Items(items) => items,
            SuggestionOutcome::Failed(_) => &[],
        }
    }
}

pub fn suggestions_prompt(titles: &[String]) -> String {
    let mut prompt = String::from(
        "You help a household keep a shared property in good order.\n\
         These tasks are already on the board:\n",
    );
    if titles.is_empty() {
        prompt.push_str("- (none yet)\n");
    }
    for title in titles {
        prompt.push_str("- ");
        prompt.push_str(title.trim());
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "Suggest up to {SUGGESTION_COUNT} further maintenance or cleaning tasks that are not \
         already listed. Reply only with a JSON array of short task titles."
    ));
    prompt
}

pub fn decomposition_prompt(task_text: &str) -> String {
    format!(
        "Break the household task \"{}\" into 3 to 6 concrete steps. \
         Reply only with a JSON array of short step descriptions.",
        task_text.trim()
    )
}

/// Pull the first JSON array of strings out of a completion reply.
pub fn parse_suggestion_list(reply: &str) -> Result<Vec<String>> {
    let text = unwrap_reply_text(reply);
    let start = text
        .find('[')
        .ok_or_else(|| anyhow!("reply does not contain a JSON array"))?;
    let end = text
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| anyhow!("reply contains an unterminated JSON array"))?;
    let items: Vec<String> = serde_json::from_str(&text[start..=end])
        .context("reply array is not a list of strings")?;
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .take(MAX_ITEMS)
        .collect())
}

fn unwrap_reply_text(reply: &str) -> String {
    match serde_json::from_str::<Value>(reply) {
        Ok(Value::Object(map)) => ["text", "output", "content", "response"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| reply.to_string()),
        _ => reply.to_string(),
    }
}

async fn run(suggester: &dyn Suggester, prompt: String, purpose: &str) -> SuggestionOutcome {
    let reply = match suggester.complete(&prompt).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!(purpose, error = %err, "suggestion request failed");
            return SuggestionOutcome::Failed(err.to_string());
        }
    };
    match parse_suggestion_list(&reply) {
        Ok(items) => {
            tracing::debug!(purpose, count = items.len(), "suggestions received");
            SuggestionOutcome::Items(items)
        }
        Err(err) => {
            tracing::warn!(purpose, error = %err, "suggestion reply unusable");
            SuggestionOutcome::Failed(err.to_string())
        }
    }
}

pub async fn suggest_tasks(suggester: &dyn Suggester, titles: &[String]) -> SuggestionOutcome {
    run(suggester, suggestions_prompt(titles), "suggest").await
}

pub async fn decompose(suggester: &dyn Suggester, task_text: &str) -> SuggestionOutcome {
    run(suggester, decomposition_prompt(task_text), "decompose").await
}

/// JSON-over-HTTP text generation client.
///
/// Posts `{"prompt": ...}` and accepts either a bare text body or a JSON
/// object carrying the text under `text`, `output`, `content` or `response`.
#[derive(Debug, Clone)]
pub struct HttpSuggester {
    client: Client,
    endpoint: SuggestionEndpoint,
}

impl HttpSuggester {
    pub fn new(endpoint: SuggestionEndpoint) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Suggester for HttpSuggester {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(&self.endpoint.url)
            .json(&json!({ "prompt": prompt }));
        if let Some(key) = &self.endpoint.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let res = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint.url))?;
        if res.status().is_success() {
            Ok(res.text().await?)
        } else {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            Err(anyhow!(
                "Suggestion service returned {}: {}",
                status,
                error_text
            ))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Replays canned replies and records the prompts it saw.
    #[derive(Default)]
    pub struct ScriptedSuggester {
        replies: Mutex<Vec<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedSuggester {
        pub fn replying(reply: &str) -> Self {
            Self {
                replies: Mutex::new(vec![Ok(reply.to_string())]),
                prompts: Mutex::default(),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                replies: Mutex::new(vec![Err(message.to_string())]),
                prompts: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl Suggester for ScriptedSuggester {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            match self.replies.lock().pop() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("no scripted reply left")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSuggester;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bare_and_fenced_arrays() {
        assert_eq!(
            parse_suggestion_list(r#"["Oil hinges", " ", "Wash windows"]"#).unwrap(),
            vec!["Oil hinges", "Wash windows"]
        );
        assert_eq!(
            parse_suggestion_list("Sure!\n```json\n[\"Clean oven\"]\n```").unwrap(),
            vec!["Clean oven"]
        );
    }

    #[test]
    fn parses_wrapped_json_reply() {
        let reply = json!({ "text": "[\"Defrost freezer\"]" }).to_string();
        assert_eq!(
            parse_suggestion_list(&reply).unwrap(),
            vec!["Defrost freezer"]
        );
    }

    #[test]
    fn rejects_replies_without_array() {
        assert!(parse_suggestion_list("no idea").is_err());
        assert!(parse_suggestion_list("[1, 2]").is_err());
    }

    #[test]
    fn prompt_lists_current_titles() {
        let prompt = suggestions_prompt(&["Fix tap".to_string(), "Mow lawn".to_string()]);
        assert!(prompt.contains("- Fix tap\n"));
        assert!(prompt.contains("- Mow lawn\n"));
        assert!(prompt.contains("JSON array"));
        assert!(suggestions_prompt(&[]).contains("(none yet)"));
    }

    #[tokio::test]
    async fn failures_become_failed_outcome() {
        let suggester = ScriptedSuggester::failing("timeout");
        let outcome = suggest_tasks(&suggester, &[]).await;
        assert_eq!(outcome, SuggestionOutcome::Failed("timeout".into()));
        assert!(outcome.items().is_empty());
    }

    #[tokio::test]
    async fn decompose_sends_task_text() {
        let suggester = ScriptedSuggester::replying(r#"["Buy paint", "Sand wall"]"#);
        let outcome = decompose(&suggester, "Repaint hallway").await;
        assert_eq!(outcome.items(), ["Buy paint", "Sand wall"]);
        assert!(suggester.prompts.lock()[0].contains("\"Repaint hallway\""));
    }
}
