use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::AnswerGrader;
use crate::error::GradingError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read the grader settings from `QUICKSTUDY_AI_*` variables.
    ///
    /// Returns `None` when no API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUICKSTUDY_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("QUICKSTUDY_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = env::var("QUICKSTUDY_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let timeout_secs = env::var("QUICKSTUDY_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(Self {
            base_url,
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Grades free-response answers with a Gemini `generateContent` call.
#[derive(Clone)]
pub struct GeminiGrader {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGrader {
    /// # Errors
    ///
    /// Returns `GradingError::Http` if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, GradingError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl AnswerGrader for GeminiGrader {
    async fn grade(
        &self,
        user_answer: &str,
        correct_answer: &str,
        question: &str,
    ) -> Result<bool, GradingError> {
        let payload = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: grading_prompt(user_answer, correct_answer, question),
                }],
            }],
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GradingError::HttpStatus(response.status()));
        }

        let body: GenerateResponse = response.json().await?;
        parse_verdict(body)
    }
}

fn grading_prompt(user_answer: &str, correct_answer: &str, question: &str) -> String {
    format!(
        "Question: \"{question}\"\n\n\
         Expected Answer: \"{correct_answer}\"\n\n\
         User's Answer: \"{user_answer}\"\n\n\
         Evaluate if the user's answer is conceptually correct compared to the expected answer, \
         even if the wording is different. This is for an educational application, so be somewhat \
         lenient but make sure the core concepts are correct.\n\
         Only respond with \"YES\" if the user's answer is correct, or \"NO\" if it is incorrect. \
         Do not include any explanation."
    )
}

fn parse_verdict(body: GenerateResponse) -> Result<bool, GradingError> {
    let text = body
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or(GradingError::UnexpectedResponse)?;

    let verdict = text.trim().to_uppercase();
    if verdict.is_empty() {
        return Err(GradingError::EmptyResponse);
    }
    Ok(verdict == "YES")
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
