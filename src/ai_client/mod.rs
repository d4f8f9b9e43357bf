//! AiClient - vision/text model host adapter
//!
//! ## Responsibilities
//!
//! - Send the two event images to the vision model for object/person signals
//! - Send the vision observation to the text model for a short alert phrase
//! - Response parsing with a plain-text fallback
//!
//! The host speaks the ollama-style `/api/generate` protocol: one JSON body
//! per call, images inlined as base64, non-streaming responses.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Ceiling on the stored alert phrase.
pub const PHRASE_MAX_CHARS: usize = 500;

const VISION_PROMPT: &str = "These pictures are taken from a security camera mounted on a house, \
     four seconds apart. Motion was detected between them. Describe the differences between the \
     two pictures. Then report your findings as a JSON object with exactly these keys: \
     \"summary\" (string), \"person_detected\" (boolean), \"confidence\" (number between 0 and 1), \
     \"objects\" (array of strings naming the moving objects). Output the JSON object only.";

const PHRASE_PROMPT_PREFIX: &str = "This is a description of motion captured by a security \
     camera. Describe in a short phrase what this motion was, based on the description given. \
     The phrase is used for alert lines in security logs. Give the phrase only, nothing else.";

/// Structured result of the vision call
#[derive(Debug, Clone, PartialEq)]
pub struct VisionAnalysis {
    /// Free-text observation of what changed between the frames.
    pub summary: String,
    pub person_detected: Option<bool>,
    /// Model confidence as a fraction in [0, 1].
    pub confidence: Option<f64>,
    pub objects: Option<Vec<String>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// What the vision model is asked to emit.
#[derive(Deserialize)]
struct VisionPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    person_detected: Option<bool>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    objects: Option<Vec<String>>,
}

/// Model host client
pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    vision_model: String,
    text_model: String,
}

impl AiClient {
    pub fn new(
        base_url: String,
        vision_model: String,
        text_model: String,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            vision_model,
            text_model,
        }
    }

    /// Check the model host answers at all.
    pub async fn health_check(&self) -> Result<bool> {
        match self.client.get(&self.base_url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Vision call: both event images in one prompt, structured signals out.
    pub async fn analyze_images(
        &self,
        image_a: &[u8],
        image_b: &[u8],
    ) -> Result<VisionAnalysis> {
        let images = vec![BASE64.encode(image_a), BASE64.encode(image_b)];
        let text = self
            .generate(&self.vision_model, VISION_PROMPT, Some(images))
            .await?;
        Ok(parse_vision_response(&text))
    }

    /// Text call: condense the vision observation into an alert phrase.
    pub async fn extract_phrase(&self, summary: &str) -> Result<String> {
        let prompt = format!("{}\n\"{}\"", PHRASE_PROMPT_PREFIX, summary);
        let text = self.generate(&self.text_model, &prompt, None).await?;
        Ok(clean_phrase(&text))
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        images: Option<Vec<String>>,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt,
            images,
            stream: false,
        };

        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Unavailable(format!(
                "model host returned {}: {}",
                status,
                body.trim()
            )));
        }

        let result: GenerateResponse = resp.json().await?;
        Ok(result.response.trim().to_string())
    }
}

/// Parse the vision response, tolerating code fences and prose around the
/// JSON object. Falls back to treating the whole response as the summary.
fn parse_vision_response(text: &str) -> VisionAnalysis {
    if let Some(json) = extract_json_object(text) {
        if let Ok(payload) = serde_json::from_str::<VisionPayload>(&json) {
            let summary = if payload.summary.is_empty() {
                text.to_string()
            } else {
                payload.summary
            };
            return VisionAnalysis {
                summary,
                person_detected: payload.person_detected,
                confidence: payload.confidence.map(|c| c.clamp(0.0, 1.0)),
                objects: payload.objects,
            };
        }
    }

    VisionAnalysis {
        summary: text.to_string(),
        person_detected: None,
        confidence: None,
        objects: None,
    }
}

/// First balanced `{...}` span in the text, if any.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Normalize the text model's phrase: drop reasoning blocks some models
/// emit, strip wrapping quotes, cap the length.
fn clean_phrase(text: &str) -> String {
    let without_think = match (text.find("<think>"), text.find("</think>")) {
        (Some(open), Some(close)) if close > open => {
            format!("{}{}", &text[..open], &text[close + "</think>".len()..])
        }
        _ => text.to_string(),
    };

    let trimmed = without_think.trim().trim_matches('"').trim();
    trimmed.chars().take(PHRASE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_json() {
        let text = r#"{"summary": "A person walked to the door.", "person_detected": true, "confidence": 0.92, "objects": ["person"]}"#;
        let analysis = parse_vision_response(text);
        assert_eq!(analysis.summary, "A person walked to the door.");
        assert_eq!(analysis.person_detected, Some(true));
        assert_eq!(analysis.confidence, Some(0.92));
        assert_eq!(analysis.objects, Some(vec!["person".to_string()]));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here is my analysis:\n```json\n{\"summary\": \"A cat crossed the driveway.\", \"person_detected\": false, \"confidence\": 0.6, \"objects\": [\"cat\"]}\n```";
        let analysis = parse_vision_response(text);
        assert_eq!(analysis.summary, "A cat crossed the driveway.");
        assert_eq!(analysis.person_detected, Some(false));
    }

    #[test]
    fn test_parse_plain_text_falls_back() {
        let text = "The second picture shows a delivery van that was not there before.";
        let analysis = parse_vision_response(text);
        assert_eq!(analysis.summary, text);
        assert_eq!(analysis.person_detected, None);
        assert_eq!(analysis.confidence, None);
    }

    #[test]
    fn test_confidence_clamped() {
        let text = r#"{"summary": "x", "confidence": 3.5}"#;
        let analysis = parse_vision_response(text);
        assert_eq!(analysis.confidence, Some(1.0));
    }

    #[test]
    fn test_clean_phrase_strips_reasoning_and_quotes() {
        let raw = "<think>The description mentions a person.</think>\n\"Person at front door\"";
        assert_eq!(clean_phrase(raw), "Person at front door");
    }

    #[test]
    fn test_clean_phrase_caps_length() {
        let long = "x".repeat(PHRASE_MAX_CHARS + 100);
        assert_eq!(clean_phrase(&long).chars().count(), PHRASE_MAX_CHARS);
    }
}
