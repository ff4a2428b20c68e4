use super::{parse_result, AnalysisError, InterpretationService, InterpreterSettings};
use crate::ingest::{LogKind, LogPayload};
use crate::model::{AnalysisResult, BondQuality, DepthUnit};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// LAS text beyond this many characters is dropped from the request.
pub const LAS_CHAR_LIMIT: usize = 45_000;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

#[derive(Debug, Clone)]
pub struct GeminiInterpreter {
    http: Client,
    url: String,
    api_key: Option<String>,
    thinking_budget: u32,
}

impl GeminiInterpreter {
    pub fn new(settings: &InterpreterSettings) -> Result<Self> {
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            base.trim_end_matches('/'),
            model
        );
        let mut builder = Client::builder().user_agent("cementlog/0.3");
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            thinking_budget: settings.thinking_budget,
        })
    }
}

#[async_trait]
impl InterpretationService for GeminiInterpreter {
    async fn interpret(&self, payload: &LogPayload) -> Result<AnalysisResult, AnalysisError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AnalysisError::MissingCredential {
                env: InterpreterSettings::API_KEY_ENV,
            })?;
        let request = build_request(payload, self.thinking_budget);
        tracing::debug!(url = %self.url, kind = payload.kind().label(), "calling Gemini generateContent");

        let response = self
            .http
            .post(&self.url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|err| AnalysisError::Service(format!("failed to call Gemini generateContent API: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Service(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| AnalysisError::Service(format!("failed to read Gemini response: {err}")))?;
        let message: GeminiResponse = serde_json::from_str(&body).map_err(|err| {
            AnalysisError::MalformedResponse(format!("failed to parse Gemini response: {err}"))
        })?;
        let content = message
            .candidates
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| {
                AnalysisError::MalformedResponse("Gemini response missing message content".into())
            })?;

        parse_result(&content)
    }
}

fn prompt(kind: LogKind) -> String {
    let source = match kind {
        LogKind::Las => "digital LAS data curves",
        LogKind::Pdf => "PDF logs (CBL/VDL images)",
    };
    format!(
        "You are a Senior Petroleum Engineer in the Well Cementing Section (شعبة تسميت الآبار).
Analyze the provided {source} and generate a report.

REPORTING PROTOCOL:
1. Segmentation: Divide the log into logical intervals based on significant changes in bond quality. DO NOT use fixed 50m intervals if it doesn't make sense.
2. For each interval, provide:
   - Quality: The overall bond quality rating.
   - Technical Description: A detailed engineering description of what the CBL amplitude and VDL waveforms show.
   - Diagnosis: A very concise summary of the primary indicator, for example: \"CBL amplitude avg > 90 mV\" or \"CBL drops < 30 mV\".
3. Terminology: Use standard Iraqi oil sector Arabic terms (حقن، تخديد، تلاحم، بطانة).
4. Overall Summary & Recommendations: Provide a comprehensive executive summary and a list of actionable engineering recommendations, giving the English and Arabic lists in the same order and the same length."
    )
}

/// Hard cut on a character boundary; the remainder is dropped without marker.
fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &input[..byte_idx],
        None => input,
    }
}

fn payload_part(payload: &LogPayload) -> GeminiPart {
    match payload {
        LogPayload::Pdf { base64 } => GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: "application/pdf",
                data: base64.clone(),
            },
        },
        LogPayload::Las { text } => GeminiPart::Text {
            text: format!("LAS DATA:\n{}", truncate_chars(text, LAS_CHAR_LIMIT)),
        },
    }
}

fn build_request(payload: &LogPayload, thinking_budget: u32) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![
                payload_part(payload),
                GeminiPart::Text {
                    text: prompt(payload.kind()),
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(),
            thinking_config: ThinkingConfig { thinking_budget },
        },
    }
}

/// Response schema in Gemini's OpenAPI subset; every field is required.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summaryEn": { "type": "STRING" },
            "summaryAr": { "type": "STRING" },
            "logTypeDetected": { "type": "STRING" },
            "depthUnit": { "type": "STRING", "enum": DepthUnit::LABELS },
            "zones": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "depthFrom": { "type": "NUMBER" },
                        "depthTo": { "type": "NUMBER" },
                        "quality": { "type": "STRING", "enum": BondQuality::LABELS },
                        "technicalDescriptionEn": {
                            "type": "STRING",
                            "description": "Detailed technical explanation of the log readings (CBL, VDL) for this interval."
                        },
                        "technicalDescriptionAr": {
                            "type": "STRING",
                            "description": "Arabic translation of the technical description."
                        },
                        "diagnosisEn": {
                            "type": "STRING",
                            "description": "A very brief diagnostic summary, e.g., 'CBL > 90 mV' or 'Good bonding'."
                        },
                        "diagnosisAr": {
                            "type": "STRING",
                            "description": "Arabic translation of the diagnosis."
                        }
                    },
                    "required": [
                        "depthFrom", "depthTo", "quality",
                        "technicalDescriptionEn", "technicalDescriptionAr",
                        "diagnosisEn", "diagnosisAr"
                    ]
                }
            },
            "recommendationsEn": { "type": "ARRAY", "items": { "type": "STRING" } },
            "recommendationsAr": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": [
            "summaryEn", "summaryAr", "zones", "recommendationsEn",
            "recommendationsAr", "logTypeDetected", "depthUnit"
        ]
    })
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
    #[serde(rename = "thinkingConfig")]
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "thinkingBudget")]
    thinking_budget: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}
