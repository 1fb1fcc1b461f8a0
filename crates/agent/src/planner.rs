//! Planning service: turns a build description into a draft plan.
//!
//! [`LlmPlanner`] asks a chat-completion provider for structured output
//! matching [`plan_schema`]. Drafts are never trusted; the orchestrator
//! validates every one before it reaches the world.

use std::sync::Arc;

use async_trait::async_trait;
use blockwright_core::error::PlanningError;
use blockwright_core::geometry::Size;
use blockwright_core::message::Message;
use blockwright_core::plan::Plan;
use blockwright_core::provider::{Provider, ProviderRequest, ResponseFormat};
use serde_json::json;
use tracing::debug;

/// Everything a planner is told about one draft.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub description: String,
    /// Relative extent; plan coordinates must lie in `[0, size)`.
    pub size: Size,
    /// Namespaced material ids.
    pub palette: Vec<String>,
    pub max_operations: usize,
    /// Why the previous draft was rejected, if there was one.
    pub feedback: Option<String>,
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn draft(&self, request: &PlanRequest) -> Result<Plan, PlanningError>;
}

const SYSTEM_PROMPT: &str = "You are a Minecraft build planner. Return only a structured plan \
that matches the schema: a list of operations, each with relative integer x, y, z and a \
material id from the palette. Respect bounds, palette, and max block constraints.";

/// A planner backed by any [`Provider`].
pub struct LlmPlanner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmPlanner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// The user turn for one draft.
    pub fn compose_prompt(request: &PlanRequest) -> String {
        let Size {
            width,
            height,
            length,
        } = request.size;
        let mut lines = vec![
            format!("Build request: {}", request.description),
            format!("Bounds size (relative): width={width}, height={height}, length={length}"),
            format!(
                "Coordinates must satisfy: 0 <= x < {width}, 0 <= y < {height}, 0 <= z < {length}"
            ),
            format!("Palette: {}", request.palette.join(", ")),
            format!("Max blocks: {}", request.max_operations),
        ];
        if let Some(feedback) = &request.feedback {
            lines.push(format!("\nPrevious error: {feedback}"));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn draft(&self, request: &PlanRequest) -> Result<Plan, PlanningError> {
        let provider_request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(Self::compose_prompt(request)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: Some(ResponseFormat {
                name: "build_plan".into(),
                schema: plan_schema(),
            }),
        };

        let response = self.provider.complete(provider_request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Draft received"
            );
        }
        parse_plan(&response.message.content)
    }
}

/// JSON schema for a plan, strict-mode compatible.
pub fn plan_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "operations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "x": {"type": "integer"},
                        "y": {"type": "integer"},
                        "z": {"type": "integer"},
                        "material": {"type": "string"}
                    },
                    "required": ["x", "y", "z", "material"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["operations"],
        "additionalProperties": false
    })
}

/// Parse a structured reply, tolerating a Markdown code fence around it.
pub fn parse_plan(content: &str) -> Result<Plan, PlanningError> {
    let body = strip_fence(content.trim());
    if body.is_empty() {
        return Err(PlanningError::MalformedOutput("empty reply".into()));
    }
    serde_json::from_str(body).map_err(|e| PlanningError::MalformedOutput(e.to_string()))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
