//! [`DistanceResolver`] backed by Claude.

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::delivery::{DistanceResolver, ResolveError, RouteQuery};

use super::client::ClaudeClient;
use super::error::ClaudeError;
use super::types::{ChatResponse, Message, Tool, ToolChoice};

const TOOL_NAME: &str = "report_distance";
const MAX_TOKENS: u32 = 256;
const SYSTEM_PROMPT: &str = "You estimate road distances for a delivery service. \
     Always answer by calling the report_distance tool.";

#[derive(Debug, Deserialize)]
struct DistanceReport {
    found: bool,
    #[serde(default)]
    distance_km: Option<f64>,
}

fn distance_tool() -> Tool {
    Tool {
        name: TOOL_NAME.to_string(),
        description: "Report the driving distance between the origin and the destination."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "found": {
                    "type": "boolean",
                    "description": "false if the destination cannot be located"
                },
                "distance_km": {
                    "type": "number",
                    "description": "Driving distance in kilometers"
                }
            },
            "required": ["found"]
        }),
    }
}

fn prompt(route: &RouteQuery) -> String {
    format!(
        "Calculate the driving distance in kilometers between the origin and the destination.\n\
         Origin: {}\n\
         Destination: {}",
        route.origin, route.destination
    )
}

impl From<ClaudeError> for ResolveError {
    fn from(e: ClaudeError) -> Self {
        if e.is_transient() {
            Self::Transient(e.to_string())
        } else {
            Self::Unresolvable(e.to_string())
        }
    }
}

/// Extract the reported distance from a forced tool call.
fn read_distance(response: &ChatResponse) -> Result<f64, ResolveError> {
    let input = response
        .tool_input(TOOL_NAME)
        .ok_or_else(|| ResolveError::Transient("no distance reported".to_string()))?;

    let report: DistanceReport = serde_json::from_value(input.clone())
        .map_err(|e| ResolveError::Transient(format!("malformed distance report: {e}")))?;

    match report {
        DistanceReport {
            found: true,
            distance_km: Some(km),
        } => Ok(km),
        _ => Err(ResolveError::Unresolvable(
            "destination could not be located".to_string(),
        )),
    }
}

/// Asks Claude for driving distances.
#[derive(Clone)]
pub struct ClaudeDistanceResolver {
    client: ClaudeClient,
}

impl ClaudeDistanceResolver {
    #[must_use]
    pub const fn new(client: ClaudeClient) -> Self {
        Self { client }
    }
}

impl DistanceResolver for ClaudeDistanceResolver {
    fn resolve<'a>(&'a self, route: &'a RouteQuery) -> BoxFuture<'a, Result<f64, ResolveError>> {
        Box::pin(async move {
            let response = self
                .client
                .chat(
                    vec![Message::user(prompt(route))],
                    Some(SYSTEM_PROMPT.to_string()),
                    Some(vec![distance_tool()]),
                    Some(ToolChoice::Tool {
                        name: TOOL_NAME.to_string(),
                    }),
                    MAX_TOKENS,
                )
                .await?;

            read_distance(&response)
        })
    }
}
