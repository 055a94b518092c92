//! MCP client for deployed services.
//!
//! Connects over the service's SSE endpoint, performs the MCP handshake,
//! and exposes the two operations the CLI needs: capability discovery and
//! a single tool call.

use rmcp::{
    model::{CallToolRequestParam, CallToolResult, ClientInfo, JsonObject},
    serve_client,
    transport::SseClientTransport,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::lib::errors::ClientError;

/// One advertised tool on a remote service.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCapability {
    pub name: String,
    pub description: Option<String>,
}

/// One advertised resource on a remote service.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceCapability {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
}

/// One advertised prompt on a remote service.
#[derive(Debug, Clone, Serialize)]
pub struct PromptCapability {
    pub name: String,
    pub description: Option<String>,
}

/// Everything a remote service advertises: tools, resources, and prompts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    pub tools: Vec<ToolCapability>,
    pub resources: Vec<ResourceCapability>,
    pub prompts: Vec<PromptCapability>,
}

/// Build tool-call arguments from `KEY=VALUE` pairs.
///
/// Each value is parsed as JSON when it is valid JSON (`3`, `true`,
/// `[1,2]`), and passed through as a string otherwise. Later pairs win on
/// duplicate keys.
pub fn tool_args_from_pairs(pairs: &[(String, String)]) -> JsonObject {
    let mut arguments = JsonObject::new();
    for (key, value) in pairs {
        let parsed = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.clone()));
        arguments.insert(key.clone(), parsed);
    }
    arguments
}

/// Client bound to one deployed service's base URL.
pub struct ServiceClient {
    base_url: String,
    endpoint_suffix: String,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint_suffix: "sse".to_string(),
        }
    }

    /// Override the event-stream suffix appended to the base URL.
    pub fn with_endpoint_suffix(mut self, suffix: &str) -> Self {
        self.endpoint_suffix = suffix.trim_start_matches('/').to_string();
        self
    }

    /// Event-stream endpoint derived from the service base URL.
    pub fn sse_endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.endpoint_suffix)
    }

    /// Discover everything the remote service advertises.
    ///
    /// Tool listing is mandatory and its failure propagates; resource and
    /// prompt listing are optional MCP surfaces, so a server that does not
    /// implement them just contributes empty sections.
    pub async fn capabilities(&self) -> Result<ServerCapabilities, ClientError> {
        let client = self.connect().await?;
        let tools = client.list_all_tools().await;
        let resources = client.list_all_resources().await;
        let prompts = client.list_all_prompts().await;
        let _ = client.cancel().await;

        let tools = tools.map_err(|source| ClientError::Call {
            tool: "tools/list".to_string(),
            source,
        })?;
        let resources = resources.unwrap_or_else(|err| {
            debug!(
                target: "mcp_forge::client",
                reason = %err,
                "Service does not list resources"
            );
            Vec::new()
        });
        let prompts = prompts.unwrap_or_else(|err| {
            debug!(
                target: "mcp_forge::client",
                reason = %err,
                "Service does not list prompts"
            );
            Vec::new()
        });

        Ok(ServerCapabilities {
            tools: tools
                .into_iter()
                .map(|tool| ToolCapability {
                    name: tool.name.into_owned(),
                    description: tool.description.map(|d| d.into_owned()),
                })
                .collect(),
            resources: resources
                .into_iter()
                .map(|resource| ResourceCapability {
                    uri: resource.raw.uri,
                    name: resource.raw.name,
                    description: resource.raw.description,
                })
                .collect(),
            prompts: prompts
                .into_iter()
                .map(|prompt| PromptCapability {
                    name: prompt.name,
                    description: prompt.description,
                })
                .collect(),
        })
    }

    /// Call one tool by name with the given arguments.
    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ClientError> {
        let client = self.connect().await?;
        let result = client
            .call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments,
            })
            .await;
        let _ = client.cancel().await;

        result.map_err(|source| ClientError::Call {
            tool: tool.to_string(),
            source,
        })
    }

    async fn connect(
        &self,
    ) -> Result<rmcp::service::RunningService<rmcp::RoleClient, ClientInfo>, ClientError> {
        let endpoint = self.sse_endpoint();
        debug!(
            target: "mcp_forge::client",
            endpoint = %endpoint,
            "Opening SSE connection"
        );
        let transport =
            SseClientTransport::start(endpoint.clone())
                .await
                .map_err(|err| ClientError::Connect {
                    url: endpoint.clone(),
                    message: err.to_string(),
                })?;
        serve_client(ClientInfo::default(), transport)
            .await
            .map_err(|err| ClientError::Handshake {
                url: endpoint,
                message: err.to_string(),
            })
    }
}
