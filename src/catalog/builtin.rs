//! Builtin tool metadata shipped with the forge.
//!
//! Business logic lives in the `forge_tools` runtime package baked into the
//! service base image; only the registration metadata is described here.

use super::{AuthRequirement, ToolDefinition};

/// Static registration table consumed by [`super::ToolCatalog::builtin`].
pub const BUILTIN_TOOLS: &[ToolDefinition] = &[
    ToolDefinition {
        id: "basic_math",
        description: "Perform basic arithmetic (add, subtract, multiply, divide) over a list of numbers",
        module: "forge_tools.calculator",
        entrypoint: "basic_math",
        required_env: &[],
        auth: None,
    },
    ToolDefinition {
        id: "advanced_math",
        description: "Perform advanced operations (sqrt, sin, cos, tan, log) on a single number",
        module: "forge_tools.calculator",
        entrypoint: "advanced_math",
        required_env: &[],
        auth: None,
    },
    ToolDefinition {
        id: "statistics",
        description: "Calculate mean, median, min, max, and count for a list of numbers",
        module: "forge_tools.calculator",
        entrypoint: "statistics",
        required_env: &[],
        auth: None,
    },
    ToolDefinition {
        id: "create_event",
        description: "Create a calendar event with a title, start time, and duration",
        module: "forge_tools.calendar",
        entrypoint: "create_event",
        required_env: &["CALENDAR_API_TOKEN"],
        auth: Some(AuthRequirement {
            provider: "google",
            scopes: &["https://www.googleapis.com/auth/calendar.events"],
        }),
    },
    ToolDefinition {
        id: "list_events",
        description: "List calendar events between two dates",
        module: "forge_tools.calendar",
        entrypoint: "list_events",
        required_env: &["CALENDAR_API_TOKEN"],
        auth: Some(AuthRequirement {
            provider: "google",
            scopes: &["https://www.googleapis.com/auth/calendar.readonly"],
        }),
    },
    ToolDefinition {
        id: "delete_event",
        description: "Delete a calendar event by id",
        module: "forge_tools.calendar",
        entrypoint: "delete_event",
        required_env: &["CALENDAR_API_TOKEN"],
        auth: Some(AuthRequirement {
            provider: "google",
            scopes: &["https://www.googleapis.com/auth/calendar.events"],
        }),
    },
    ToolDefinition {
        id: "web_search",
        description: "Search the web and return ranked result snippets",
        module: "forge_tools.search",
        entrypoint: "web_search",
        required_env: &["SEARCH_API_KEY"],
        auth: None,
    },
    ToolDefinition {
        id: "news_search",
        description: "Search recent news articles",
        module: "forge_tools.search",
        entrypoint: "news_search",
        required_env: &["SEARCH_API_KEY"],
        auth: None,
    },
    ToolDefinition {
        id: "image_search",
        description: "Search for images matching a query",
        module: "forge_tools.search",
        entrypoint: "image_search",
        required_env: &["SEARCH_API_KEY"],
        auth: None,
    },
    ToolDefinition {
        id: "get_forecast",
        description: "Get the weather forecast for a latitude/longitude pair",
        module: "forge_tools.weather",
        entrypoint: "get_forecast",
        required_env: &[],
        auth: None,
    },
];
