//! Type conversions between rmcp's MCP model types and this crate's own
//! catalog/result types, so the rest of the codebase never needs to know
//! about rmcp's wire types directly.

use rmcp::model::{CallToolResult, Prompt, RawContent, Resource, Tool as McpTool};

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

pub fn mcp_tool_to_descriptor(tool: McpTool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.into_owned(),
        description: tool.description.map(|d| d.into_owned()).unwrap_or_default(),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

#[derive(Debug, Clone)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: Option<String>,
}

pub fn mcp_prompt_to_descriptor(prompt: Prompt) -> PromptDescriptor {
    PromptDescriptor { name: prompt.name, description: prompt.description }
}

#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub mime_type: Option<String>,
}

pub fn mcp_resource_to_descriptor(resource: Resource) -> ResourceDescriptor {
    ResourceDescriptor {
        uri: resource.raw.uri,
        name: resource.raw.name,
        mime_type: resource.raw.mime_type,
    }
}

/// One piece of a tool call's result, flattened to text. Non-text content
/// (images, audio, embedded resources) is summarized as a placeholder
/// rather than dropped silently.
#[derive(Debug, Clone)]
pub struct ToolCallOutput {
    pub text: String,
    pub is_error: bool,
}

pub fn call_result_to_output(result: CallToolResult) -> ToolCallOutput {
    let mut text = String::new();
    for item in result.content.into_iter() {
        match item.raw {
            RawContent::Text(t) => text.push_str(&t.text),
            RawContent::Image(_) => text.push_str("[image content omitted]"),
            RawContent::Audio(_) => text.push_str("[audio content omitted]"),
            RawContent::Resource(r) => {
                text.push_str(&format!("[resource: {}]", r.resource.uri()));
            }
            RawContent::ResourceLink(l) => {
                text.push_str(&format!("[resource link: {}]", l.uri));
            }
        }
        text.push('\n');
    }
    ToolCallOutput { text: text.trim_end().to_string(), is_error: result.is_error.unwrap_or(false) }
}
