//! Tool registry: name-keyed dispatch with argument validation.
//!
//! Nothing in here fails. Unknown tools, malformed arguments and tool errors
//! all come back as text the LLM can read and correct itself from.

use lectern_core::traits::Tool;
use lectern_core::types::{ToolDefinition, ToolOutput};
use serde_json::Value;

/// One executed tool call, kept for the lifetime of a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: Value,
    pub result_text: String,
}

/// Validate arguments against a tool's JSON schema.
///
/// Checks that the arguments form an object, that every required key is
/// present and non-null, and that each known property has the declared type.
pub fn validate_args(definition: &ToolDefinition, args: &Value) -> Result<(), String> {
    let Some(obj) = args.as_object() else {
        return Err(format!(
            "Arguments for tool '{}' must be a JSON object, got {}.",
            definition.name,
            json_type(args)
        ));
    };
    let params = &definition.parameters;

    if let Some(required) = params.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|r| r.as_str()) {
            match obj.get(key) {
                None | Some(Value::Null) => {
                    return Err(format!(
                        "Missing required parameter '{key}' for tool '{}'.",
                        definition.name
                    ));
                }
                Some(_) => {}
            }
        }
    }

    if let Some(props) = params.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in obj {
            if value.is_null() {
                continue;
            }
            if let Some(expected) = props.get(key).and_then(|p| p.get("type")).and_then(|t| t.as_str())
                && !matches_type(value, expected)
            {
                return Err(format!(
                    "Parameter '{key}' for tool '{}' must be {}, got {}.",
                    definition.name,
                    article(expected),
                    json_type(value)
                ));
            }
        }
    }
    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn article(ty: &str) -> String {
    match ty {
        "integer" | "array" | "object" => format!("an {ty}"),
        _ => format!("a {ty}"),
    }
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolManager {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == name) {
            tracing::warn!("⚠️ Tool '{name}' registered twice, replacing");
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name. Always returns output, never an error.
    pub async fn execute(&self, name: &str, args: &Value) -> ToolOutput {
        let Some(tool) = self.find(name) else {
            return ToolOutput::message(format!(
                "Tool '{name}' not found. Available tools: {}",
                self.names().join(", ")
            ));
        };

        if let Err(msg) = validate_args(&tool.definition(), args) {
            tracing::debug!("Rejected arguments for {name}: {msg}");
            return ToolOutput::message(format!("Error: {msg}"));
        }

        match tool.execute(args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("⚠️ Tool '{name}' failed: {e}");
                ToolOutput::message(format!("Error executing tool '{name}': {e}"))
            }
        }
    }

    /// Like [`execute`](Self::execute) but takes the raw JSON argument string an LLM produced.
    pub async fn execute_json(&self, name: &str, arguments: &str) -> (Value, ToolOutput) {
        let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
        match serde_json::from_str::<Value>(raw) {
            Ok(args) => {
                let output = self.execute(name, &args).await;
                (args, output)
            }
            Err(e) => (
                Value::String(arguments.to_string()),
                ToolOutput::message(format!(
                    "Error: Invalid JSON arguments for tool '{name}': {e}"
                )),
            ),
        }
    }
}
