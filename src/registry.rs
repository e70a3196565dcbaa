//! Explicit registry of externally callable operations.
//!
//! A registry is built once at startup with one `register` call per
//! operation and handed to whatever dispatches calls. Each entry pairs the
//! operation's metadata with its handler, so the tool list, the system-prompt
//! text and dispatch all come from the same place.

use std::fmt;

use anyhow::{bail, Result};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::store::ProgressStore;

/// Text result of one operation, plus whether it represents an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        ToolResponse {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ToolResponse {
            text: text.into(),
            is_error: true,
        }
    }

    /// Content-block envelope expected by tool-calling clients.
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::json!({
            "content": [{ "type": "text", "text": self.text }],
        });
        if self.is_error {
            out["is_error"] = Value::Bool(true);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Parameter names with human-readable descriptions, in display order.
    pub parameters: Vec<(&'static str, &'static str)>,
}

/// What a handler can reach while it runs.
pub struct ToolContext<'a> {
    pub store: &'a ProgressStore,
    pub registry: &'a ToolRegistry,
}

pub type Handler = fn(&ToolContext<'_>, &Value) -> Result<ToolResponse>;

struct RegisteredTool {
    spec: ToolSpec,
    handler: Handler,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec, handler: Handler) -> Result<()> {
        if self.get(spec.name).is_some() {
            bail!("tool '{}' is already registered", spec.name);
        }
        self.tools.push(RegisteredTool { spec, handler });
        Ok(())
    }

    fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.spec.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.spec.name).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().map(|t| &t.spec)
    }

    /// Fully-qualified names as exposed by a tool server called `server_name`.
    pub fn allowed_tools(&self, server_name: &str) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| format!("mcp__{server_name}__{}", t.spec.name))
            .collect()
    }

    /// Run the named operation against `store`.
    pub fn dispatch(&self, store: &ProgressStore, name: &str, args: &Value) -> Result<ToolResponse> {
        let Some(tool) = self.get(name) else {
            bail!(
                "unknown tool '{name}' (available: {})",
                self.names().join(", ")
            );
        };
        debug!("dispatching {name} with {args}");
        let ctx = ToolContext {
            store,
            registry: self,
        };
        (tool.handler)(&ctx, args)
    }

    /// Tool section for an assistant's system prompt.
    pub fn system_prompt_section(&self) -> String {
        let mut lines = vec![
            "## Available Tools".to_string(),
            String::new(),
            "You have access to the following tools:".to_string(),
            String::new(),
        ];
        for spec in self.specs() {
            lines.push(format!("**{}**: {}", spec.name, spec.description));
            if !spec.parameters.is_empty() {
                lines.push("Parameters:".to_string());
                for (param, desc) in &spec.parameters {
                    lines.push(format!("- {param}: {desc}"));
                }
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// Markdown listing returned by the `list_tools` operation.
    pub fn introspection_text(&self) -> String {
        let mut lines = vec!["# Available Tools\n".to_string()];
        for spec in self.specs() {
            lines.push(format!("## {}", spec.name));
            lines.push(format!("{}\n", spec.description));
            if !spec.parameters.is_empty() {
                lines.push("**Parameters:**".to_string());
                for (param, desc) in &spec.parameters {
                    lines.push(format!("- `{param}`: {desc}"));
                }
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}
