//! Callable lookup tools for the language-generation agent.
//!
//! The agent discovers tools through [`ToolRegistry`] (name, description and
//! a JSON Schema for parameters) and invokes them with a JSON object. Both
//! built-in tools take a single `query` string and return
//! `{ "query": ..., "context": ... }`; an empty retrieval is reported as a
//! tool error carrying a fixed message the agent can relay.
//!
//! ```text
//! agent ──▶ ToolRegistry::find("lookup_records")
//!               │
//!               ▼
//!        Tool::execute(params, &ToolContext)
//!               │
//!               ▼
//!        KnowledgeBase::lookup_records ──▶ StatusNotifier
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::knowledge::KnowledgeBase;
use crate::models::Lookup;
use crate::notify::StatusNotifier;

pub const DOCUMENTS_NOT_FOUND: &str = "No relevant information found.";
pub const RECORDS_NOT_FOUND: &str = "No relevant information found in calendar or faculty data.";

/// A tool the agent can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"lookup_documents"`.
    fn name(&self) -> &str;

    /// One-line description the agent uses to decide whether to call the tool.
    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool can reach while executing.
#[derive(Clone)]
pub struct ToolContext {
    pub knowledge: Arc<KnowledgeBase>,
    pub notifier: Option<Arc<dyn StatusNotifier>>,
}

impl ToolContext {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            knowledge,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn notifier(&self) -> Option<&dyn StatusNotifier> {
        self.notifier.as_deref()
    }
}

fn query_schema(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": description }
        },
        "required": ["query"]
    })
}

fn query_param(params: &Value) -> Result<&str> {
    let query = params["query"].as_str().unwrap_or("");
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    Ok(query)
}

fn found_or(lookup: Lookup, not_found: &str) -> Result<Value> {
    match lookup {
        Lookup::Found { query, context, .. } => Ok(serde_json::json!({
            "query": query,
            "context": context,
        })),
        Lookup::NotFound => bail!("{}", not_found),
    }
}

/// Policy and handbook questions, answered from the document index.
pub struct LookupDocumentsTool;

#[async_trait]
impl Tool for LookupDocumentsTool {
    fn name(&self) -> &str {
        "lookup_documents"
    }

    fn description(&self) -> &str {
        "Retrieve university policy and handbook information relevant to a question"
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The user's question about university information")
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = query_param(&params)?;
        let lookup = ctx
            .knowledge
            .lookup_documents(query, ctx.notifier())
            .await
            .context("Error retrieving document information")?;
        found_or(lookup, DOCUMENTS_NOT_FOUND)
    }
}

/// Calendar, holiday, faculty and lab schedule questions, answered from the
/// record index.
pub struct LookupRecordsTool;

#[async_trait]
impl Tool for LookupRecordsTool {
    fn name(&self) -> &str {
        "lookup_records"
    }

    fn description(&self) -> &str {
        "Retrieve calendar events, holiday dates, faculty details and lab schedules"
    }

    fn parameters_schema(&self) -> Value {
        query_schema("The user's question about calendar, faculty, or lab information")
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = query_param(&params)?;
        let lookup = ctx
            .knowledge
            .lookup_records(query, ctx.notifier())
            .await
            .context("Error retrieving calendar/faculty information")?;
        found_or(lookup, RECORDS_NOT_FOUND)
    }
}

/// Registry of tools exposed to the agent.
///
/// ```rust
/// use context_desk::tools::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert!(tools.find("lookup_records").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding `lookup_documents` and `lookup_records`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LookupDocumentsTool));
        registry.register(Box::new(LookupRecordsTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
