//! The registry itself: registration, discovery, and timeout-bounded
//! dispatch.
//!
//! Grounded on `agent_tool::registry::ToolRegistry`, which keeps tools as
//! `Arc<dyn ToolDyn>` in a `HashMap<String, _>` and dispatches through a
//! middleware chain. This registry stores a declarative [`ToolDefinition`]
//! alongside a boxed handler instead, since tools here are named and
//! schema-validated at runtime rather than known as compile-time types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use rt_protocol::{
    Event, EventMsg, SharedEventSink, ToolContext, ToolDefinition, ToolHandler, ToolOutput,
};
use serde_json::Value;
use tokio::time::timeout;

use crate::error::ToolError;
use crate::validate::validate_params;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// A `{namePattern}` filter for [`ToolRegistry::discover`].
#[derive(Debug, Clone, Default)]
pub struct DiscoverQuery {
    pub name_pattern: Option<String>,
}

/// The result of [`ToolRegistry::discover`].
#[derive(Debug, Clone)]
pub struct DiscoverResult {
    pub tools: Vec<ToolDefinition>,
    pub total: usize,
}

/// The arguments to [`ToolRegistry::execute`].
pub struct ExecuteRequest {
    pub tool_name: String,
    pub parameters: Value,
    pub session_id: String,
    pub turn_id: String,
    pub timeout: Option<Duration>,
    pub cancellation_token: tokio_util::sync::CancellationToken,
}

/// The `{success, data|error, duration}` result of [`ToolRegistry::execute`].
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub output: Result<ToolOutput, ToolError>,
    pub duration: Duration,
}

impl ExecuteResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.output.is_ok()
    }
}

/// Central registry and dispatcher for named tools.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    sink: Option<SharedEventSink>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            sink: None,
        }
    }

    #[must_use]
    pub fn with_event_sink(sink: SharedEventSink) -> Self {
        Self {
            tools: HashMap::new(),
            sink: Some(sink),
        }
    }

    fn emit(&self, submission_id: &str, msg: EventMsg) {
        if let Some(sink) = &self.sink {
            sink.emit(Event::new(submission_id, msg));
        }
    }

    /// Register a tool. Rejects a blank name/description, a `function` tool
    /// without an `object` schema carrying a `properties` map, and a
    /// duplicate name.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        let name = definition
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| singleton_name(&definition).to_string());

        if name.trim().is_empty() {
            return Err(ToolError::InvalidDefinition(
                "tool name must not be empty".to_string(),
            ));
        }
        if let ToolDefinition::Function {
            description,
            parameters,
            ..
        } = &definition
        {
            if description.trim().is_empty() {
                return Err(ToolError::InvalidDefinition(
                    "tool description must not be empty".to_string(),
                ));
            }
            let is_object = parameters.get("type").and_then(Value::as_str) == Some("object");
            let has_properties = parameters.get("properties").is_some_and(Value::is_object);
            if !is_object || !has_properties {
                return Err(ToolError::InvalidDefinition(format!(
                    "tool '{name}' parameters must be an object schema with a properties map"
                )));
            }
        }
        if let ToolDefinition::Custom { description, .. } = &definition {
            if description.trim().is_empty() {
                return Err(ToolError::InvalidDefinition(
                    "tool description must not be empty".to_string(),
                ));
            }
        }

        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateName(name));
        }

        self.tools.insert(
            name.clone(),
            RegisteredTool {
                definition,
                handler,
            },
        );
        self.emit("system", EventMsg::ToolRegistered { name });
        Ok(())
    }

    /// Unregister a tool by name. Rejects if no tool by that name exists.
    pub fn unregister(&mut self, name: &str) -> Result<(), ToolError> {
        if self.tools.remove(name).is_none() {
            return Err(ToolError::NotFound(name.to_string()));
        }
        self.emit(
            "system",
            EventMsg::ToolUnregistered {
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// List registered tool definitions, optionally filtered by name regex.
    pub fn discover(&self, query: Option<DiscoverQuery>) -> Result<DiscoverResult, ToolError> {
        let pattern = query
            .and_then(|q| q.name_pattern)
            .map(|p| {
                Regex::new(&p)
                    .map_err(|e| ToolError::InvalidDefinition(format!("bad namePattern: {e}")))
            })
            .transpose()?;

        let mut tools: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| match &pattern {
                None => true,
                Some(re) => t.definition.name().is_some_and(|name| re.is_match(name)),
            })
            .map(|t| t.definition.clone())
            .collect();
        tools.sort_by(|a, b| a.name().unwrap_or("").cmp(b.name().unwrap_or("")));

        let total = tools.len();
        Ok(DiscoverResult { tools, total })
    }

    /// Validate `params` against the named tool's parameter schema.
    pub fn validate(&self, name: &str, params: &Value) -> Result<(), ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let schema = match &tool.definition {
            ToolDefinition::Function { parameters, .. } => parameters,
            _ => return Ok(()),
        };

        let result = validate_params(params, schema);
        if result.valid {
            Ok(())
        } else {
            Err(ToolError::Validation(result.errors))
        }
    }

    /// Dispatch a call through lookup, validation, and a timeout-bounded
    /// handler invocation, emitting exactly one terminal lifecycle event.
    pub async fn execute(&self, request: ExecuteRequest) -> ExecuteResult {
        let ExecuteRequest {
            tool_name,
            parameters,
            session_id,
            turn_id,
            timeout: requested_timeout,
            cancellation_token,
        } = request;

        let tool = match self.tools.get(&tool_name) {
            Some(tool) => tool,
            None => {
                return ExecuteResult {
                    output: Err(ToolError::NotFound(tool_name)),
                    duration: Duration::ZERO,
                }
            }
        };

        if let Err(err) = self.validate(&tool_name, &parameters) {
            return ExecuteResult {
                output: Err(err),
                duration: Duration::ZERO,
            };
        }

        self.emit(
            &turn_id,
            EventMsg::ToolExecutionStart {
                tool_name: tool_name.clone(),
                session_id: session_id.clone(),
            },
        );

        let bound = requested_timeout.unwrap_or(DEFAULT_TOOL_TIMEOUT);
        let ctx = ToolContext {
            session_id,
            turn_id: turn_id.clone(),
            tool_name: tool_name.clone(),
            cancellation_token,
        };

        let start = Instant::now();
        let handler_fut = tool.handler.call(parameters, &ctx);
        let outcome = timeout(bound, handler_fut).await;
        let duration = start.elapsed();

        let output = match outcome {
            Ok(Ok(output)) => {
                self.emit(
                    &turn_id,
                    EventMsg::ToolExecutionEnd {
                        tool_name: tool_name.clone(),
                        success: true,
                        duration_ms: duration.as_millis() as u64,
                    },
                );
                Ok(output)
            }
            Ok(Err(handler_err)) => {
                self.emit(
                    &turn_id,
                    EventMsg::ToolExecutionError {
                        tool_name: tool_name.clone(),
                        message: handler_err.0.clone(),
                    },
                );
                Err(ToolError::Execution(handler_err.0))
            }
            Err(_elapsed) => {
                let timeout_ms = bound.as_millis() as u64;
                self.emit(
                    &turn_id,
                    EventMsg::ToolExecutionTimeout {
                        tool_name: tool_name.clone(),
                        timeout_ms,
                    },
                );
                Err(ToolError::Timeout { timeout_ms })
            }
        };

        ExecuteResult { output, duration }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn singleton_name(definition: &ToolDefinition) -> &'static str {
    match definition {
        ToolDefinition::LocalShell => "local_shell",
        ToolDefinition::WebSearch => "web_search",
        ToolDefinition::Function { .. } | ToolDefinition::Custom { .. } => unreachable!(),
    }
}
