//! Tool definitions, registry, and function-calling schema emission.
//!
//! A [`Tool`] pairs metadata — name, description, typed parameter
//! descriptors — with an async handler. Tools live in a [`ToolRegistry`],
//! which renders the registry as function-calling JSON for the system
//! prompt and dispatches invocations back to the handlers. The registry may
//! be shared read-only across conversations behind an `Arc`.
//!
//! Parameter descriptors are a recursive [`PropertySchema`] tree rather
//! than free-form JSON, so schema emission is total: every descriptor
//! renders to the `{type:"function", function:{...}}` shape local models
//! are prompted with.
//!
//! # Example
//!
//! ```
//! use agent_loop::{tool, PropertySchema};
//!
//! let weather = tool("get_weather", "Get current weather for a location")
//!     .param(PropertySchema::string("location", "City name", true))
//!     .param(PropertySchema::enumeration(
//!         "units",
//!         "Temperature units",
//!         false,
//!         &["celsius", "fahrenheit"],
//!     ))
//!     .build(|args| async move {
//!         let location = args["location"].as_str().unwrap_or("Unknown");
//!         Ok(serde_json::json!({"location": location, "temperature": 22}))
//!     });
//! assert_eq!(weather.name(), "get_weather");
//! ```

use crate::arena::Arena;
use crate::error::Result;
use crate::json::Value;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// JSON schema base types a parameter may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// `"string"`
    String,
    /// `"integer"`
    Integer,
    /// `"number"`
    Number,
    /// `"boolean"`
    Boolean,
    /// `"array"` (carries an item schema)
    Array,
    /// `"object"` (carries nested properties)
    Object,
}

impl PropertyType {
    fn as_str(self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Array => "array",
            PropertyType::Object => "object",
        }
    }
}

/// Recursive descriptor for one tool parameter.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    /// Parameter name as the model will supply it.
    pub name: String,
    /// Declared base type.
    pub ptype: PropertyType,
    /// Human-readable description shown to the model.
    pub description: String,
    /// Whether the parameter appears in the `required` array.
    pub required: bool,
    /// Closed set of accepted values; non-empty overrides the base type
    /// with `{"type":"string","enum":[...]}` on emission.
    pub enum_values: Vec<String>,
    /// Item schema for `Array` parameters.
    pub items: Option<Box<PropertySchema>>,
    /// Nested properties for `Object` parameters.
    pub properties: Vec<PropertySchema>,
}

impl PropertySchema {
    fn base(name: &str, ptype: PropertyType, description: &str, required: bool) -> Self {
        PropertySchema {
            name: name.to_string(),
            ptype,
            description: description.to_string(),
            required,
            enum_values: Vec::new(),
            items: None,
            properties: Vec::new(),
        }
    }

    /// String parameter.
    pub fn string(name: &str, description: &str, required: bool) -> Self {
        Self::base(name, PropertyType::String, description, required)
    }

    /// Integer parameter.
    pub fn integer(name: &str, description: &str, required: bool) -> Self {
        Self::base(name, PropertyType::Integer, description, required)
    }

    /// Floating-point parameter.
    pub fn number(name: &str, description: &str, required: bool) -> Self {
        Self::base(name, PropertyType::Number, description, required)
    }

    /// Boolean parameter.
    pub fn boolean(name: &str, description: &str, required: bool) -> Self {
        Self::base(name, PropertyType::Boolean, description, required)
    }

    /// String parameter restricted to a closed value set.
    pub fn enumeration(name: &str, description: &str, required: bool, values: &[&str]) -> Self {
        let mut prop = Self::base(name, PropertyType::String, description, required);
        prop.enum_values = values.iter().map(|v| v.to_string()).collect();
        prop
    }

    /// Array parameter with an item schema.
    pub fn array(name: &str, description: &str, required: bool, items: PropertySchema) -> Self {
        let mut prop = Self::base(name, PropertyType::Array, description, required);
        prop.items = Some(Box::new(items));
        prop
    }

    /// Object parameter with nested properties.
    pub fn object(
        name: &str,
        description: &str,
        required: bool,
        properties: Vec<PropertySchema>,
    ) -> Self {
        let mut prop = Self::base(name, PropertyType::Object, description, required);
        prop.properties = properties;
        prop
    }

    /// Render this property as a JSON-schema fragment.
    fn to_value<'a>(&self, arena: &'a Arena) -> Value<'a> {
        let mut obj = Value::Object(&[]);

        // A non-empty enum forces string typing regardless of the declared
        // base type.
        if !self.enum_values.is_empty() {
            obj = Value::object_set(arena, obj, "type", Value::string(arena, "string"));
            if !self.description.is_empty() {
                obj = Value::object_set(
                    arena,
                    obj,
                    "description",
                    Value::string(arena, &self.description),
                );
            }
            let mut values = Value::Array(&[]);
            for v in &self.enum_values {
                values = Value::array_push(arena, values, Value::string(arena, v));
            }
            return Value::object_set(arena, obj, "enum", values);
        }

        obj = Value::object_set(arena, obj, "type", Value::string(arena, self.ptype.as_str()));
        if !self.description.is_empty() {
            obj = Value::object_set(
                arena,
                obj,
                "description",
                Value::string(arena, &self.description),
            );
        }

        if self.ptype == PropertyType::Array {
            if let Some(items) = &self.items {
                obj = Value::object_set(arena, obj, "items", items.to_value(arena));
            }
        }

        if self.ptype == PropertyType::Object && !self.properties.is_empty() {
            let mut props = Value::Object(&[]);
            let mut required = Value::Array(&[]);
            for nested in &self.properties {
                props = Value::object_set(arena, props, &nested.name, nested.to_value(arena));
                if nested.required {
                    required = Value::array_push(arena, required, Value::string(arena, &nested.name));
                }
            }
            obj = Value::object_set(arena, obj, "properties", props);
            if !required.is_empty() {
                obj = Value::object_set(arena, obj, "required", required);
            }
        }

        obj
    }
}

/// Async handler invoked when the model calls a tool.
///
/// Takes the JSON argument object and returns a JSON result. The `Arc` +
/// boxed-future shape allows handlers of different concrete types to share
/// one registry and to run on any executor.
pub type ToolHandler = Arc<
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value>> + Send + Sync,
>;

/// A tool the model may invoke: metadata plus its handler.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    parameters: Vec<PropertySchema>,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool from its metadata and an async handler.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<PropertySchema>,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Tool name (the identifier the model emits).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description shown to the model.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameter descriptors.
    pub fn parameters(&self) -> &[PropertySchema] {
        &self.parameters
    }

    /// Run the handler with the given argument object.
    pub async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        (self.handler)(args).await
    }

    /// Render this tool in the function-calling schema shape.
    fn to_value<'a>(&self, arena: &'a Arena) -> Value<'a> {
        let mut func = Value::Object(&[]);
        func = Value::object_set(arena, func, "name", Value::string(arena, &self.name));
        if !self.description.is_empty() {
            func = Value::object_set(
                arena,
                func,
                "description",
                Value::string(arena, &self.description),
            );
        }

        let mut params = Value::Object(&[]);
        params = Value::object_set(arena, params, "type", Value::string(arena, "object"));
        let mut props = Value::Object(&[]);
        let mut required = Value::Array(&[]);
        for prop in &self.parameters {
            props = Value::object_set(arena, props, &prop.name, prop.to_value(arena));
            if prop.required {
                required = Value::array_push(arena, required, Value::string(arena, &prop.name));
            }
        }
        params = Value::object_set(arena, params, "properties", props);
        if !required.is_empty() {
            params = Value::object_set(arena, params, "required", required);
        }
        func = Value::object_set(arena, func, "parameters", params);

        let mut root = Value::Object(&[]);
        root = Value::object_set(arena, root, "type", Value::string(arena, "function"));
        Value::object_set(arena, root, "function", func)
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Builder returned by [`tool()`].
pub struct ToolBuilder {
    name: String,
    description: String,
    parameters: Vec<PropertySchema>,
}

impl ToolBuilder {
    /// Add one parameter descriptor.
    pub fn param(mut self, schema: PropertySchema) -> Self {
        self.parameters.push(schema);
        self
    }

    /// Attach the handler and produce the [`Tool`].
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.parameters, handler)
    }
}

/// Start building a tool.
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder {
        name: name.into(),
        description: description.into(),
        parameters: Vec::new(),
    }
}

/// Output of one tool execution as seen by the orchestrator.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Result text fed back to the model (truncated by the orchestrator).
    pub content: String,
    /// Marks a tool-level failure. The model sees the content either way.
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful output.
    pub fn ok(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            is_error: false,
        }
    }

    /// Failed output; the loop continues and the model may react.
    pub fn error(content: impl Into<String>) -> Self {
        ToolOutput {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Dispatch seam between the orchestrator and the host's tools.
///
/// [`ToolRegistry`] implements this by handler lookup; hosts with external
/// tool transports implement it directly. An `Err` return is converted by
/// the orchestrator into an `is_error` tool result, never run termination.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute `name` with the given JSON argument object.
    async fn execute(&self, name: &str, arguments: &serde_json::Value) -> Result<ToolOutput>;
}

/// Vector-backed collection of tools keyed by unique name.
///
/// Lookup is linear; registries are small. Duplicate names are not checked —
/// the first registration wins on lookup and the caller is responsible for
/// uniqueness.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        ToolRegistry { tools: Vec::new() }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Tool) {
        self.tools.push(Arc::new(tool));
    }

    /// Register an already-shared tool.
    pub fn register_arc(&mut self, tool: Arc<Tool>) {
        self.tools.push(tool);
    }

    /// Linear lookup by name.
    pub fn find(&self, name: &str) -> Option<&Arc<Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterate over the registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.tools.iter()
    }

    /// Render the whole registry as a function-calling schema array.
    ///
    /// An empty registry renders as `[]`.
    pub fn schema_json(&self, pretty: bool) -> String {
        let arena = Arena::new();
        let mut array = Value::Array(&[]);
        for tool in &self.tools {
            array = Value::array_push(&arena, array, tool.to_value(&arena));
        }
        array.serialize(pretty)
    }

    /// Human-readable markdown description of every tool, for prompts and
    /// debugging. `japanese` selects the localized labels.
    pub fn describe(&self, japanese: bool) -> String {
        let mut out = String::new();
        out.push_str(if japanese {
            "# 利用可能なツール\n\n"
        } else {
            "# Available Tools\n\n"
        });
        for tool in &self.tools {
            out.push_str(&format!("### {}\n", tool.name()));
            if !tool.description().is_empty() {
                out.push_str(&format!("{}\n\n", tool.description()));
            }
            if !tool.parameters().is_empty() {
                out.push_str(if japanese {
                    "**パラメータ:**\n"
                } else {
                    "**Parameters:**\n"
                });
                for prop in tool.parameters() {
                    out.push_str(&format!("- `{}` ({})", prop.name, prop.ptype.as_str()));
                    if prop.required {
                        out.push_str(if japanese { " *必須*" } else { " *required*" });
                    }
                    if !prop.description.is_empty() {
                        out.push_str(&format!(": {}", prop.description));
                    }
                    if !prop.enum_values.is_empty() {
                        out.push_str(" [");
                        for (i, v) in prop.enum_values.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push_str(&format!("\"{v}\""));
                        }
                        out.push(']');
                    }
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &format!("{} tools", self.tools.len()))
            .finish()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, arguments: &serde_json::Value) -> Result<ToolOutput> {
        let Some(tool) = self.find(name) else {
            log::debug!("tool '{name}' not found in registry");
            return Ok(ToolOutput::error(format!("Tool '{name}' not found")));
        };
        match tool.execute(arguments.clone()).await {
            // Plain string results are passed through unquoted; everything
            // else is serialized.
            Ok(serde_json::Value::String(s)) => Ok(ToolOutput::ok(s)),
            Ok(value) => Ok(ToolOutput::ok(value.to_string())),
            Err(e) => Ok(ToolOutput::error(e.to_string())),
        }
    }
}
