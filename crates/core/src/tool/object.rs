use std::pin::Pin;

use jsonschema::Validator;
use jsonschema::error::{TypeKind, ValidationError, ValidationErrorKind};
use jsonschema::primitive_type::PrimitiveType;
use loupe_model::ModelTool;
use schemars::schema_for;
use serde_json::{Value, json};

use super::{Error, Tool};

pub(crate) type ToolFuture =
    Pin<Box<dyn Future<Output = Result<String, Error>> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> &ModelTool;

    /// Checks `arguments` against the input schema, describing what is
    /// wrong in a way the model can act on.
    fn validate(&self, arguments: &Value) -> Result<(), String>;

    fn execute(&self, arguments: Value) -> Result<ToolFuture, String>;
}

pub(crate) struct ToolObjectImpl<T: Tool> {
    tool: T,
    definition: ModelTool,
    validator: Option<Validator>,
}

impl<T: Tool> ToolObjectImpl<T> {
    pub fn new(tool: T) -> Self {
        let schema = schema_for!(T::Input).to_value();
        let validator = match Validator::new(&schema) {
            Ok(validator) => Some(validator),
            Err(err) => {
                warn!("invalid input schema for `{}`: {err}", tool.name());
                None
            }
        };
        let definition = ModelTool {
            name: tool.name().to_owned(),
            description: tool.description().to_owned(),
            parameters: parameters(&schema),
        };
        Self {
            tool,
            definition,
            validator,
        }
    }
}

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.tool.name()
    }

    #[inline]
    fn definition(&self) -> &ModelTool {
        &self.definition
    }

    fn validate(&self, arguments: &Value) -> Result<(), String> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let errors: Vec<_> = validator.iter_errors(arguments).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(describe_errors(&errors))
        }
    }

    fn execute(&self, arguments: Value) -> Result<ToolFuture, String> {
        let input: T::Input = serde_json::from_value(arguments).map_err(|err| {
            format!("Invalid arguments: {err}. Check types and required fields.")
        })?;
        Ok(Box::pin(self.tool.execute(input)))
    }
}

/// Reduces a generated schema to the shape advertised to the model.
fn parameters(schema: &Value) -> Value {
    let properties = schema.get("properties").cloned().unwrap_or(json!({}));
    let required = schema.get("required").cloned().unwrap_or(json!([]));
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn field_path(err: &ValidationError<'_>) -> String {
    let mut path: Vec<String> = err
        .instance_path
        .to_string()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();
    if let ValidationErrorKind::Required { property } = &err.kind {
        match property {
            Value::String(name) => path.push(name.clone()),
            other => path.push(other.to_string()),
        }
    }
    path.join(".")
}

fn describe_errors(errors: &[ValidationError<'_>]) -> String {
    if let [err] = errors {
        let field = field_path(err);
        return match &err.kind {
            ValidationErrorKind::Required { .. } => {
                format!("Missing required argument '{field}'.")
            }
            ValidationErrorKind::Type {
                kind: TypeKind::Single(PrimitiveType::String),
            } => format!("Argument '{field}' must be a string."),
            ValidationErrorKind::Type {
                kind: TypeKind::Single(PrimitiveType::Integer),
            } => format!("Argument '{field}' must be an integer."),
            _ => format!("Invalid argument '{field}': {err}."),
        };
    }

    let fields: Vec<_> = errors.iter().map(field_path).collect();
    format!(
        "Invalid arguments: {}. Check types and required fields.",
        fields.join(", ")
    )
}
