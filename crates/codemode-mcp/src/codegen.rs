//! Render tool descriptors as TypeScript-style declarations.
//!
//! Each tool becomes one `export function name(params: T): Promise<any>;`
//! where `T` is derived from the tool's JSON Schema.

use serde_json::Value;

use codemode_types::ToolDescriptor;

const HEADER: &str = r#"/**
 * Code Mode SDK
 * Generated automatically. Do not edit.
 */

// Common types
export interface ToolResult {
  content: Array<{ type: string; text: string }>;
  isError?: boolean;
}

// Tools
"#;

/// Map a JSON Schema node to a declaration type.
///
/// Absent or unrecognized schemas map to `any`.
pub fn render_type(schema: &Value) -> String {
    let Some(kind) = schema.get("type").and_then(Value::as_str) else {
        return "any".into();
    };

    match kind {
        "string" => match schema.get("enum").and_then(Value::as_array) {
            Some(members) if !members.is_empty() => members
                .iter()
                .map(render_literal)
                .collect::<Vec<_>>()
                .join(" | "),
            _ => "string".into(),
        },
        "number" | "integer" => "number".into(),
        "boolean" => "boolean".into(),
        "array" => {
            let element = schema
                .get("items")
                .map(render_type)
                .unwrap_or_else(|| "any".into());
            if element.contains(" | ") {
                format!("({element})[]")
            } else {
                format!("{element}[]")
            }
        }
        "object" => match schema.get("properties").and_then(Value::as_object) {
            Some(properties) => {
                let required: Vec<&str> = schema
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| names.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();

                let fields: Vec<String> = properties
                    .iter()
                    .map(|(name, prop)| {
                        let optional = if required.contains(&name.as_str()) { "" } else { "?" };
                        format!("{}{optional}: {}", property_key(name), render_type(prop))
                    })
                    .collect();

                if fields.is_empty() {
                    "{}".into()
                } else {
                    format!("{{ {} }}", fields.join("; "))
                }
            }
            None => "Record<string, any>".into(),
        },
        _ => "any".into(),
    }
}

/// Render one exported function declaration for a tool.
pub fn render_declaration(tool: &ToolDescriptor) -> String {
    let doc = tool
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| format!("/** {} */\n", d.trim().replace("*/", "*\\/")))
        .unwrap_or_default();

    format!(
        "{doc}export function {}(params: {}): Promise<any>;",
        safe_identifier(&tool.name),
        render_type(&tool.input_schema)
    )
}

/// Render the complete declaration file for a tool list.
pub fn generate_declarations(tools: &[ToolDescriptor]) -> String {
    let functions: Vec<String> = tools.iter().map(render_declaration).collect();
    format!("{HEADER}{}\n", functions.join("\n\n"))
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn safe_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

fn render_literal(value: &Value) -> String {
    // serde_json quotes and escapes strings; numbers/bools render as-is.
    value.to_string()
}

fn property_key(name: &str) -> String {
    let is_identifier = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        name.to_string()
    } else {
        Value::String(name.to_string()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, description: Option<&str>, schema: Value) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: description.map(String::from),
            input_schema: schema,
        }
    }

    #[test]
    fn test_echo_declaration() {
        let echo = tool(
            "echo",
            None,
            json!({
                "type": "object",
                "properties": {"msg": {"type": "string"}},
                "required": ["msg"]
            }),
        );
        assert_eq!(
            render_declaration(&echo),
            "export function echo(params: { msg: string }): Promise<any>;"
        );
    }

    #[test]
    fn test_primitive_types() {
        assert_eq!(render_type(&json!({"type": "string"})), "string");
        assert_eq!(render_type(&json!({"type": "integer"})), "number");
        assert_eq!(render_type(&json!({"type": "number"})), "number");
        assert_eq!(render_type(&json!({"type": "boolean"})), "boolean");
    }

    #[test]
    fn test_string_enum_is_literal_union() {
        let schema = json!({"type": "string", "enum": ["mesh", "star", "ring"]});
        assert_eq!(render_type(&schema), r#""mesh" | "star" | "ring""#);
    }

    #[test]
    fn test_array_types() {
        assert_eq!(
            render_type(&json!({"type": "array", "items": {"type": "number"}})),
            "number[]"
        );
        assert_eq!(
            render_type(&json!({"type": "array", "items": {"type": "string", "enum": ["a", "b"]}})),
            r#"("a" | "b")[]"#
        );
        assert_eq!(render_type(&json!({"type": "array"})), "any[]");
    }

    #[test]
    fn test_object_fields_optional_unless_required() {
        let schema = json!({
            "type": "object",
            "properties": {
                "task": {"type": "string"},
                "priority": {"type": "integer"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["task"]
        });
        let rendered = render_type(&schema);
        assert!(rendered.contains("task: string"));
        assert!(rendered.contains("priority?: number"));
        assert!(rendered.contains("tags?: string[]"));
    }

    #[test]
    fn test_nested_object() {
        let schema = json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "object",
                    "properties": {"depth": {"type": "integer"}},
                    "required": ["depth"]
                }
            }
        });
        assert_eq!(render_type(&schema), "{ options?: { depth: number } }");
    }

    #[test]
    fn test_permissive_fallbacks() {
        assert_eq!(render_type(&Value::Null), "any");
        assert_eq!(render_type(&json!({})), "any");
        assert_eq!(render_type(&json!({"type": "null"})), "any");
        assert_eq!(render_type(&json!({"type": ["string", "null"]})), "any");
        assert_eq!(render_type(&json!({"type": "object"})), "Record<string, any>");
    }

    #[test]
    fn test_non_identifier_property_is_quoted() {
        let schema = json!({"type": "object", "properties": {"content-type": {"type": "string"}}});
        assert_eq!(render_type(&schema), r#"{ "content-type"?: string }"#);
    }

    #[test]
    fn test_safe_identifier() {
        assert_eq!(safe_identifier("mcp__claude-flow__swarm_init"), "mcp__claude_flow__swarm_init");
        assert_eq!(safe_identifier("memory.usage"), "memory_usage");
        assert_eq!(safe_identifier("3d_render"), "_3d_render");
    }

    #[test]
    fn test_description_becomes_doc_comment() {
        let t = tool("ping", Some("Check liveness */ now"), json!({"type": "object"}));
        let rendered = render_declaration(&t);
        assert!(rendered.starts_with("/** Check liveness *\\/ now */\n"));
        assert!(rendered.ends_with("export function ping(params: Record<string, any>): Promise<any>;"));
    }

    #[test]
    fn test_one_declaration_per_tool() {
        let tools = vec![
            tool("a", None, json!({"type": "object"})),
            tool("b", Some("B"), Value::Null),
            tool("c", None, json!({"type": "object", "properties": {}})),
        ];
        let output = generate_declarations(&tools);
        assert_eq!(output.matches("export function ").count(), tools.len());
        assert!(output.contains("export interface ToolResult"));
        assert!(output.contains("export function c(params: {}): Promise<any>;"));
    }
}
