//! Tool invocation text.
//!
//! Shell commands and their captured output live in different places per
//! provider. Codex writes `function_call` / `function_call_output` records
//! whose `arguments` and `output` are often JSON encoded as strings; Claude
//! nests `tool_use` / `tool_result` parts inside the message content and
//! may add a `toolUseResult` object with the raw streams.

use crate::ingest::extract::{non_blank, string_or};
use crate::types::{Message, Provider};
use serde_json::{Map, Value};

/// Searchable tool text of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolText {
    pub cmd: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolText {
    /// Extract tool text from a message of either provider.
    pub fn from_message(message: &Message) -> Self {
        match message.provider {
            Provider::Codex => codex(message),
            Provider::Claude => claude(message),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cmd.is_empty() && self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// A key from the record, falling back to its `payload`.
fn field<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    raw.get(key).or_else(|| {
        raw.get("payload")
            .and_then(Value::as_object)
            .and_then(|payload| payload.get(key))
    })
}

/// Join the string elements of a `command` array.
fn command_line(object: &Map<String, Value>) -> Option<String> {
    match object.get("command")? {
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            Some(parts.join(" "))
        }
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn parse_object(s: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(s) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn codex(message: &Message) -> ToolText {
    let mut text = ToolText::default();
    match message.record_type.to_lowercase().as_str() {
        "function_call" => {
            text.cmd = match field(&message.raw, "arguments") {
                Some(Value::String(s)) => parse_object(s)
                    .and_then(|args| command_line(&args))
                    .filter(|cmd| !cmd.is_empty())
                    .unwrap_or_else(|| s.clone()),
                Some(Value::Object(args)) => command_line(args).unwrap_or_default(),
                _ => String::new(),
            };
        }
        "function_call_output" => match field(&message.raw, "output") {
            Some(Value::String(s)) => match parse_object(s) {
                Some(output) => {
                    text.stdout = first_string(&output, &["output", "stdout"])
                        .unwrap_or_else(|| s.clone());
                    text.stderr = first_string(&output, &["stderr"]).unwrap_or_default();
                }
                None => text.stdout = s.clone(),
            },
            Some(Value::Object(output)) => {
                text.stdout = first_string(output, &["output", "stdout"]).unwrap_or_default();
                text.stderr = first_string(output, &["stderr"]).unwrap_or_default();
            }
            _ => {}
        },
        _ => {}
    }
    text
}

fn claude(message: &Message) -> ToolText {
    let mut cmds: Vec<String> = Vec::new();
    let mut results: Vec<String> = Vec::new();

    let parts = message
        .raw
        .get("message")
        .and_then(Value::as_object)
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array);
    for part in parts.into_iter().flatten().filter_map(Value::as_object) {
        match string_or(part.get("type")).as_str() {
            "tool_use" => {
                let cmd = match part.get("input") {
                    Some(Value::Object(input)) => non_blank(input, "command")
                        .map(str::to_string)
                        .unwrap_or_else(|| Value::Object(input.clone()).to_string()),
                    Some(other) if !other.is_null() => other.to_string(),
                    _ => String::new(),
                };
                if !cmd.is_empty() {
                    cmds.push(cmd);
                }
            }
            "tool_result" => {
                let result = tool_result_text(part.get("content"));
                if !result.trim().is_empty() {
                    results.push(result);
                }
            }
            _ => {}
        }
    }

    let mut text = ToolText {
        cmd: cmds.join("\n"),
        stdout: results.join("\n"),
        stderr: String::new(),
    };
    if let Some(Value::Object(result)) = message.raw.get("toolUseResult") {
        if let Some(stdout) = non_blank(result, "stdout") {
            text.stdout = stdout.to_string();
        }
        if let Some(stderr) = non_blank(result, "stderr") {
            text.stderr = stderr.to_string();
        }
    }
    text
}

/// `tool_result` content: a string or an array of text parts.
fn tool_result_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(object) => object.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn message(provider: Provider, record_type: &str, raw: Value) -> Message {
        Message {
            id: "m1".to_string(),
            session_id: "s1".to_string(),
            timestamp: None,
            role: String::new(),
            content: String::new(),
            thinking: String::new(),
            model: String::new(),
            record_type: record_type.to_string(),
            tool_name: String::new(),
            raw: raw.as_object().cloned().unwrap_or_default(),
            source: "s1.jsonl".to_string(),
            provider,
            line_no: 1,
            file: PathBuf::from("/r/s1.jsonl"),
        }
    }

    #[test]
    fn test_codex_arguments_json_string() {
        let m = message(
            Provider::Codex,
            "function_call",
            json!({"arguments": "{\"command\":[\"bash\",\"-lc\",\"go build ./...\"]}"}),
        );
        assert_eq!(ToolText::from_message(&m).cmd, "bash -lc go build ./...");
    }

    #[test]
    fn test_codex_arguments_raw_string_and_payload() {
        let m = message(
            Provider::Codex,
            "function_call",
            json!({"payload": {"type": "function_call", "arguments": "ls -la"}}),
        );
        assert_eq!(ToolText::from_message(&m).cmd, "ls -la");

        let m = message(
            Provider::Codex,
            "function_call",
            json!({"arguments": {"command": ["rg", "todo"]}}),
        );
        assert_eq!(ToolText::from_message(&m).cmd, "rg todo");
    }

    #[test]
    fn test_codex_output_variants() {
        let m = message(
            Provider::Codex,
            "function_call_output",
            json!({"output": "{\"output\":\"ok\\n\",\"stderr\":\"warn\"}"}),
        );
        let text = ToolText::from_message(&m);
        assert_eq!(text.stdout, "ok\n");
        assert_eq!(text.stderr, "warn");

        let m = message(
            Provider::Codex,
            "function_call_output",
            json!({"output": "plain output"}),
        );
        assert_eq!(ToolText::from_message(&m).stdout, "plain output");

        let m = message(
            Provider::Codex,
            "function_call_output",
            json!({"output": {"stdout": "x", "stderr": "y"}}),
        );
        let text = ToolText::from_message(&m);
        assert_eq!((text.stdout.as_str(), text.stderr.as_str()), ("x", "y"));
    }

    #[test]
    fn test_codex_other_types_have_no_tool_text() {
        let m = message(Provider::Codex, "message", json!({"arguments": "ls"}));
        assert!(ToolText::from_message(&m).is_empty());
    }

    #[test]
    fn test_claude_tool_use_and_result() {
        let m = message(
            Provider::Claude,
            "assistant",
            json!({"message": {"content": [
                {"type": "text", "text": "running"},
                {"type": "tool_use", "name": "Bash", "input": {"command": "cargo build"}},
                {"type": "tool_use", "name": "Read", "input": {"file_path": "/a"}}
            ]}}),
        );
        let text = ToolText::from_message(&m);
        assert_eq!(text.cmd, "cargo build\n{\"file_path\":\"/a\"}");
        assert!(text.stdout.is_empty());
    }

    #[test]
    fn test_claude_tool_use_result_overrides_stdout() {
        let m = message(
            Provider::Claude,
            "user",
            json!({
                "message": {"content": [
                    {"type": "tool_result", "content": [{"type": "text", "text": "short"}]}
                ]},
                "toolUseResult": {"stdout": "full output", "stderr": "boom"}
            }),
        );
        let text = ToolText::from_message(&m);
        assert_eq!(text.stdout, "full output");
        assert_eq!(text.stderr, "boom");

        let m = message(
            Provider::Claude,
            "user",
            json!({"message": {"content": [{"type": "tool_result", "content": "done"}]}}),
        );
        assert_eq!(ToolText::from_message(&m).stdout, "done");
    }
}
