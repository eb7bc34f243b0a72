use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::SessionError;
use crate::host::NavigationRecord;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

pub fn output_session_error(output_format: &OutputFormat, error: &SessionError) -> anyhow::Result<()> {
    output_error(output_format, &error.to_string(), Some(error.error_code()))
}

/// Output a serializable value as JSON, or as `key: value` lines for text.
pub fn output_details(output_format: &OutputFormat, title: &str, details: Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        OutputFormat::Text => {
            println!("{}", title);
            if let Value::Object(map) = details {
                for (key, value) in map {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        Value::Null => println!("  {}: -", key),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// Navigations the headless page would have performed.
pub fn output_navigations(output_format: &OutputFormat, history: &[NavigationRecord]) -> anyhow::Result<()> {
    if history.is_empty() {
        return Ok(());
    }
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "navigations": history }))?);
        }
        OutputFormat::Text => {
            for record in history {
                match record {
                    NavigationRecord::InApp(path) => println!("→ route {}", path),
                    NavigationRecord::External(url) => println!("→ open {}", url),
                    NavigationRecord::Reload => println!("→ reload"),
                }
            }
        }
    }
    Ok(())
}
