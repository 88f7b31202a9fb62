//! Output formatting for CLI commands.

use std::collections::HashMap;

use serde::Serialize;

use crate::cli::args::{NaginataArgs, OutputFormat};
use crate::error::Result;

/// Result structure for index creation.
#[derive(Debug, Serialize)]
pub struct CreateResult {
    pub path: String,
    pub policy: String,
}

/// Result structure for document addition.
#[derive(Debug, Serialize)]
pub struct AddResult {
    pub documents_added: usize,
    pub duration_ms: u64,
    pub docs_per_second: f64,
}

/// One hit as printed by the search command.
#[derive(Debug, Serialize)]
pub struct HitOutput {
    pub doc_id: u64,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Result structure for search operations.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub hits: Vec<HitOutput>,
    pub total_hits: usize,
    pub duration_ms: u64,
}

/// Result structure for fetching a document.
#[derive(Debug, Serialize)]
pub struct GetResult {
    pub doc_id: u64,
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
}

/// Result structure for removal.
#[derive(Debug, Serialize)]
pub struct RemoveResult {
    pub doc_id: u64,
    pub removed: bool,
}

/// Result structure for flush.
#[derive(Debug, Serialize)]
pub struct FlushResult {
    pub segments: usize,
}

/// Result structure for optimization.
#[derive(Debug, Serialize)]
pub struct OptimizeResult {
    pub segments_before: usize,
    pub segments_after: usize,
    pub duration_ms: u64,
}

/// Result structure for clearing.
#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub documents_removed: u64,
}

/// Output a result in the configured format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &NaginataArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &NaginataArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &NaginataArgs) -> Result<()> {
    if args.verbosity() > 0 && !message.is_empty() {
        println!("{message}");
    }

    let value = serde_json::to_value(result)?;
    if std::any::type_name::<T>().contains("SearchOutput") {
        output_search_human(&value);
    } else if std::any::type_name::<T>().contains("EngineStats") {
        output_stats_human(&value);
    } else {
        output_generic_human(&value, 0);
    }
    Ok(())
}

fn output_search_human(value: &serde_json::Value) {
    let Some(obj) = value.as_object() else { return };

    if let Some(hits) = obj.get("hits").and_then(|h| h.as_array()) {
        for (i, hit) in hits.iter().enumerate() {
            let doc_id = hit.get("doc_id").and_then(|d| d.as_u64()).unwrap_or(0);
            let score = hit.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0);
            println!("{}. doc {doc_id} (score {score:.3})", i + 1);
            if let Some(text) = hit.get("text").and_then(|t| t.as_str()) {
                println!("   {text}");
            }
        }
    }

    if let Some(total) = obj.get("total_hits").and_then(|t| t.as_u64()) {
        println!();
        println!("Total hits: {total}");
    }
    if let Some(duration) = obj.get("duration_ms").and_then(|d| d.as_u64()) {
        println!("Search time: {duration}ms");
    }
}

fn output_stats_human(value: &serde_json::Value) {
    println!("Index statistics:");
    output_generic_human(value, 1);
}

fn output_generic_human(value: &serde_json::Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                match val {
                    serde_json::Value::Object(_) => {
                        println!("{indent}{key}:");
                        output_generic_human(val, depth + 1);
                    }
                    _ => println!("{indent}{key}: {val}"),
                }
            }
        }
        _ => println!("{indent}{value}"),
    }
}
