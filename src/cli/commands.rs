//! Command implementations for the Naginata CLI.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use serde::Deserialize;

use crate::analysis::AnalyzerConfig;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::engine::{EngineConfig, SearchEngine};
use crate::error::{NaginataError, Result};

/// Execute a CLI command.
pub fn execute_command(args: NaginataArgs) -> Result<()> {
    match &args.command {
        Command::Create(create_args) => create_index(create_args.clone(), &args),
        Command::Add(add_args) => add_documents(add_args.clone(), &args),
        Command::Search(search_args) => search_index(search_args.clone(), &args),
        Command::Get(get_args) => get_document(get_args.clone(), &args),
        Command::Remove(remove_args) => remove_document(remove_args.clone(), &args),
        Command::Flush(flush_args) => flush_index(flush_args.clone(), &args),
        Command::Optimize(optimize_args) => optimize_index(optimize_args.clone(), &args),
        Command::Stats(stats_args) => show_stats(stats_args.clone(), &args),
        Command::Clear(clear_args) => clear_index(clear_args.clone(), &args),
    }
}

/// Open an existing index with its pinned analyzer policy.
fn open_engine(path: &Path) -> Result<SearchEngine> {
    SearchEngine::open(path, EngineConfig::default())
}

/// Create a new index.
fn create_index(args: CreateArgs, cli_args: &NaginataArgs) -> Result<()> {
    if args.exclusive && args.index_path.join("manifest.json").exists() {
        return Err(NaginataError::invalid_operation(format!(
            "an index already exists at {}",
            args.index_path.display()
        )));
    }

    let analyzer = match args.policy {
        PolicyArg::Ngram => AnalyzerConfig::ngram(args.gram_size),
        PolicyArg::Word => AnalyzerConfig::word(),
    };

    let engine = SearchEngine::open(
        &args.index_path,
        EngineConfig {
            analyzer,
            ..Default::default()
        },
    )?;
    engine.flush()?;

    output_result(
        "Index created",
        &CreateResult {
            path: args.index_path.to_string_lossy().to_string(),
            policy: match engine.analyzer().config().policy {
                crate::analysis::NormalizationPolicy::Ngram { size } => format!("ngram({size})"),
                crate::analysis::NormalizationPolicy::Word => "word".to_string(),
            },
        },
        cli_args,
    )
}

/// One line of a JSONL document file.
#[derive(Debug, Deserialize)]
struct DocRecord {
    id: u64,
    text: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

/// Add documents from the command line or a JSONL file.
fn add_documents(args: AddArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;
    let start = Instant::now();
    let mut added = 0usize;

    match (&args.id, &args.text, &args.file) {
        (Some(id), Some(text), None) => {
            engine.index(*id, text, HashMap::new())?;
            added += 1;
        }
        (None, None, Some(file)) => {
            let reader = BufReader::new(File::open(file)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: DocRecord = serde_json::from_str(&line).map_err(|e| {
                    NaginataError::invalid_operation(format!(
                        "{}:{}: {e}",
                        file.display(),
                        line_no + 1
                    ))
                })?;
                engine.index(record.id, &record.text, record.attributes)?;
                added += 1;
            }
        }
        _ => {
            return Err(NaginataError::invalid_operation(
                "provide either --id and --text, or --file",
            ));
        }
    }

    if !args.no_flush {
        engine.flush()?;
    }

    let duration = start.elapsed();
    let duration_ms = duration.as_millis() as u64;
    output_result(
        "Documents added",
        &AddResult {
            documents_added: added,
            duration_ms,
            docs_per_second: added as f64 / duration.as_secs_f64().max(f64::EPSILON),
        },
        cli_args,
    )
}

/// Search an index.
fn search_index(args: SearchArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;

    let start = Instant::now();
    let hits = engine.search(&args.query, args.limit)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let hits: Vec<HitOutput> = hits
        .into_iter()
        .map(|hit| {
            let text = if args.show_content {
                engine
                    .get(hit.doc_id)
                    .and_then(|d| d.text().map(String::from))
            } else {
                None
            };
            HitOutput {
                doc_id: hit.doc_id,
                score: hit.score,
                text,
            }
        })
        .collect();

    output_result(
        &format!("Results for: {}", args.query),
        &SearchOutput {
            total_hits: hits.len(),
            hits,
            duration_ms,
        },
        cli_args,
    )
}

/// Fetch one stored document.
fn get_document(args: GetArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;

    let Some(doc) = engine.get(args.doc_id) else {
        return Err(NaginataError::invalid_operation(format!(
            "document {} not found",
            args.doc_id
        )));
    };

    output_result(
        "",
        &GetResult {
            doc_id: args.doc_id,
            text: doc.text().map(String::from),
            attributes: doc.attributes,
        },
        cli_args,
    )
}

/// Remove a document.
fn remove_document(args: RemoveArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;
    let removed = engine.remove(args.doc_id)?;

    output_result(
        if removed {
            "Document removed"
        } else {
            "Document not found"
        },
        &RemoveResult {
            doc_id: args.doc_id,
            removed,
        },
        cli_args,
    )
}

/// Flush buffered documents.
fn flush_index(args: FlushArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;
    engine.sync()?;

    output_result(
        "Index flushed",
        &FlushResult {
            segments: engine.stats().index.segment_count,
        },
        cli_args,
    )
}

/// Merge all segments and reclaim removed documents.
fn optimize_index(args: OptimizeArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;

    let before = engine.stats().index.segment_count;
    let start = Instant::now();
    engine.optimize()?;
    let duration_ms = start.elapsed().as_millis() as u64;

    output_result(
        "Index optimized",
        &OptimizeResult {
            segments_before: before,
            segments_after: engine.stats().index.segment_count,
            duration_ms,
        },
        cli_args,
    )
}

/// Show statistics.
fn show_stats(args: StatsArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;
    output_result("", &engine.stats(), cli_args)
}

/// Remove every document.
fn clear_index(args: ClearArgs, cli_args: &NaginataArgs) -> Result<()> {
    let engine = open_engine(&args.index_path)?;
    let before = engine.doc_count();

    if !args.yes {
        eprintln!(
            "This removes all {before} documents from {}. Continue? [y/N]",
            args.index_path.display()
        );
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            return Err(NaginataError::invalid_operation("aborted"));
        }
    }

    engine.clear()?;
    output_result(
        "Index cleared",
        &ClearResult {
            documents_removed: before,
        },
        cli_args,
    )
}
