//! Output writers
//!
//! The last stage of the pipeline: encodes the final node stream in one of
//! the supported output formats.

mod columns;
mod env;
mod template;

use serde_yaml::Value;
use std::io::Write;
use std::str::FromStr;

use konjure_core::{INDEX_ANNOTATION, Node, PATH_ANNOTATION, to_yaml};

use crate::error::{CliError, Result};

pub use columns::Column;
pub use env::EnvOptions;

/// Output encoding selected with `--output`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-document YAML stream
    Yaml,
    /// Newline delimited JSON
    Json,
    /// `KEY=VALUE` lines from ConfigMaps, Secrets and container environments
    Env,
    /// `kind.group/name`, one per line
    Name,
    /// Aligned table
    Columns(Vec<Column>),
    /// Comma separated values
    Csv(Vec<Column>),
    /// One template rendering per node
    Template(String),
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(spec) = s.strip_prefix("columns=") {
            return Ok(OutputFormat::Columns(Column::parse_list(spec)?));
        }
        if let Some(spec) = s.strip_prefix("csv=") {
            return Ok(OutputFormat::Csv(Column::parse_list(spec)?));
        }
        if let Some(text) = s.strip_prefix("template=") {
            return Ok(OutputFormat::Template(text.to_string()));
        }
        match s {
            "" | "yaml" => Ok(OutputFormat::Yaml),
            "json" | "ndjson" => Ok(OutputFormat::Json),
            "env" => Ok(OutputFormat::Env),
            "name" => Ok(OutputFormat::Name),
            other => Err(CliError::usage(format!(
                "unknown output format '{}' (expected yaml, json, env, name, columns=, csv= or template=)",
                other
            ))),
        }
    }
}

/// Writes the final node stream
#[derive(Debug, Clone)]
pub struct Writer {
    format: OutputFormat,
    /// Stable sort by source path before writing
    pub sort: bool,
    /// Restore blank lines between YAML documents
    pub vws: bool,
    pub env: EnvOptions,
}

impl Writer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            sort: false,
            vws: false,
            env: EnvOptions::default(),
        }
    }

    /// Encode the nodes onto `out`
    pub fn write(&self, mut nodes: Vec<Node>, out: &mut impl Write) -> Result<()> {
        if self.sort {
            sort_by_path(&mut nodes);
        }

        // Computed before the source annotations are stripped
        let gaps = if self.vws && self.format == OutputFormat::Yaml {
            blank_line_before(&nodes)
        } else {
            vec![false; nodes.len()]
        };

        for node in &mut nodes {
            strip_source_annotations(node);
        }

        match &self.format {
            OutputFormat::Yaml => write_yaml(&nodes, &gaps, out),
            OutputFormat::Json => {
                for node in &nodes {
                    let line = serde_json::to_string(node.value())
                        .map_err(|e| CliError::output(e.to_string()))?;
                    writeln!(out, "{}", line)?;
                }
                Ok(())
            }
            OutputFormat::Env => env::write_env(&nodes, &self.env, out),
            OutputFormat::Name => {
                for node in &nodes {
                    writeln!(out, "{}", resource_name(node))?;
                }
                Ok(())
            }
            OutputFormat::Columns(columns) => columns::write_table(&nodes, columns, out),
            OutputFormat::Csv(columns) => columns::write_csv(&nodes, columns, out),
            OutputFormat::Template(text) => template::write_template(&nodes, text, out),
        }
    }
}

fn write_yaml(nodes: &[Node], gaps: &[bool], out: &mut impl Write) -> Result<()> {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            if gaps[i] {
                writeln!(out)?;
            }
            writeln!(out, "---")?;
        }
        out.write_all(to_yaml(node)?.as_bytes())?;
    }
    Ok(())
}

/// `kind.group/name` with the core group omitted
fn resource_name(node: &Node) -> String {
    let kind = node.kind().to_lowercase();
    if node.group().is_empty() {
        format!("{}/{}", kind, node.name())
    } else {
        format!("{}.{}/{}", kind, node.group(), node.name())
    }
}

// =============================================================================
// SOURCE ANNOTATIONS
// =============================================================================

fn source_path(node: &Node) -> Option<String> {
    node.annotations().get(PATH_ANNOTATION).cloned()
}

fn source_index(node: &Node) -> usize {
    node.annotations()
        .get(INDEX_ANNOTATION)
        .and_then(|i| i.parse().ok())
        .unwrap_or(0)
}

/// Stable sort by source path, then by index within the file
fn sort_by_path(nodes: &mut [Node]) {
    nodes.sort_by_cached_key(|n| (source_path(n).unwrap_or_default(), source_index(n)));
}

fn strip_source_annotations(node: &mut Node) {
    let Some(Value::Mapping(annotations)) = node
        .value_mut()
        .get_mut("metadata")
        .and_then(|m| m.get_mut("annotations"))
    else {
        return;
    };
    annotations.remove(PATH_ANNOTATION);
    annotations.remove(INDEX_ANNOTATION);
    if annotations.is_empty() {
        node.remove_field(&["metadata", "annotations"]);
    }
}

fn comment_lines(comment: Option<&str>) -> usize {
    comment.map(|c| c.lines().count()).unwrap_or(0)
}

/// For each node, was there a blank line before it in its source file?
///
/// The next document is expected right after the previous one's content,
/// its foot comment, the separator and its own head comment. Anything
/// further down means blank lines were dropped when the stream was parsed.
fn blank_line_before(nodes: &[Node]) -> Vec<bool> {
    let mut gaps = vec![false; nodes.len()];
    for i in 1..nodes.len() {
        let (prev, node) = (&nodes[i - 1], &nodes[i]);
        if prev.line() == 0 || node.line() == 0 || source_path(prev) != source_path(node) {
            continue;
        }
        let expected = prev.line()
            + prev.line_count()
            + comment_lines(prev.foot_comment())
            + 1
            + comment_lines(node.head_comment());
        gaps[i] = node.line() > expected;
    }
    gaps
}
