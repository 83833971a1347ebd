//! Tabular output (`columns=` and `csv=`)

use serde_yaml::Value;
use std::io::Write;

use konjure_core::Node;
use konjure_core::node::scalar_to_string;

use crate::error::{CliError, Result};

const NONE: &str = "<none>";
const PADDING: usize = 3;

/// A `HEADER:.json.path` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub path: Vec<String>,
}

impl Column {
    /// Parse `NAME:.metadata.name,KIND:.kind`
    pub fn parse_list(spec: &str) -> Result<Vec<Column>> {
        let columns = spec
            .split(',')
            .filter(|c| !c.trim().is_empty())
            .map(Column::parse)
            .collect::<Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(CliError::usage("at least one column is required"));
        }
        Ok(columns)
    }

    fn parse(spec: &str) -> Result<Column> {
        let (header, path) = spec
            .split_once(':')
            .ok_or_else(|| CliError::usage(format!("column '{}' must be HEADER:.path", spec)))?;
        let path = path.trim().trim_start_matches('.');
        Ok(Column {
            header: header.trim().to_string(),
            path: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    /// Cell text for a node; `None` when the path does not resolve
    fn value(&self, node: &Node) -> Option<String> {
        let mut current = node.value();
        for segment in &self.path {
            current = match current {
                Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?)?,
                other => other.get(segment.as_str())?,
            };
        }
        match current {
            Value::Null => None,
            Value::Mapping(_) | Value::Sequence(_) => serde_json::to_string(current).ok(),
            scalar => scalar_to_string(scalar),
        }
    }
}

fn rows(nodes: &[Node], columns: &[Column]) -> Vec<Vec<String>> {
    nodes
        .iter()
        .map(|node| {
            columns
                .iter()
                .map(|c| c.value(node).unwrap_or_else(|| NONE.to_string()))
                .collect()
        })
        .collect()
}

/// Aligned table with a header row
pub fn write_table(nodes: &[Node], columns: &[Column], out: &mut impl Write) -> Result<()> {
    let header: Vec<String> = columns.iter().map(|c| c.header.clone()).collect();
    let mut table = vec![header];
    table.extend(rows(nodes, columns));

    let widths: Vec<usize> = (0..columns.len())
        .map(|i| {
            table
                .iter()
                .map(|row| console::measure_text_width(&row[i]))
                .max()
                .unwrap_or(0)
        })
        .collect();

    for row in &table {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < row.len() {
                let pad = widths[i] - console::measure_text_width(cell) + PADDING;
                line.push_str(&" ".repeat(pad));
            }
        }
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// RFC 4180 CSV with a header row
pub fn write_csv(nodes: &[Node], columns: &[Column], out: &mut impl Write) -> Result<()> {
    let header: Vec<String> = columns.iter().map(|c| csv_field(&c.header)).collect();
    writeln!(out, "{}", header.join(","))?;
    for row in rows(nodes, columns) {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}
