use std::io::Read;

use konjure_core::Node;
use konjure_core::yaml::parse_documents;

use super::Reader;
use crate::error::Result;

/// Reads a YAML document stream (stdin for the `-` spec)
pub struct StreamReader<R> {
    name: String,
    input: R,
}

impl<R: Read> StreamReader<R> {
    pub fn new(name: impl Into<String>, input: R) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

impl StreamReader<std::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new("stdin", std::io::stdin())
    }
}

impl<R: Read> Reader for StreamReader<R> {
    fn read(&mut self) -> Result<Vec<Node>> {
        let mut content = String::new();
        self.input.read_to_string(&mut content)?;
        tracing::debug!(source = %self.name, bytes = content.len(), "read document stream");
        Ok(parse_documents(&content)?)
    }
}
