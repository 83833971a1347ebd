//! Recursive expansion
//!
//! Every typed spec node in the stream is replaced by what its reader
//! produces, and the result is expanded again until nothing changes or the
//! depth runs out. Resources allocated by the readers of an iteration are
//! released once everything that iteration fed into has been expanded.

use konjure_core::{Node, Spec};

use crate::error::{CleanupErrors, EngineError, Result};
use crate::options::ReaderOptions;
use crate::parser::{Parsed, SpecParser, format_spec};
use crate::readers::{Cleaner, reader_for};

/// Default number of expansion iterations
pub const DEFAULT_DEPTH: usize = 100;

/// Expands typed specs into resources
pub struct Expander {
    options: ReaderOptions,
    parser: SpecParser,
}

impl Expander {
    pub fn new(options: ReaderOptions, parser: SpecParser) -> Self {
        Self { options, parser }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn parser(&self) -> &SpecParser {
        &self.parser
    }

    /// Turn spec strings into the initial node stream
    ///
    /// Typed specs become spec nodes; the default reader (`-`) is read in place.
    pub fn parse_specs<S: AsRef<str>>(&self, args: &[S]) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            match self.parser.decode(arg)? {
                Some(Parsed::Spec(spec)) => nodes.push(spec.to_node()?),
                Some(Parsed::Reader(mut reader)) => nodes.extend(reader.read()?),
                None => tracing::debug!(spec = %arg, "no default reader configured, skipping"),
            }
        }
        Ok(nodes)
    }

    /// Expand spec nodes, at most `depth` times
    ///
    /// Non-spec nodes pass through untouched and the stream order is kept.
    pub fn expand(&self, nodes: Vec<Node>, depth: usize) -> Result<Vec<Node>> {
        if depth == 0 {
            return Ok(nodes);
        }

        // Dropped after the recursive call: later iterations may still read
        // from directories allocated by this one
        let mut cleaners = CleanerRegistry::default();

        let mut changed = false;
        let mut result = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Some(spec) = Spec::from_node(&node)? else {
                result.push(node);
                continue;
            };

            let description = describe(&spec);
            tracing::debug!(spec = %description, depth, "expanding");

            let mut reader = reader_for(spec, &self.options, &self.parser);
            let read = reader.read();
            if let Some(cleaner) = reader.cleaner() {
                cleaners.register(cleaner);
            }
            let expanded = read.map_err(|source| EngineError::Read {
                spec: description,
                source: Box::new(source),
            })?;

            changed |= match expanded.as_slice() {
                [single] => single.value() != node.value(),
                _ => true,
            };
            result.extend(expanded);
        }

        if !changed {
            tracing::debug!(depth, "fixed point reached");
            return Ok(result);
        }
        self.expand(result, depth - 1)
    }
}

/// Readable name of a spec for logs and error context
fn describe(spec: &Spec) -> String {
    match format_spec(spec) {
        Some(s) => format!("{} {}", spec.kind(), s),
        None => format!("{} spec", spec.kind()),
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

/// Cleaners registered during one iteration, run on drop
#[derive(Default)]
pub struct CleanerRegistry {
    cleaners: Vec<Box<dyn Cleaner>>,
}

impl CleanerRegistry {
    pub fn register(&mut self, cleaner: Box<dyn Cleaner>) {
        self.cleaners.push(cleaner);
    }

    pub fn len(&self) -> usize {
        self.cleaners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleaners.is_empty()
    }

    /// Run every cleaner, collecting the failures
    pub fn clean(&mut self) -> CleanupErrors {
        let mut errors = CleanupErrors::default();
        for cleaner in self.cleaners.drain(..) {
            if let Err(err) = cleaner.clean() {
                errors.push(err);
            }
        }
        errors
    }
}

impl Drop for CleanerRegistry {
    fn drop(&mut self) {
        let errors = self.clean();
        if !errors.is_empty() {
            tracing::warn!(%errors, "cleanup failed");
        }
    }
}
