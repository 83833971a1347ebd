//! Konjure Engine - Spec parsing, readers and recursive expansion
//!
//! This crate turns spec strings and typed spec nodes into resources:
//! - `SpecParser`: free-form arguments to typed specs (Git/Helm URL normalization)
//! - `Reader`: one reader per spec kind, external tools run through `ExternalCommand`
//! - `Expander`: fixed-point expansion with per-iteration cleanup
//! - `ArtifactHubClient`: Helm chart lookup for Artifact Hub package URLs

pub mod artifacthub;
pub mod error;
pub mod exec;
pub mod expand;
pub mod options;
pub mod parser;
pub mod readers;

pub use artifacthub::{ArtifactHubClient, ChartResolver, ResolvedChart};
pub use error::{CleanupErrors, EngineError, Result};
pub use exec::ExternalCommand;
pub use expand::{CleanerRegistry, DEFAULT_DEPTH, Expander};
pub use options::{ReaderOptions, ToolPaths};
pub use parser::{Parsed, SpecParser, format_spec, parse_git};
pub use readers::{Cleaner, Reader, StreamReader, reader_for};
