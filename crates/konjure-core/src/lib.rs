//! Konjure Core - Resource nodes and typed specs for manifest expansion
//!
//! This crate provides the foundational types used throughout Konjure:
//! - `Node`: A YAML resource document with comments and position
//! - `Spec`: The typed Konjure resources (`File`, `Git`, `Helm`, ...)
//! - `Selector`: Kubernetes label selector parsing and matching
//! - `Values`: Helm values with ordered directive merging
//! - `MergeSchema`: Structural merge directives for lists and maps
//! - `PasswordGenerator`: Recipe driven password generation

pub mod error;
pub mod node;
pub mod schema;
pub mod secrets;
pub mod selector;
pub mod spec;
pub mod values;
pub mod yaml;

pub use error::{CoreError, Result};
pub use node::{GroupKind, INDEX_ANNOTATION, Node, PATH_ANNOTATION};
pub use schema::{MergeSchema, merge_two};
pub use secrets::{PasswordGenerator, PasswordOptions, PasswordRecipe};
pub use selector::{Operator, Requirement, Selector};
pub use spec::{
    FileSpec, GitSpec, HelmSpec, HelmValue, HttpSpec, JsonnetParameter, JsonnetSpec,
    KubernetesSpec, KustomizeSpec, ResourceSpec, SecretSpec, Spec,
};
pub use values::{SetMode, Values, ValuesMerger, parse_set_values};
pub use yaml::{parse_documents, to_yaml};
