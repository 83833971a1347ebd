//! Konjure Kube - Filters over expanded Kubernetes resources
//!
//! This crate provides:
//! - **Filters**: label/annotation selectors, anchored resource-meta patterns,
//!   status and comment stripping, canonical field order, Helm install order
//! - **Applications**: `app.k8s.io` Application aggregation and synthesis
//!   from recommended labels
//! - **Workloads**: controller chain detection down to the Pods
//! - **Schemas**: bundled merge schemas used when collapsing duplicates

pub mod application;
pub mod error;
pub mod filters;
pub mod labels;
pub mod schemas;
pub mod workload;

pub use application::{ApplicationFilter, ApplicationNode, split_helm_chart};
pub use error::{FilterError, Result};
pub use filters::{
    ClearStatus, Filter, FormatFilter, ResourceMetaFilter, SelectorFilter, SortFilter, SortOrder,
    StripComments, apply_filters,
};
pub use workload::WorkloadFilter;
