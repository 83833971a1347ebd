//! Post-expansion filters
//!
//! Each filter is an idempotent `nodes -> nodes` transformation. Filters are
//! composed in order with [`apply_filters`].

mod format;
mod meta;
mod selector;
mod sort;

pub use format::FormatFilter;
pub use meta::ResourceMetaFilter;
pub use selector::SelectorFilter;
pub use sort::{INSTALL_ORDER, SortFilter, SortOrder, UNINSTALL_ORDER};

use konjure_core::Node;

use crate::error::Result;

/// A transformation of the resource stream
pub trait Filter {
    fn filter(&self, nodes: Vec<Node>) -> Result<Vec<Node>>;
}

/// Run the filters in order
pub fn apply_filters(filters: &[Box<dyn Filter>], nodes: Vec<Node>) -> Result<Vec<Node>> {
    filters.iter().try_fold(nodes, |nodes, filter| filter.filter(nodes))
}

/// Removes the `status` subtree
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearStatus;

impl Filter for ClearStatus {
    fn filter(&self, mut nodes: Vec<Node>) -> Result<Vec<Node>> {
        for node in &mut nodes {
            node.remove_field(&["status"]);
        }
        Ok(nodes)
    }
}

/// Removes document comments
#[derive(Debug, Clone, Copy, Default)]
pub struct StripComments;

impl Filter for StripComments {
    fn filter(&self, mut nodes: Vec<Node>) -> Result<Vec<Node>> {
        for node in &mut nodes {
            node.clear_comments();
        }
        Ok(nodes)
    }
}
