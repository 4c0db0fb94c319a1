// harvest-core/src/domain/ports/document.rs

// The engine never parses markup. It asks a tree for nodes by selector and
// reads text back out of them.

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq, Serialize)]
#[error("Invalid selector '{selector}': {message}")]
#[diagnostic(code(harvest::domain::selector))]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// A parsed document that can be queried with selectors.
///
/// Nodes are cheap handles borrowed from the tree, so extraction can hold
/// many of them without cloning markup.
pub trait DocumentTree<'a> {
    type Node: Copy + PartialEq + 'a;

    /// All nodes matching `selector`, in document order.
    fn query(&'a self, selector: &str) -> Result<Vec<Self::Node>, SelectorError>;

    /// Descendants of `scope` matching `selector`, in document order.
    fn query_within(
        &'a self,
        scope: Self::Node,
        selector: &str,
    ) -> Result<Vec<Self::Node>, SelectorError>;

    /// Concatenated text content of the node.
    fn node_text(&self, node: Self::Node) -> String;

    /// True for header cells (`th`).
    fn node_is_header_cell(&self, node: Self::Node) -> bool;

    /// Closest proper ancestor with element name `tag`.
    fn nearest_ancestor(&self, node: Self::Node, tag: &str) -> Option<Self::Node>;
}
