// harvest-core/src/infrastructure/adapters/html.rs

// Markup side of the DocumentTree port. Selectors are CSS, compiled per query.

use scraper::{ElementRef, Html, Selector};
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

use crate::domain::ports::{DocumentTree, SelectorError};
use crate::infrastructure::error::InfrastructureError;

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    /// Parses a full document. Malformed markup is repaired, never rejected.
    pub fn parse(raw: &str) -> Self {
        Self {
            html: Html::parse_document(raw),
        }
    }

    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self, InfrastructureError> {
        let raw = fs::read_to_string(path)?;
        debug!(bytes = raw.len(), "Document loaded");
        Ok(Self::parse(&raw))
    }
}

fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl<'a> DocumentTree<'a> for HtmlDocument {
    type Node = ElementRef<'a>;

    fn query(&'a self, selector: &str) -> Result<Vec<Self::Node>, SelectorError> {
        let compiled = compile(selector)?;
        Ok(self.html.select(&compiled).collect())
    }

    fn query_within(
        &'a self,
        scope: Self::Node,
        selector: &str,
    ) -> Result<Vec<Self::Node>, SelectorError> {
        let compiled = compile(selector)?;
        Ok(scope.select(&compiled).collect())
    }

    fn node_text(&self, node: Self::Node) -> String {
        node.text().collect()
    }

    fn node_is_header_cell(&self, node: Self::Node) -> bool {
        node.value().name().eq_ignore_ascii_case("th")
    }

    fn nearest_ancestor(&self, node: Self::Node, tag: &str) -> Option<Self::Node> {
        node.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
    }
}
