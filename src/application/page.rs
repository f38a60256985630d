//! TOML page documents: an ordered list of text blocks, each rendered through
//! a pipe list and/or block filters.
//!
//! ```toml
//! [[blocks]]
//! text = "  <b>hello</b>  "
//! pipe = "Trim,H"
//!
//! [[blocks]]
//! text = "summary"
//! filters = [{ name = "Defer" }, { name = "Repeat", args = [2] }]
//! flush = true
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::error::{FilterError, RenderError};

use super::filter::{Filter, FilterArg, FilterRegistry, literal};
use super::request::Request;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read page document {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse page document")]
    Parse(#[from] toml::de::Error),
    #[error("failed to resolve filters for block {index}")]
    Filter {
        index: usize,
        #[source]
        source: FilterError,
    },
    #[error("failed to render block {index}")]
    Render {
        index: usize,
        #[source]
        source: RenderError,
    },
    #[error("failed to flush page output")]
    Flush(#[source] RenderError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageDocument {
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockSpec {
    #[serde(default)]
    pub text: String,
    /// Pipe list applied outside the block filters.
    #[serde(default)]
    pub pipe: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterCall>,
    /// Flush the buffer once this block has been printed.
    #[serde(default)]
    pub flush: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterCall {
    pub name: String,
    #[serde(default)]
    pub args: Vec<FilterArg>,
}

impl BlockSpec {
    /// Filters for this block, outermost first.
    pub fn resolve_filters(&self, registry: &FilterRegistry) -> Result<Vec<Filter>, FilterError> {
        let mut filters = match self.pipe.as_deref() {
            Some(list) => registry.resolve_pipe(list)?,
            None => Vec::new(),
        };
        for call in &self.filters {
            filters.extend(registry.resolve(&call.name, &call.args)?);
        }
        Ok(filters)
    }
}

impl PageDocument {
    pub fn from_toml(source: &str) -> Result<Self, DocumentError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let source = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document = Self::from_toml(&source)?;
        debug!(
            op = "page::load",
            path = %path.display(),
            blocks = document.blocks.len(),
            "Page document loaded"
        );
        Ok(document)
    }

    /// Print every block into `request`, then finish it and return the output.
    pub fn render(&self, request: &mut Request) -> Result<String, DocumentError> {
        let registry = request.filters();

        for (index, block) in self.blocks.iter().enumerate() {
            let filters = block
                .resolve_filters(&registry)
                .map_err(|source| DocumentError::Filter { index, source })?;
            request
                .filter(&filters, literal(block.text.clone()))
                .map_err(|source| DocumentError::Render { index, source })?;

            if block.flush {
                request.flush_buffer().map_err(DocumentError::Flush)?;
            }
        }

        let output = request.finish().map_err(DocumentError::Flush)?;
        info!(
            op = "page::render",
            blocks = self.blocks.len(),
            bytes = output.len(),
            "Page rendered"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> Result<String, DocumentError> {
        let document = PageDocument::from_toml(source)?;
        let mut request = Request::for_tests();
        document.render(&mut request)
    }

    #[test]
    fn renders_blocks_in_order() {
        let output = render(
            r#"
            [[blocks]]
            text = "  <b>hi</b>  "
            pipe = "Trim,H"

            [[blocks]]
            text = "!"
            "#,
        )
        .expect("render");

        assert_eq!(output, "&lt;b&gt;hi&lt;/b&gt;!");
    }

    #[test]
    fn pipe_filters_wrap_block_filters() {
        let output = render(
            r#"
            [[blocks]]
            text = " x "
            pipe = "Trim"
            filters = [{ name = "Repeat", args = [2] }]
            "#,
        )
        .expect("render");

        assert_eq!(output, "x  x");
    }

    #[test]
    fn deferred_block_is_substituted_in_place() {
        let output = render(
            r#"
            [[blocks]]
            text = "late"
            filters = [{ name = "Defer" }]

            [[blocks]]
            text = "-early"
            "#,
        )
        .expect("render");

        assert_eq!(output, "late-early");
    }

    #[test]
    fn flush_between_blocks_keeps_output_order() {
        let output = render(
            r#"
            [[blocks]]
            text = "a"
            filters = [{ name = "Defer" }]
            flush = true

            [[blocks]]
            text = "b"
            filters = [{ name = "Defer" }]
            "#,
        )
        .expect("render");

        assert_eq!(output, "ab");
    }

    #[test]
    fn unknown_filter_reports_block_index() {
        let err = render(
            r#"
            [[blocks]]
            text = "fine"

            [[blocks]]
            text = "broken"
            pipe = "Trim,Nope"
            "#,
        )
        .expect_err("unknown filter");

        match err {
            DocumentError::Filter { index, source } => {
                assert_eq!(index, 1);
                assert_eq!(source, FilterError::unknown("Nope", "Trim,Nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_block_argument_is_rejected() {
        let err = render(
            r#"
            [[blocks]]
            text = "x"
            filters = [{ name = "Repeat", args = ["many"] }]
            "#,
        )
        .expect_err("invalid argument");

        assert!(matches!(
            err,
            DocumentError::Filter {
                index: 0,
                source: FilterError::InvalidFilterArgument { .. }
            }
        ));
    }

    #[test]
    fn unknown_fields_fail_to_parse() {
        let err = PageDocument::from_toml("[[blocks]]\ntxt = \"typo\"\n").expect_err("parse");
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn empty_document_renders_nothing() {
        assert_eq!(render("").expect("render"), "");
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.toml");

        let err = PageDocument::load(&path).expect_err("missing file");
        assert!(matches!(err, DocumentError::Read { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }
}
