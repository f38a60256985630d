use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Deserialize;

use crate::application::request::Request;
use crate::domain::error::FilterError;

use super::{Filter, RenderResult, YieldBlock, html, standard};

/// Argument passed to a filter factory by block invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FilterArg {
    Integer(i64),
    Text(String),
}

impl FilterArg {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FilterArg::Integer(value) => Some(*value),
            FilterArg::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterArg::Text(value) => Some(value),
            FilterArg::Integer(_) => None,
        }
    }
}

impl fmt::Display for FilterArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterArg::Integer(value) => write!(f, "{value}"),
            FilterArg::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i64> for FilterArg {
    fn from(value: i64) -> Self {
        FilterArg::Integer(value)
    }
}

impl From<&str> for FilterArg {
    fn from(value: &str) -> Self {
        FilterArg::Text(value.to_string())
    }
}

impl From<String> for FilterArg {
    fn from(value: String) -> Self {
        FilterArg::Text(value)
    }
}

/// Builds the filter(s) a name stands for, given its arguments.
pub type FilterFactory =
    Arc<dyn Fn(&[FilterArg]) -> Result<Vec<Filter>, FilterError> + Send + Sync>;

#[derive(Clone)]
struct RegistryEntry {
    summary: String,
    factory: FilterFactory,
}

/// Name-to-filter lookup: the capability set a component exposes to its templates.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard and HTML filters.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        standard::register(&mut registry);
        html::register(&mut registry);
        registry
    }

    /// Register (or replace) a filter factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, summary: impl Into<String>, factory: F)
    where
        F: Fn(&[FilterArg]) -> Result<Vec<Filter>, FilterError> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            RegistryEntry {
                summary: summary.into(),
                factory: Arc::new(factory),
            },
        );
    }

    /// Register an argument-less simple filter.
    pub fn register_simple(
        &mut self,
        name: &'static str,
        summary: impl Into<String>,
        filter: fn(&str) -> String,
    ) {
        self.register(name, summary, move |args| {
            expect_no_args(name, args)?;
            Ok(vec![Filter::simple(filter)])
        });
    }

    /// Define a named dynamic filter from a block body. The body receives the
    /// arguments bound at resolution time and the yield block.
    pub fn define_block<F>(&mut self, name: impl Into<String>, summary: impl Into<String>, body: F)
    where
        F: Fn(&mut Request, &[FilterArg], YieldBlock) -> RenderResult + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        self.register(name, summary, move |args| {
            let body = Arc::clone(&body);
            let bound = args.to_vec();
            Ok(vec![Filter::dynamic(move |request, yield_block| {
                body(request, &bound, yield_block)
            })])
        });
    }

    /// Make `alias` resolve exactly like `target`.
    pub fn alias(&mut self, alias: impl Into<String>, target: &str) -> Result<(), FilterError> {
        let alias = alias.into();
        let entry = self
            .entries
            .get(target)
            .cloned()
            .ok_or_else(|| FilterError::unknown(target, alias.as_str()))?;
        self.entries.insert(alias, entry);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names with their summaries, sorted by name.
    pub fn describe(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.summary.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Block invocation: resolve `name` with explicit arguments.
    pub fn resolve(&self, name: &str, args: &[FilterArg]) -> Result<Vec<Filter>, FilterError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| FilterError::unknown(name, name))?;
        (entry.factory)(args)
    }

    /// Pipe invocation: resolve a comma separated list of argument-less names.
    pub fn resolve_pipe(&self, list: &str) -> Result<Vec<Filter>, FilterError> {
        let mut filters = Vec::new();
        for name in parse_pipe_list(list)? {
            let entry = self
                .entries
                .get(name)
                .ok_or_else(|| FilterError::unknown(name, list.trim()))?;
            filters.extend((entry.factory)(&[])?);
        }
        Ok(filters)
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Split a pipe list such as `"Trim, H"` into filter names.
pub fn parse_pipe_list(list: &str) -> Result<Vec<&str>, FilterError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    list.split(',')
        .map(str::trim)
        .map(|name| {
            if let Some((head, _)) = name.split_once(|ch: char| ch == '(' || ch.is_whitespace()) {
                return Err(FilterError::invalid_argument(
                    head.trim(),
                    format!("pipe filter list `{}` does not accept arguments", list.trim()),
                ));
            }
            if !is_filter_name(name) {
                return Err(FilterError::unknown(name, list.trim()));
            }
            Ok(name)
        })
        .collect()
}

fn is_filter_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

pub(crate) fn expect_no_args(name: &str, args: &[FilterArg]) -> Result<(), FilterError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(FilterError::invalid_argument(
            name,
            format!("expected no arguments, got {}", args.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::filter::{compose, literal};

    #[test]
    fn parse_pipe_list_trims_names() {
        let names = parse_pipe_list(" Trim ,H,NoBlankLines").expect("parse");
        assert_eq!(names, vec!["Trim", "H", "NoBlankLines"]);
    }

    #[test]
    fn parse_pipe_list_accepts_empty_list() {
        assert!(parse_pipe_list("  ").expect("parse").is_empty());
    }

    #[test]
    fn pipe_list_with_arguments_is_rejected() {
        let err = parse_pipe_list("Trim,Repeat(3)").expect_err("arguments are not allowed");
        assert!(matches!(
            err,
            FilterError::InvalidFilterArgument { ref name, .. } if name == "Repeat"
        ));

        let err = parse_pipe_list("Repeat 3").expect_err("arguments are not allowed");
        assert!(matches!(err, FilterError::InvalidFilterArgument { .. }));
    }

    #[test]
    fn unknown_pipe_filter_reports_list_context() {
        let registry = FilterRegistry::standard();
        let err = registry
            .resolve_pipe("Trim, Sparkle")
            .expect_err("Sparkle is not registered");
        assert_eq!(err, FilterError::unknown("Sparkle", "Trim, Sparkle"));
        assert!(err.to_string().contains("Trim, Sparkle"));
    }

    #[test]
    fn empty_entry_in_pipe_list_is_unknown() {
        let err = parse_pipe_list("Trim,,H").expect_err("empty name");
        assert!(matches!(err, FilterError::UnknownFilter { ref name, .. } if name.is_empty()));
    }

    #[test]
    fn resolve_pipe_keeps_declaration_order() {
        let mut registry = FilterRegistry::new();
        registry.register_simple("Upper", "uppercase", |text| text.to_uppercase());
        registry.register_simple("Reverse", "reverse", |text| text.chars().rev().collect());

        let filters = registry.resolve_pipe("Upper,Reverse").expect("resolve");
        let mut request = Request::for_tests();
        let output = compose(&filters, literal("ab"))(&mut request).expect("render");
        assert_eq!(output, "BA");
    }

    #[test]
    fn factory_may_expand_to_several_filters() {
        let mut registry = FilterRegistry::new();
        registry.register("Shout", "trim then uppercase", |args| {
            expect_no_args("Shout", args)?;
            Ok(vec![
                Filter::simple(|text| text.to_uppercase()),
                Filter::simple(|text| text.trim().to_string()),
            ])
        });

        let filters = registry.resolve_pipe("Shout").expect("resolve");
        assert_eq!(filters.len(), 2);
        let mut request = Request::for_tests();
        let output = compose(&filters, literal("  hi  "))(&mut request).expect("render");
        assert_eq!(output, "HI");
    }

    #[test]
    fn simple_filter_rejects_block_arguments() {
        let registry = FilterRegistry::standard();
        let err = registry
            .resolve("Trim", &[FilterArg::Integer(1)])
            .expect_err("Trim takes no arguments");
        assert!(matches!(err, FilterError::InvalidFilterArgument { .. }));
    }

    #[test]
    fn block_defined_filter_binds_arguments_and_yields() {
        let mut registry = FilterRegistry::new();
        registry.define_block("Wrap", "surround content with a tag", |request, args, inner| {
            let tag = args.first().and_then(FilterArg::as_text).unwrap_or("div");
            Ok(format!("<{tag}>{}</{tag}>", inner(request)?))
        });

        let filters = registry
            .resolve("Wrap", &[FilterArg::from("em")])
            .expect("resolve");
        let mut request = Request::for_tests();
        let output = compose(&filters, literal("hi"))(&mut request).expect("render");
        assert_eq!(output, "<em>hi</em>");
    }

    #[test]
    fn alias_resolves_like_target() {
        let mut registry = FilterRegistry::standard();
        registry.alias("Strip", "Trim").expect("Trim is registered");
        assert!(registry.contains("Strip"));

        let filters = registry.resolve_pipe("Strip").expect("resolve");
        let mut request = Request::for_tests();
        let output = compose(&filters, literal("  x  "))(&mut request).expect("render");
        assert_eq!(output, "x");
    }

    #[test]
    fn alias_to_unknown_target_is_an_error() {
        let mut registry = FilterRegistry::standard();
        let err = registry
            .alias("Nothing", "DoesNotExist")
            .expect_err("target is not registered");
        assert_eq!(err, FilterError::unknown("DoesNotExist", "Nothing"));
        assert!(!registry.contains("Nothing"));
    }

    #[test]
    fn describe_lists_names_in_order() {
        let registry = FilterRegistry::standard();
        let names: Vec<&str> = registry.describe().map(|(name, _)| name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"Defer"));
        assert!(names.contains(&"H"));
    }

    #[test]
    fn filter_args_deserialize_untagged() {
        #[derive(Deserialize)]
        struct Call {
            args: Vec<FilterArg>,
        }

        let call: Call = toml::from_str(r#"args = [3, "key"]"#).expect("toml");
        assert_eq!(
            call.args,
            vec![FilterArg::Integer(3), FilterArg::Text("key".to_string())]
        );
    }
}
