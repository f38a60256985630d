//! Filter composition.
//!
//! A filter list `[F1, F2, ..., Fn]` wraps a content producer `C` as
//! `F1(F2(...Fn(C)...))`: the last declared filter sits closest to the raw
//! content. Simple filters post-process text that is already rendered.
//! Dynamic filters receive the inner producer un-invoked as a yield block and
//! decide whether, when and how often it runs.

mod html;
mod registry;
mod standard;

use std::{fmt, rc::Rc};

use crate::application::request::Request;
use crate::domain::error::RenderError;

pub use registry::{FilterArg, FilterFactory, FilterRegistry, parse_pipe_list};
pub use standard::{CaptureSlot, capture, tee};

pub type RenderResult = Result<String, RenderError>;

/// Zero-argument content producer, re-invocable.
pub type Content = Rc<dyn Fn(&mut Request) -> RenderResult>;

/// The inner producer handed to a dynamic filter.
pub type YieldBlock = Content;

#[derive(Clone)]
pub enum Filter {
    /// Transforms fully rendered inner content.
    Simple(Rc<dyn Fn(String) -> RenderResult>),
    /// Controls execution of the inner content through a yield block.
    Dynamic(Rc<dyn Fn(&mut Request, YieldBlock) -> RenderResult>),
}

impl Filter {
    pub fn simple<F>(filter: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        Filter::Simple(Rc::new(move |text: String| Ok(filter(&text))))
    }

    pub fn dynamic<F>(filter: F) -> Self
    where
        F: Fn(&mut Request, YieldBlock) -> RenderResult + 'static,
    {
        Filter::Dynamic(Rc::new(filter))
    }

    /// Wrap `inner`, producing the filtered content producer.
    pub fn wrap(&self, inner: Content) -> Content {
        match self {
            Filter::Simple(apply) => {
                let apply = Rc::clone(apply);
                Rc::new(move |request: &mut Request| apply(inner(request)?))
            }
            Filter::Dynamic(filter) => {
                let filter = Rc::clone(filter);
                Rc::new(move |request: &mut Request| filter(request, Rc::clone(&inner)))
            }
        }
    }

    /// Apply the filter to text that has already been rendered.
    pub fn apply(&self, request: &mut Request, text: impl Into<String>) -> RenderResult {
        self.wrap(literal(text))(request)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Simple(_) => f.write_str("Filter::Simple"),
            Filter::Dynamic(_) => f.write_str("Filter::Dynamic"),
        }
    }
}

/// Build the effective producer for `filters` declared left to right around `content`.
pub fn compose(filters: &[Filter], content: Content) -> Content {
    filters
        .iter()
        .rev()
        .fold(content, |inner, filter| filter.wrap(inner))
}

pub fn content<F>(producer: F) -> Content
where
    F: Fn(&mut Request) -> RenderResult + 'static,
{
    Rc::new(producer)
}

/// Content producer that always yields `text`.
pub fn literal(text: impl Into<String>) -> Content {
    let text = text.into();
    Rc::new(move |_: &mut Request| Ok(text.clone()))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    fn upper() -> Filter {
        Filter::simple(|text| text.to_uppercase())
    }

    fn reverse() -> Filter {
        Filter::simple(|text| text.chars().rev().collect())
    }

    #[test]
    fn first_declared_filter_is_outermost() {
        let mut request = Request::for_tests();
        let effective = compose(&[upper(), reverse()], literal("ab"));
        assert_eq!(effective(&mut request).expect("render"), "BA");
    }

    #[test]
    fn composition_matches_nested_application() {
        let mut request = Request::for_tests();
        let bracket = Filter::simple(|text| format!("[{text}]"));
        let star = Filter::simple(|text| format!("*{text}*"));

        let composed = compose(&[bracket.clone(), star.clone()], literal("x"))(&mut request)
            .expect("composed");
        let inner = star.apply(&mut request, "x").expect("inner");
        let nested = bracket.apply(&mut request, inner).expect("outer");

        assert_eq!(composed, "[*x*]");
        assert_eq!(composed, nested);
    }

    #[test]
    fn empty_filter_list_renders_content_unchanged() {
        let mut request = Request::for_tests();
        let effective = compose(&[], literal("plain"));
        assert_eq!(effective(&mut request).expect("render"), "plain");
    }

    #[test]
    fn dynamic_filter_that_never_yields_skips_inner_content() {
        let mut request = Request::for_tests();
        let calls = Rc::new(Cell::new(0));
        let counted = {
            let calls = Rc::clone(&calls);
            content(move |_: &mut Request| {
                calls.set(calls.get() + 1);
                Ok("inner".to_string())
            })
        };
        let suppress = Filter::dynamic(|_, _| Ok("replacement".to_string()));

        let output = compose(&[upper(), suppress], counted)(&mut request).expect("render");

        assert_eq!(output, "REPLACEMENT");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn filters_run_inner_to_outer_exactly_once() {
        let mut request = Request::for_tests();
        let log = Rc::new(RefCell::new(Vec::new()));
        let tagged = |tag: &'static str| {
            let log = Rc::clone(&log);
            Filter::simple(move |text| {
                log.borrow_mut().push(tag);
                text.to_string()
            })
        };

        compose(&[tagged("outer"), tagged("middle"), tagged("inner")], literal(""))(&mut request)
            .expect("render");

        assert_eq!(*log.borrow(), vec!["inner", "middle", "outer"]);
    }

    #[test]
    fn inner_failure_propagates_through_simple_filters() {
        let mut request = Request::for_tests();
        let failing = content(|_: &mut Request| Err(RenderError::component("boom")));
        let err = compose(&[upper()], failing)(&mut request).expect_err("should fail");
        assert!(matches!(err, RenderError::Component { .. }));
    }
}
