//! Standard filters available to every component.

use std::{cell::RefCell, rc::Rc, time::Duration};

use tracing::debug;

use crate::application::request::Request;
use crate::cache::CacheSetOptions;
use crate::domain::error::FilterError;

use super::registry::{FilterArg, FilterRegistry, expect_no_args};
use super::{Filter, YieldBlock};

/// Destination for [`capture`] and [`tee`].
pub type CaptureSlot = Rc<RefCell<String>>;

pub(super) fn register(registry: &mut FilterRegistry) {
    registry.register_simple("Trim", "Remove leading and trailing whitespace", trim);
    registry.register_simple(
        "NoBlankLines",
        "Remove lines that contain only whitespace",
        no_blank_lines,
    );
    registry.register("Repeat", "Render the wrapped content N times", |args| {
        Ok(vec![repeat(repeat_times(args)?)])
    });
    registry.register(
        "Cache",
        "Serve the wrapped content from the cache under a key, rendering it on a miss",
        |args| {
            let (key, options) = cache_args(args)?;
            Ok(vec![cache(key, options)])
        },
    );
    registry.register(
        "Defer",
        "Render the wrapped content when the buffer is flushed",
        |args| {
            expect_no_args("Defer", args)?;
            Ok(vec![defer()])
        },
    );
}

pub fn trim(text: &str) -> String {
    text.trim().to_string()
}

/// Drop every whitespace-only line that is terminated by a newline.
pub fn no_blank_lines(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !(line.ends_with('\n') && line.trim().is_empty()))
        .collect()
}

pub fn repeat(times: usize) -> Filter {
    Filter::dynamic(move |request, inner| {
        let mut output = String::new();
        for _ in 0..times {
            output.push_str(&inner(request)?);
        }
        Ok(output)
    })
}

/// Memoise the wrapped content in the request's cache backend under `key`.
pub fn cache(key: String, options: CacheSetOptions) -> Filter {
    Filter::dynamic(move |request, inner| {
        let backend = request.cache();
        if let Some(hit) = backend.get(&key) {
            debug!(op = "filter::cache", key = %key, result = "hit", "Cached content reused");
            return Ok(hit);
        }

        let rendered = inner(request)?;
        backend.set(&key, rendered.clone(), &options);
        debug!(
            op = "filter::cache",
            key = %key,
            result = "miss",
            bytes = rendered.len(),
            "Cached content rendered and stored"
        );
        Ok(rendered)
    })
}

/// Emit a marker now and render the wrapped content at flush time.
pub fn defer() -> Filter {
    Filter::dynamic(|request, inner: YieldBlock| {
        let marker = request.defer(move |request: &mut Request| inner(request))?;
        Ok(marker.into())
    })
}

/// Render into `slot` and output nothing.
pub fn capture(slot: CaptureSlot) -> Filter {
    Filter::dynamic(move |request, inner| {
        let rendered = inner(request)?;
        *slot.borrow_mut() = rendered;
        Ok(String::new())
    })
}

/// Render into `slot` and also pass the content through.
pub fn tee(slot: CaptureSlot) -> Filter {
    Filter::dynamic(move |request, inner| {
        let rendered = inner(request)?;
        slot.borrow_mut().clone_from(&rendered);
        Ok(rendered)
    })
}

fn repeat_times(args: &[FilterArg]) -> Result<usize, FilterError> {
    let [arg] = args else {
        return Err(FilterError::invalid_argument(
            "Repeat",
            format!("expected exactly one argument, got {}", args.len()),
        ));
    };
    let times = arg.as_integer().ok_or_else(|| {
        FilterError::invalid_argument(
            "Repeat",
            format!("repeat count must be an integer, got {arg}"),
        )
    })?;
    usize::try_from(times).map_err(|_| {
        FilterError::invalid_argument(
            "Repeat",
            format!("repeat count must not be negative, got {times}"),
        )
    })
}

fn cache_args(args: &[FilterArg]) -> Result<(String, CacheSetOptions), FilterError> {
    let (key, rest) = match args {
        [key, rest @ ..] if rest.len() <= 1 => (key, rest),
        _ => {
            return Err(FilterError::invalid_argument(
                "Cache",
                format!(
                    "expected a key and an optional expiry, got {} arguments",
                    args.len()
                ),
            ));
        }
    };

    let key = match key {
        FilterArg::Text(text) if !text.is_empty() => text.clone(),
        FilterArg::Integer(value) => value.to_string(),
        FilterArg::Text(_) => {
            return Err(FilterError::invalid_argument(
                "Cache",
                "cache key must not be empty",
            ));
        }
    };

    let expires_in = match rest.first() {
        None => None,
        Some(arg) => {
            let seconds = arg
                .as_integer()
                .and_then(|value| u64::try_from(value).ok())
                .filter(|value| *value > 0)
                .ok_or_else(|| {
                    FilterError::invalid_argument(
                        "Cache",
                        format!("expiry must be a positive number of seconds, got {arg}"),
                    )
                })?;
            Some(Duration::from_secs(seconds))
        }
    };

    Ok((key, CacheSetOptions { expires_in }))
}
