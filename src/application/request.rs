//! Rendering state for a single request.
//!
//! A [`Request`] owns the output buffer, the defer registry and the marker
//! source. Content is printed into the buffer as it renders; deferred
//! producers run when the buffer is flushed and their output replaces the
//! markers printed in their place.

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use tracing::{debug, trace, warn};

use crate::cache::CacheBackend;
use crate::domain::error::RenderError;
use crate::domain::marker::{DistinctStrings, Marker, MarkerSource};

use super::defer::{DeferEntry, DeferRegistry, DeferState, substitute_first};
use super::filter::{Content, Filter, FilterRegistry, RenderResult, compose, literal};

pub(crate) const METRIC_DEFER_REGISTERED: &str = "mason_defer_registered_total";
pub(crate) const METRIC_DEFER_RESOLVED: &str = "mason_defer_resolved_total";
pub(crate) const METRIC_DEFER_MARKER_MISSING: &str = "mason_defer_marker_missing_total";
pub(crate) const METRIC_FLUSH_MS: &str = "mason_flush_ms";

pub struct Request {
    buffer: String,
    output: String,
    defers: DeferRegistry,
    markers: Box<dyn MarkerSource>,
    filters: Arc<FilterRegistry>,
    cache: Arc<dyn CacheBackend>,
    finished: bool,
}

impl Request {
    pub fn new(filters: Arc<FilterRegistry>, cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            buffer: String::new(),
            output: String::new(),
            defers: DeferRegistry::new(),
            markers: Box::new(DistinctStrings::new()),
            filters,
            cache,
            finished: false,
        }
    }

    /// Replace the default marker source.
    pub fn with_marker_source(mut self, source: impl MarkerSource + 'static) -> Self {
        self.markers = Box::new(source);
        self
    }

    pub fn filters(&self) -> Arc<FilterRegistry> {
        Arc::clone(&self.filters)
    }

    pub fn cache(&self) -> Arc<dyn CacheBackend> {
        Arc::clone(&self.cache)
    }

    /// Text rendered since the last flush.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Text emitted by completed flushes.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn pending_defers(&self) -> usize {
        self.defers.len()
    }

    pub fn defer_state(&self) -> DeferState {
        self.defers.state()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn print(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Register `producer` to run at the next flush and return the marker to
    /// print in place of its output.
    ///
    /// Calling this from inside a running producer is allowed: the new entry
    /// is resolved later in the same flush.
    pub fn defer<F>(&mut self, producer: F) -> Result<Marker, RenderError>
    where
        F: FnOnce(&mut Request) -> RenderResult + 'static,
    {
        if self.finished {
            return Err(RenderError::RequestFinished);
        }

        let marker = self.markers.next_distinct_string();
        self.defers.push(marker.clone(), Box::new(producer));
        counter!(METRIC_DEFER_REGISTERED).increment(1);
        trace!(
            op = "request::defer",
            pending = self.defers.len(),
            state = ?self.defers.state(),
            "Deferred producer registered"
        );
        Ok(marker)
    }

    /// Run `content` wrapped in `filters` and return the result.
    pub fn render(&mut self, filters: &[Filter], content: Content) -> RenderResult {
        compose(filters, content)(self)
    }

    /// Run `content` wrapped in `filters` and print the result.
    pub fn filter(&mut self, filters: &[Filter], content: Content) -> Result<(), RenderError> {
        let rendered = self.render(filters, content)?;
        self.print(&rendered);
        Ok(())
    }

    /// Resolve a pipe list such as `"Trim,H"`, apply it to `text` and print the result.
    pub fn pipe(&mut self, list: &str, text: impl Into<String>) -> Result<(), RenderError> {
        let filters = self.filters.resolve_pipe(list)?;
        self.filter(&filters, literal(text))
    }

    /// Resolve every pending defer against `buffer` and return it.
    ///
    /// The pending list is empty afterwards, whether or not a producer failed.
    pub fn flush_deferred(&mut self, mut buffer: String) -> RenderResult {
        self.substitute_deferred(&mut buffer)?;
        Ok(buffer)
    }

    /// Substitute deferred content into the buffer, then move it to the output.
    ///
    /// Text a producer prints (rather than returns) lands in the next buffer.
    /// When a producer fails, the partially substituted buffer is left in
    /// place and the error is returned.
    pub fn flush_buffer(&mut self) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let mut buffer = std::mem::take(&mut self.buffer);

        match self.substitute_deferred(&mut buffer) {
            Ok(resolved) => {
                self.output.push_str(&buffer);
                let elapsed = started_at.elapsed();
                histogram!(METRIC_FLUSH_MS).record(elapsed.as_secs_f64() * 1000.0);
                debug!(
                    op = "request::flush_buffer",
                    result = "ok",
                    resolved,
                    bytes = buffer.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Buffer flushed"
                );
                Ok(())
            }
            Err(err) => {
                buffer.push_str(&self.buffer);
                self.buffer = buffer;
                Err(err)
            }
        }
    }

    /// Flush until nothing is left and return everything emitted. Text that
    /// producers print during a flush is emitted by a further flush. The
    /// request accepts no further defers afterwards, even when a flush fails.
    pub fn finish(&mut self) -> RenderResult {
        if self.finished {
            return Err(RenderError::RequestFinished);
        }

        let flushed = self.flush_until_empty();
        self.finished = true;
        flushed?;
        Ok(std::mem::take(&mut self.output))
    }

    fn flush_until_empty(&mut self) -> Result<(), RenderError> {
        loop {
            self.flush_buffer()?;
            if self.buffer.is_empty() && self.defers.is_empty() {
                return Ok(());
            }
        }
    }

    fn substitute_deferred(&mut self, buffer: &mut String) -> Result<usize, RenderError> {
        let mut position = 0;

        while let Some(DeferEntry { marker, producer }) = self.defers.next_for_drain() {
            let replacement = match producer(self) {
                Ok(text) => text,
                Err(source) => {
                    let dropped = self.defers.abandon();
                    warn!(
                        op = "request::flush_deferred",
                        result = "error",
                        position,
                        dropped,
                        error = %source,
                        "Deferred producer failed; remaining entries discarded"
                    );
                    return Err(RenderError::deferred_producer(marker, position, source));
                }
            };

            if substitute_first(buffer, marker.as_str(), &replacement) {
                counter!(METRIC_DEFER_RESOLVED).increment(1);
            } else {
                counter!(METRIC_DEFER_MARKER_MISSING).increment(1);
                debug!(
                    op = "request::flush_deferred",
                    result = "marker_missing",
                    position,
                    "Deferred marker not present in buffer"
                );
            }
            position += 1;
        }

        self.defers.finish_drain();
        Ok(position)
    }
}

#[cfg(test)]
impl Request {
    pub(crate) fn for_tests() -> Self {
        use crate::cache::{CacheConfig, MemoryCache};

        Self::new(
            Arc::new(FilterRegistry::standard()),
            Arc::new(MemoryCache::new(&CacheConfig::default())),
        )
    }
}
