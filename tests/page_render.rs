use std::fs;
use std::sync::Arc;

use mason_filter::application::filter::FilterRegistry;
use mason_filter::application::page::{DocumentError, PageDocument};
use mason_filter::application::request::Request;
use mason_filter::cache::{self, CacheConfig, NullCache};
use mason_filter::domain::error::RenderError;
use tempfile::tempdir;

fn request_with_cache(config: &CacheConfig) -> Request {
    Request::new(
        Arc::new(FilterRegistry::standard()),
        cache::backend_from_config(config),
    )
}

#[test]
fn renders_a_document_loaded_from_disk() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("page.toml");
    fs::write(
        &path,
        r#"
[[blocks]]
text = "Tom & Jerry"
pipe = "H"

[[blocks]]
text = " | "

[[blocks]]
text = "a b"
pipe = "U"
filters = [{ name = "Repeat", args = [2] }]
"#,
    )
    .expect("write page");

    let document = PageDocument::load(&path).expect("load");
    let mut request = request_with_cache(&CacheConfig::default());
    let output = document.render(&mut request).expect("render");

    insta::assert_snapshot!(output, @"Tom &amp; Jerry | a%20ba%20b");
}

#[test]
fn cached_block_is_reused_across_requests_sharing_a_backend() {
    let document = PageDocument::from_toml(
        r#"
[[blocks]]
text = "fresh"
filters = [{ name = "Cache", args = ["greeting"] }]
"#,
    )
    .expect("parse");
    let stale = PageDocument::from_toml(
        r#"
[[blocks]]
text = "stale"
filters = [{ name = "Cache", args = ["greeting"] }]
"#,
    )
    .expect("parse");

    let registry = Arc::new(FilterRegistry::standard());
    let backend = cache::backend_from_config(&CacheConfig::default());

    let mut first = Request::new(Arc::clone(&registry), Arc::clone(&backend));
    assert_eq!(document.render(&mut first).expect("render"), "fresh");

    let mut second = Request::new(registry, backend);
    assert_eq!(stale.render(&mut second).expect("render"), "fresh");
}

#[test]
fn disabled_cache_renders_every_time() {
    let source = r#"
[[blocks]]
text = "x"
filters = [{ name = "Cache", args = ["k", 60] }]
"#;
    let document = PageDocument::from_toml(source).expect("parse");
    let registry = Arc::new(FilterRegistry::standard());

    for _ in 0..2 {
        let mut request = Request::new(Arc::clone(&registry), Arc::new(NullCache));
        assert_eq!(document.render(&mut request).expect("render"), "x");
    }
}

#[test]
fn rendered_request_cannot_be_reused() {
    let document = PageDocument::from_toml("[[blocks]]\ntext = \"once\"\n").expect("parse");
    let mut request = request_with_cache(&CacheConfig::default());

    assert_eq!(document.render(&mut request).expect("render"), "once");

    let err = document.render(&mut request).expect_err("finished");
    assert!(matches!(err, DocumentError::Flush(RenderError::RequestFinished)));
}
