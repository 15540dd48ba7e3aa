//! The cache primitive's public operations show up as spans.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use pigeon_cache::{CacheConfig, CacheStore, FetchCache, loader};
use pigeon_storage::{MemoryBackend, RequestContext};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

#[tokio::test]
async fn fetch_and_tag_create_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(collector));

    let cache = FetchCache::new(MemoryBackend::new(), CacheConfig::default());
    let ctx = RequestContext::background();
    cache.fetch(&ctx, "k", Duration::from_secs(5), loader(|| async { Ok("v".to_owned()) })).await.unwrap();
    cache.tag_as_deleted("k").await.unwrap();

    let recorded = spans.lock().expect("lock poisoned").clone();
    assert!(recorded.iter().any(|s| s == "fetch"), "expected a 'fetch' span, got: {recorded:?}");
    assert!(recorded.iter().any(|s| s == "tag_as_deleted"), "got: {recorded:?}");
    assert!(recorded.iter().any(|s| s == "compare_and_set_with_ttl"), "got: {recorded:?}");
}
