//! End-to-end discovery passes over in-memory documents.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use common::Page;
use image_discovery::{
    DiscoveryOptions, Document, DocumentEvent, ElementSpec, FrameCandidate, HostBridge, ImageEntry,
    Marker, UpgradeSource, spawn_watcher,
};

// ============================================================================
// Helpers
// ============================================================================

fn urls(list: &[ImageEntry]) -> Vec<&str> {
    list.iter().map(|e| e.url.as_str()).collect()
}

/// Bridge that records when frame extraction starts and ends, and answers
/// each call with the next prepared batch.
struct RecordingBridge {
    log: Mutex<Vec<&'static str>>,
    batches: Mutex<Vec<Vec<FrameCandidate>>>,
}

impl RecordingBridge {
    fn new(batches: Vec<Vec<FrameCandidate>>) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            batches: Mutex::new(batches.into_iter().rev().collect()),
        }
    }
}

#[async_trait]
impl HostBridge for RecordingBridge {
    async fn size_lookup(&self, _url: &str) -> image_discovery::Result<u64> {
        Ok(0)
    }

    async fn resolve_frame_sources(
        &self,
        addresses: &[String],
    ) -> image_discovery::Result<Vec<String>> {
        Ok(addresses.to_vec())
    }

    async fn extract_frame_candidates(
        &self,
        _min_size: u32,
    ) -> image_discovery::Result<Vec<FrameCandidate>> {
        self.log.lock().push("enter");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let batch = self.batches.lock().pop().unwrap_or_default();
        self.log.lock().push("exit");
        Ok(batch)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn full_pipeline_orders_every_source() -> Result<()> {
    let page = Page::new()?;
    let doc = &page.doc;

    let lazy = page.img(
        ElementSpec::new("img")
            .attr("src", "/thumb.jpg")
            .attr("data-src", "/full.jpg"),
        300.0,
        200.0,
    )?;
    doc.append(
        doc.root(),
        ElementSpec::new("div")
            .background(r#"url("https://cdn.test/bg.jpg"), linear-gradient(red, blue)"#)
            .size(400.0, 300.0),
    )?;
    doc.append(
        doc.root(),
        ElementSpec::new("iframe").attr("src", "/embed").size(640.0, 360.0),
    )?;
    doc.append(
        doc.root(),
        ElementSpec::new("video").attr("poster", "/poster.jpg").size(640.0, 360.0),
    )?;
    let icon = page.img(ElementSpec::new("img").attr("src", "/icon.png"), 16.0, 16.0)?;

    page.jpeg("/thumb.jpg", 5_000);
    page.jpeg("/full.jpg", 8_000);
    page.bridge.set_frame_candidates(vec![FrameCandidate::new(
        "https://player.test/still.jpg",
        "https://example.com/embed",
    )]);

    let session = page.session()?;
    let list = session
        .run_discovery_pass(&DiscoveryOptions::new().with_min_size(100, 100))
        .await;

    assert_eq!(
        list,
        vec![
            ImageEntry::new("https://example.com/full.jpg"),
            ImageEntry::new("https://cdn.test/bg.jpg"),
            ImageEntry::framed("https://player.test/still.jpg", "https://example.com/embed"),
            ImageEntry::new("https://example.com/poster.jpg"),
        ]
    );
    assert_eq!(doc.attribute(lazy, "loading").as_deref(), Some("eager"));
    assert!(doc.has_marker(icon, Marker::Scanned));
    assert_eq!(page.bridge.last_min_size(), Some(100));
    assert_eq!(session.index_of(lazy), Some(0));
    Ok(())
}

#[tokio::test]
async fn size_race_prefers_strictly_larger_candidate() -> Result<()> {
    let page = Page::new()?;
    let bigger = page.img(
        ElementSpec::new("img")
            .attr("src", "/a.jpg")
            .attr("data-src", "/a-large.jpg"),
        300.0,
        300.0,
    )?;
    let smaller = page.img(
        ElementSpec::new("img")
            .attr("src", "/b.jpg")
            .attr("data-src", "/b-small.jpg"),
        300.0,
        300.0,
    )?;
    page.jpeg("/a.jpg", 5_000);
    page.jpeg("/a-large.jpg", 8_000);
    page.jpeg("/b.jpg", 5_000);
    page.jpeg("/b-small.jpg", 3_000);

    let session = page.session()?;
    let report = session.resolver().unlazy_document().await;

    assert_eq!(report.pending, 2);
    assert_eq!(
        report.upgrades,
        vec![UpgradeSource::Attribute("data-src".into())]
    );
    assert_eq!(page.doc.current_source(bigger), "https://example.com/a-large.jpg");
    assert_eq!(page.doc.current_source(smaller), "https://example.com/b.jpg");
    Ok(())
}

#[tokio::test]
async fn resolution_is_idempotent() -> Result<()> {
    let page = Page::new()?;
    let img = page.img(
        ElementSpec::new("img")
            .attr("src", "/a.jpg")
            .attr("data-src", "/a-large.jpg"),
        300.0,
        300.0,
    )?;
    page.jpeg("/a.jpg", 5_000);
    page.jpeg("/a-large.jpg", 8_000);

    let session = page.session()?;
    let resolver = session.resolver();

    assert!(resolver.resolve(img).await.is_some());
    assert_eq!(resolver.resolve(img).await, None);
    assert_eq!(page.doc.current_source(img), "https://example.com/a-large.jpg");
    Ok(())
}

#[tokio::test]
async fn filter_boundary_is_inclusive() -> Result<()> {
    let page = Page::new()?;
    page.img(ElementSpec::new("img").attr("src", "/exact.jpg"), 200.0, 150.0)?;
    page.img(ElementSpec::new("img").attr("src", "/narrow.jpg"), 199.0, 150.0)?;
    page.img(ElementSpec::new("img").attr("src", "/short.jpg"), 200.0, 149.0)?;
    let focused = page.img(ElementSpec::new("img").attr("src", "/focus.jpg"), 40.0, 40.0)?;
    page.doc.mark(focused, Marker::LastFocused);

    let session = page.session()?;
    let list = session
        .run_discovery_pass(&DiscoveryOptions::new().with_min_size(200, 150))
        .await;

    assert_eq!(
        urls(&list),
        vec!["https://example.com/exact.jpg", "https://example.com/focus.jpg"]
    );
    Ok(())
}

#[tokio::test]
async fn infinite_scroll_keeps_viewer_position() -> Result<()> {
    let page = Page::new()?;
    let options = DiscoveryOptions::default();
    let first = ["/a.jpg", "/b.jpg", "/c.jpg", "/d.jpg"]
        .iter()
        .map(|src| page.img(ElementSpec::new("img").attr("src", *src), 300.0, 300.0))
        .collect::<image_discovery::Result<Vec<_>>>()?;

    let session = page.session()?;
    session.run_discovery_pass(&options).await;

    // The page recycles the first element and inserts one before the last.
    page.doc.detach(first[0])?;
    page.doc.detach(first[3])?;
    page.img(ElementSpec::new("img").attr("src", "/x.jpg"), 300.0, 300.0)?;
    page.img(ElementSpec::new("img").attr("src", "/d.jpg"), 300.0, 300.0)?;

    let list = session.run_discovery_pass(&options).await;
    assert_eq!(
        urls(&list),
        vec![
            "https://example.com/a.jpg",
            "https://example.com/b.jpg",
            "https://example.com/c.jpg",
            "https://example.com/x.jpg",
            "https://example.com/d.jpg",
        ]
    );
    assert_eq!(session.index_of("https://example.com/x.jpg"), Some(3));
    Ok(())
}

#[tokio::test]
async fn overlapping_passes_run_one_after_another() -> Result<()> {
    let page = Page::new()?;
    page.img(ElementSpec::new("img").attr("src", "/a.jpg"), 300.0, 300.0)?;
    page.doc.append(
        page.doc.root(),
        ElementSpec::new("iframe").attr("src", "/embed").size(300.0, 300.0),
    )?;

    let owner = "https://example.com/embed";
    let bridge = Arc::new(RecordingBridge::new(vec![
        vec![FrameCandidate::new("https://f.test/1.jpg", owner)],
        vec![FrameCandidate::new("https://f.test/2.jpg", owner)],
    ]));
    let session = page.session_with_bridge(bridge.clone())?;
    let options = DiscoveryOptions::default();

    let (first, second) = tokio::join!(
        session.run_discovery_pass(&options),
        session.run_discovery_pass(&options)
    );

    assert_eq!(*bridge.log.lock(), vec!["enter", "exit", "enter", "exit"]);
    assert_eq!(
        urls(&first),
        vec!["https://example.com/a.jpg", "https://f.test/1.jpg"]
    );
    // The second pass merged against what the first one published.
    assert_eq!(
        urls(&second),
        vec![
            "https://example.com/a.jpg",
            "https://f.test/1.jpg",
            "https://f.test/2.jpg"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn watcher_rechecks_mutated_sources() -> Result<()> {
    let page = Page::new()?;
    let img = page.img(ElementSpec::new("img").attr("src", "/a.jpg"), 300.0, 300.0)?;
    page.jpeg("/a.jpg", 5_000);
    page.jpeg("/a-hd.jpg", 9_000);

    let session = page.session()?;
    let options = DiscoveryOptions::default();
    session.run_discovery_pass(&options).await;

    let (tx, rx) = mpsc::channel(16);
    let watcher = spawn_watcher(session.clone(), rx, options);
    let mut published = session.subscribe();

    // The host lazily fills in a better source after the first pass.
    page.doc.set_attribute(img, "data-src", "/a-hd.jpg");
    tx.send(DocumentEvent::SourceMutated(img)).await?;
    tx.send(DocumentEvent::Changed).await?;
    published.changed().await?;

    assert_eq!(page.doc.current_source(img), "https://example.com/a-hd.jpg");
    assert!(page.doc.has_marker(img, Marker::SourceUpdated));
    assert_eq!(
        urls(&published.borrow_and_update()),
        vec!["https://example.com/a.jpg", "https://example.com/a-hd.jpg"]
    );

    // The echo of our own swap is swallowed.
    tx.send(DocumentEvent::SourceMutated(img)).await?;
    drop(tx);
    watcher.await?;
    assert!(!page.doc.has_marker(img, Marker::SourceUpdated));
    Ok(())
}
