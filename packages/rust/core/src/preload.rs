//! Bounded-concurrency content preloader.
//!
//! Warm-up only: every file's `load()` runs once on a pool of workers racing
//! for a shared cursor, and a failing file is recorded in the report instead
//! of stopping the pass.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use docuify_shared::{DocuifyError, PreloadConfig};

use crate::content::ContentActions;
use crate::flatten::flatten_ref;
use crate::id::NodeId;
use crate::node::Node;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One file whose content could not be warmed.
#[derive(Debug)]
pub struct PreloadFailure {
    pub id: NodeId,
    pub path: String,
    pub error: DocuifyError,
}

/// Summary of a preload pass.
#[derive(Debug, Default)]
pub struct PreloadReport {
    /// Files with a loader that were scheduled.
    pub attempted: usize,
    /// Files whose `load()` succeeded.
    pub loaded: usize,
    /// Files whose `load()` failed.
    pub failures: Vec<PreloadFailure>,
    /// Loaded text by node, only filled when `keep_content` is set.
    pub contents: HashMap<NodeId, String>,
    pub duration: Duration,
}

impl PreloadReport {
    /// Whether every scheduled file loaded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.loaded == self.attempted
    }
}

// ---------------------------------------------------------------------------
// Preloading
// ---------------------------------------------------------------------------

struct Job {
    id: NodeId,
    path: String,
    actions: ContentActions,
}

#[derive(Default)]
struct WorkerOutcome {
    loaded: usize,
    failures: Vec<PreloadFailure>,
    contents: Vec<(NodeId, String)>,
}

/// Preload every file in `nodes` that has a loader.
///
/// Folders and loader-less files are skipped. Loads of different files may
/// complete in any order. A concurrency of 0 is treated as 1.
#[instrument(skip_all, fields(concurrency = config.concurrency))]
pub async fn preload<'a, I>(nodes: I, config: &PreloadConfig) -> PreloadReport
where
    I: IntoIterator<Item = &'a Node>,
{
    let start = Instant::now();

    let jobs: Vec<Job> = nodes
        .into_iter()
        .filter(|node| node.is_file())
        .filter_map(|node| {
            node.content()
                .filter(|actions| actions.has_loader())
                .map(|actions| Job {
                    id: node.id(),
                    path: node.full_path().to_string(),
                    actions: actions.clone(),
                })
        })
        .collect();

    let attempted = jobs.len();
    let worker_count = config.concurrency.max(1).min(attempted);
    if config.concurrency == 0 {
        warn!("preload concurrency of 0 requested, using 1");
    }

    info!(files = attempted, workers = worker_count, "starting preload");

    let jobs = Arc::new(jobs);
    let cursor = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..worker_count)
        .map(|worker| {
            let jobs = jobs.clone();
            let cursor = cursor.clone();
            let keep_content = config.keep_content;

            tokio::spawn(async move {
                let mut outcome = WorkerOutcome::default();

                loop {
                    let next = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(job) = jobs.get(next) else {
                        break;
                    };

                    let loaded = AssertUnwindSafe(job.actions.load())
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            Err(DocuifyError::content_load(
                                &job.path,
                                format!("loader panicked: {}", panic_message(panic.as_ref())),
                            ))
                        });

                    match loaded {
                        Ok(text) => {
                            debug!(worker, path = %job.path, len = text.len(), "preloaded");
                            outcome.loaded += 1;
                            if keep_content {
                                outcome.contents.push((job.id, text));
                            }
                        }
                        Err(error) => {
                            warn!(path = %job.path, %error, "failed to preload content");
                            outcome.failures.push(PreloadFailure {
                                id: job.id,
                                path: job.path.clone(),
                                error,
                            });
                        }
                    }
                }

                outcome
            })
        })
        .collect();

    let mut report = PreloadReport {
        attempted,
        ..PreloadReport::default()
    };

    for handle in handles {
        match handle.await {
            Ok(outcome) => {
                report.loaded += outcome.loaded;
                report.failures.extend(outcome.failures);
                report.contents.extend(outcome.contents);
            }
            Err(e) => {
                warn!(error = %e, "preload worker aborted");
            }
        }
    }

    report.duration = start.elapsed();

    info!(
        loaded = report.loaded,
        failed = report.failures.len(),
        duration_ms = report.duration.as_millis(),
        "preload completed"
    );

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Preload every file of the tree rooted at `root`.
pub async fn preload_tree(root: &Node, config: &PreloadConfig) -> PreloadReport {
    preload(flatten_ref(root), config).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentLoader;
    use crate::flatten::flatten;
    use crate::item::Item;
    use crate::tree::build_tree;
    use async_trait::async_trait;
    use docuify_shared::Result;

    struct TrackedLoader {
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        fail: bool,
        text: String,
    }

    #[async_trait]
    impl ContentLoader for TrackedLoader {
        async fn load(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                Err(DocuifyError::content_load(&self.text, "simulated failure"))
            } else {
                Ok(self.text.clone())
            }
        }
    }

    struct Fixture {
        items: Vec<Item>,
        calls: Vec<Arc<AtomicUsize>>,
        max_in_flight: Arc<AtomicUsize>,
    }

    fn fixture(count: usize, failing: &[usize]) -> Fixture {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let mut items = Vec::new();
        let mut calls = Vec::new();

        for i in 0..count {
            let counter = Arc::new(AtomicUsize::new(0));
            calls.push(counter.clone());
            items.push(Item::file(format!("docs/{i}.md")).with_loader(TrackedLoader {
                calls: counter,
                in_flight: in_flight.clone(),
                max_in_flight: max_in_flight.clone(),
                fail: failing.contains(&i),
                text: format!("content {i}"),
            }));
        }

        Fixture {
            items,
            calls,
            max_in_flight,
        }
    }

    fn config(concurrency: usize) -> PreloadConfig {
        PreloadConfig {
            concurrency,
            keep_content: false,
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_each_loader_runs_once() {
        let fx = fixture(100, &[7, 42, 99]);
        let flat = flatten(build_tree(&fx.items).unwrap());

        let report = preload(&flat, &config(10)).await;

        assert_eq!(report.attempted, 100);
        assert_eq!(report.loaded, 97);
        assert_eq!(report.failures.len(), 3);
        assert!(!report.is_complete());
        assert!(fx.calls.iter().all(|c| c.load(Ordering::SeqCst) == 1));

        let mut failed: Vec<&str> = report.failures.iter().map(|f| f.path.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["docs/42.md", "docs/7.md", "docs/99.md"]);
    }

    struct PanickingLoader;

    #[async_trait]
    impl ContentLoader for PanickingLoader {
        async fn load(&self) -> Result<String> {
            panic!("loader exploded");
        }
    }

    #[tokio::test]
    async fn panicking_loader_is_recorded_and_later_files_still_load() {
        let tree = build_tree(&[
            Item::file("a.md").with_loader(PanickingLoader),
            Item::file("b.md").with_content("B"),
            Item::file("c.md").with_content("C"),
        ])
        .unwrap();

        let report = preload_tree(&tree, &config(1)).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.path, "a.md");
        assert!(matches!(
            &failure.error,
            DocuifyError::ContentLoad { message, .. } if message.contains("loader exploded")
        ));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let fx = fixture(20, &[]);
        let tree = build_tree(&fx.items).unwrap();

        let report = preload_tree(&tree, &config(4)).await;

        assert!(report.is_complete());
        let max = fx.max_in_flight.load(Ordering::SeqCst);
        assert!((1..=4).contains(&max), "max in flight was {max}");
    }

    #[tokio::test]
    async fn keep_content_retains_text() {
        let fx = fixture(3, &[]);
        let tree = build_tree(&fx.items).unwrap();
        let cfg = PreloadConfig {
            concurrency: 2,
            keep_content: true,
        };

        let report = preload_tree(&tree, &cfg).await;

        let first = &tree.children()[0].children()[0];
        assert_eq!(report.contents.len(), 3);
        assert_eq!(report.contents[&first.id()], "content 0");
    }

    #[tokio::test]
    async fn skips_folders_and_loaderless_files() {
        let tree = build_tree(&[
            Item::folder("empty"),
            Item::file("no-loader.md"),
            Item::file("inline.md").with_content("x"),
        ])
        .unwrap();

        let report = preload_tree(&tree, &config(0)).await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.loaded, 1);
        assert!(report.contents.is_empty());
    }

    #[tokio::test]
    async fn empty_input_completes() {
        let report = preload(std::iter::empty(), &config(8)).await;
        assert_eq!(report.attempted, 0);
        assert!(report.is_complete());
    }
}
