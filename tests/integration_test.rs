//! Integration tests for the wikidict conversion pipeline.
//!
//! These tests exercise the complete flow from configuration files through
//! per-article conversion to scheduler outcome reporting. They are
//! organized into logical sections:
//!
//! - **Configuration Tests** -- Site info, filter files, database loading
//! - **Pipeline Tests** -- End-to-end conversion of articles, redirects
//!   and filtered content
//! - **Scheduler Tests** -- Exactly-once outcome reporting, early
//!   termination, timeout recovery with pool recreation
//! - **Output Tests** -- JSONL consumer record shapes
//!
//! # Test Strategy
//!
//! Scheduler behavior is driven through stub conversion jobs where timing
//! matters (hanging titles, deterministic failures) and through the real
//! pipeline everywhere else. Every test asserts on what the consumer saw:
//! the consumer protocol is the system's observable boundary.
//!
//! ## Key Patterns
//!
//! - **Fixture creation**: `write_json(...)` produces temp config files
//! - **Recording consumer**: collects every callback for later assertions
//! - **Exactly-once**: each title appears in exactly one outcome bucket
//! - **Isolation**: each test builds its own context and consumer

use rustc_hash::FxHashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use wikidict::consumer::{Consumer, JsonlConsumer};
use wikidict::db::MemoryDb;
use wikidict::error::ConvertError;
use wikidict::filters::FilterConfig;
use wikidict::models::{article_payload, ConversionResult};
use wikidict::parser::BasicParser;
use wikidict::pipeline::{convert, ConvertContext};
use wikidict::scheduler::{Scheduler, SchedulerOptions};
use wikidict::siteinfo::{GeneralInfo, SiteInfo};

fn write_json(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn siteinfo() -> SiteInfo {
    SiteInfo {
        general: GeneralInfo {
            sitename: "Testipedia".to_string(),
            lang: "en".to_string(),
            server: "//test.example".to_string(),
            base: String::new(),
            rights: String::new(),
        },
        magicwords: vec![],
    }
}

fn context(db: MemoryDb) -> ConvertContext {
    ConvertContext {
        db: Arc::new(db),
        parser: Arc::new(BasicParser::new()),
        filters: Arc::new(FilterConfig::default()),
        redirect_aliases: Arc::new(vec!["#REDIRECT".to_string(), "#redirect".to_string()]),
        math: None,
    }
}

#[derive(Default)]
struct RecordingConsumer {
    added: Vec<(String, bool, bool)>,
    empty: Vec<String>,
    failed: Vec<String>,
    timeouts: Vec<usize>,
    metadata: Vec<(String, serde_json::Value)>,
}

impl RecordingConsumer {
    /// Number of outcome reports for a title across all buckets.
    fn outcome_count(&self, title: &str) -> usize {
        self.added.iter().filter(|(t, _, c)| t == title && *c).count()
            + self.empty.iter().filter(|t| *t == title).count()
            + self.failed.iter().filter(|t| *t == title).count()
    }
}

impl Consumer for RecordingConsumer {
    fn add_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.metadata.push((key.to_string(), value));
    }
    fn add_article(
        &mut self,
        title: &str,
        _payload: &str,
        is_redirect: bool,
        counted: bool,
        _size: Option<u64>,
    ) {
        self.added.push((title.to_string(), is_redirect, counted));
    }
    fn empty_article(&mut self, title: &str) {
        self.empty.push(title.to_string());
    }
    fn fail_article(&mut self, title: &str) {
        self.failed.push(title.to_string());
    }
    fn timed_out(&mut self, active_workers: usize) {
        self.timeouts.push(active_workers);
    }
}

// ---------------------------------------------------------------------------
// Configuration Tests
// ---------------------------------------------------------------------------

#[test]
fn configuration_files_load_together() {
    let dir = TempDir::new().unwrap();
    let site_path = write_json(
        &dir,
        "siteinfo.json",
        r##"{
            "general": {
                "sitename": "Testipedia",
                "lang": "en",
                "server": "//test.example",
                "base": "https://test.example/wiki",
                "rights": "Public Domain"
            },
            "magicwords": [
                {"name": "redirect", "aliases": ["#REDIRECT"]}
            ]
        }"##,
    );
    let filter_path = write_json(
        &dir,
        "filters.json",
        r#"{"exclude_classes": ["metadata"], "text_replace": [{"re": "foo", "sub": "bar"}]}"#,
    );
    let db_path = write_json(&dir, "db.json", r#"{"A": "text", "B": ""}"#);

    let site = SiteInfo::load(&site_path).unwrap();
    let filters = FilterConfig::load(&filter_path).unwrap();
    let db = MemoryDb::load(&db_path).unwrap();

    assert!(site.redirect_aliases().contains(&"#redirect".to_string()));
    assert!(filters.is_class_excluded(["metadata"].into_iter()));
    assert_eq!(db.len(), 2);
}

// ---------------------------------------------------------------------------
// Pipeline Tests
// ---------------------------------------------------------------------------

#[test]
fn full_pipeline_article_redirect_and_filter() {
    let mut db = MemoryDb::new();
    db.insert(
        "Rust (programming language)",
        "Rust is a systems language.\n\n== History ==\nAnnounced in 2010.",
    );
    db.insert("Rust", "#REDIRECT [[Rust (programming language)]]");
    let ctx = context(db);

    let article = convert(&ctx, "Rust (programming language)").unwrap();
    assert!(!article.is_redirect);
    let value: serde_json::Value = serde_json::from_str(&article.payload).unwrap();
    let body = value[0].as_str().unwrap();
    assert!(body.contains("<h1>Rust (programming language)</h1>"));
    assert!(body.contains("<h2>History</h2>"));

    let redirect = convert(&ctx, "Rust").unwrap();
    assert!(redirect.is_redirect);
    let value: serde_json::Value = serde_json::from_str(&redirect.payload).unwrap();
    assert_eq!(value[2]["r"], "Rust (programming language)");
}

#[test]
fn navbox_content_elided_end_to_end() {
    use wikidict::tree::{Node, NodeKind};

    struct NavboxParser;
    impl wikidict::parser::MarkupParser for NavboxParser {
        fn parse(&self, title: &str, _raw: &str) -> anyhow::Result<Node> {
            Ok(Node::new(NodeKind::Article {
                caption: title.to_string(),
            })
            .with_child(
                Node::new(NodeKind::Generic {
                    tag: "div".to_string(),
                })
                .with_attr("class", "navbox other")
                .with_child(Node::text("navigation junk")),
            )
            .with_child(
                Node::new(NodeKind::Paragraph).with_child(Node::text("real content")),
            ))
        }
    }

    let mut db = MemoryDb::new();
    db.insert("Page", "raw markup");
    let mut ctx = context(db);
    ctx.parser = Arc::new(NavboxParser);

    let result = convert(&ctx, "Page").unwrap();
    assert!(result.payload.contains("real content"));
    assert!(!result.payload.contains("navigation junk"));
}

#[test]
fn conversion_failures_do_not_poison_later_articles() {
    struct FlakyParser;
    impl wikidict::parser::MarkupParser for FlakyParser {
        fn parse(&self, title: &str, raw: &str) -> anyhow::Result<wikidict::tree::Node> {
            if title == "Bad" {
                anyhow::bail!("malformed");
            }
            BasicParser::new().parse(title, raw)
        }
    }

    let mut db = MemoryDb::new();
    db.insert("Bad", "whatever");
    db.insert("Good", "fine text");
    let mut ctx = context(db);
    ctx.parser = Arc::new(FlakyParser);

    assert_eq!(
        convert(&ctx, "Bad").unwrap_err(),
        ConvertError::failed("Bad")
    );
    let good = convert(&ctx, "Good").unwrap();
    assert!(good.payload.contains("fine text"));
}

// ---------------------------------------------------------------------------
// Scheduler Tests
// ---------------------------------------------------------------------------

fn scheduler_db(titles: &[(&str, &str)]) -> MemoryDb {
    let mut db = MemoryDb::new();
    for (title, text) in titles {
        db.insert(*title, *text);
    }
    db
}

#[test]
fn pooled_every_title_reported_exactly_once() {
    let db = scheduler_db(&[
        ("A", "text for a"),
        ("B", ""),
        ("C", "#REDIRECT [[A]]"),
        ("D", "text for d"),
        ("E", "#REDIRECT broken"),
        ("F", "text for f"),
    ]);
    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            workers: Some(3),
            chunk_size: 2,
            ..Default::default()
        },
    );
    let mut consumer = RecordingConsumer::default();
    let stats = scheduler.run(&mut consumer).unwrap();

    for title in ["A", "B", "C", "D", "E", "F"] {
        assert_eq!(consumer.outcome_count(title), 1, "title {title}");
    }
    assert_eq!(stats.added, 3);
    assert_eq!(stats.redirects, 1);
    assert_eq!(stats.empty, 1);
    assert_eq!(stats.failed, 1);
}

#[test]
fn pooled_early_termination_at_limit() {
    let titles: Vec<(String, String)> = (0..30)
        .map(|i| (format!("T{i:02}"), format!("body {i}")))
        .collect();
    let mut db = MemoryDb::new();
    for (title, text) in &titles {
        db.insert(title.clone(), text.clone());
    }

    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            workers: Some(2),
            chunk_size: 5,
            article_limit: Some(7),
            ..Default::default()
        },
    );
    let mut consumer = RecordingConsumer::default();
    let stats = scheduler.run(&mut consumer).unwrap();

    let counted = consumer
        .added
        .iter()
        .filter(|(_, redirect, counted)| !redirect && *counted)
        .count();
    assert_eq!(counted, 7);
    assert_eq!(stats.added, 7);
    // Later chunks were never dispatched.
    assert!(consumer.outcome_count("T29") == 0);
}

/// Stub pipeline that hangs the first time it sees one specific title and
/// succeeds on every other call.
fn hang_once_job(
    hang_title: &str,
    hang_for: Duration,
) -> Arc<wikidict::scheduler::JobFn> {
    let hang_title = hang_title.to_string();
    let hung = Arc::new(AtomicBool::new(false));
    Arc::new(move |_ctx: &ConvertContext, title: &str| {
        if title == hang_title && !hung.swap(true, Ordering::SeqCst) {
            thread::sleep(hang_for);
        }
        Ok(ConversionResult {
            title: title.to_string(),
            payload: article_payload("body", &[]),
            is_redirect: false,
            language_links: Vec::new(),
            size: 4,
        })
    })
}

#[test]
fn timeout_recovery_reports_every_title_in_chunk() {
    let db = scheduler_db(&[("A", "a"), ("Hang", "h"), ("C", "c"), ("D", "d")]);
    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            workers: Some(2),
            chunk_size: 4,
            timeout: Duration::from_millis(200),
            ..Default::default()
        },
    )
    .with_job(hang_once_job("Hang", Duration::from_secs(5)));

    let mut consumer = RecordingConsumer::default();
    let stats = scheduler.run(&mut consumer).unwrap();

    // One timeout event, then the fresh pool picks the chunk back up.
    assert_eq!(consumer.timeouts.len(), 1);
    assert_eq!(stats.timeouts, 1);
    for title in ["A", "Hang", "C", "D"] {
        assert_eq!(consumer.outcome_count(title), 1, "title {title}");
    }
    assert_eq!(stats.added, 4);
}

#[test]
fn deterministic_hang_reported_failed_not_looped() {
    let db = scheduler_db(&[("Stuck", "s"), ("Fine", "f")]);
    let job: Arc<wikidict::scheduler::JobFn> =
        Arc::new(|_ctx: &ConvertContext, title: &str| {
            if title == "Stuck" {
                thread::sleep(Duration::from_secs(3));
            }
            Ok(ConversionResult {
                title: title.to_string(),
                payload: article_payload("body", &[]),
                is_redirect: false,
                language_links: Vec::new(),
                size: 1,
            })
        });

    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            workers: Some(2),
            chunk_size: 2,
            timeout: Duration::from_millis(150),
            ..Default::default()
        },
    )
    .with_job(job);

    let mut consumer = RecordingConsumer::default();
    let stats = scheduler.run(&mut consumer).unwrap();

    // Two pool generations time out on the stuck title, then it is
    // reported failed rather than redispatched forever.
    assert_eq!(stats.timeouts, 2);
    assert_eq!(consumer.failed, vec!["Stuck"]);
    assert_eq!(consumer.outcome_count("Fine"), 1);
    assert_eq!(consumer.outcome_count("Stuck"), 1);
}

#[test]
fn pooled_interrupt_terminates_run() {
    let titles: Vec<(String, String)> = (0..50)
        .map(|i| (format!("T{i:02}"), "body".to_string()))
        .collect();
    let mut db = MemoryDb::new();
    for (title, text) in &titles {
        db.insert(title.clone(), text.clone());
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    let job: Arc<wikidict::scheduler::JobFn> =
        Arc::new(move |_ctx: &ConvertContext, title: &str| {
            // Trip the interrupt from inside the pool partway through.
            if title == "T05" {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(ConversionResult {
                title: title.to_string(),
                payload: article_payload("body", &[]),
                is_redirect: false,
                language_links: Vec::new(),
                size: 1,
            })
        });

    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            workers: Some(2),
            chunk_size: 10,
            interrupt,
            ..Default::default()
        },
    )
    .with_job(job);

    let mut consumer = RecordingConsumer::default();
    let err = scheduler.run(&mut consumer).unwrap_err();
    assert!(err.downcast_ref::<wikidict::error::Interrupted>().is_some());
    // The run stopped early: not every title got an outcome.
    let reported: usize = (0..50)
        .map(|i| consumer.outcome_count(&format!("T{i:02}")))
        .sum();
    assert!(reported < 50);
}

#[test]
fn worker_panic_is_isolated_to_one_title() {
    let db = scheduler_db(&[("Boom", "b"), ("Calm", "c")]);
    let job: Arc<wikidict::scheduler::JobFn> =
        Arc::new(|_ctx: &ConvertContext, title: &str| {
            if title == "Boom" {
                panic!("conversion panicked");
            }
            Ok(ConversionResult {
                title: title.to_string(),
                payload: article_payload("body", &[]),
                is_redirect: false,
                language_links: Vec::new(),
                size: 1,
            })
        });

    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            workers: Some(2),
            chunk_size: 2,
            ..Default::default()
        },
    )
    .with_job(job);

    let mut consumer = RecordingConsumer::default();
    let stats = scheduler.run(&mut consumer).unwrap();
    assert_eq!(consumer.failed, vec!["Boom"]);
    assert_eq!(stats.added, 1);
    assert_eq!(stats.timeouts, 0);
}

#[test]
fn sequential_and_pooled_agree_on_outcomes() {
    let entries = [
        ("A", "text for a"),
        ("B", ""),
        ("C", "#REDIRECT [[A]]"),
        ("D", "more text"),
    ];

    let run = |sequential: bool| {
        let scheduler = Scheduler::new(
            context(scheduler_db(&entries)),
            siteinfo(),
            SchedulerOptions {
                workers: Some(2),
                chunk_size: 3,
                sequential,
                ..Default::default()
            },
        );
        let mut consumer = RecordingConsumer::default();
        let stats = scheduler.run(&mut consumer).unwrap();
        (stats, consumer)
    };

    let (seq_stats, seq) = run(true);
    let (pool_stats, pooled) = run(false);

    assert_eq!(seq_stats, pool_stats);
    for title in ["A", "B", "C", "D"] {
        assert_eq!(seq.outcome_count(title), pooled.outcome_count(title));
    }
}

// ---------------------------------------------------------------------------
// Output Tests
// ---------------------------------------------------------------------------

#[test]
fn jsonl_output_records_full_run() {
    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("articles.jsonl");

    let db = scheduler_db(&[("A", "text"), ("B", ""), ("C", "#REDIRECT [[A]]")]);
    let scheduler = Scheduler::new(
        context(db),
        siteinfo(),
        SchedulerOptions {
            sequential: true,
            ..Default::default()
        },
    );

    let mut consumer = JsonlConsumer::create(&out_path).unwrap();
    scheduler.run(&mut consumer).unwrap();
    consumer.flush().unwrap();

    let content = std::fs::read_to_string(&out_path).unwrap();
    let mut kinds: FxHashMap<String, usize> = FxHashMap::default();
    for line in content.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        *kinds
            .entry(value["kind"].as_str().unwrap().to_string())
            .or_default() += 1;
    }

    assert_eq!(kinds["article"], 2);
    assert_eq!(kinds["empty"], 1);
    assert!(kinds["metadata"] >= 5);
}
