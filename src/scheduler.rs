//! Batch scheduler.
//!
//! Drives the conversion pipeline over the configured slice of the title
//! stream and reports every outcome to the consumer exactly once. Two
//! functionally equivalent modes: strictly sequential in-process
//! conversion, and the default pooled mode dispatching fixed-size chunks
//! to a worker pool with unordered completion.
//!
//! The pooled mode owns the recovery path: when no result arrives within
//! the timeout, the whole pool is discarded and recreated (stuck workers
//! are never resumed) and the chunk's unreported titles are redispatched.
//! A title that keeps timing out is reported failed after its dispatch
//! attempts are exhausted, so a deterministic hang cannot stall the run
//! and no title is ever dropped silently.

use crate::config::{
    ARTICLE_FORMAT, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS, MAX_DISPATCH_ATTEMPTS,
};
use crate::consumer::Consumer;
use crate::error::{ConvertError, Interrupted};
use crate::langlinks;
use crate::models::ConversionResult;
use crate::pipeline::{convert, ConvertContext};
use crate::pool::WorkerPool;
use crate::siteinfo::SiteInfo;
use crate::stats::RunStats;
use anyhow::{bail, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub type JobFn =
    dyn Fn(&ConvertContext, &str) -> Result<ConversionResult, ConvertError> + Send + Sync;

pub struct SchedulerOptions {
    /// Worker pool size; defaults to available parallelism.
    pub workers: Option<usize>,
    pub chunk_size: usize,
    pub timeout: Duration,
    /// Index into the title stream to start from.
    pub start: usize,
    /// Exclusive end index into the title stream.
    pub end: Option<usize>,
    /// Stop after this many counted (non-redirect) additions.
    pub article_limit: Option<u64>,
    pub sequential: bool,
    /// Language codes whose links get synthetic redirects.
    pub lang_links: Vec<String>,
    /// Set externally to cancel the batch at the next result boundary.
    pub interrupt: Arc<AtomicBool>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            workers: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            start: 0,
            end: None,
            article_limit: None,
            sequential: false,
            lang_links: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }
}

enum ChunkEnd {
    Drained,
    LimitReached,
}

pub struct Scheduler {
    ctx: ConvertContext,
    site: SiteInfo,
    options: SchedulerOptions,
    /// Configured language-link codes, minus the site's own language.
    languages: FxHashSet<String>,
    job: Arc<JobFn>,
}

impl Scheduler {
    pub fn new(ctx: ConvertContext, site: SiteInfo, options: SchedulerOptions) -> Self {
        let sitelang = site.general.lang.to_lowercase();
        let languages = options
            .lang_links
            .iter()
            .map(|lang| lang.trim().to_lowercase())
            .filter(|lang| !lang.is_empty() && *lang != sitelang)
            .collect();

        Scheduler {
            ctx,
            site,
            options,
            languages,
            job: Arc::new(convert),
        }
    }

    /// Replaces the conversion function, for exercising the scheduler
    /// against stub pipelines.
    pub fn with_job(mut self, job: Arc<JobFn>) -> Self {
        self.job = job;
        self
    }

    pub fn run(&self, consumer: &mut dyn Consumer) -> Result<RunStats> {
        self.announce_metadata(consumer);

        let stats = if self.options.sequential {
            info!("Multiprocessing disabled, converting sequentially");
            self.run_sequential(consumer)?
        } else {
            self.run_pooled(consumer)?
        };

        info!(
            added = stats.added,
            redirects = stats.redirects,
            empty = stats.empty,
            failed = stats.failed,
            "Batch complete"
        );
        Ok(stats)
    }

    fn announce_metadata(&self, consumer: &mut dyn Consumer) {
        let general = &self.site.general;
        consumer.add_metadata("title", json!(general.sitename));
        consumer.add_metadata("source", json!(general.server));
        consumer.add_metadata(
            "description",
            json!(format!(
                "{} is a collection of text documents from {} (articles only). \
                 Some documents or portions of documents may have been omitted or \
                 could not be converted to the offline format. All documents can be \
                 found online at {} under the same title.",
                general.sitename, general.server, general.server
            )),
        );
        consumer.add_metadata("lang", json!(general.lang));
        consumer.add_metadata("sitelang", json!(general.lang));
        consumer.add_metadata("index_language", json!(general.lang));
        consumer.add_metadata("article_language", json!(general.lang));

        if !general.rights.is_empty() {
            let license_text = self
                .site
                .license_file()
                .and_then(|path| std::fs::read_to_string(path).ok());
            match license_text {
                Some(text) => consumer.add_metadata("license", json!(text)),
                None => consumer.add_metadata("license", json!(general.rights)),
            }
        }

        if !self.languages.is_empty() {
            let mut languages: Vec<&String> = self.languages.iter().collect();
            languages.sort();
            consumer.add_metadata("language_links", json!(languages));
        }

        consumer.add_metadata("article_format", json!(ARTICLE_FORMAT));
    }

    fn titles(&self) -> Box<dyn Iterator<Item = String> + '_> {
        if self.options.start > 0 {
            info!(start = self.options.start, "Skipping to article");
        }
        let iter = self.ctx.db.titles().skip(self.options.start);
        match self.options.end {
            Some(end) => Box::new(iter.take(end.saturating_sub(self.options.start))),
            None => Box::new(iter),
        }
    }

    /// Forwards one successful result (and any derived language-link
    /// redirects) to the consumer. Returns true once the requested
    /// article count is reached.
    fn accept(
        &self,
        consumer: &mut dyn Consumer,
        stats: &mut RunStats,
        result: ConversionResult,
    ) -> bool {
        consumer.add_article(
            &result.title,
            &result.payload,
            result.is_redirect,
            true,
            Some(result.size),
        );
        if result.is_redirect {
            stats.redirects += 1;
        } else {
            stats.added += 1;
        }

        if !result.language_links.is_empty() && !self.languages.is_empty() {
            let derived = langlinks::synthesize_redirects(
                self.ctx.db.as_ref(),
                &self.languages,
                &result.title,
                &result.language_links,
            );
            for redirect in derived {
                consumer.add_article(&redirect.title, &redirect.payload, true, false, None);
                stats.lang_redirects += 1;
            }
        }

        matches!(self.options.article_limit, Some(limit) if stats.added >= limit)
    }

    fn run_sequential(&self, consumer: &mut dyn Consumer) -> Result<RunStats> {
        let mut stats = RunStats::new();

        for title in self.titles() {
            if self.options.interrupt.load(Ordering::SeqCst) {
                warn!("Interrupt requested, stopping batch");
                return Err(Interrupted.into());
            }

            match (self.job)(&self.ctx, &title) {
                Ok(result) => {
                    if self.accept(consumer, &mut stats, result) {
                        break;
                    }
                }
                Err(ConvertError::Empty { title }) => {
                    consumer.empty_article(&title);
                    stats.empty += 1;
                }
                Err(ConvertError::Failed { title }) => {
                    consumer.fail_article(&title);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    fn make_pool(&self, workers: usize) -> WorkerPool<ConversionResult> {
        let ctx = self.ctx.clone();
        let job = Arc::clone(&self.job);
        WorkerPool::new(
            workers,
            Arc::new(move || ctx.clone()),
            Arc::new(move |ctx: &ConvertContext, title: &str| job(ctx, title)),
        )
    }

    fn run_pooled(&self, consumer: &mut dyn Consumer) -> Result<RunStats> {
        let workers = self.options.workers.unwrap_or_else(|| {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        });
        let mut stats = RunStats::new();
        let mut titles = self.titles();
        let mut pool = self.make_pool(workers);

        loop {
            let chunk: Vec<String> = titles.by_ref().take(self.options.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            match self.run_chunk(&mut pool, workers, chunk, consumer, &mut stats)? {
                ChunkEnd::LimitReached => {
                    info!(added = stats.added, "Requested article count reached");
                    pool.terminate();
                    return Ok(stats);
                }
                ChunkEnd::Drained => {}
            }

            // Fresh pool per chunk bounds per-chunk resource leakage; the
            // drained pool winds down gracefully.
            let drained = std::mem::replace(&mut pool, self.make_pool(workers));
            drained.close();
        }

        pool.close();
        Ok(stats)
    }

    fn run_chunk(
        &self,
        pool: &mut WorkerPool<ConversionResult>,
        workers: usize,
        chunk: Vec<String>,
        consumer: &mut dyn Consumer,
        stats: &mut RunStats,
    ) -> Result<ChunkEnd> {
        let mut attempts: FxHashMap<String, u32> =
            chunk.iter().map(|title| (title.clone(), 1)).collect();
        for title in chunk {
            pool.dispatch(title);
        }

        while !attempts.is_empty() {
            if self.options.interrupt.load(Ordering::SeqCst) {
                warn!("Interrupt requested, terminating worker pool");
                return Err(Interrupted.into());
            }

            match pool.next_result(self.options.timeout) {
                Ok((title, outcome)) => {
                    attempts.remove(&title);
                    match outcome {
                        Ok(result) => {
                            if self.accept(consumer, stats, result) {
                                return Ok(ChunkEnd::LimitReached);
                            }
                        }
                        Err(ConvertError::Empty { title }) => {
                            consumer.empty_article(&title);
                            stats.empty += 1;
                        }
                        Err(ConvertError::Failed { title }) => {
                            consumer.fail_article(&title);
                            stats.failed += 1;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let active = pool.active_workers();
                    warn!(active, "Worker pool timed out, recreating");
                    consumer.timed_out(active);
                    stats.timeouts += 1;

                    let stuck = std::mem::replace(pool, self.make_pool(workers));
                    stuck.terminate();

                    attempts.retain(|title, tries| {
                        if *tries >= MAX_DISPATCH_ATTEMPTS {
                            warn!(title, "Dispatch attempts exhausted, reporting as failed");
                            consumer.fail_article(title);
                            stats.failed += 1;
                            false
                        } else {
                            true
                        }
                    });
                    for (title, tries) in attempts.iter_mut() {
                        *tries += 1;
                        pool.dispatch(title.clone());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("worker pool result channel disconnected")
                }
            }
        }

        Ok(ChunkEnd::Drained)
    }
}
