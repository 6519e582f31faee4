//! Consumer interface to the downstream packager.
//!
//! The scheduler reports every per-title outcome and all run-level
//! metadata through this trait exactly once. [`JsonlConsumer`] is the
//! reference sink used by the CLI: one JSON object per line, suitable for
//! piping into a separate packaging step.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub trait Consumer {
    fn add_metadata(&mut self, key: &str, value: serde_json::Value);
    fn add_article(
        &mut self,
        title: &str,
        payload: &str,
        is_redirect: bool,
        counted: bool,
        size: Option<u64>,
    );
    fn empty_article(&mut self, title: &str);
    fn fail_article(&mut self, title: &str);
    fn timed_out(&mut self, active_workers: usize);
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Metadata {
        key: &'a str,
        value: &'a serde_json::Value,
    },
    Article {
        title: &'a str,
        payload: &'a str,
        redirect: bool,
        counted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
    Empty {
        title: &'a str,
    },
    Failed {
        title: &'a str,
    },
    Timeout {
        active: usize,
    },
}

/// Writes one JSON record per line.
pub struct JsonlConsumer {
    writer: BufWriter<File>,
}

impl JsonlConsumer {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(JsonlConsumer {
            writer: BufWriter::with_capacity(128 * 1024, file),
        })
    }

    fn write(&mut self, record: &Record) {
        // An output write failure here is unrecoverable mid-batch; surface
        // it at flush time instead of panicking a worker loop.
        let _ = serde_json::to_writer(&mut self.writer, record);
        let _ = self.writer.write_all(b"\n");
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush output file")
    }
}

impl Consumer for JsonlConsumer {
    fn add_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.write(&Record::Metadata { key, value: &value });
    }

    fn add_article(
        &mut self,
        title: &str,
        payload: &str,
        is_redirect: bool,
        counted: bool,
        size: Option<u64>,
    ) {
        self.write(&Record::Article {
            title,
            payload,
            redirect: is_redirect,
            counted,
            size,
        });
    }

    fn empty_article(&mut self, title: &str) {
        self.write(&Record::Empty { title });
    }

    fn fail_article(&mut self, title: &str) {
        self.write(&Record::Failed { title });
    }

    fn timed_out(&mut self, active_workers: usize) {
        self.write(&Record::Timeout {
            active: active_workers,
        });
    }
}
