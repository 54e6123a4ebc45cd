//! Budget-bounded JSON array shards.
//!
//! Every file a writer produces is a complete JSON array on its own, including the
//! empty `[]` of a category that received nothing. Two layouts exist:
//!
//! - [`CountShardWriter`] streams records into `{category}.0000.json`,
//!   `{category}.0001.json`, ... and rotates when the next record would break the byte
//!   or item budget.
//! - [`BucketShardWriter`] groups records in memory by the first character of a key
//!   and writes `{category}.A.json`, `{category}.0-9.json`, `{category}._.json` on close.
//!
//! Both close on drop, so an error elsewhere still leaves well-formed files behind.

use crate::config::{
    DEFAULT_MAX_SHARD_BYTES, DEFAULT_MAX_SHARD_FILES, DIGIT_BUCKET, SHARD_EXTENSION, SYMBOL_BUCKET,
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const WRITE_BUFFER_BYTES: usize = 256 * 1024;

/// Budget violations a writer refuses to paper over.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShardError {
    #[error("a '{category}' record of {bytes} bytes does not fit the {max_bytes}-byte shard budget")]
    Oversize {
        category: String,
        bytes: u64,
        max_bytes: u64,
    },
    #[error("category '{category}' needs more than {max_files} shard files")]
    TooManyFiles { category: String, max_files: usize },
}

/// What to do when a single record cannot fit an empty shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    /// Abort the run with [`ShardError::Oversize`].
    Fail,
    /// Let that one shard exceed the byte budget.
    #[default]
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardBudget {
    pub max_bytes: u64,
    pub max_items: usize,
    pub max_files: usize,
    pub oversize: OversizePolicy,
}

impl Default for ShardBudget {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_SHARD_BYTES,
            max_items: usize::MAX,
            max_files: DEFAULT_MAX_SHARD_FILES,
            oversize: OversizePolicy::Allow,
        }
    }
}

impl ShardBudget {
    /// No byte, item or file limit: everything lands in one file.
    pub fn unbounded() -> Self {
        Self {
            max_bytes: u64::MAX,
            max_items: usize::MAX,
            max_files: usize::MAX,
            oversize: OversizePolicy::Allow,
        }
    }

    /// Default byte and file limits with `max_items` records per file.
    pub fn items(max_items: usize) -> Self {
        Self {
            max_items,
            ..Self::default()
        }
        .normalized()
    }

    /// Item and file counts below one are raised to one.
    pub fn normalized(self) -> Self {
        Self {
            max_items: self.max_items.max(1),
            max_files: self.max_files.max(1),
            ..self
        }
    }
}

/// One finished file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardFile {
    pub file: String,
    pub items: usize,
    pub bytes: u64,
}

/// What a writer produced for its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSummary {
    pub category: String,
    pub shards: Vec<ShardFile>,
    pub total_items: usize,
}

impl ShardSummary {
    pub fn total_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.bytes).sum()
    }
}

/// A per-category output stream.
pub trait RecordSink<T> {
    fn category(&self) -> &str;

    fn write(&mut self, record: &T) -> Result<()>;

    /// Closes every open file and reports what was written.
    fn finish(self: Box<Self>) -> Result<ShardSummary>;
}

struct OpenShard {
    name: String,
    writer: BufWriter<File>,
    items: usize,
    bytes: u64,
}

/// Streams records into sequentially numbered shards.
pub struct CountShardWriter<T> {
    category: String,
    dir: PathBuf,
    budget: ShardBudget,
    current: Option<OpenShard>,
    next_index: usize,
    shards: Vec<ShardFile>,
    total_items: usize,
    finished: bool,
    _record: PhantomData<fn(&T)>,
}

impl<T: Serialize> CountShardWriter<T> {
    /// Creates `dir` if needed and opens the first shard immediately.
    pub fn create(dir: impl AsRef<Path>, category: &str, budget: ShardBudget) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        let mut writer = Self {
            category: category.to_string(),
            dir,
            budget: budget.normalized(),
            current: None,
            next_index: 0,
            shards: Vec::new(),
            total_items: 0,
            finished: false,
            _record: PhantomData,
        };
        writer.open_next()?;
        Ok(writer)
    }

    pub fn budget(&self) -> ShardBudget {
        self.budget
    }

    fn open_next(&mut self) -> Result<()> {
        if self.next_index >= self.budget.max_files {
            return Err(ShardError::TooManyFiles {
                category: self.category.clone(),
                max_files: self.budget.max_files,
            }
            .into());
        }

        let name = format!(
            "{}.{:04}.{}",
            self.category, self.next_index, SHARD_EXTENSION
        );
        let path = self.dir.join(&name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create shard file: {}", path.display()))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
        writer
            .write_all(b"[")
            .with_context(|| format!("Failed to write shard file: {}", path.display()))?;

        self.current = Some(OpenShard {
            name,
            writer,
            items: 0,
            bytes: 1,
        });
        self.next_index += 1;
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        let Some(mut shard) = self.current.take() else {
            return Ok(());
        };
        shard
            .writer
            .write_all(b"]")
            .and_then(|_| shard.writer.flush())
            .with_context(|| format!("Failed to close shard file: {}", shard.name))?;
        shard.bytes += 1;

        debug!(file = %shard.name, items = shard.items, bytes = shard.bytes, "Closed shard");
        self.shards.push(ShardFile {
            file: shard.name,
            items: shard.items,
            bytes: shard.bytes,
        });
        Ok(())
    }

    /// Closes the open shard and returns the summary. Later writes fail.
    pub fn close(&mut self) -> Result<ShardSummary> {
        if !self.finished {
            self.finished = true;
            self.close_current()?;
        }
        Ok(ShardSummary {
            category: self.category.clone(),
            shards: std::mem::take(&mut self.shards),
            total_items: self.total_items,
        })
    }

    fn write_serialized(&mut self, json: &[u8]) -> Result<()> {
        if self.finished {
            bail!("Shard writer for '{}' is already closed", self.category);
        }
        if self.current.is_none() {
            self.open_next()?;
        }
        let len = json.len() as u64;

        let needs_rotation = self.current.as_ref().is_some_and(|shard| {
            let separator = u64::from(shard.items > 0);
            let projected_bytes = shard.bytes + separator + len + 1;
            shard.items > 0
                && (projected_bytes > self.budget.max_bytes
                    || shard.items + 1 > self.budget.max_items)
        });
        if needs_rotation {
            self.close_current()?;
            self.open_next()?;
        }

        let budget = self.budget;
        let category = self.category.clone();
        let Some(shard) = self.current.as_mut() else {
            bail!("No open shard for '{}'", category);
        };

        if shard.items == 0 && shard.bytes + len + 1 > budget.max_bytes {
            match budget.oversize {
                OversizePolicy::Fail => {
                    return Err(ShardError::Oversize {
                        category,
                        bytes: len,
                        max_bytes: budget.max_bytes,
                    }
                    .into());
                }
                OversizePolicy::Allow => warn!(
                    category = %category,
                    bytes = len,
                    max_bytes = budget.max_bytes,
                    file = %shard.name,
                    "Record exceeds shard byte budget, writing it alone"
                ),
            }
        }

        if shard.items > 0 {
            shard.writer.write_all(b",")?;
            shard.bytes += 1;
        }
        shard
            .writer
            .write_all(json)
            .with_context(|| format!("Failed to write shard file: {}", shard.name))?;
        shard.bytes += len;
        shard.items += 1;
        self.total_items += 1;
        Ok(())
    }
}

impl<T: Serialize> RecordSink<T> for CountShardWriter<T> {
    fn category(&self) -> &str {
        &self.category
    }

    fn write(&mut self, record: &T) -> Result<()> {
        let json = serde_json::to_vec(record)
            .with_context(|| format!("Failed to serialize '{}' record", self.category))?;
        self.write_serialized(&json)
    }

    fn finish(mut self: Box<Self>) -> Result<ShardSummary> {
        self.close()
    }
}

impl<T> Drop for CountShardWriter<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(shard) = self.current.as_mut() {
            let closed = shard
                .writer
                .write_all(b"]")
                .and_then(|_| shard.writer.flush());
            if let Err(e) = closed {
                warn!(file = %shard.name, error = %e, "Failed to close shard on drop");
            }
        }
    }
}

/// Picks the string a record is bucketed by.
pub type KeySelector<T> = Box<dyn Fn(&T) -> String + Send>;

/// Bucket of a key: its first letter upper-cased, the digit bucket, or the symbol bucket.
pub fn bucket_label(key: &str) -> String {
    match key.trim().chars().next() {
        Some(c) if c.is_alphabetic() => c.to_uppercase().collect(),
        Some(c) if c.is_ascii_digit() => DIGIT_BUCKET.to_string(),
        _ => SYMBOL_BUCKET.to_string(),
    }
}

/// Holds serialized records per bucket and writes one file per bucket on close.
pub struct BucketShardWriter<T> {
    category: String,
    dir: PathBuf,
    budget: ShardBudget,
    key: KeySelector<T>,
    buckets: BTreeMap<String, Vec<Vec<u8>>>,
    total_items: usize,
    finished: bool,
}

impl<T: Serialize> BucketShardWriter<T> {
    pub fn create(
        dir: impl AsRef<Path>,
        category: &str,
        budget: ShardBudget,
        key: KeySelector<T>,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        Ok(Self {
            category: category.to_string(),
            dir,
            budget: budget.normalized(),
            key,
            buckets: BTreeMap::new(),
            total_items: 0,
            finished: false,
        })
    }

    /// Writes every bucket. An empty writer still produces the symbol bucket as `[]`.
    pub fn close(&mut self) -> Result<ShardSummary> {
        if self.finished {
            bail!("Shard writer for '{}' is already closed", self.category);
        }
        self.finished = true;

        let mut buckets = std::mem::take(&mut self.buckets);
        if buckets.is_empty() {
            buckets.insert(SYMBOL_BUCKET.to_string(), Vec::new());
        }
        if buckets.len() > self.budget.max_files {
            return Err(ShardError::TooManyFiles {
                category: self.category.clone(),
                max_files: self.budget.max_files,
            }
            .into());
        }

        let mut shards = Vec::with_capacity(buckets.len());
        for (label, items) in &buckets {
            shards.push(self.write_bucket(label, items)?);
        }

        Ok(ShardSummary {
            category: self.category.clone(),
            shards,
            total_items: self.total_items,
        })
    }

    fn write_bucket(&self, label: &str, items: &[Vec<u8>]) -> Result<ShardFile> {
        let separators = items.len().saturating_sub(1) as u64;
        let bytes = 2 + separators + items.iter().map(|i| i.len() as u64).sum::<u64>();

        if bytes > self.budget.max_bytes {
            match self.budget.oversize {
                OversizePolicy::Fail => {
                    return Err(ShardError::Oversize {
                        category: self.category.clone(),
                        bytes,
                        max_bytes: self.budget.max_bytes,
                    }
                    .into());
                }
                OversizePolicy::Allow => warn!(
                    category = %self.category,
                    bucket = label,
                    bytes,
                    max_bytes = self.budget.max_bytes,
                    "Bucket exceeds shard byte budget"
                ),
            }
        }

        let name = format!("{}.{}.{}", self.category, label, SHARD_EXTENSION);
        let path = self.dir.join(&name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create shard file: {}", path.display()))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);

        let mut write_all = || -> std::io::Result<()> {
            writer.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writer.write_all(b",")?;
                }
                writer.write_all(item)?;
            }
            writer.write_all(b"]")?;
            writer.flush()
        };
        write_all().with_context(|| format!("Failed to write shard file: {}", path.display()))?;

        debug!(file = %name, items = items.len(), bytes, "Wrote bucket shard");
        Ok(ShardFile {
            file: name,
            items: items.len(),
            bytes,
        })
    }
}

impl<T: Serialize> RecordSink<T> for BucketShardWriter<T> {
    fn category(&self) -> &str {
        &self.category
    }

    fn write(&mut self, record: &T) -> Result<()> {
        if self.finished {
            bail!("Shard writer for '{}' is already closed", self.category);
        }
        let json = serde_json::to_vec(record)
            .with_context(|| format!("Failed to serialize '{}' record", self.category))?;
        let label = bucket_label(&(self.key)(record));
        self.buckets.entry(label).or_default().push(json);
        self.total_items += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<ShardSummary> {
        self.close()
    }
}

impl<T> Drop for BucketShardWriter<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut buckets = std::mem::take(&mut self.buckets);
        if buckets.is_empty() {
            buckets.insert(SYMBOL_BUCKET.to_string(), Vec::new());
        }
        for (label, items) in &buckets {
            let path = self
                .dir
                .join(format!("{}.{}.{}", self.category, label, SHARD_EXTENSION));
            let written = File::create(&path).and_then(|file| {
                let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
                writer.write_all(b"[")?;
                writer.write_all(&items.join(&b","[..]))?;
                writer.write_all(b"]")?;
                writer.flush()
            });
            if let Err(e) = written {
                warn!(file = %path.display(), error = %e, "Failed to write bucket on drop");
            }
        }
    }
}
