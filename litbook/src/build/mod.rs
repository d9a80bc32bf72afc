//! Build Driver: discovers documents, compiles each one on a worker pool
//! with its own session, writes the mirrored output tree and reports.

pub mod cache;
pub mod discover;
pub mod report;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::assemble::assemble;
use crate::backend::Backend;
use crate::config::{BuildConfig, FailPolicy};
use crate::error::{Error, Failure, Result};
use crate::parser::{ParseError, Parser};
use crate::render::RenderOptions;
use crate::session::{self, EvalError, EvalOptions};

use cache::{BuildCache, CacheEntry, sha256_hex};
use discover::{discover_documents, document_key};
use report::{BuildReport, DocumentReport};

/// Evaluation recurses once per interpreted call, so workers get room for
/// deep user recursion.
const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Settings for compiling one document.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    pub timeout: Duration,
    pub width: usize,
    pub cancel: Option<&'a AtomicBool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Failed(Vec<Failure>),
    Cancelled,
}

/// Parse, evaluate and assemble one document in a fresh session.
pub fn compile_document<B: Backend>(
    path: &Path,
    source: String,
    backend: &B,
    options: &CompileOptions<'_>,
) -> std::result::Result<String, CompileError> {
    let document = Parser::new(path, source, backend.language())
        .parse()
        .map_err(|errors| {
            CompileError::Failed(errors.iter().map(ParseError::to_failure).collect())
        })?;

    let eval_options = EvalOptions {
        timeout: options.timeout,
        cancel: options.cancel,
    };
    let results = session::evaluate(&document, backend, &eval_options).map_err(|e| match e {
        EvalError::Failed(failure) => CompileError::Failed(vec![failure]),
        EvalError::Cancelled => CompileError::Cancelled,
    })?;

    let render_options = RenderOptions {
        width: options.width,
        comment_prefix: backend.comment_prefix().to_string(),
    };
    assemble(&document, &results, &render_options).map_err(|f| CompileError::Failed(vec![f]))
}

/// Compile every document under `config.input` into `config.output`.
///
/// Document failures are reported, not returned: the `Err` case is kept
/// for problems with the build itself (unreadable input root, unwritable
/// report).
pub fn build<B: Backend>(config: &BuildConfig, backend: &B) -> Result<BuildReport> {
    let documents = discover_documents(&config.input, &config.extensions, Some(&config.output))?;
    if same_directory(&config.input, &config.output) {
        return Err(Error::OutputIsInput(config.output.clone()));
    }
    info!(
        count = documents.len(),
        input = %config.input.display(),
        jobs = config.jobs,
        "discovered documents"
    );

    std::fs::create_dir_all(&config.output).map_err(|e| Error::io(&config.output, e))?;

    let fingerprint = fingerprint(config, backend);
    let mut cache = if config.incremental {
        BuildCache::load(&config.output)
    } else {
        BuildCache::default()
    };
    let cancel = AtomicBool::new(false);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .stack_size(WORKER_STACK_SIZE)
        .thread_name(|i| format!("litbook-worker-{}", i))
        .build()?;

    let outcomes: Vec<Outcome> = {
        let driver = Driver {
            config,
            backend,
            cache: &cache,
            fingerprint: &fingerprint,
            cancel: &cancel,
        };
        pool.install(|| {
            documents
                .par_iter()
                .map(|relative| driver.compile_one(relative))
                .collect()
        })
    };

    if config.incremental {
        let discovered: HashSet<String> = documents.iter().map(|d| document_key(d)).collect();
        cache.retain(|key| discovered.contains(key));
        for outcome in &outcomes {
            let key = &outcome.report.document_path;
            match &outcome.cache_entry {
                Some(entry) => cache.insert(key.clone(), entry.clone()),
                None => cache.remove(key),
            }
        }
        cache.save(&config.output)?;
    }

    let report = BuildReport::from_documents(outcomes.into_iter().map(|o| o.report).collect());
    info!(
        passed = report.passed,
        failed = report.failed,
        cancelled = report.cancelled,
        "build finished"
    );

    if let Some(path) = &config.report {
        report.write_json(path)?;
    }

    Ok(report)
}

/// Hash of every shared setting that affects rendered output.
pub fn fingerprint<B: Backend>(config: &BuildConfig, backend: &B) -> String {
    let text = format!(
        "litbook {}\nbackend {}\nlanguage {}\ncomment {:?}\nwidth {}\n",
        env!("CARGO_PKG_VERSION"),
        backend.identity(),
        backend.language(),
        backend.comment_prefix(),
        config.width,
    );
    sha256_hex(text.as_bytes())
}

// ---------------------------------------------------------------------------
// Per-document work
// ---------------------------------------------------------------------------

struct Driver<'a, B> {
    config: &'a BuildConfig,
    backend: &'a B,
    cache: &'a BuildCache,
    fingerprint: &'a str,
    cancel: &'a AtomicBool,
}

struct Outcome {
    report: DocumentReport,
    /// Entry to record for this document; `None` drops any previous one.
    cache_entry: Option<CacheEntry>,
}

impl<B: Backend> Driver<'_, B> {
    fn compile_one(&self, relative: &Path) -> Outcome {
        let key = document_key(relative);
        let source_path = self.config.input.join(relative);
        let output_path = self.config.output.join(relative);

        if self.cancel.load(Ordering::Relaxed) {
            debug!(document = %key, "skipped after an earlier failure");
            return self.cancelled(key, source_path, &output_path);
        }

        let source = match std::fs::read_to_string(&source_path) {
            Ok(source) => source,
            Err(e) => {
                let failure = Failure::io(&source_path, &e);
                return self.failed(key, source_path, &output_path, vec![failure]);
            }
        };
        let source_hash = sha256_hex(source.as_bytes());

        if self.config.incremental
            && self
                .cache
                .is_fresh(&key, &source_hash, self.fingerprint, &output_path)
        {
            debug!(document = %key, "up to date");
            return Outcome {
                cache_entry: self.cache.get(&key).cloned(),
                report: DocumentReport::pass(key, source_path, true),
            };
        }

        info!(document = %key, "compiling");
        let options = CompileOptions {
            timeout: self.config.timeout,
            width: self.config.width,
            cancel: Some(self.cancel),
        };

        match compile_document(&source_path, source, self.backend, &options) {
            Ok(compiled) => match write_output(&output_path, &compiled) {
                Ok(()) => Outcome {
                    report: DocumentReport::pass(key, source_path, false),
                    cache_entry: Some(CacheEntry {
                        source_hash,
                        fingerprint: self.fingerprint.to_string(),
                        output_hash: sha256_hex(compiled.as_bytes()),
                    }),
                },
                Err(e) => {
                    let failure = Failure::io(&output_path, &e);
                    self.failed(key, source_path, &output_path, vec![failure])
                }
            },
            Err(CompileError::Cancelled) => {
                warn!(document = %key, "cancelled before completion");
                self.cancelled(key, source_path, &output_path)
            }
            Err(CompileError::Failed(failures)) => {
                self.failed(key, source_path, &output_path, failures)
            }
        }
    }

    fn failed(
        &self,
        key: String,
        source_path: PathBuf,
        output_path: &Path,
        failures: Vec<Failure>,
    ) -> Outcome {
        for failure in &failures {
            warn!(
                document = %key,
                line = failure.line,
                kind = %failure.kind,
                "{}",
                failure.message.lines().next().unwrap_or("")
            );
        }
        if self.config.fail_policy == FailPolicy::FailFast {
            self.cancel.store(true, Ordering::Relaxed);
        }
        remove_stale_output(&key, output_path);
        Outcome {
            report: DocumentReport::fail(key, source_path, failures),
            cache_entry: None,
        }
    }

    fn cancelled(&self, key: String, source_path: PathBuf, output_path: &Path) -> Outcome {
        remove_stale_output(&key, output_path);
        Outcome {
            report: DocumentReport::cancelled(key, source_path),
            cache_entry: None,
        }
    }
}

fn write_output(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

/// A rendering left over from an earlier run no longer matches its source
/// once the document fails or is skipped.
fn remove_stale_output(key: &str, output_path: &Path) {
    match std::fs::remove_file(output_path) {
        Ok(()) => debug!(document = %key, "removed stale output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(document = %key, error = %e, "cannot remove stale output"),
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
