//! End-to-end conversion: one `.eml` file in, one rendered document out.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};
use crate::export::backend::{PageSpec, Renderer};
use crate::export::naming;
use crate::parser::eml;
use crate::render::{document, sanitize};

/// Per-run conversion settings.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory receiving the rendered files. Must exist.
    pub output_dir: PathBuf,
    pub page: PageSpec,
    /// Skip sanitization. Only for trusted input.
    pub unsafe_html: bool,
    /// Also write the final HTML next to each output as `{output}.html`.
    pub debug_html: bool,
}

/// Result of converting one message.
#[derive(Debug)]
pub enum Outcome {
    Produced(PathBuf),
    Skipped(String),
    Failed(ConvertError),
}

/// Convert a single `.eml` file.
///
/// Never panics and never returns early for the batch: every problem is
/// reported through the [`Outcome`].
pub fn process_one(path: &Path, options: &Options, renderer: &dyn Renderer) -> Outcome {
    let span = info_span!("message", path = %path.display());
    let _guard = span.enter();

    match convert(path, options, renderer) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Conversion failed");
            Outcome::Failed(e)
        }
    }
}

fn convert(path: &Path, options: &Options, renderer: &dyn Renderer) -> Result<Outcome> {
    debug!("Processing");
    let message = eml::parse_eml(path)?;

    let Some(assembled) = document::assemble(&message) else {
        let reason = "no plain text or HTML content".to_string();
        warn!(%reason, "Skipping message");
        return Ok(Outcome::Skipped(reason));
    };

    let html = if options.unsafe_html {
        assembled
    } else {
        sanitize::sanitize(&assembled)
    };

    // Render before claiming a name so failures leave nothing behind.
    let bytes = renderer.render(&html, &options.page)?;

    let base = naming::base_name(message.header.date.as_ref(), &message.header.subject_text);
    let (output, mut file) = naming::claim(&options.output_dir, &base, renderer.extension())?;

    if let Err(e) = file.write_all(&bytes).and_then(|()| file.flush()) {
        drop(file);
        if let Err(remove_err) = std::fs::remove_file(&output) {
            warn!(path = %output.display(), error = %remove_err, "Could not remove partial output");
        }
        return Err(ConvertError::io(output, e));
    }

    if options.debug_html {
        write_debug_html(&output, &html);
    }

    info!(output = %output.display(), bytes = bytes.len(), "Converted");
    Ok(Outcome::Produced(output))
}

fn write_debug_html(output: &Path, html: &str) {
    let mut name = output.as_os_str().to_owned();
    name.push(".html");
    let debug_path = PathBuf::from(name);

    // Another message may already own this name; never overwrite it.
    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&debug_path)
        .and_then(|mut file| file.write_all(html.as_bytes()));
    match written {
        Ok(()) => debug!(path = %debug_path.display(), "Wrote debug HTML"),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            warn!(path = %debug_path.display(), "Debug HTML name already taken, not written")
        }
        Err(e) => warn!(path = %debug_path.display(), error = %e, "Could not write debug HTML"),
    }
}

/// One line of a [`BatchReport`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportEntry {
    Produced { input: PathBuf, output: PathBuf },
    Skipped { input: PathBuf, reason: String },
    Failed { input: PathBuf, error: String },
}

impl ReportEntry {
    pub fn new(input: &Path, outcome: &Outcome) -> Self {
        let input = input.to_path_buf();
        match outcome {
            Outcome::Produced(output) => Self::Produced {
                input,
                output: output.clone(),
            },
            Outcome::Skipped(reason) => Self::Skipped {
                input,
                reason: reason.clone(),
            },
            Outcome::Failed(e) => Self::Failed {
                input,
                error: e.to_string(),
            },
        }
    }

    pub fn input(&self) -> &Path {
        match self {
            Self::Produced { input, .. } | Self::Skipped { input, .. } | Self::Failed { input, .. } => {
                input
            }
        }
    }
}

/// Summary of a batch run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn produced(&self) -> usize {
        self.count(|e| matches!(e, ReportEntry::Produced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|e| matches!(e, ReportEntry::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|e| matches!(e, ReportEntry::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ReportEntry) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(e)).count()
    }
}

/// Convert every input on a pool of `jobs` workers (0 = available parallelism).
///
/// `progress` is called once per finished input, from worker threads.
pub fn process_all(
    inputs: &[PathBuf],
    options: &Options,
    renderer: &dyn Renderer,
    jobs: usize,
    progress: &(dyn Fn(&ReportEntry) + Sync),
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("eml2pdf-worker-{i}"))
        .build()
        .map_err(|e| ConvertError::WorkerPool(e.to_string()))?;

    info!(inputs = inputs.len(), threads = pool.current_num_threads(), "Starting batch");

    let entries = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let outcome = process_one(input, options, renderer);
                let entry = ReportEntry::new(input, &outcome);
                progress(&entry);
                entry
            })
            .collect()
    });

    Ok(BatchReport { entries })
}

/// Find `*.eml` files (extension matched case-insensitively) below `dir`, sorted.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConvertError::InvalidPath(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut inputs: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();

    inputs.sort();
    debug!(dir = %dir.display(), count = inputs.len(), "Discovered inputs");
    Ok(inputs)
}
