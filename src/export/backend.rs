//! Rendering backends: turn the final HTML into the bytes written to disk.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{ConvertError, Result};

/// Paper sizes understood by CSS `@page { size }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A3,
    A4,
    A5,
    B4,
    B5,
    Letter,
    Legal,
    Ledger,
}

impl PageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A3 => "a3",
            Self::A4 => "a4",
            Self::A5 => "a5",
            Self::B4 => "b4",
            Self::B5 => "b5",
            Self::Letter => "letter",
            Self::Legal => "legal",
            Self::Ledger => "ledger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page size with an optional orientation, e.g. `"letter landscape"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub size: PageSize,
    pub orientation: Option<Orientation>,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            orientation: None,
        }
    }
}

impl PageSpec {
    /// The `@page` rule applied to every rendered document.
    pub fn css(&self) -> String {
        format!("@page {{ size: {self}; margin: 1cm }}")
    }
}

impl fmt::Display for PageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.size.as_str())?;
        match self.orientation {
            Some(Orientation::Landscape) => f.write_str(" landscape"),
            Some(Orientation::Portrait) => f.write_str(" portrait"),
            None => Ok(()),
        }
    }
}

impl FromStr for PageSpec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ConvertError::InvalidPageSpec(s.to_string());
        let lower = s.to_ascii_lowercase();
        let mut words = lower.split_whitespace();

        let size = match words.next().ok_or_else(invalid)? {
            "a3" => PageSize::A3,
            "a4" => PageSize::A4,
            "a5" => PageSize::A5,
            "b4" => PageSize::B4,
            "b5" => PageSize::B5,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            "ledger" => PageSize::Ledger,
            _ => return Err(invalid()),
        };
        let orientation = match words.next() {
            None => None,
            Some("landscape") => Some(Orientation::Landscape),
            Some("portrait") => Some(Orientation::Portrait),
            Some(_) => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { size, orientation })
    }
}

/// Something that turns a finished HTML document into output bytes.
pub trait Renderer: Send + Sync {
    /// Render `html` for the given page setup.
    fn render(&self, html: &str, page: &PageSpec) -> Result<Vec<u8>>;

    /// File extension of the produced files, without the dot.
    fn extension(&self) -> &str;
}

/// Wrap a document so it renders the same way on its own: doctype, UTF-8
/// declaration and the `@page` rule.
pub fn standalone_html(html: &str, page: &PageSpec) -> String {
    format!(
        "<!DOCTYPE html>\n<meta charset=\"UTF-8\">\n<style>{}</style>\n{html}",
        page.css()
    )
}

/// Writes the standalone HTML document itself.
#[derive(Debug, Default, Clone)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, html: &str, page: &PageSpec) -> Result<Vec<u8>> {
        Ok(standalone_html(html, page).into_bytes())
    }

    fn extension(&self) -> &str {
        "html"
    }
}

/// Pipes the standalone HTML through an external program and keeps its stdout.
///
/// Configured by default as `weasyprint - -`, which reads HTML on stdin and
/// writes a PDF.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    extension: String,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>, extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            extension: extension.into(),
        }
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, html: &str, page: &PageSpec) -> Result<Vec<u8>> {
        let document = standalone_html(html, page);
        debug!(program = %self.program, bytes = document.len(), "Running renderer");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConvertError::Render(format!("cannot start '{}': {e}", self.program)))?;

        let stdin = child.stdin.take();
        // stdin is fed from its own thread: the child may fill stdout before reading all input.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(document.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            if let Ok(Err(e)) = writer.join() {
                warn!(program = %self.program, error = %e, "Renderer closed its input early");
            }
            output
        })
        .map_err(|e| ConvertError::Render(format!("'{}' failed: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Render(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(ConvertError::Render(format!(
                "'{}' produced no output",
                self.program
            )));
        }
        Ok(output.stdout)
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}
