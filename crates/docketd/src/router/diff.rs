//! Line-based comparison of local and mirror responses.

use std::fmt;

use similar::TextDiff;

use crate::message::Response;

const CONTEXT_LINES: usize = 1;

/// Unified diffs of the headers and bodies of two responses.
///
/// Both parts are empty when the responses render identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Diff of the rendered headers.
    pub header: String,
    /// Diff of the rendered bodies.
    pub body: String,
}

impl DiffReport {
    /// Compares the local response against the mirror response.
    #[must_use]
    pub fn between(local: &Response, mirror: &Response) -> Self {
        Self {
            header: unified(
                &local.header.to_string(),
                &mirror.header.to_string(),
                ("local header", "mirror header"),
            ),
            body: unified(
                &render_body(local),
                &render_body(mirror),
                ("local body", "mirror body"),
            ),
        }
    }

    /// Whether the responses rendered identically.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty()
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Header diff:")?;
        f.write_str(&self.header)?;
        write!(f, "\nBody diff:")?;
        if !self.body.is_empty() {
            write!(f, "\n{}", self.body.trim())?;
        }
        Ok(())
    }
}

fn render_body(response: &Response) -> String {
    response
        .body
        .as_ref()
        .map(|body| body.render())
        .unwrap_or_default()
}

fn unified(local: &str, mirror: &str, (from, to): (&str, &str)) -> String {
    if local == mirror {
        return String::new();
    }
    let diff = TextDiff::from_lines(local, mirror);
    format!(
        "{}",
        diff.unified_diff()
            .context_radius(CONTEXT_LINES)
            .header(from, to)
    )
}
