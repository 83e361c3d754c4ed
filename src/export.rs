//! Artifact export: local markdown (the primary deliverable) and a
//! best-effort binary word-processor document behind a trait boundary.

use docx_rs::{Docx, Paragraph, Run};
use std::path::{Path, PathBuf};

use crate::errors::ExportError;

/// Write the assembled document as a markdown file under `dir`, returning
/// the path written.
pub fn write_markdown(
    dir: &Path,
    file_name: &str,
    title: &str,
    body: &str,
) -> Result<PathBuf, ExportError> {
    let path = dir.join(file_name);
    let contents = format!("# {title}\n\n{body}\n");
    std::fs::write(&path, contents).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Renders the assembled document into a binary word-processor format.
/// The rendering backend is an external collaborator; only this boundary is
/// part of the pipeline's contract.
pub trait BinaryDocWriter: Send + Sync {
    fn write(&self, title: &str, markdown: &str, dest: &Path) -> Result<(), ExportError>;
}

/// Default docx renderer. Maps the assembled document's `## ` section
/// markers to level-2 headings and everything else to body paragraphs.
pub struct DocxWriter;

impl BinaryDocWriter for DocxWriter {
    fn write(&self, title: &str, markdown: &str, dest: &Path) -> Result<(), ExportError> {
        let mut doc = Docx::new().add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(title))
                .style("Title"),
        );

        for line in markdown.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(heading) = line.strip_prefix("## ") {
                doc = doc.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(heading))
                        .style("Heading2"),
                );
            } else {
                doc = doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
            }
        }

        let file = std::fs::File::create(dest).map_err(|source| ExportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        doc.build()
            .pack(file)
            .map_err(|e| ExportError::Render(e.to_string()))?;
        Ok(())
    }
}
