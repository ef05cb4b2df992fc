//! Folding attached files into the upstream input.

use drafter_core::util::truncate_chars;
use drafter_core::{ImageUploader, Reference, ReferenceReader};
use std::path::Path;
use tracing::{debug, error};

const FILE_REFERENCE: &str = "file";
const TRUNCATION_MARKER: &str = "...(truncated)";

/// How a referenced file contributes to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Uploaded and passed to the engine by URL.
    Image,
    /// Extracted and appended to the input; carries the lowercase extension
    /// including its dot.
    Text(String),
    Ignored,
}

impl ReferenceKind {
    #[must_use]
    pub fn classify(reference: &Reference) -> Self {
        if reference.reference_type != FILE_REFERENCE {
            return Self::Ignored;
        }
        let Some(ext) = Path::new(&reference.reference_id)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
        else {
            return Self::Ignored;
        };

        match ext.as_str() {
            "jpg" | "png" => Self::Image,
            "txt" | "md" | "csv" | "docx" | "pdf" => Self::Text(format!(".{ext}")),
            _ => Self::Ignored,
        }
    }
}

/// Build the engine input for `input` and its attachments.
///
/// Returns the enriched text and the URL of the last successfully uploaded
/// image. A reference that cannot be read or uploaded is logged and skipped.
pub async fn enrich_input(
    input: &str,
    references: &[Reference],
    reader: Option<&dyn ReferenceReader>,
    uploader: Option<&dyn ImageUploader>,
    max_chars: usize,
) -> (String, Option<String>) {
    let mut prompt = input.to_string();
    let mut image = None;

    for reference in references {
        let id = &reference.reference_id;
        match ReferenceKind::classify(reference) {
            ReferenceKind::Image => {
                let Some(uploader) = uploader else {
                    debug!("No image uploader configured, skipping {id}");
                    continue;
                };
                match uploader.upload_image(id).await {
                    Ok(url) => image = Some(url),
                    Err(e) => error!("Image upload failed: reference_id={id} err={e}"),
                }
            }
            ReferenceKind::Text(ext) => {
                let Some(reader) = reader else {
                    debug!("No reference reader configured, skipping {id}");
                    continue;
                };
                match reader.read_text(id).await {
                    Ok(text) => {
                        let text = truncate_chars(&text, max_chars, TRUNCATION_MARKER);
                        prompt.push_str(&format!("\nThe user provided a {ext} file: {text}."));
                    }
                    Err(e) => error!("Reading reference failed: reference_id={id} err={e}"),
                }
            }
            ReferenceKind::Ignored => debug!("Ignoring reference {id}"),
        }
    }

    (prompt, image)
}
