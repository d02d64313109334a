//! Export requests over the session.
//!
//! At most one export may be in flight per document. A second request for a
//! busy document is rejected with [`Error::AlreadyInProgress`], never queued.
//! Bulk exports fan out across documents on the rayon pool and are joined
//! back in session order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ExportFormat;
use crate::render::{escape_html, to_json, JsonFormat};
use crate::transcribe::{ProgressHub, Transcriber};

use super::registry::{DocumentId, DocumentSource, Session};

/// Registry of documents with an export in flight.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<DocumentId>>,
}

impl InFlight {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark one document as in flight.
    pub fn try_acquire(self: &Arc<Self>, id: DocumentId) -> Result<InFlightGuard> {
        let mut ids = self.ids.lock();
        if !ids.insert(id) {
            return Err(Error::AlreadyInProgress(id));
        }
        Ok(InFlightGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Mark several documents as in flight, all or none.
    pub fn try_acquire_all(self: &Arc<Self>, targets: &[DocumentId]) -> Result<Vec<InFlightGuard>> {
        let mut ids = self.ids.lock();
        if let Some(busy) = targets.iter().find(|id| ids.contains(*id)) {
            return Err(Error::AlreadyInProgress(*busy));
        }
        ids.extend(targets.iter().copied());
        Ok(targets
            .iter()
            .map(|&id| InFlightGuard {
                registry: Arc::clone(self),
                id,
            })
            .collect())
    }

    /// Whether a document currently has an export in flight.
    pub fn is_in_flight(&self, id: DocumentId) -> bool {
        self.ids.lock().contains(&id)
    }

    /// Number of documents in flight.
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Check whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears a document's in-flight mark when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlight>,
    id: DocumentId,
}

impl InFlightGuard {
    /// The guarded document.
    pub fn id(&self) -> DocumentId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.ids.lock().remove(&self.id);
    }
}

/// One document's part of a bulk export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Source document
    pub document: DocumentId,
    /// Display name
    pub name: String,
    /// Transcript, or placeholder text if the document was unreadable
    pub content: String,
    /// Failure reason when `content` is a placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Segment {
    /// Placeholder for a document that could not be transcribed.
    pub fn placeholder(source: &DocumentSource, format: ExportFormat, reason: impl Into<String>) -> Self {
        let label = format!("[unreadable document: {}]", source.name);
        let content = match format {
            ExportFormat::Text => label,
            ExportFormat::Overlay => {
                format!("<div class=\"unreadable\">{}</div>", escape_html(&label))
            }
        };
        Self {
            document: source.id,
            name: source.name.clone(),
            content,
            error: Some(reason.into()),
        }
    }

    /// Whether this segment is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of exporting every open document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkTranscript {
    /// Output format of every segment
    pub format: ExportFormat,
    /// Segments in session order
    pub segments: Vec<Segment>,
    /// When the export finished
    pub created: DateTime<Utc>,
}

impl BulkTranscript {
    /// Join all segments with the format's document separator.
    pub fn join(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join(self.format.document_separator())
    }

    /// Segments that are placeholders.
    pub fn failed(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_placeholder())
    }

    /// Serialize to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        to_json(self, format)
    }
}

/// Content prepared in both formats, waiting for the user to pick one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedCopy {
    /// Plain-text transcript
    pub text: String,
    /// Overlay markup
    pub overlay: String,
}

impl PreparedCopy {
    /// Content for one format.
    pub fn get(&self, format: ExportFormat) -> &str {
        match format {
            ExportFormat::Text => &self.text,
            ExportFormat::Overlay => &self.overlay,
        }
    }
}

/// Where copied content goes (system clipboard, a file, stdout).
pub trait ClipboardSink: Send + Sync {
    /// Store `content` tagged with `format`.
    fn write(&self, content: &str, format: ExportFormat) -> Result<()>;
}

/// Outcome of a copy action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Content was handed to the sink
    Copied {
        /// Format that was copied
        format: ExportFormat,
        /// Length of the copied content in bytes
        len: usize,
    },
    /// Nothing to copy; the sink was not touched
    Empty,
}

/// Runs export requests against a session.
pub struct ExportCoordinator {
    session: Arc<Session>,
    transcriber: Arc<Transcriber>,
    in_flight: Arc<InFlight>,
}

impl ExportCoordinator {
    /// Create a coordinator for `session`.
    pub fn new(session: Arc<Session>, transcriber: Arc<Transcriber>) -> Self {
        Self {
            session,
            transcriber,
            in_flight: InFlight::new(),
        }
    }

    /// The session exports read from.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The transcriber used for every request.
    pub fn transcriber(&self) -> &Arc<Transcriber> {
        &self.transcriber
    }

    /// The in-flight registry.
    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Progress events of every request.
    pub fn progress(&self) -> &Arc<ProgressHub> {
        self.transcriber.progress()
    }

    /// Export one document.
    pub fn export(&self, id: DocumentId, format: ExportFormat) -> Result<String> {
        let source = self.session.source(id)?;
        let _guard = self.in_flight.try_acquire(id)?;
        self.transcriber.transcribe(&source, format)
    }

    /// Export every open document, joined in session order.
    ///
    /// Rejected as a whole if any document already has an export in flight.
    /// A document that cannot be read becomes a placeholder segment; any
    /// other failure aborts the request.
    pub fn export_all(&self, format: ExportFormat) -> Result<BulkTranscript> {
        let sources = self.session.sources();
        let ids: Vec<DocumentId> = sources.iter().map(|s| s.id).collect();
        let _guards = self.in_flight.try_acquire_all(&ids)?;
        self.bulk(&sources, format)
    }

    /// Prepare one document in both formats for a copy action.
    pub fn prepare(&self, id: DocumentId) -> Result<PreparedCopy> {
        let source = self.session.source(id)?;
        let _guard = self.in_flight.try_acquire(id)?;
        Ok(PreparedCopy {
            text: self.transcriber.transcribe(&source, ExportFormat::Text)?,
            overlay: self.transcriber.transcribe(&source, ExportFormat::Overlay)?,
        })
    }

    /// Prepare every open document in both formats for a copy action.
    pub fn prepare_all(&self) -> Result<PreparedCopy> {
        let sources = self.session.sources();
        let ids: Vec<DocumentId> = sources.iter().map(|s| s.id).collect();
        let _guards = self.in_flight.try_acquire_all(&ids)?;
        Ok(PreparedCopy {
            text: self.bulk(&sources, ExportFormat::Text)?.join(),
            overlay: self.bulk(&sources, ExportFormat::Overlay)?.join(),
        })
    }

    /// Hand prepared content in the chosen format to a sink.
    ///
    /// Empty content is not copied. A sink failure is returned as
    /// [`Error::SinkUnavailable`] and not retried.
    pub fn copy(&self, prepared: &PreparedCopy, format: ExportFormat, sink: &dyn ClipboardSink) -> Result<CopyOutcome> {
        let content = prepared.get(format);
        if content.is_empty() {
            log::info!("Nothing to copy as {}", format.label());
            return Ok(CopyOutcome::Empty);
        }

        sink.write(content, format).map_err(|e| match e {
            Error::SinkUnavailable(reason) => Error::SinkUnavailable(reason),
            other => Error::SinkUnavailable(other.to_string()),
        })?;

        log::debug!("Copied {} bytes as {}", content.len(), format.mime_type());
        Ok(CopyOutcome::Copied {
            format,
            len: content.len(),
        })
    }

    fn bulk(&self, sources: &[DocumentSource], format: ExportFormat) -> Result<BulkTranscript> {
        let run = |source: &DocumentSource| match self.transcriber.transcribe(source, format) {
            Ok(content) => Ok(Segment {
                document: source.id,
                name: source.name.clone(),
                content,
                error: None,
            }),
            Err(e) if e.is_document_level() => {
                log::warn!("Placeholder for '{}': {}", source.name, e);
                Ok(Segment::placeholder(source, format, e.to_string()))
            }
            Err(e) => Err(e),
        };

        let segments = if self.transcriber.options().parallel {
            sources.par_iter().map(run).collect::<Result<Vec<Segment>>>()?
        } else {
            sources.iter().map(run).collect::<Result<Vec<Segment>>>()?
        };

        Ok(BulkTranscript {
            format,
            segments,
            created: Utc::now(),
        })
    }
}

impl fmt::Debug for ExportCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportCoordinator")
            .field("session", &self.session)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
