//! Progress notifications.
//!
//! The transcriber publishes discrete events to a [`ProgressHub`]; any number
//! of observers subscribe and drain their own channel. Publishing never
//! blocks and never fails.

use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::session::DocumentId;

/// A status change of one document's transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Transcription of a document started.
    Started {
        /// Target document
        document: DocumentId,
        /// Display name
        name: String,
    },
    /// Recognition progress on a page without embedded text.
    PageRecognition {
        /// Target document
        document: DocumentId,
        /// 1-indexed page
        page: u32,
        /// Percent complete
        percent: u8,
        /// Engine stage name
        stage: String,
    },
    /// Recognition of a page failed; the page is left empty.
    PageFailed {
        /// Target document
        document: DocumentId,
        /// 1-indexed page
        page: u32,
        /// Failure reason
        reason: String,
    },
    /// Malformed fragments were skipped on a page.
    FragmentDropped {
        /// Target document
        document: DocumentId,
        /// 1-indexed page
        page: u32,
        /// Number of fragments skipped
        count: usize,
    },
    /// The document transcript is ready.
    Completed {
        /// Target document
        document: DocumentId,
        /// Pages processed
        pages: u32,
        /// Pages whose text came from recognition
        recognized_pages: usize,
    },
    /// The document could not be transcribed at all.
    Failed {
        /// Target document
        document: DocumentId,
        /// Failure reason
        reason: String,
    },
}

impl ProgressEvent {
    /// Document the event refers to.
    pub fn document(&self) -> DocumentId {
        match self {
            ProgressEvent::Started { document, .. }
            | ProgressEvent::PageRecognition { document, .. }
            | ProgressEvent::PageFailed { document, .. }
            | ProgressEvent::FragmentDropped { document, .. }
            | ProgressEvent::Completed { document, .. }
            | ProgressEvent::Failed { document, .. } => *document,
        }
    }

    /// Whether this is the last event of a transcription.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. }
        )
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Started { document, name } => {
                write!(f, "{} {}: started", document, name)
            }
            ProgressEvent::PageRecognition {
                document,
                page,
                percent,
                stage,
            } => write!(f, "{} page {} OCR {}% ({})", document, page, percent, stage),
            ProgressEvent::PageFailed {
                document,
                page,
                reason,
            } => write!(f, "{} page {} unreadable: {}", document, page, reason),
            ProgressEvent::FragmentDropped {
                document,
                page,
                count,
            } => write!(f, "{} page {}: skipped {} malformed fragment(s)", document, page, count),
            ProgressEvent::Completed {
                document,
                pages,
                recognized_pages,
            } => write!(
                f,
                "{} completed: {} page(s), {} recognized",
                document, pages, recognized_pages
            ),
            ProgressEvent::Failed { document, reason } => {
                write!(f, "{} failed: {}", document, reason)
            }
        }
    }
}

/// Fan-out of progress events to any number of subscribers.
#[derive(Debug, Default)]
pub struct ProgressHub {
    subscribers: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl ProgressHub {
    /// Create a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all events published from now on.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are forgotten.
    pub fn publish(&self, event: ProgressEvent) {
        log::trace!("{}", event);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
