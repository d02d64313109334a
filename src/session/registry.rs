//! Ordered registry of open documents.
//!
//! Every document gets a [`DocumentId`] when it is added. The id never
//! changes and is never reused; the tab position is derived from the current
//! order and recomputed after every mutation. Transcription only ever sees a
//! [`DocumentSource`] (id, name and shared bytes), so reordering the session
//! while an export runs cannot affect its result.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable identity of an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Build an id from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value of the id.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Picked or dropped by the user
    #[default]
    User,
    /// Handed over by a trusted host; always takes focus
    Trusted,
}

/// Snapshot of one open document as seen by the session's consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Permanent identity
    pub id: DocumentId,
    /// Display name (usually the file name)
    pub name: String,
    /// Current 0-based tab position
    pub position: usize,
    /// Where the document came from
    pub origin: Origin,
    /// Size of the source bytes
    pub size: usize,
    /// Preview resource created by the host, if any
    pub preview: Option<String>,
}

/// What transcription needs to read a document.
///
/// The bytes are shared: removing the document from the session does not
/// free them while a source is still held by an in-flight export.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Permanent identity
    pub id: DocumentId,
    /// Display name
    pub name: String,
    /// Immutable document bytes
    pub bytes: Arc<[u8]>,
}

impl DocumentSource {
    /// Create a source outside of any session (e.g. for one-shot export).
    pub fn new(id: DocumentId, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Creates and releases document previews (e.g. an object URL for a viewer).
pub trait PreviewHost: Send + Sync {
    /// Create a preview for newly added bytes; returns a resource locator.
    fn create_preview(&self, id: DocumentId, name: &str, bytes: &[u8]) -> Result<String>;

    /// Release a preview created earlier. Called exactly once per preview.
    fn release_preview(&self, id: DocumentId, preview: &str);
}

/// Result of adding a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Added {
    /// Snapshot of the new document
    pub handle: DocumentHandle,
    /// Whether the document became the active one
    pub activated: bool,
}

struct Entry {
    source: DocumentSource,
    position: usize,
    origin: Origin,
    preview: Option<String>,
}

impl Entry {
    fn handle(&self) -> DocumentHandle {
        DocumentHandle {
            id: self.source.id,
            name: self.source.name.clone(),
            position: self.position,
            origin: self.origin,
            size: self.source.bytes.len(),
            preview: self.preview.clone(),
        }
    }
}

#[derive(Default)]
struct State {
    order: Vec<Entry>,
    active: Option<DocumentId>,
}

impl State {
    fn index_of(&self, id: DocumentId) -> Result<usize> {
        self.order
            .iter()
            .position(|e| e.source.id == id)
            .ok_or(Error::UnknownDocument(id))
    }

    fn renumber(&mut self) {
        for (position, entry) in self.order.iter_mut().enumerate() {
            entry.position = position;
        }
        debug_assert!(self.positions_contiguous(), "tab positions must be 0..n-1");
    }

    fn positions_contiguous(&self) -> bool {
        self.order
            .iter()
            .enumerate()
            .all(|(i, e)| e.position == i)
    }
}

/// The ordered set of open documents plus at most one active document.
///
/// All methods take `&self`; the session can be shared across threads and
/// mutated while exports read from it.
pub struct Session {
    next_id: AtomicU64,
    state: RwLock<State>,
    preview_host: Option<Arc<dyn PreviewHost>>,
}

impl Session {
    /// Create an empty session without a preview host.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            state: RwLock::new(State::default()),
            preview_host: None,
        }
    }

    /// Attach a preview host.
    pub fn with_preview_host(mut self, host: Arc<dyn PreviewHost>) -> Self {
        self.preview_host = Some(host);
        self
    }

    /// Add a document at the end of the order.
    ///
    /// A user document activates only when it is the sole open document;
    /// a trusted document always activates. The preview host is called
    /// before the session is locked, so it may read the session.
    pub fn add(&self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>, origin: Origin) -> Added {
        let name = name.into();
        let bytes = bytes.into();

        let id = DocumentId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        let preview = self.preview_host.as_ref().and_then(|host| {
            host.create_preview(id, &name, &bytes)
                .map_err(|e| log::warn!("Preview for {} unavailable: {}", name, e))
                .ok()
        });

        let mut state = self.state.write();
        let activated = origin == Origin::Trusted || state.order.is_empty();
        let position = state.order.len();
        state.order.push(Entry {
            source: DocumentSource { id, name, bytes },
            position,
            origin,
            preview,
        });
        if activated {
            state.active = Some(id);
        }
        state.renumber();

        let handle = state.order[position].handle();
        log::debug!("Added {} '{}' at position {}", id, handle.name, position);
        Added { handle, activated }
    }

    /// Add several documents at once, in the given order.
    ///
    /// For user documents only the first one of an empty session activates.
    pub fn add_batch<N, B, I>(&self, files: I, origin: Origin) -> Vec<Added>
    where
        N: Into<String>,
        B: Into<Arc<[u8]>>,
        I: IntoIterator<Item = (N, B)>,
    {
        files
            .into_iter()
            .map(|(name, bytes)| self.add(name, bytes, origin))
            .collect()
    }

    /// Remove a document and release its preview.
    ///
    /// The bytes themselves are dropped once the last [`DocumentSource`]
    /// referring to them goes away.
    pub fn remove(&self, id: DocumentId) -> Result<DocumentHandle> {
        let entry = {
            let mut state = self.state.write();
            let index = state.index_of(id)?;
            let entry = state.order.remove(index);
            if state.active == Some(id) {
                state.active = None;
            }
            state.renumber();
            entry
        };

        if let (Some(host), Some(preview)) = (&self.preview_host, &entry.preview) {
            host.release_preview(id, preview);
        }

        log::debug!("Removed {} '{}'", id, entry.source.name);
        Ok(entry.handle())
    }

    /// Replace the order with a permutation of the open documents.
    ///
    /// Anything other than a permutation of the current ids is rejected and
    /// leaves the order untouched.
    pub fn reorder(&self, new_order: &[DocumentId]) -> Result<()> {
        let mut state = self.state.write();

        if new_order.len() != state.order.len() {
            return Err(Error::InvalidReorder(format!(
                "expected {} documents, got {}",
                state.order.len(),
                new_order.len()
            )));
        }

        let mut slots: Vec<Option<Entry>> = state.order.drain(..).map(Some).collect();
        let mut reordered = Vec::with_capacity(slots.len());
        for id in new_order {
            let slot = slots
                .iter_mut()
                .find(|s| matches!(s, Some(e) if e.source.id == *id));
            match slot.and_then(Option::take) {
                Some(entry) => reordered.push(entry),
                None => {
                    // Put everything back in its previous order.
                    let mut restored: Vec<Entry> = reordered;
                    restored.extend(slots.into_iter().flatten());
                    restored.sort_by_key(|e| e.position);
                    state.order = restored;
                    return Err(Error::InvalidReorder(format!(
                        "{} is unknown or listed twice",
                        id
                    )));
                }
            }
        }

        state.order = reordered;
        state.renumber();
        Ok(())
    }

    /// Move one document to `position`, shifting the others.
    ///
    /// A `position` past the end moves the document to the end.
    pub fn move_to(&self, id: DocumentId, position: usize) -> Result<()> {
        let mut state = self.state.write();
        let from = state.index_of(id)?;
        let entry = state.order.remove(from);
        let to = position.min(state.order.len());
        state.order.insert(to, entry);
        state.renumber();
        Ok(())
    }

    /// Make a document the active one.
    pub fn activate(&self, id: DocumentId) -> Result<()> {
        let mut state = self.state.write();
        state.index_of(id)?;
        state.active = Some(id);
        Ok(())
    }

    /// The active document, if any.
    pub fn active(&self) -> Option<DocumentId> {
        self.state.read().active
    }

    /// Snapshots of all documents in tab order.
    pub fn handles(&self) -> Vec<DocumentHandle> {
        self.state.read().order.iter().map(Entry::handle).collect()
    }

    /// Snapshot of one document.
    pub fn handle(&self, id: DocumentId) -> Result<DocumentHandle> {
        let state = self.state.read();
        let index = state.index_of(id)?;
        Ok(state.order[index].handle())
    }

    /// Ids of all documents in tab order.
    pub fn ids(&self) -> Vec<DocumentId> {
        self.state.read().order.iter().map(|e| e.source.id).collect()
    }

    /// Readable source of one document.
    pub fn source(&self, id: DocumentId) -> Result<DocumentSource> {
        let state = self.state.read();
        let index = state.index_of(id)?;
        Ok(state.order[index].source.clone())
    }

    /// Readable sources of all documents in tab order.
    pub fn sources(&self) -> Vec<DocumentSource> {
        self.state
            .read()
            .order
            .iter()
            .map(|e| e.source.clone())
            .collect()
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.state.read().order.len()
    }

    /// Check whether no document is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the content area should be shown.
    pub fn is_content_visible(&self) -> bool {
        !self.is_empty()
    }

    /// Whether the "export all" action should be offered.
    pub fn is_export_all_visible(&self) -> bool {
        !self.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("documents", &state.order.len())
            .field("active", &state.active)
            .finish()
    }
}
