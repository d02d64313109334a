//! Open documents and export requests.
//!
//! [`Session`] owns the ordered set of open documents. [`ExportCoordinator`]
//! runs transcriptions against it and makes sure a document never has two
//! exports in flight at once.

mod coordinator;
mod registry;

pub use coordinator::{
    BulkTranscript, ClipboardSink, CopyOutcome, ExportCoordinator, InFlight, InFlightGuard,
    PreparedCopy, Segment,
};
pub use registry::{
    Added, DocumentHandle, DocumentId, DocumentSource, Origin, PreviewHost, Session,
};
