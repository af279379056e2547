//! `Dossier` Core: topic names, envelopes, error taxonomy, and entity models
//! shared by the gateway and the workers.

pub mod envelope;
pub mod error;
pub mod models;
pub mod response;
pub mod topic;

pub use envelope::{CorrelationId, Envelope, EnvelopeError, EnvelopeKind, ErrorBody};
pub use error::{status_for, CorrelationError, ErrorKind, FailureClass, HandlerError, STATUS_TABLE};
pub use models::Record;
pub use response::ApiResponse;
pub use topic::{TopicError, TopicName, TopicRegistry};
