// Bridge module - request/response plumbing over the native message channel
//
// - envelope: wire types and the native command vocabulary
// - correlator: request ids, pending table, timeouts

pub mod correlator;
pub mod envelope;

pub use correlator::{Correlator, NativeChannel, NativePort, DEFAULT_REQUEST_TIMEOUT};
pub use envelope::{GitCommand, RequestEnvelope, ResponseEnvelope};
