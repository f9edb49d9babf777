pub mod axis;
pub mod error;
pub mod event;
pub mod media;
pub mod protocol;
pub mod retriever;
pub mod session;
pub mod transport;
mod worker;

pub use error::{ErrorKind, Result, RetrieverError};
pub use event::{
    ApplicationData, Diagnostics, ErrorReport, RetrieverEvent, SessionInfo, VideoFrame,
};
pub use retriever::{CallbackResult, RetrieverConfig, RetrieverHandle};
pub use session::RtspCredentials;
