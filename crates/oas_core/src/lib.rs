//! OAS publisher core: pure request, state and report types. No IO lives here.
mod error;
mod report;
mod request;
mod response;
mod source;
mod state;

pub use error::{
    AuthError, ConversionError, ErrorBody, FetchError, ItemError, PublishError, RequestError,
};
pub use report::{BatchReport, ItemResult};
pub use request::{
    AuthOptions, CanonicalRequest, Invocation, RawRequest, StorageNotification,
    Workload, DEFAULT_INLINE_NAME,
};
pub use response::{status_for, Response, OUTPUT_KEY_HEADER};
pub use source::{parse_manifest, SourceRef};
pub use state::{ItemState, Stage, TransitionError};
