pub mod context;
pub mod request_id;

pub use context::{context_middleware, RequestCtx};
pub use request_id::{request_id_middleware, RequestId};
