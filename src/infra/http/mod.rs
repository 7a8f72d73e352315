mod middleware;
mod public;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{CACHE_STATUS_HEADER, HttpState, build_router};
