mod live;
mod middleware;
mod public;

pub use middleware::REQUEST_ID_HEADER;
pub use public::{HttpState, build_router, render_request_path};

const DATASTAR_REQUEST_HEADER: &str = "datastar-request";
