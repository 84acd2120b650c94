mod error_handler;
mod identity;
mod rate_limit;
mod security;

pub use error_handler::log_errors;
pub use identity::ClientIdentity;
pub use rate_limit::{Admission, rate_limit, rate_limit_headers};
pub use security::apply_security_headers;
