pub mod gate;
pub mod protected;

pub use gate::{GateDecision, GateMount, GateSkip, GateView, RouteGate};
pub use protected::ProtectedRoute;

use url::form_urlencoded::byte_serialize;

/// External login URL that returns the user to `path` inside the hash router.
///
/// `/reports` becomes `<login-url>/?next=%2F%23%2Freports`.
pub fn login_redirect_url(login_url: &str, path: &str) -> String {
    let next = format!("/#{}", path);
    let encoded: String = byte_serialize(next.as_bytes()).collect();
    format!("{}/?next={}", login_url.trim_end_matches('/'), encoded)
}
