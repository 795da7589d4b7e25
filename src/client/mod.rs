//! Outbound HTTP: token verification and any other federated calls.
//!
//! Layout:
//! - `request.rs`: method enum and request description
//! - `http.rs`: the reqwest-backed client (redirects, timeout)
//! - `response.rs`: header folding and content-type driven body decoding
//! - `form.rs`: form-urlencoded coding

pub mod form;
pub mod http;
pub mod request;
pub mod response;

pub use form::{FormData, decode_form, decode_form_pairs, encode_form};
pub use http::{DEFAULT_TIMEOUT, HttpClient, MAX_REDIRECTS};
pub use request::{HttpMethod, HttpRequest};
pub use response::{ContentType, HttpResponse, ResponseBody, fold_header_lines};
