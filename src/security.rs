//! Stateless validation helpers for both sides of the wire.
//!
//! The client uses the sanitizers and redaction helpers on every call. The remaining helpers
//! (redirect checks, origin checks, double-submit verification, IP extraction, cookie parsing
//! and building, fingerprints, file name and JSON input checks) are exposed for the server
//! routes and UI code that sit next to the client, so both ends agree on one implementation.

pub mod cookie;
pub mod csrf;
pub mod fingerprint;
pub mod input;
pub mod ip;
pub mod origin;
pub mod redact;
pub mod redirect;
pub mod sanitize;

pub use cookie::*;
pub use csrf::*;
pub use fingerprint::*;
pub use input::*;
pub use ip::*;
pub use origin::*;
pub use redact::*;
pub use redirect::*;
pub use sanitize::*;
