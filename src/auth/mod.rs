//! Cookie loading for authenticated downloads.
//!
//! Cookies come from a Netscape-format file exported from a browser and are
//! attached to every request through a shared `reqwest` cookie jar.

mod cookies;

pub use cookies::{CookieFileError, CookieRecord, cookie_jar, load_cookie_file, parse_cookie_file};
