//! # Response Module
//!
//! One value type for every handler outcome, plus the rendering step that turns
//! it into bytes on the wire.
//!
//! ## Kinds
//!
//! | Kind | Body | Wire form |
//! |---|---|---|
//! | `View` | view name + parameter bag | template output, `text/html` |
//! | `Payload` | structured value | encoded by the payload codec, `application/json` |
//! | `File` | bytes + filename + media type | `Content-Disposition: attachment` |
//! | `Content` | bytes + explicit content type | raw bytes, no disposition |
//! | `Redirect` | target location | status line + `Location` only |
//!
//! Exactly one kind is populated per [`Response`]. A redirect always carries a
//! 3xx status and never a body.
//!
//! ```rust
//! use brrtmvc::response::{Response, ResponseKind};
//! use serde_json::json;
//!
//! let resp = Response::created(json!({"id": 7})).with_header("x-trace", "abc");
//! assert_eq!(resp.status(), 201);
//! assert_eq!(resp.kind(), ResponseKind::Payload);
//!
//! let redirect = Response::redirect("/User/login");
//! assert_eq!(redirect.status(), 302);
//! ```

mod core;
pub mod render;

pub use core::{Body, HeaderVec, Response, ResponseError, ResponseKind, MAX_INLINE_HEADERS};
pub use render::{RenderError, ResponseRenderer, WireResponse};
