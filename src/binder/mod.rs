//! # Binder Module
//!
//! Resolves a handler's declared input slots from the request: query string,
//! `application/x-www-form-urlencoded` fields, `multipart/form-data` parts and
//! a structured body decoded by the configured [`PayloadCodec`](crate::codec::PayloadCodec).
//!
//! ## Precedence
//!
//! 1. Exactly one structured-object slot and a structured body: the whole
//!    body is decoded into that slot. With several object slots each one binds
//!    from the body field of the same name.
//! 2. Scalar slots: multipart text field, then form field, then query
//!    parameter. First source holding the name wins.
//! 3. Upload slots bind only from a multipart file part of the same name.
//!
//! Absent scalars take their zero value (`0`, `false`, `0.0`, `None`). A
//! present value that does not coerce fails with a
//! [`BindingError`](crate::error::BindingError) naming the slot.
//!
//! ## Example
//!
//! ```rust
//! use brrtmvc::binder::{Binder, InputSlot};
//! use brrtmvc::context::RequestContext;
//! use http::Method;
//!
//! let ctx = RequestContext::new(Method::GET, "/Product/list?page=2");
//! let args = Binder::default()
//!     .bind(&ctx, &[InputSlot::integer("page"), InputSlot::boolean("archived")])
//!     .unwrap();
//! assert_eq!(args.int("page"), Some(2));
//! assert_eq!(args.boolean("archived"), Some(false));
//! ```

mod core;
mod multipart;

pub use core::{Binder, BoundArgs, BoundValue, InputSlot, ObjectShape, SlotKind};
pub use multipart::UploadedFile;
