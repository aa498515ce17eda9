//! Binder core: slot declarations, bound values and the precedence rules.

use super::multipart::{self, MultipartForm, UploadedFile};
use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::UploadLimits;
use crate::context::RequestContext;
use crate::error::BindingError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type AnyValue = Box<dyn Any + Send + Sync>;
type DecodeFn = fn(Value) -> Result<AnyValue, serde_json::Error>;

fn decode_object<T>(value: Value) -> Result<AnyValue, serde_json::Error>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    Ok(Box::new(serde_json::from_value::<T>(value)?))
}

/// How a structured-object slot is decoded.
#[derive(Clone, Copy)]
pub struct ObjectShape {
    type_name: &'static str,
    decode: DecodeFn,
}

impl ObjectShape {
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            decode: decode_object::<T>,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ObjectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectShape").field(&self.type_name).finish()
    }
}

/// Semantic type of a handler input.
#[derive(Debug, Clone, Copy)]
pub enum SlotKind {
    Integer,
    Boolean,
    Decimal,
    Text,
    Object(ObjectShape),
    Upload,
}

impl SlotKind {
    fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

/// One named input a handler expects.
#[derive(Debug, Clone)]
pub struct InputSlot {
    name: String,
    kind: SlotKind,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Boolean)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Decimal)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Text)
    }

    /// Structured-object slot decoded into `T`.
    ///
    /// Fields missing from the body take their zero value only if `T` allows
    /// it, typically through `#[serde(default)]`.
    pub fn object<T>(name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Self::new(name, SlotKind::Object(ObjectShape::of::<T>()))
    }

    /// Raw multipart file part.
    pub fn upload(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Upload)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &SlotKind {
        &self.kind
    }
}

/// Value bound onto one slot. Absent inputs carry the zero value.
pub enum BoundValue {
    Integer(i64),
    Boolean(bool),
    Decimal(f64),
    Text(Option<String>),
    Object(Option<AnyValue>),
    Upload(Option<UploadedFile>),
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => f.debug_tuple("Integer").field(v).finish(),
            Self::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Self::Decimal(v) => f.debug_tuple("Decimal").field(v).finish(),
            Self::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Self::Object(v) => f
                .debug_tuple("Object")
                .field(&v.as_ref().map(|_| ".."))
                .finish(),
            Self::Upload(v) => f.debug_tuple("Upload").field(v).finish(),
        }
    }
}

/// Bound arguments in slot declaration order.
#[derive(Debug, Default)]
pub struct BoundArgs {
    values: Vec<(String, BoundValue)>,
}

impl BoundArgs {
    fn find(&self, name: &str) -> Option<&BoundValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut BoundValue> {
        self.values
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Raw bound value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.find(name)
    }

    /// Integer slot value. `None` when `name` is not an integer slot.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.find(name)? {
            BoundValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.find(name)? {
            BoundValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn decimal(&self, name: &str) -> Option<f64> {
        match self.find(name)? {
            BoundValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// Text slot value. `None` when the input was absent.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.find(name)? {
            BoundValue::Text(v) => v.as_deref(),
            _ => None,
        }
    }

    /// Borrow a structured-object slot as `T`.
    #[must_use]
    pub fn object<T: 'static>(&self, name: &str) -> Option<&T> {
        match self.find(name)? {
            BoundValue::Object(Some(v)) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Move a structured-object slot out as `T`.
    pub fn take_object<T: 'static>(&mut self, name: &str) -> Option<T> {
        let BoundValue::Object(slot) = self.find_mut(name)? else {
            return None;
        };
        match slot.take()?.downcast::<T>() {
            Ok(v) => Some(*v),
            Err(original) => {
                *slot = Some(original);
                None
            }
        }
    }

    #[must_use]
    pub fn upload(&self, name: &str) -> Option<&UploadedFile> {
        match self.find(name)? {
            BoundValue::Upload(v) => v.as_ref(),
            _ => None,
        }
    }

    pub fn take_upload(&mut self, name: &str) -> Option<UploadedFile> {
        match self.find_mut(name)? {
            BoundValue::Upload(v) => v.take(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Request data sources, parsed once per bind.
#[derive(Default)]
struct Sources {
    multipart: Option<MultipartForm>,
    form: Vec<(String, String)>,
    structured: Option<Value>,
}

fn media_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Resolves handler inputs from a request.
#[derive(Clone)]
pub struct Binder {
    limits: UploadLimits,
    codec: Arc<dyn PayloadCodec>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new(UploadLimits::default(), Arc::new(JsonCodec))
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Binder {
    pub fn new(limits: UploadLimits, codec: Arc<dyn PayloadCodec>) -> Self {
        Self { limits, codec }
    }

    #[must_use]
    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Bind `slots` from `ctx`.
    ///
    /// Fails only on a body that breaks the upload limits or cannot be parsed,
    /// or on a present value that does not coerce to its slot's type.
    pub fn bind(
        &self,
        ctx: &RequestContext,
        slots: &[InputSlot],
    ) -> Result<BoundArgs, BindingError> {
        let size = ctx.body().len() as u64;
        if size > self.limits.max_request_bytes {
            return Err(BindingError::Body(format!(
                "request body of {size} bytes exceeds the {} byte limit",
                self.limits.max_request_bytes
            )));
        }
        if slots.is_empty() {
            return Ok(BoundArgs::default());
        }

        let object_slots = slots.iter().filter(|s| s.kind.is_object()).count();
        let mut sources = self.read_sources(ctx, object_slots > 0)?;

        let mut values = Vec::with_capacity(slots.len());
        for slot in slots {
            let raw = scalar_source(&sources, ctx, &slot.name);
            let value = match slot.kind {
                SlotKind::Object(shape) => {
                    BoundValue::Object(bind_object(slot, shape, &sources, object_slots)?)
                }
                SlotKind::Upload => BoundValue::Upload(
                    sources
                        .multipart
                        .as_mut()
                        .and_then(|m| m.take_file(&slot.name)),
                ),
                SlotKind::Integer => coerce(&slot.name, Scalar::Integer, raw)?,
                SlotKind::Boolean => coerce(&slot.name, Scalar::Boolean, raw)?,
                SlotKind::Decimal => coerce(&slot.name, Scalar::Decimal, raw)?,
                SlotKind::Text => coerce(&slot.name, Scalar::Text, raw)?,
            };
            values.push((slot.name.clone(), value));
        }
        Ok(BoundArgs { values })
    }

    fn read_sources(
        &self,
        ctx: &RequestContext,
        want_structured: bool,
    ) -> Result<Sources, BindingError> {
        let mut sources = Sources::default();
        let body = ctx.body();
        let Some(content_type) = ctx.content_type() else {
            return Ok(sources);
        };
        if body.is_empty() {
            return Ok(sources);
        }

        match media_essence(content_type).as_str() {
            "multipart/form-data" => {
                sources.multipart = Some(multipart::parse(
                    content_type,
                    body.clone(),
                    &self.limits,
                )?);
            }
            "application/x-www-form-urlencoded" => {
                sources.form = url::form_urlencoded::parse(body)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
            }
            _ if want_structured && self.codec.accepts(content_type) => {
                let value = self
                    .codec
                    .decode(body)
                    .map_err(|e| BindingError::Body(format!("malformed structured body: {e}")))?;
                sources.structured = Some(value);
            }
            _ => {}
        }
        Ok(sources)
    }
}

fn bind_object(
    slot: &InputSlot,
    shape: ObjectShape,
    sources: &Sources,
    object_slots: usize,
) -> Result<Option<AnyValue>, BindingError> {
    let Some(body) = &sources.structured else {
        return Ok(None);
    };
    let value = if object_slots == 1 {
        body.clone()
    } else {
        match body.get(&slot.name) {
            None | Some(Value::Null) => return Ok(None),
            Some(field) => field.clone(),
        }
    };
    (shape.decode)(value)
        .map(Some)
        .map_err(|e| BindingError::coercion(&slot.name, format!("expected {}: {e}", shape.type_name)))
}

/// Multipart field, then form field, then query parameter.
fn scalar_source<'a>(sources: &'a Sources, ctx: &'a RequestContext, name: &str) -> Option<&'a str> {
    if let Some(v) = sources.multipart.as_ref().and_then(|m| m.field(name)) {
        return Some(v);
    }
    if let Some((_, v)) = sources.form.iter().rfind(|(k, _)| k == name) {
        return Some(v.as_str());
    }
    ctx.query_param(name)
}

/// Slot kinds read from a single string source.
#[derive(Debug, Clone, Copy)]
enum Scalar {
    Integer,
    Boolean,
    Decimal,
    Text,
}

fn coerce(name: &str, kind: Scalar, raw: Option<&str>) -> Result<BoundValue, BindingError> {
    let present = raw.filter(|s| !s.is_empty());
    let fail = |expected: &str, raw: &str| {
        BindingError::coercion(name, format!("expected {expected}, got {raw:?}"))
    };
    Ok(match kind {
        Scalar::Integer => BoundValue::Integer(match present {
            Some(s) => s.parse().map_err(|_| fail("an integer", s))?,
            None => 0,
        }),
        Scalar::Boolean => BoundValue::Boolean(match present {
            Some("true") => true,
            Some("false") | None => false,
            Some(s) => return Err(fail("true or false", s)),
        }),
        Scalar::Decimal => BoundValue::Decimal(match present {
            Some(s) => s
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| fail("a finite decimal", s))?,
            None => 0.0,
        }),
        Scalar::Text => BoundValue::Text(raw.map(str::to_string)),
    })
}
