//! Value: the uniform dynamic representation of arguments and results
//!
//! Every argument of an intercepted call and every interceptor result is a
//! [`Value`]. Primitives are stored inline; host objects are reference
//! counted and keep their identity across the interception boundary.
//!
//! ```text
//! Null | Bool | I32 | I64 | U32 | U64 | F32 | F64 | String | List | Object
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};
use crate::types::{TypeDescriptor, TypeKind};

/// Type-erased, reference-counted host object.
///
/// Cloning shares the same allocation. Equality is pointer identity.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ObjectRef {
    /// Wrap a shared object, keeping its identity
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Self {
            inner: object,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Move an object into a fresh allocation
    pub fn wrap<T: Any + Send + Sync>(object: T) -> Self {
        Self::new(Arc::new(object))
    }

    /// Rust type name of the wrapped object
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check the concrete type of the wrapped object
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Recover the shared object if it has type `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Borrow the object if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Check whether two handles point to the same allocation
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({} @ {:p})", self.type_name, self.addr())
    }
}

/// Dynamic value carried through the interception channel
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit unsigned integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Owned string
    String(String),
    /// List of values
    List(Vec<Value>),
    /// Shared host object
    Object(ObjectRef),
}

impl Value {
    /// Wrap a host object
    pub fn object<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Value::Object(ObjectRef::new(object))
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract i32 value
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract i64 value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract u32 value
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(u) => Some(*u),
            _ => None,
        }
    }

    /// Extract u64 value
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(u) => Some(*u),
            _ => None,
        }
    }

    /// Extract f32 value
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract f64 value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Borrow string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow list items
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "String",
            Value::List(_) => "Vec",
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Check whether this value has exactly the declared shape
    pub fn conforms_to(&self, ty: &TypeDescriptor) -> bool {
        match (ty.kind, self) {
            (TypeKind::Dynamic, _) => true,
            (TypeKind::Unit, Value::Null) => true,
            (TypeKind::Bool, Value::Bool(_)) => true,
            (TypeKind::I32, Value::I32(_)) => true,
            (TypeKind::I64, Value::I64(_)) => true,
            (TypeKind::U32, Value::U32(_)) => true,
            (TypeKind::U64, Value::U64(_)) => true,
            (TypeKind::F32, Value::F32(_)) => true,
            (TypeKind::F64, Value::F64(_)) => true,
            (TypeKind::String, Value::String(_)) => true,
            (TypeKind::Object, Value::Object(obj)) => obj.type_name() == ty.name,
            (TypeKind::Optional, Value::Null) => true,
            (TypeKind::Optional, value) => ty.element().is_some_and(|inner| value.conforms_to(inner)),
            (TypeKind::List, Value::List(items)) => ty
                .element()
                .is_some_and(|element| items.iter().all(|item| item.conforms_to(element))),
            _ => false,
        }
    }

    /// Convert this value to the declared type without loss
    ///
    /// Conforming values pass through unchanged. Integers convert between
    /// widths when the value fits, `f32` widens to `f64`, and `f64` narrows
    /// to `f32` only when it round-trips exactly. Anything else is a
    /// `TypeMismatch`.
    pub fn coerce_to(self, ty: &TypeDescriptor) -> ProxyResult<Value> {
        if self.conforms_to(ty) {
            return Ok(self);
        }

        let coerced = match ty.kind {
            TypeKind::I32 => self.as_integer().and_then(|i| i32::try_from(i).ok()).map(Value::I32),
            TypeKind::I64 => self.as_integer().and_then(|i| i64::try_from(i).ok()).map(Value::I64),
            TypeKind::U32 => self.as_integer().and_then(|i| u32::try_from(i).ok()).map(Value::U32),
            TypeKind::U64 => self.as_integer().and_then(|i| u64::try_from(i).ok()).map(Value::U64),
            TypeKind::F64 => self.as_f32().map(|f| Value::F64(f as f64)),
            TypeKind::F32 => self.as_f64().and_then(|f| {
                let narrowed = f as f32;
                (narrowed as f64 == f).then_some(Value::F32(narrowed))
            }),
            TypeKind::Optional => match ty.element() {
                Some(inner) => return self.coerce_to(inner),
                None => None,
            },
            TypeKind::List => match (self, ty.element()) {
                (Value::List(items), Some(element)) => {
                    let items = items
                        .into_iter()
                        .map(|item| item.coerce_to(element))
                        .collect::<ProxyResult<Vec<_>>>()?;
                    return Ok(Value::List(items));
                }
                (other, _) => return Err(ProxyError::mismatch(&ty.name, other.type_name())),
            },
            _ => None,
        };

        coerced.ok_or_else(|| ProxyError::mismatch(&ty.name, self.describe()))
    }

    fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I32(i) => Some(*i as i128),
            Value::I64(i) => Some(*i as i128),
            Value::U32(u) => Some(*u as i128),
            Value::U64(u) => Some(*u as i128),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        let shown = match self {
            Value::I32(i) => i.to_string(),
            Value::I64(i) => i.to_string(),
            Value::U32(u) => u.to_string(),
            Value::U64(u) => u.to_string(),
            Value::F32(f) => f.to_string(),
            Value::F64(f) => f.to_string(),
            _ => return self.type_name().to_string(),
        };
        format!("{} {}", self.type_name(), shown)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<Value> => List,
    ObjectRef => Object,
}

// Narrow types widen into the nearest variant
macro_rules! value_from_widened {
    ($($ty:ty => $variant:ident as $wide:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $wide)
                }
            }
        )*
    };
}

value_from_widened! {
    i8 => I32 as i32,
    i16 => I32 as i32,
    u8 => U32 as u32,
    u16 => U32 as u32,
    isize => I64 as i64,
    usize => U64 as u64,
    char => U32 as u32,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null() {
        let v = Value::default();
        assert!(v.is_null());
        assert_eq!(v.type_name(), "null");
        assert!(v.conforms_to(&TypeDescriptor::unit()));
        assert!(!v.conforms_to(&TypeDescriptor::primitive(TypeKind::I32)));
    }

    #[test]
    fn test_from_literals() {
        assert_eq!(Value::from(123), Value::I32(123));
        assert_eq!(Value::from(123.123), Value::F64(123.123));
        assert_eq!(Value::from("Hello").as_str(), Some("Hello"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(200u8), Value::U32(200));
        assert_eq!(Value::from(-5i16), Value::I32(-5));
        assert_eq!(Value::from(42usize), Value::U64(42));
        assert_eq!(Value::from('A'), Value::U32(65));
    }

    #[test]
    fn test_object_identity() {
        let shared = Arc::new(String::from("payload"));
        let a = Value::object(shared.clone());
        let b = a.clone();
        let c = Value::object(Arc::new(String::from("payload")));

        assert_eq!(a, b);
        assert_ne!(a, c);
        let back = a.as_object().unwrap().downcast::<String>().unwrap();
        assert!(Arc::ptr_eq(&back, &shared));
        assert!(a.as_object().unwrap().downcast::<i32>().is_none());
    }

    #[test]
    fn test_conforms_to_composites() {
        let list = Value::List(vec![Value::I32(1), Value::I32(2)]);
        assert!(list.conforms_to(&TypeDescriptor::list(TypeDescriptor::primitive(TypeKind::I32))));
        assert!(!list.conforms_to(&TypeDescriptor::list(TypeDescriptor::primitive(TypeKind::I64))));

        let opt = TypeDescriptor::optional(TypeDescriptor::primitive(TypeKind::String));
        assert!(Value::Null.conforms_to(&opt));
        assert!(Value::from("x").conforms_to(&opt));
        assert!(!Value::from(1).conforms_to(&opt));

        let obj = Value::object(Arc::new(7u8));
        assert!(obj.conforms_to(&TypeDescriptor::object("u8")));
        assert!(!obj.conforms_to(&TypeDescriptor::object("u16")));
        assert!(obj.conforms_to(&TypeDescriptor::dynamic()));
    }

    #[test]
    fn test_coerce_integers() {
        let i64_ty = TypeDescriptor::primitive(TypeKind::I64);
        let i32_ty = TypeDescriptor::primitive(TypeKind::I32);
        let u32_ty = TypeDescriptor::primitive(TypeKind::U32);

        assert_eq!(Value::I32(-5).coerce_to(&i64_ty).unwrap(), Value::I64(-5));
        assert_eq!(Value::I64(42).coerce_to(&i32_ty).unwrap(), Value::I32(42));

        let err = Value::I64(5_000_000_000).coerce_to(&i32_ty).unwrap_err();
        assert!(matches!(err, ProxyError::TypeMismatch { .. }));
        assert!(Value::I32(-1).coerce_to(&u32_ty).is_err());
    }

    #[test]
    fn test_coerce_floats() {
        let f32_ty = TypeDescriptor::primitive(TypeKind::F32);
        let f64_ty = TypeDescriptor::primitive(TypeKind::F64);

        assert_eq!(Value::F32(1.5).coerce_to(&f64_ty).unwrap(), Value::F64(1.5));
        assert_eq!(Value::F64(0.25).coerce_to(&f32_ty).unwrap(), Value::F32(0.25));
        // 123.123 has no exact f32 representation
        assert!(Value::F64(123.123).coerce_to(&f32_ty).is_err());
        // Integers never become floats implicitly
        assert!(Value::I32(1).coerce_to(&f64_ty).is_err());
    }

    #[test]
    fn test_coerce_nested() {
        let ty = TypeDescriptor::optional(TypeDescriptor::list(TypeDescriptor::primitive(TypeKind::I64)));
        let coerced = Value::List(vec![Value::I32(1), Value::U32(2)]).coerce_to(&ty).unwrap();
        assert_eq!(coerced, Value::List(vec![Value::I64(1), Value::I64(2)]));
        assert_eq!(Value::Null.coerce_to(&ty).unwrap(), Value::Null);
        assert!(Value::from("nope").coerce_to(&ty).is_err());
    }
}
