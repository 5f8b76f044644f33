//! Conversion between Rust types and [`Value`]
//!
//! Generated proxies box every argument with [`ToValue`] and convert the
//! interceptor's result back with [`FromValue`]. [`ValueType`] supplies the
//! static descriptor recorded in each method's metadata.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use interpose::{FromValue, ToValue, ValueType};
//!
//! let v = 42i64.to_value();
//! assert_eq!(i64::from_value(v)?, 42);
//! assert_eq!(<Option<Vec<u32>>>::type_descriptor().name, "Option<Vec<u32>>");
//!
//! let shared = Arc::new(Config::default());
//! let back = <Arc<Config>>::from_value(shared.clone().to_value())?;
//! assert!(Arc::ptr_eq(&shared, &back));
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};
use crate::types::{TypeDescriptor, TypeKind};
use crate::value::{ObjectRef, Value};

/// Static type description of a Rust type
pub trait ValueType {
    /// Descriptor recorded in method metadata
    fn type_descriptor() -> TypeDescriptor;
}

/// Convert from Rust type to Value.
pub trait ToValue {
    /// Box into a Value.
    fn to_value(self) -> Value;
}

/// Convert from Value to Rust type.
///
/// Conversions never lose information: a value that does not fit the
/// target type is a `TypeMismatch`.
pub trait FromValue: Sized {
    /// Convert from Value, returning an error if the type doesn't match.
    fn from_value(value: Value) -> ProxyResult<Self>;
}

/// Types whose `to_value` is never `Value::Null`
///
/// Only these may appear inside `Option<T>`: `Some(x)` is boxed as `x`
/// itself, so an inner value that can be null would read back as `None`.
/// `Option<Option<T>>`, `Option<Value>` and `Option<()>` are rejected at
/// compile time.
pub trait NonNullValue {}

macro_rules! primitive_conversions {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl ValueType for $ty {
                fn type_descriptor() -> TypeDescriptor {
                    TypeDescriptor::primitive(TypeKind::$kind)
                }
            }

            impl ToValue for $ty {
                fn to_value(self) -> Value {
                    Value::$kind(self)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> ProxyResult<Self> {
                    match value.coerce_to(&<$ty as ValueType>::type_descriptor())? {
                        Value::$kind(v) => Ok(v),
                        other => Err(ProxyError::mismatch(stringify!($ty), other.type_name())),
                    }
                }
            }

            impl NonNullValue for $ty {}
        )*
    };
}

// Narrow integers travel in the nearest wide variant and are range-checked
// on the way back
macro_rules! narrow_conversions {
    ($($ty:ty => $kind:ident as $wide:ty),* $(,)?) => {
        $(
            impl ValueType for $ty {
                fn type_descriptor() -> TypeDescriptor {
                    TypeDescriptor::primitive(TypeKind::$kind)
                }
            }

            impl ToValue for $ty {
                fn to_value(self) -> Value {
                    Value::$kind(self as $wide)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> ProxyResult<Self> {
                    let wide = <$wide as FromValue>::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        ProxyError::mismatch(stringify!($ty), format!("{} {}", stringify!($wide), wide))
                    })
                }
            }

            impl NonNullValue for $ty {}
        )*
    };
}

primitive_conversions! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
}

narrow_conversions! {
    i8 => I32 as i32,
    i16 => I32 as i32,
    u8 => U32 as u32,
    u16 => U32 as u32,
    isize => I64 as i64,
    usize => U64 as u64,
}

// Characters travel as their scalar value
impl ValueType for char {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::primitive(TypeKind::U32)
    }
}

impl ToValue for char {
    fn to_value(self) -> Value {
        Value::U32(self as u32)
    }
}

impl FromValue for char {
    fn from_value(value: Value) -> ProxyResult<Self> {
        let scalar = u32::from_value(value)?;
        char::from_u32(scalar).ok_or_else(|| ProxyError::mismatch("char", format!("u32 {:#x}", scalar)))
    }
}

impl NonNullValue for char {}

// Unit type (for methods that return nothing)
impl ValueType for () {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::unit()
    }
}

impl ToValue for () {
    fn to_value(self) -> Value {
        Value::Null
    }
}

impl FromValue for () {
    fn from_value(_value: Value) -> ProxyResult<Self> {
        Ok(())
    }
}

impl ValueType for Value {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::dynamic()
    }
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> ProxyResult<Self> {
        Ok(value)
    }
}

impl ValueType for &str {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::primitive(TypeKind::String)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl NonNullValue for &str {}

impl<T: ValueType + NonNullValue> ValueType for Option<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::type_descriptor())
    }
}

impl<T: ToValue + NonNullValue> ToValue for Option<T> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue + NonNullValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ValueType> ValueType for Vec<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::list(T::type_descriptor())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(self) -> Value {
        Value::List(self.into_iter().map(ToValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> ProxyResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(ProxyError::mismatch("Vec", other.type_name())),
        }
    }
}

impl<T> NonNullValue for Vec<T> {}

// Shared host objects keep their identity in both directions
impl<T: Any + Send + Sync> ValueType for Arc<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::object(std::any::type_name::<T>())
    }
}

impl<T: Any + Send + Sync> ToValue for Arc<T> {
    fn to_value(self) -> Value {
        Value::Object(ObjectRef::new(self))
    }
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn from_value(value: Value) -> ProxyResult<Self> {
        let expected = std::any::type_name::<T>();
        match value {
            Value::Object(obj) => obj
                .downcast::<T>()
                .ok_or_else(|| ProxyError::mismatch(expected, obj.type_name())),
            other => Err(ProxyError::mismatch(expected, other.type_name())),
        }
    }
}

impl<T: Any + Send + Sync> NonNullValue for Arc<T> {}
