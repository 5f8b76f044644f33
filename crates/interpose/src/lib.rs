//! Interpose - interface proxies backed by a single interceptor
//!
//! A [`ProxyFactory`] produces implementations of an interface in which
//! every method call is packaged into a [`CallContext`] (proxy identity,
//! method metadata, ordered arguments) and handed to one [`Interceptor`].
//! The interceptor's result becomes the method's return value.
//!
//! Interfaces come from two places:
//!
//! - Rust traits annotated with [`macro@proxy`], turned into proxies with
//!   [`ProxyFactory::create_proxy`]
//! - [`InterfaceDescriptor`]s built at runtime, turned into
//!   [`ProxyInstance`]s with [`ProxyFactory::create_dynamic`]
//!
//! # Example
//!
//! ```ignore
//! use interpose::{interceptor_fn, proxy, ProxyFactory, Value};
//!
//! #[proxy]
//! pub trait ITestInterface {
//!     fn echo(&self, value: Value) -> Value;
//! }
//!
//! let factory = ProxyFactory::new(interceptor_fn(|call| {
//!     Ok(call.first_arg().cloned().unwrap_or_default())
//! }));
//! let proxy = factory.create_proxy::<dyn ITestInterface>()?;
//! assert_eq!(proxy.echo(Value::from("Hello")), Value::from("Hello"));
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod interceptor;
pub mod proxy;
pub mod types;
pub mod value;

pub use convert::{FromValue, NonNullValue, ToValue, ValueType};
pub use descriptor::{
    FieldDecl, InterfaceDescriptor, InterfaceId, MemberDecl, MethodDecl, MethodDescriptor, ParamDecl,
    ParameterInfo, TypeRef,
};
pub use error::{ProxyError, ProxyResult};
pub use factory::{FactoryOptions, ProxyFactory};
pub use interceptor::{interceptor_fn, CallContext, FnInterceptor, Interceptor};
pub use proxy::{implementation_name, ProxyId, ProxyImplementation, ProxyInstance, ProxyInterface};
pub use types::{TypeDescriptor, TypeKind, TypeRegistry, TypeResolveError};
pub use value::{ObjectRef, Value};

pub use interpose_macros::proxy;

/// Re-exports used by `#[proxy]`-generated code
#[doc(hidden)]
pub mod __private {
    pub use anyhow;
}
