// interpose-macros: compile-time proxy generation for traits
//
// Provides one attribute macro:
// - #[proxy] - Generates a forwarding implementation of a trait
//
// Example:
// ```
// use interpose::{proxy, Value};
//
// #[proxy]
// pub trait ITestInterface {
//     fn echo(&self, value: Value) -> Value;
// }
// ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemTrait};

mod codegen;
mod proxy;

/// Generates a proxy implementation for a trait.
///
/// The trait itself is left unchanged. Next to it the macro emits:
/// - a struct named after the trait (`ITestInterface` -> `TestInterfaceProxy`)
///   holding an `interpose::ProxyInstance`
/// - an implementation of the trait for that struct, in which every method
///   converts its arguments to `Value`s, forwards them to the instance's
///   interceptor and converts the result back to the declared return type
/// - `interpose::ProxyInterface` for `dyn Trait`, so that
///   `ProxyFactory::create_proxy::<dyn Trait>()` can build it
///
/// # Errors and results
///
/// Methods returning `Result<T, E>` report interceptor failures as
/// `Err(E::from(error))`, where `error` is the interceptor's own
/// `anyhow::Error`. With `E = anyhow::Error` the caller receives exactly
/// what the interceptor returned.
///
/// Methods returning a plain `T` (or nothing) have no error channel: an
/// interceptor failure panics with the original `anyhow::Error` as payload,
/// and a result that does not convert to `T` panics with the mismatch.
///
/// # Example
///
/// ```ignore
/// #[proxy]
/// pub trait Repository: Send + Sync {
///     fn load(&self, id: u64) -> anyhow::Result<Option<String>>;
///     fn store(&self, id: u64, body: String);
/// }
///
/// let repo = factory.create_proxy::<dyn Repository>()?;
/// repo.store(7, "draft".to_string());
/// ```
///
/// Supported traits have no generic parameters and only `&self` or
/// `&mut self` methods with plain identifier parameters. Argument types
/// must implement `interpose::ToValue + ValueType`, return types
/// `interpose::FromValue + ValueType`.
#[proc_macro_attribute]
pub fn proxy(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    proxy::expand_proxy(attr.into(), input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
