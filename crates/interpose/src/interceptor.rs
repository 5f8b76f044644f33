//! Interceptor trait: the single seam every proxy call flows through
//!
//! A proxy packages each call into a [`CallContext`] and hands it to the
//! factory's interceptor. Whatever the interceptor returns becomes the
//! method's result; whatever error it returns reaches the caller as-is.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::MethodDescriptor;
use crate::proxy::ProxyInstance;
use crate::value::Value;

/// Per-call bundle handed to an interceptor
pub struct CallContext<'a> {
    instance: &'a ProxyInstance,
    method: &'a Arc<MethodDescriptor>,
    args: Vec<Value>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(instance: &'a ProxyInstance, method: &'a Arc<MethodDescriptor>, args: Vec<Value>) -> Self {
        Self {
            instance,
            method,
            args,
        }
    }

    /// The proxy the method was called on
    pub fn instance(&self) -> &'a ProxyInstance {
        self.instance
    }

    /// Metadata of the invoked method
    pub fn method(&self) -> &'a MethodDescriptor {
        self.method
    }

    /// Shared handle to the method metadata, for keeping past the call
    pub fn method_handle(&self) -> Arc<MethodDescriptor> {
        Arc::clone(self.method)
    }

    /// Arguments in declaration order
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument at `index`
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// First argument, if any
    pub fn first_arg(&self) -> Option<&Value> {
        self.args.first()
    }

    /// Take ownership of the arguments
    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("instance", &self.instance.id())
            .field("method", &self.method.signature())
            .field("args", &self.args)
            .finish()
    }
}

/// Trait for handling every method call made on a proxy
///
/// One interceptor is owned by a factory and shared by all proxies it
/// creates, possibly from several threads at once. The mechanism adds no
/// locking around `intercept`.
///
/// The returned value is converted to the method's declared return type
/// by the caller's side of the proxy; for methods without a return type
/// it is discarded. An `Err` is propagated to the proxy's caller without
/// wrapping.
pub trait Interceptor: Send + Sync {
    /// Handle one call
    fn intercept(&self, call: CallContext<'_>) -> anyhow::Result<Value>;

    /// Short type name, used as the default synthesis-unit label
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Interceptor backed by a closure (see [`interceptor_fn`])
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(CallContext<'_>) -> anyhow::Result<Value> + Send + Sync,
{
    fn intercept(&self, call: CallContext<'_>) -> anyhow::Result<Value> {
        (self.f)(call)
    }
}

/// Build an interceptor from a closure
///
/// ```ignore
/// let factory = ProxyFactory::new(interceptor_fn(|call| {
///     Ok(Value::from(call.method().name()))
/// }));
/// ```
pub fn interceptor_fn<F>(f: F) -> FnInterceptor<F>
where
    F: Fn(CallContext<'_>) -> anyhow::Result<Value> + Send + Sync,
{
    FnInterceptor { f }
}
