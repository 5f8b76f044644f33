//! Proxy implementations and bound proxy instances
//!
//! A [`ProxyImplementation`] is the synthesized form of one interface: its
//! resolved method table, in dispatch-slot order, plus a name index for
//! overload lookup. A [`ProxyInstance`] binds an implementation to an
//! interceptor; every call made through it becomes one `intercept` call.
//!
//! ## Dispatch paths
//!
//! - `dispatch(slot, args)`: used by `#[proxy]`-generated types. The slot
//!   is fixed at compile time, argument shapes are guaranteed by the
//!   trait signature.
//! - `invoke(name, args)` / `invoke_signature(name, types, args)`: dynamic
//!   entry points for interfaces described at runtime. Arguments and the
//!   result are checked against the declared types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::descriptor::{InterfaceDescriptor, InterfaceId, MethodDescriptor, ParameterInfo, TypeRef};
use crate::error::{ProxyError, ProxyResult};
use crate::interceptor::{CallContext, Interceptor};
use crate::types::{TypeDescriptor, TypeRegistry};
use crate::value::Value;

/// Derive the implementation name for an interface
///
/// Strips one leading `I` interface marker (when followed by an uppercase
/// letter) and appends `Proxy`: `ITestInterface` becomes
/// `TestInterfaceProxy`, `Greeter` becomes `GreeterProxy`.
pub fn implementation_name(interface_name: &str) -> String {
    let mut chars = interface_name.chars();
    let stripped = match (chars.next(), chars.next()) {
        (Some('I'), Some(next)) if next.is_ascii_uppercase() => &interface_name[1..],
        _ => interface_name,
    };
    format!("{}Proxy", stripped)
}

/// Unique identifier of a proxy instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(u64);

impl ProxyId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ProxyId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Synthesized forwarding implementation of one interface
#[derive(Debug)]
pub struct ProxyImplementation {
    interface: InterfaceId,
    interface_name: String,
    name: String,
    unit: String,
    methods: Vec<Arc<MethodDescriptor>>,
    by_name: FxHashMap<String, Vec<usize>>,
}

impl ProxyImplementation {
    /// Synthesize the implementation of an interface
    ///
    /// Resolves every parameter and return type through `registry` and
    /// assigns dispatch slots in declaration order. Fails with
    /// `Construction` for data members and with `Resolution` for
    /// unresolvable types or two methods sharing a full signature.
    pub fn synthesize(
        descriptor: &InterfaceDescriptor,
        registry: &TypeRegistry,
        unit: &str,
    ) -> ProxyResult<Self> {
        if let Some(field) = descriptor.fields().next() {
            return Err(ProxyError::Construction {
                interface: descriptor.id.to_string(),
                reason: format!("data member '{}' cannot be forwarded to an interceptor", field.name),
            });
        }

        let mut methods: Vec<Arc<MethodDescriptor>> = Vec::new();
        let mut by_name: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for (slot, decl) in descriptor.methods().enumerate() {
            let resolve = |ty: &TypeRef| {
                ty.resolve(registry).map_err(|e| ProxyError::Resolution {
                    interface: descriptor.id.to_string(),
                    method: decl.name.clone(),
                    reason: e.to_string(),
                })
            };

            let parameters = decl
                .params
                .iter()
                .enumerate()
                .map(|(index, param)| {
                    Ok(ParameterInfo {
                        name: param.name.clone(),
                        type_info: resolve(&param.ty)?,
                        index,
                    })
                })
                .collect::<ProxyResult<Vec<_>>>()?;
            let return_type = match &decl.returns {
                Some(ty) => resolve(ty)?,
                None => TypeDescriptor::unit(),
            };

            let method = MethodDescriptor::new(
                descriptor.id.clone(),
                decl.name.clone(),
                parameters,
                return_type,
                slot,
            );

            // Overloads must differ in their full parameter-type list
            let parameter_types: Vec<TypeDescriptor> =
                method.parameter_types().into_iter().cloned().collect();
            let overloads = by_name.entry(decl.name.clone()).or_default();
            if overloads
                .iter()
                .any(|&other| methods[other].matches_signature(&decl.name, &parameter_types))
            {
                return Err(ProxyError::Resolution {
                    interface: descriptor.id.to_string(),
                    method: decl.name.clone(),
                    reason: format!("signature {} is declared twice", method.signature()),
                });
            }
            overloads.push(slot);
            methods.push(Arc::new(method));
        }

        Ok(Self {
            interface: descriptor.id.clone(),
            interface_name: descriptor.name.clone(),
            name: implementation_name(&descriptor.name),
            unit: unit.to_string(),
            methods,
            by_name,
        })
    }

    /// Interface this implementation satisfies
    pub fn interface(&self) -> &InterfaceId {
        &self.interface
    }

    /// Interface name as declared
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// Derived implementation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label of the synthesis unit that produced this implementation
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// `unit::name`
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.unit, self.name)
    }

    /// Methods in slot order
    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    /// Method at a dispatch slot
    pub fn method(&self, slot: usize) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(slot)
    }

    /// All methods sharing a name, in declaration order
    pub fn overloads<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Arc<MethodDescriptor>> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&slot| &self.methods[slot])
    }

    /// Method with exactly this name and parameter-type list
    pub fn find(&self, name: &str, parameter_types: &[TypeDescriptor]) -> Option<&Arc<MethodDescriptor>> {
        self.overloads(name)
            .find(|method| method.matches_signature(name, parameter_types))
    }
}

/// An implementation bound to an interceptor
///
/// Cloning is cheap; clones share the same identity.
#[derive(Clone)]
pub struct ProxyInstance {
    id: ProxyId,
    implementation: Arc<ProxyImplementation>,
    interceptor: Arc<dyn Interceptor>,
}

impl ProxyInstance {
    pub(crate) fn new(implementation: Arc<ProxyImplementation>, interceptor: Arc<dyn Interceptor>) -> Self {
        Self {
            id: ProxyId::next(),
            implementation,
            interceptor,
        }
    }

    /// Instance identity
    pub fn id(&self) -> ProxyId {
        self.id
    }

    /// Interface this instance implements
    pub fn interface(&self) -> &InterfaceId {
        self.implementation.interface()
    }

    /// Shared implementation
    pub fn implementation(&self) -> &Arc<ProxyImplementation> {
        &self.implementation
    }

    /// Methods in slot order
    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        self.implementation.methods()
    }

    /// Check whether two handles share one interceptor
    pub fn shares_interceptor(&self, other: &ProxyInstance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.interceptor) as *const (),
            Arc::as_ptr(&other.interceptor) as *const (),
        )
    }

    /// Forward a call to the method at `slot`
    ///
    /// Returns the interceptor's result, or `Value::Null` for methods
    /// without a return type. An interceptor error is returned unchanged.
    pub fn dispatch(&self, slot: usize, args: Vec<Value>) -> anyhow::Result<Value> {
        let method = self
            .implementation
            .method(slot)
            .ok_or_else(|| ProxyError::MethodNotFound {
                interface: self.interface().to_string(),
                method: format!("#{}", slot),
            })?;
        self.forward(method, args)
    }

    /// Call a method by name with runtime-checked arguments
    ///
    /// When the name is overloaded, the overload is chosen by comparing the
    /// arguments with each candidate's full parameter-type list: exact
    /// matches first, then lossless coercions.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Value> {
        let method = self.select_overload(name, &args)?;
        self.invoke_method(method, args)
    }

    /// Call the overload with exactly this parameter-type list
    pub fn invoke_signature(
        &self,
        name: &str,
        parameter_types: &[TypeDescriptor],
        args: Vec<Value>,
    ) -> anyhow::Result<Value> {
        let method = self
            .implementation
            .find(name, parameter_types)
            .ok_or_else(|| ProxyError::MethodNotFound {
                interface: self.interface().to_string(),
                method: format!("{}({})", name, join_names(parameter_types.iter())),
            })?;
        self.invoke_method(method, args)
    }

    fn invoke_method(&self, method: &Arc<MethodDescriptor>, args: Vec<Value>) -> anyhow::Result<Value> {
        if args.len() != method.arity() {
            return Err(ProxyError::ArityMismatch {
                method: method.signature(),
                expected: method.arity(),
                got: args.len(),
            }
            .into());
        }

        let args = args
            .into_iter()
            .zip(method.parameters())
            .map(|(arg, param)| arg.coerce_to(&param.type_info))
            .collect::<ProxyResult<Vec<_>>>()?;

        let result = self.forward(method, args)?;
        Ok(result.coerce_to(method.return_type())?)
    }

    fn forward(&self, method: &Arc<MethodDescriptor>, args: Vec<Value>) -> anyhow::Result<Value> {
        tracing::trace!(
            proxy = self.id.as_u64(),
            interface = %self.interface(),
            method = %method.name(),
            slot = method.slot(),
            "forwarding call to interceptor"
        );

        let result = self.interceptor.intercept(CallContext::new(self, method, args))?;
        if method.returns_unit() {
            Ok(Value::Null)
        } else {
            Ok(result)
        }
    }

    fn select_overload(&self, name: &str, args: &[Value]) -> ProxyResult<&Arc<MethodDescriptor>> {
        let candidates: Vec<&Arc<MethodDescriptor>> = self.implementation.overloads(name).collect();
        if candidates.len() == 1 {
            return Ok(candidates[0]);
        }

        let same_arity: Vec<&Arc<MethodDescriptor>> = candidates
            .into_iter()
            .filter(|method| method.arity() == args.len())
            .collect();

        let exact: Vec<&Arc<MethodDescriptor>> = same_arity
            .iter()
            .copied()
            .filter(|method| {
                args.iter()
                    .zip(method.parameters())
                    .all(|(arg, param)| arg.conforms_to(&param.type_info))
            })
            .collect();
        let matches = if exact.is_empty() {
            same_arity
                .into_iter()
                .filter(|method| {
                    args.iter()
                        .zip(method.parameters())
                        .all(|(arg, param)| arg.clone().coerce_to(&param.type_info).is_ok())
                })
                .collect()
        } else {
            exact
        };

        match matches.len() {
            1 => Ok(matches[0]),
            0 => Err(ProxyError::MethodNotFound {
                interface: self.interface().to_string(),
                method: format!(
                    "{}({})",
                    name,
                    args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
                ),
            }),
            candidates => Err(ProxyError::AmbiguousMethod {
                interface: self.interface().to_string(),
                method: name.to_string(),
                candidates,
            }),
        }
    }
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("id", &self.id)
            .field("implementation", &self.implementation.qualified_name())
            .finish()
    }
}

fn join_names<'a>(types: impl Iterator<Item = &'a TypeDescriptor>) -> String {
    types.map(|ty| ty.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// An interface the factory can produce typed proxies for
///
/// Implemented by `#[proxy]` for `dyn Trait`; `bind` wraps an instance in
/// the generated forwarding type.
pub trait ProxyInterface {
    /// Interface identity (cache key)
    fn interface_id() -> InterfaceId;

    /// Full description, used on a cache miss
    fn descriptor() -> InterfaceDescriptor;

    /// Wrap a bound instance as the interface type
    fn bind(instance: ProxyInstance) -> Box<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDecl, MethodDecl};
    use crate::interceptor::interceptor_fn;
    use crate::types::TypeKind;

    fn echo() -> Arc<dyn Interceptor> {
        Arc::new(interceptor_fn(|call| Ok(call.first_arg().cloned().unwrap_or(Value::Null))))
    }

    fn calculator() -> InterfaceDescriptor {
        InterfaceDescriptor::named("tests::ICalculator")
            .method(MethodDecl::new("add").param("a", "i32").param("b", "i32").returns("i32"))
            .method(MethodDecl::new("add").param("a", "f64").param("b", "f64").returns("f64"))
            .method(MethodDecl::new("reset"))
    }

    fn instance(descriptor: &InterfaceDescriptor, interceptor: Arc<dyn Interceptor>) -> ProxyInstance {
        let implementation = ProxyImplementation::synthesize(descriptor, &TypeRegistry::new(), "tests").unwrap();
        ProxyInstance::new(Arc::new(implementation), interceptor)
    }

    #[test]
    fn test_implementation_name() {
        assert_eq!(implementation_name("ITestInterface"), "TestInterfaceProxy");
        assert_eq!(implementation_name("Greeter"), "GreeterProxy");
        assert_eq!(implementation_name("Iterator"), "IteratorProxy");
        assert_eq!(implementation_name("I"), "IProxy");
        assert_eq!(implementation_name("IO"), "OProxy");
        // Deterministic across runs
        assert_eq!(implementation_name("IStore"), implementation_name("IStore"));
    }

    #[test]
    fn test_synthesize_slots_and_names() {
        let implementation = ProxyImplementation::synthesize(&calculator(), &TypeRegistry::new(), "calc").unwrap();

        assert_eq!(implementation.name(), "CalculatorProxy");
        assert_eq!(implementation.qualified_name(), "calc::CalculatorProxy");
        assert_eq!(implementation.interface().as_str(), "tests::ICalculator");
        assert_eq!(implementation.methods().len(), 3);
        assert_eq!(implementation.overloads("add").count(), 2);
        assert_eq!(implementation.method(2).unwrap().name(), "reset");
        assert!(implementation.method(2).unwrap().returns_unit());

        let f64_ty = TypeDescriptor::primitive(TypeKind::F64);
        let found = implementation.find("add", &[f64_ty.clone(), f64_ty]).unwrap();
        assert_eq!(found.slot(), 1);
    }

    #[test]
    fn test_synthesize_rejects_fields() {
        let descriptor = InterfaceDescriptor::named("IHasState")
            .method(MethodDecl::new("get").returns("i32"))
            .field(FieldDecl::new("state", "i32"));

        let err = ProxyImplementation::synthesize(&descriptor, &TypeRegistry::new(), "tests").unwrap_err();
        assert!(matches!(err, ProxyError::Construction { .. }));
    }

    #[test]
    fn test_synthesize_unresolvable_type() {
        let descriptor = InterfaceDescriptor::named("IRepo")
            .method(MethodDecl::new("load").param("id", "u64").returns("Customer"));

        let err = ProxyImplementation::synthesize(&descriptor, &TypeRegistry::new(), "tests").unwrap_err();
        assert_eq!(
            err,
            ProxyError::Resolution {
                interface: "IRepo".to_string(),
                method: "load".to_string(),
                reason: "unknown type 'Customer'".to_string(),
            }
        );
    }

    #[test]
    fn test_synthesize_duplicate_signature() {
        let descriptor = InterfaceDescriptor::named("IDup")
            .method(MethodDecl::new("put").param("v", "i32"))
            .method(MethodDecl::new("put").param("other", "i32").returns("bool"));

        let err = ProxyImplementation::synthesize(&descriptor, &TypeRegistry::new(), "tests").unwrap_err();
        assert!(matches!(err, ProxyError::Resolution { ref method, .. } if method == "put"));
    }

    #[test]
    fn test_dispatch_forwards_and_discards_unit() {
        let proxy = instance(&calculator(), echo());

        assert_eq!(proxy.dispatch(0, vec![Value::I32(4), Value::I32(5)]).unwrap(), Value::I32(4));
        // reset() returns nothing: echo's result is discarded
        assert_eq!(proxy.dispatch(2, vec![]).unwrap(), Value::Null);

        let err = proxy.dispatch(9, vec![]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProxyError>(),
            Some(ProxyError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn test_invoke_selects_overload_by_parameter_types() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let proxy = instance(
            &calculator(),
            Arc::new(interceptor_fn(move |call| {
                record.lock().push(call.method().slot());
                Ok(call.first_arg().cloned().unwrap_or_default())
            })),
        );

        assert_eq!(proxy.invoke("add", vec![Value::I32(1), Value::I32(2)]).unwrap(), Value::I32(1));
        assert_eq!(proxy.invoke("add", vec![Value::F64(1.5), Value::F64(2.0)]).unwrap(), Value::F64(1.5));
        // f32 arguments only coerce losslessly to the f64 overload
        assert_eq!(proxy.invoke("add", vec![Value::F32(0.5), Value::F32(1.0)]).unwrap(), Value::F64(0.5));
        assert_eq!(*seen.lock(), vec![0, 1, 1]);
    }

    #[test]
    fn test_invoke_rejects_bad_arguments() {
        let proxy = instance(&calculator(), echo());

        let err = proxy.invoke("add", vec![Value::from("x"), Value::I32(1)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProxyError>(),
            Some(ProxyError::MethodNotFound { .. })
        ));

        let err = proxy.invoke("reset", vec![Value::I32(1)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProxyError>(),
            Some(ProxyError::ArityMismatch { expected: 0, got: 1, .. })
        ));

        let err = proxy.invoke("missing", vec![]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProxyError>(),
            Some(ProxyError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn test_invoke_ambiguous_overloads() {
        let descriptor = InterfaceDescriptor::named("ISink")
            .method(MethodDecl::new("write").param("v", "i64"))
            .method(MethodDecl::new("write").param("v", "u64"));
        let proxy = instance(&descriptor, echo());

        // i32 coerces losslessly to both i64 and u64
        let err = proxy.invoke("write", vec![Value::I32(7)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProxyError>(),
            Some(ProxyError::AmbiguousMethod { candidates: 2, .. })
        ));

        // The full signature resolves it
        let i64_ty = TypeDescriptor::primitive(TypeKind::I64);
        assert!(proxy.invoke_signature("write", &[i64_ty], vec![Value::I32(7)]).is_ok());
    }

    #[test]
    fn test_invoke_checks_return_type() {
        let descriptor = InterfaceDescriptor::named("ICounter")
            .method(MethodDecl::new("count").returns("u32"));
        let proxy = instance(&descriptor, Arc::new(interceptor_fn(|_| Ok(Value::from("many")))));

        let err = proxy.invoke("count", vec![]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProxyError>(),
            Some(ProxyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_clones_share_identity() {
        let proxy = instance(&calculator(), echo());
        let other = proxy.clone();
        assert_eq!(proxy.id(), other.id());
        assert!(proxy.shares_interceptor(&other));

        let fresh = instance(&calculator(), echo());
        assert_ne!(proxy.id(), fresh.id());
        assert!(!proxy.shares_interceptor(&fresh));
    }
}
