//! Proxy factory
//!
//! A [`ProxyFactory`] owns one interceptor and a cache of synthesized
//! implementations keyed by interface identity. The first request for an
//! interface synthesizes its implementation; every later request, from any
//! thread, reuses it. Each request returns a fresh instance bound to the
//! factory's interceptor.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::descriptor::{InterfaceDescriptor, InterfaceId};
use crate::error::{ProxyError, ProxyResult};
use crate::interceptor::Interceptor;
use crate::proxy::{ProxyImplementation, ProxyInstance, ProxyInterface};
use crate::types::{TypeDescriptor, TypeRegistry};

/// Factory configuration
#[derive(Clone, Default)]
pub struct FactoryOptions {
    /// Interceptor every proxy forwards to (required)
    pub interceptor: Option<Arc<dyn Interceptor>>,

    /// Synthesis-unit label; defaults to the interceptor's type name
    pub naming_hint: Option<String>,

    /// Types available to runtime-described interfaces
    pub types: TypeRegistry,
}

impl FactoryOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interceptor
    pub fn interceptor<I: Interceptor + 'static>(self, interceptor: I) -> Self {
        self.shared_interceptor(Arc::new(interceptor))
    }

    /// Set an interceptor that is already shared
    pub fn shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Set the synthesis-unit label
    pub fn naming_hint(mut self, hint: impl Into<String>) -> Self {
        self.naming_hint = Some(hint.into());
        self
    }

    /// Replace the type registry
    pub fn types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    /// Register a named type
    pub fn register_type(mut self, name: impl Into<String>, descriptor: TypeDescriptor) -> ProxyResult<Self> {
        self.types.register(name, descriptor)?;
        Ok(self)
    }

    /// Register host object type `T`
    pub fn register_object<T: 'static>(mut self) -> ProxyResult<Self> {
        self.types.register_object::<T>()?;
        Ok(self)
    }
}

impl fmt::Debug for FactoryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryOptions")
            .field("interceptor", &self.interceptor.as_ref().map(|i| i.name()))
            .field("naming_hint", &self.naming_hint)
            .field("types", &self.types.len())
            .finish()
    }
}

/// Creates proxies whose every call is forwarded to one interceptor
pub struct ProxyFactory {
    interceptor: Arc<dyn Interceptor>,
    unit: String,
    types: TypeRegistry,
    /// Synthesized implementations by interface identity. Synthesis holds
    /// the shard write lock of the interface being built.
    cache: DashMap<InterfaceId, Arc<ProxyImplementation>>,
    syntheses: AtomicUsize,
}

impl ProxyFactory {
    /// Create a factory from options
    ///
    /// Fails with `Configuration` when no interceptor is set.
    pub fn with_options(options: FactoryOptions) -> ProxyResult<Self> {
        let FactoryOptions {
            interceptor,
            naming_hint,
            types,
        } = options;

        let interceptor = interceptor.ok_or_else(|| ProxyError::Configuration {
            reason: "an interceptor is required to create proxies".to_string(),
        })?;
        Ok(Self::from_parts(interceptor, naming_hint, types))
    }

    /// Create a factory owning `interceptor`
    pub fn new<I: Interceptor + 'static>(interceptor: I) -> Self {
        Self::shared(Arc::new(interceptor))
    }

    /// Create a factory around a shared interceptor
    pub fn shared(interceptor: Arc<dyn Interceptor>) -> Self {
        Self::from_parts(interceptor, None, TypeRegistry::new())
    }

    /// Create a factory with a default-constructed interceptor
    pub fn with_default<I: Interceptor + Default + 'static>() -> Self {
        Self::new(I::default())
    }

    fn from_parts(interceptor: Arc<dyn Interceptor>, naming_hint: Option<String>, types: TypeRegistry) -> Self {
        let unit = naming_hint.unwrap_or_else(|| interceptor.name().to_string());
        tracing::debug!(unit = %unit, types = types.len(), "created proxy factory");

        Self {
            interceptor,
            unit,
            types,
            cache: DashMap::new(),
            syntheses: AtomicUsize::new(0),
        }
    }

    /// Create a typed proxy for interface `I`
    ///
    /// `I` is a `dyn Trait` annotated with `#[proxy]`.
    pub fn create_proxy<I: ProxyInterface + ?Sized>(&self) -> ProxyResult<Box<I>> {
        let implementation = self.implementation_for(I::interface_id(), I::descriptor)?;
        Ok(I::bind(self.instantiate(implementation)))
    }

    /// Create a typed proxy behind an `Arc`
    pub fn create_shared<I: ProxyInterface + ?Sized>(&self) -> ProxyResult<Arc<I>> {
        self.create_proxy::<I>().map(Arc::from)
    }

    /// Create a proxy for an interface described at runtime
    pub fn create_dynamic(&self, descriptor: &InterfaceDescriptor) -> ProxyResult<ProxyInstance> {
        let implementation = self.implementation_for(descriptor.id.clone(), || descriptor.clone())?;
        Ok(self.instantiate(implementation))
    }

    /// Cached implementation for `id`, synthesizing it on first request
    ///
    /// `describe` and synthesis run at most once per interface, while the
    /// vacant entry holds its `DashMap` shard's write lock. Requests for
    /// other interfaces hashed to the same shard wait until synthesis
    /// finishes; cache hits on other shards do not. `describe` must not
    /// call back into this factory.
    fn implementation_for(
        &self,
        id: InterfaceId,
        describe: impl FnOnce() -> InterfaceDescriptor,
    ) -> ProxyResult<Arc<ProxyImplementation>> {
        if let Some(cached) = self.cache.get(&id) {
            tracing::trace!(interface = %id, "proxy implementation cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        match self.cache.entry(id) {
            // Another thread synthesized it between the lookup and the entry lock
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let descriptor = describe();
                let implementation = Arc::new(ProxyImplementation::synthesize(
                    &descriptor,
                    &self.types,
                    &self.unit,
                )?);
                self.syntheses.fetch_add(1, Ordering::Relaxed);

                tracing::debug!(
                    interface = %entry.key(),
                    implementation = %implementation.qualified_name(),
                    methods = implementation.methods().len(),
                    "synthesized proxy implementation"
                );
                entry.insert(Arc::clone(&implementation));
                Ok(implementation)
            }
        }
    }

    fn instantiate(&self, implementation: Arc<ProxyImplementation>) -> ProxyInstance {
        ProxyInstance::new(implementation, Arc::clone(&self.interceptor))
    }

    /// The interceptor shared by every proxy of this factory
    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }

    /// Synthesis-unit label
    pub fn unit_name(&self) -> &str {
        &self.unit
    }

    /// Types available to runtime-described interfaces
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Check whether an implementation is cached for `id`
    pub fn is_cached(&self, id: &InterfaceId) -> bool {
        self.cache.contains_key(id)
    }

    /// Number of cached implementations
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of syntheses performed
    pub fn synthesis_count(&self) -> usize {
        self.syntheses.load(Ordering::Relaxed)
    }

    /// Cached implementation for `id`
    pub fn implementation(&self, id: &InterfaceId) -> Option<Arc<ProxyImplementation>> {
        self.cache.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("interceptor", &self.interceptor.name())
            .field("unit", &self.unit)
            .field("cached", &self.cache.len())
            .field("syntheses", &self.synthesis_count())
            .finish()
    }
}
