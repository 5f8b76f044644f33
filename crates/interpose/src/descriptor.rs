//! Interface and method descriptors
//!
//! An [`InterfaceDescriptor`] is the input to synthesis: the interface's
//! identity plus its declared members, with types given as [`TypeRef`]s.
//! Synthesis resolves it into one immutable [`MethodDescriptor`] per method.

use std::fmt;

use crate::convert::ValueType;
use crate::types::{TypeDescriptor, TypeRegistry, TypeResolveError};

/// Identity of an interface (its fully qualified name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(String);

impl InterfaceId {
    /// Create an interface identity
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self(qualified_name.into())
    }

    /// Fully qualified name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment
    pub fn short_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InterfaceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Reference to a parameter or return type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Resolved by name through the factory's `TypeRegistry`
    Named(String),
    /// Already resolved (generated proxies use this)
    Resolved(TypeDescriptor),
}

impl TypeRef {
    /// Reference a type by name
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Reference a Rust type through its `ValueType` descriptor
    pub fn of<T: ValueType>() -> Self {
        TypeRef::Resolved(T::type_descriptor())
    }

    /// Resolve against a registry
    pub fn resolve(&self, registry: &TypeRegistry) -> Result<TypeDescriptor, TypeResolveError> {
        match self {
            TypeRef::Named(name) => registry.resolve(name),
            TypeRef::Resolved(descriptor) => Ok(descriptor.clone()),
        }
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::named(name)
    }
}

impl From<TypeDescriptor> for TypeRef {
    fn from(descriptor: TypeDescriptor) -> Self {
        TypeRef::Resolved(descriptor)
    }
}

/// Declared parameter of a method
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeRef,
}

/// Declared method of an interface
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    /// Method name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<ParamDecl>,
    /// Return type (`None` = no value)
    pub returns: Option<TypeRef>,
}

impl MethodDecl {
    /// Create a method declaration with no parameters and no return value
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Set return type
    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns = Some(ty.into());
        self
    }
}

/// Declared data member. Interfaces containing one cannot be proxied.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeRef,
}

impl FieldDecl {
    /// Create a field declaration
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Interface member
#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    /// Method
    Method(MethodDecl),
    /// Data member
    Field(FieldDecl),
}

/// Description of an interface to proxy
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescriptor {
    /// Interface identity (cache key)
    pub id: InterfaceId,
    /// Interface name as declared
    pub name: String,
    /// Members in declaration order
    pub members: Vec<MemberDecl>,
}

impl InterfaceDescriptor {
    /// Create an empty interface description
    pub fn new(id: impl Into<InterfaceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Create an interface whose identity is its name
    pub fn named(name: &str) -> Self {
        Self::new(name, InterfaceId::new(name).short_name())
    }

    /// Add a method
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.members.push(MemberDecl::Method(method));
        self
    }

    /// Add a data member
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.members.push(MemberDecl::Field(field));
        self
    }

    /// Declared methods in order
    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            MemberDecl::Method(method) => Some(method),
            MemberDecl::Field(_) => None,
        })
    }

    /// Declared data members in order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            MemberDecl::Field(field) => Some(field),
            MemberDecl::Method(_) => None,
        })
    }
}

/// Resolved parameter information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Parameter type info
    pub type_info: TypeDescriptor,
    /// Parameter index
    pub index: usize,
}

/// Resolved, immutable metadata of one interface method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    interface: InterfaceId,
    name: String,
    parameters: Vec<ParameterInfo>,
    return_type: TypeDescriptor,
    slot: usize,
}

impl MethodDescriptor {
    pub(crate) fn new(
        interface: InterfaceId,
        name: String,
        parameters: Vec<ParameterInfo>,
        return_type: TypeDescriptor,
        slot: usize,
    ) -> Self {
        Self {
            interface,
            name,
            parameters,
            return_type,
            slot,
        }
    }

    /// Owning interface
    pub fn interface(&self) -> &InterfaceId {
        &self.interface
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    /// Parameter types in declaration order
    pub fn parameter_types(&self) -> Vec<&TypeDescriptor> {
        self.parameters.iter().map(|p| &p.type_info).collect()
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Declared return type
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    /// Whether the method returns no value
    pub fn returns_unit(&self) -> bool {
        self.return_type.is_unit()
    }

    /// Dispatch slot (declaration index among methods)
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Check name and full ordered parameter-type list
    pub fn matches_signature(&self, name: &str, parameter_types: &[TypeDescriptor]) -> bool {
        self.name == name
            && self.parameters.len() == parameter_types.len()
            && self
                .parameters
                .iter()
                .zip(parameter_types)
                .all(|(p, ty)| p.type_info == *ty)
    }

    /// Human-readable signature, e.g. `echo(Value) -> Value`
    pub fn signature(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| p.type_info.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if self.returns_unit() {
            format!("{}({})", self.name, params)
        } else {
            format!("{}({}) -> {}", self.name, params, self.return_type)
        }
    }
}
