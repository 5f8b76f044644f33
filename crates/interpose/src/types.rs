//! Static type metadata for interface methods
//!
//! A [`TypeDescriptor`] describes the declared shape of one parameter or
//! return value. Interfaces described at runtime name their types as
//! strings; the [`TypeRegistry`] resolves those names during synthesis.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::{ProxyError, ProxyResult};

/// Type kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No value (methods without a return type)
    Unit,
    /// Boolean
    Bool,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Owned UTF-8 string
    String,
    /// Any value at all
    Dynamic,
    /// Host object, identified by its Rust type name
    Object,
    /// Value or null
    Optional,
    /// Homogeneous list
    List,
}

impl TypeKind {
    /// Canonical name of a non-parameterized kind
    pub const fn canonical_name(self) -> &'static str {
        match self {
            TypeKind::Unit => "()",
            TypeKind::Bool => "bool",
            TypeKind::I32 => "i32",
            TypeKind::I64 => "i64",
            TypeKind::U32 => "u32",
            TypeKind::U64 => "u64",
            TypeKind::F32 => "f32",
            TypeKind::F64 => "f64",
            TypeKind::String => "String",
            TypeKind::Dynamic => "Value",
            TypeKind::Object => "object",
            TypeKind::Optional => "Option",
            TypeKind::List => "Vec",
        }
    }

    const PRIMITIVES: [TypeKind; 10] = [
        TypeKind::Unit,
        TypeKind::Bool,
        TypeKind::I32,
        TypeKind::I64,
        TypeKind::U32,
        TypeKind::U64,
        TypeKind::F32,
        TypeKind::F64,
        TypeKind::String,
        TypeKind::Dynamic,
    ];
}

const NARROW_ALIASES: [(&str, TypeKind); 7] = [
    ("i8", TypeKind::I32),
    ("i16", TypeKind::I32),
    ("u8", TypeKind::U32),
    ("u16", TypeKind::U32),
    ("isize", TypeKind::I64),
    ("usize", TypeKind::U64),
    ("char", TypeKind::U32),
];

/// Resolved type information
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Type kind
    pub kind: TypeKind,
    /// Canonical type name (`i32`, `Option<String>`, `my_crate::Point`)
    pub name: String,
    /// Element type (for `Optional` and `List`)
    pub element: Option<Box<TypeDescriptor>>,
}

impl TypeDescriptor {
    /// The "no value" type
    pub fn unit() -> Self {
        Self::primitive(TypeKind::Unit)
    }

    /// The type accepting any value
    pub fn dynamic() -> Self {
        Self::primitive(TypeKind::Dynamic)
    }

    /// Create a type descriptor for a non-parameterized kind
    ///
    /// `Object`, `Optional` and `List` need extra information; use
    /// [`TypeDescriptor::object`], [`TypeDescriptor::optional`] and
    /// [`TypeDescriptor::list`] for those.
    pub fn primitive(kind: TypeKind) -> Self {
        Self {
            kind,
            name: kind.canonical_name().to_string(),
            element: None,
        }
    }

    /// Create a host object type descriptor
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Object,
            name: name.into(),
            element: None,
        }
    }

    /// Create an optional type descriptor
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self {
            kind: TypeKind::Optional,
            name: format!("Option<{}>", inner.name),
            element: Some(Box::new(inner)),
        }
    }

    /// Create a list type descriptor
    pub fn list(element: TypeDescriptor) -> Self {
        Self {
            kind: TypeKind::List,
            name: format!("Vec<{}>", element.name),
            element: Some(Box::new(element)),
        }
    }

    /// Check whether this is the "no value" type
    pub fn is_unit(&self) -> bool {
        self.kind == TypeKind::Unit
    }

    /// Element type of an `Optional` or `List`
    pub fn element(&self) -> Option<&TypeDescriptor> {
        self.element.as_deref()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Why a type name failed to resolve
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeResolveError {
    /// Nothing is registered under the name
    #[error("unknown type '{0}'")]
    Unknown(String),

    /// A short name matches several qualified registrations
    #[error("type name '{name}' is ambiguous between {}", .candidates.join(", "))]
    Ambiguous {
        /// Requested short name
        name: String,
        /// Matching qualified names, sorted
        candidates: Vec<String>,
    },

    /// A generic form (`Option<..>`, `Vec<..>`) is malformed
    #[error("malformed type name '{0}'")]
    Malformed(String),
}

/// Registry of type names available to runtime-described interfaces
///
/// Prepopulated with the primitive kinds. Host object types must be
/// registered before an interface naming them is synthesized.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: FxHashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Create a registry containing the primitive types
    pub fn new() -> Self {
        let mut types = FxHashMap::default();
        for kind in TypeKind::PRIMITIVES {
            let descriptor = TypeDescriptor::primitive(kind);
            types.insert(descriptor.name.clone(), descriptor);
        }
        // Narrow Rust types travel in a wider kind
        for (alias, kind) in NARROW_ALIASES {
            types.insert(alias.to_string(), TypeDescriptor::primitive(kind));
        }
        Self { types }
    }

    /// Register a descriptor under a name
    ///
    /// Registering the same descriptor twice is a no-op. A different
    /// descriptor under an existing name is rejected.
    pub fn register(&mut self, name: impl Into<String>, descriptor: TypeDescriptor) -> ProxyResult<()> {
        let name = name.into();
        match self.types.get(&name) {
            Some(existing) if *existing == descriptor => Ok(()),
            Some(_) => Err(ProxyError::DuplicateRegistration { name }),
            None => {
                self.types.insert(name, descriptor);
                Ok(())
            }
        }
    }

    /// Register host object type `T` under its Rust type name
    pub fn register_object<T: 'static>(&mut self) -> ProxyResult<TypeDescriptor> {
        let descriptor = TypeDescriptor::object(std::any::type_name::<T>());
        self.register(descriptor.name.clone(), descriptor.clone())?;
        Ok(descriptor)
    }

    /// Resolve a type name to its descriptor
    ///
    /// Exact names win. `Option<X>` and `Vec<X>` resolve recursively. A
    /// short name without a path matches registrations ending in `::name`
    /// and must match exactly one of them.
    pub fn resolve(&self, name: &str) -> Result<TypeDescriptor, TypeResolveError> {
        let name = name.trim();
        if let Some(descriptor) = self.types.get(name) {
            return Ok(descriptor.clone());
        }

        if let Some(inner) = generic_argument(name, "Option")? {
            return Ok(TypeDescriptor::optional(self.resolve(inner)?));
        }
        if let Some(inner) = generic_argument(name, "Vec")? {
            return Ok(TypeDescriptor::list(self.resolve(inner)?));
        }

        if name.is_empty() || name.contains("::") {
            return Err(TypeResolveError::Unknown(name.to_string()));
        }

        let suffix = format!("::{}", name);
        let mut candidates: Vec<&String> = self
            .types
            .keys()
            .filter(|key| key.ends_with(&suffix))
            .collect();
        match candidates.len() {
            0 => Err(TypeResolveError::Unknown(name.to_string())),
            1 => Ok(self.types[candidates[0]].clone()),
            _ => {
                candidates.sort();
                Err(TypeResolveError::Ambiguous {
                    name: name.to_string(),
                    candidates: candidates.into_iter().cloned().collect(),
                })
            }
        }
    }

    /// Check if a name is registered exactly
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `Wrapper<Inner>` and return `Inner`, if `name` uses that wrapper
fn generic_argument<'a>(name: &'a str, wrapper: &str) -> Result<Option<&'a str>, TypeResolveError> {
    let Some(rest) = name.strip_prefix(wrapper) else {
        return Ok(None);
    };
    let Some(rest) = rest.trim_start().strip_prefix('<') else {
        return Ok(None);
    };
    match rest.strip_suffix('>') {
        Some(inner) if !inner.trim().is_empty() => Ok(Some(inner)),
        _ => Err(TypeResolveError::Malformed(name.to_string())),
    }
}
