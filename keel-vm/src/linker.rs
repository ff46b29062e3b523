//! Import resolution.
//!
//! A [`Resolver`] maps `(module, name, expected type)` triples to runtime
//! objects. [`link`] runs every import through one and reports all
//! failures at once. [`StubResolver`] backstops a fallback resolver with
//! synthetic objects so unresolved imports only fail when actually used.

use keel_types::{
    ExternType,
    InternedFuncType,
    Value,
};
use tracing::warn;

use crate::{
    engine::LoadedModule,
    error::MissingImport,
    runtime::{
        Compartment,
        Object,
    },
    LinkError,
    Trap,
    TrapKind,
};

/// Supplies objects for imports.
pub trait Resolver {
    /// Resolve one import, or decline with `None`.
    fn resolve(&self, module: &str, name: &str, expected: &ExternType) -> Option<Object>;
}

/// Resolves nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl Resolver for NullResolver {
    fn resolve(&self, _: &str, _: &str, _: &ExternType) -> Option<Object> {
        None
    }
}

/// A resolver backed by a list of instances or explicit objects; the
/// usual way to wire instantiations together.
#[derive(Default)]
pub struct ModuleResolver {
    entries: Vec<(String, String, Object)>,
    instances: Vec<(String, crate::runtime::Instance)>,
}

impl ModuleResolver {
    /// An empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a single object as `module.name`.
    pub fn define(&mut self, module: &str, name: &str, object: Object) -> &mut Self {
        self.entries.push((module.into(), name.into(), object));
        self
    }

    /// Expose every export of an instance under a module namespace.
    pub fn define_instance(
        &mut self,
        module: &str,
        instance: crate::runtime::Instance,
    ) -> &mut Self {
        self.instances.push((module.into(), instance));
        self
    }
}

impl Resolver for ModuleResolver {
    fn resolve(&self, module: &str, name: &str, _: &ExternType) -> Option<Object> {
        if let Some(object) = self
            .entries
            .iter()
            .find(|(m, n, _)| m == module && n == name)
            .map(|(_, _, object)| object.clone())
        {
            return Some(object);
        }
        self.instances
            .iter()
            .find(|(m, _)| m == module)
            .and_then(|(_, instance)| instance.export(name))
    }
}

/// The imports of one module, resolved in declaration order.
#[derive(Debug, Default)]
pub struct ResolvedImports {
    pub(crate) objects: Vec<Object>,
}

/// Whether a concrete object satisfies an import's declared type:
/// exact interned-type equality for functions and tags, limit inclusion
/// for tables and memories, exact match for globals.
fn satisfies(object: &ExternType, declared: &ExternType) -> bool {
    match (object, declared) {
        (ExternType::Func(have), ExternType::Func(want)) => have == want,
        (ExternType::Tag(have), ExternType::Tag(want)) => have == want,
        (ExternType::Table(have), ExternType::Table(want)) => {
            have.elem == want.elem && have.limits.satisfies(&want.limits)
        }
        (ExternType::Memory(have), ExternType::Memory(want)) => {
            have.shared == want.shared && have.limits.satisfies(&want.limits)
        }
        (ExternType::Global(have), ExternType::Global(want)) => have == want,
        _ => false,
    }
}

/// The declared extern type of each import, with type indices resolved.
pub(crate) fn import_types(loaded: &LoadedModule) -> Vec<ExternType> {
    use keel_module::ImportDesc;

    loaded
        .module
        .imports
        .iter()
        .map(|import| match &import.desc {
            ImportDesc::Func { type_index } => {
                ExternType::Func(loaded.module.types[*type_index as usize].clone())
            }
            ImportDesc::Table(ty) => ExternType::Table(*ty),
            ImportDesc::Memory(ty) => ExternType::Memory(*ty),
            ImportDesc::Global(ty) => ExternType::Global(*ty),
            ImportDesc::Tag { type_index } => {
                ExternType::Tag(loaded.module.types[*type_index as usize].clone())
            }
        })
        .collect()
}

/// Resolve every import of `loaded` against `resolver` for use in
/// `compartment`. All failures are collected before reporting.
pub fn link(
    compartment: &Compartment,
    loaded: &LoadedModule,
    resolver: &dyn Resolver,
) -> Result<ResolvedImports, LinkError> {
    let mut objects = Vec::with_capacity(loaded.module.imports.len());
    let mut missing = Vec::new();

    for (import, declared) in loaded.module.imports.iter().zip(import_types(loaded)) {
        match resolver.resolve(&import.module, &import.name, &declared) {
            Some(object) if satisfies(&object.extern_type(), &declared) => {
                if object.compartment_id() != compartment.id() {
                    return Err(LinkError::CrossCompartment {
                        module: import.module.clone(),
                        name: import.name.clone(),
                    });
                }
                objects.push(object);
            }
            _ => missing.push(MissingImport {
                module: import.module.clone(),
                name: import.name.clone(),
                ty: declared,
            }),
        }
    }

    if missing.is_empty() {
        Ok(ResolvedImports { objects })
    } else {
        Err(LinkError::MissingImports { missing })
    }
}

/// Wraps a fallback resolver and synthesizes an object for anything it
/// declines: a trapping stub function, an empty table or memory, a
/// zero global, a fresh tag.
pub struct StubResolver<'a> {
    compartment: &'a Compartment,
    fallback: &'a dyn Resolver,
}

impl<'a> StubResolver<'a> {
    /// Wrap `fallback`, creating stubs inside `compartment`.
    pub fn new(compartment: &'a Compartment, fallback: &'a dyn Resolver) -> Self {
        Self {
            compartment,
            fallback,
        }
    }

    fn stub_function(&self, module: &str, name: &str, ty: &InternedFuncType) -> Object {
        let debug_name = format!("stub!{module}.{name}");
        warn!(module, name, "stubbing unresolved function import");
        let function = self.compartment.create_host_function(
            ty.clone(),
            &debug_name,
            std::sync::Arc::new(move |_ctx, _args| {
                Err(Trap::new(TrapKind::CalledUnimplementedIntrinsic))
            }),
        );
        Object::Function(function)
    }
}

impl Resolver for StubResolver<'_> {
    fn resolve(&self, module: &str, name: &str, expected: &ExternType) -> Option<Object> {
        if let Some(object) = self.fallback.resolve(module, name, expected) {
            return Some(object);
        }
        let object = match expected {
            ExternType::Func(ty) => self.stub_function(module, name, ty),
            ExternType::Table(ty) => {
                warn!(module, name, "stubbing unresolved table import");
                Object::Table(self.compartment.create_table(*ty))
            }
            ExternType::Memory(ty) => {
                warn!(module, name, "stubbing unresolved memory import");
                Object::Memory(self.compartment.create_memory(*ty).ok()?)
            }
            ExternType::Global(ty) => {
                warn!(module, name, "stubbing unresolved global import");
                Object::Global(
                    self.compartment
                        .create_global(*ty, Value::zero(ty.ty)),
                )
            }
            ExternType::Tag(ty) => {
                warn!(module, name, "stubbing unresolved tag import");
                Object::Tag(
                    self.compartment
                        .create_tag(ty.clone(), &format!("stub!{module}.{name}")),
                )
            }
        };
        Some(object)
    }
}
