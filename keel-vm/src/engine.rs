//! The engine facade: feature configuration and the module load
//! pipeline.

use std::sync::Arc;

use keel_module::{
    validate_module,
    Module,
    ModuleInfo,
    ValidationError,
};
use keel_ops::FeatureSet;
use tracing::debug;

use crate::{
    exec::{
        arity_resolver,
        CodeUnit,
        CompiledFunc,
        SideTable,
    },
    runtime::Compartment,
};

/// A validated module plus its compiled code unit, ready to instantiate
/// any number of times.
pub struct LoadedModule {
    pub(crate) module: Module,
    pub(crate) info: ModuleInfo,
    pub(crate) code: Arc<CodeUnit>,
}

impl LoadedModule {
    /// The underlying immutable module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Facts proven during validation.
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoadedModule({} functions)", self.module.code.len())
    }
}

/// The engine: a feature configuration and the entry points that depend
/// on it.
#[derive(Debug, Clone)]
pub struct Engine {
    features: FeatureSet,
}

impl Engine {
    /// An engine with the given feature set.
    pub fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    /// The configured feature set.
    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Create an empty compartment.
    pub fn create_compartment(&self) -> Compartment {
        Compartment::new()
    }

    /// Validate a module and build its code unit. Nothing observable runs
    /// until instantiation.
    pub fn load(&self, module: Module) -> Result<Arc<LoadedModule>, ValidationError> {
        let info = validate_module(&module, self.features)?;

        let mut functions = Vec::with_capacity(module.code.len());
        for (defined, body) in module.code.iter().enumerate() {
            let func_index = module.imported_funcs() + defined;
            let type_index = module
                .func_type_index(func_index as u32)
                .expect("validated function index");
            let ty = module.types[type_index as usize].clone();
            let side = SideTable::build(&body.ops, arity_resolver(&module.types));
            let debug_name = module
                .exports
                .iter()
                .find(|export| {
                    export.kind == keel_types::ExternKind::Func
                        && export.index as usize == func_index
                })
                .map(|export| export.name.clone())
                .unwrap_or_else(|| format!("func[{func_index}]"));
            functions.push(CompiledFunc {
                ty,
                locals: body.iter_locals().collect(),
                ops: body.ops.clone(),
                side,
                debug_name,
            });
        }
        debug!(functions = functions.len(), "module loaded");
        Ok(Arc::new(LoadedModule {
            module,
            info,
            code: Arc::new(CodeUnit { functions }),
        }))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(FeatureSet::standard())
    }
}
