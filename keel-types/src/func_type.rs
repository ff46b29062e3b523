//! Function types and the process-wide interning registry.

use std::{
    collections::HashMap,
    fmt,
    hash::{
        Hash,
        Hasher,
    },
    sync::{
        Arc,
        Mutex,
        OnceLock,
    },
};

use crate::ValueType;

/// The shape of a function: ordered parameters and ordered results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    params: Box<[ValueType]>,
    results: Box<[ValueType]>,
}

impl FuncType {
    /// Build a function type from its parameter and result sequences.
    pub fn new(
        params: impl Into<Box<[ValueType]>>,
        results: impl Into<Box<[ValueType]>>,
    ) -> Self {
        Self {
            params: params.into(),
            results: results.into(),
        }
    }

    /// The parameter sequence.
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// The result sequence.
    pub fn results(&self) -> &[ValueType] {
        &self.results
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |f: &mut fmt::Formatter<'_>, types: &[ValueType]| {
            f.write_str("[")?;
            for (index, ty) in types.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{ty}")?;
            }
            f.write_str("]")
        };
        list(f, &self.params)?;
        f.write_str(" -> ")?;
        list(f, &self.results)
    }
}

/// An interned function type.
///
/// Two interned types wrap the same allocation iff they are structurally
/// equal, so equality and hashing are by pointer. Obtained through
/// [`InternedFuncType::intern`].
#[derive(Clone)]
pub struct InternedFuncType(Arc<FuncType>);

impl InternedFuncType {
    /// Intern a function type in the engine-wide registry.
    pub fn intern(ty: FuncType) -> Self {
        let mut registry = registry().lock().expect("type registry poisoned");
        Self(registry.intern(ty))
    }

    /// Shorthand for building and interning in one step.
    pub fn from_parts(params: &[ValueType], results: &[ValueType]) -> Self {
        Self::intern(FuncType::new(params, results))
    }
}

impl std::ops::Deref for InternedFuncType {
    type Target = FuncType;

    fn deref(&self) -> &FuncType {
        &self.0
    }
}

impl PartialEq for InternedFuncType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InternedFuncType {}

impl Hash for InternedFuncType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for InternedFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_ref())
    }
}

impl fmt::Display for InternedFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_ref())
    }
}

/// The registry backing [`InternedFuncType`]: a structural-hash bucket map
/// guarded by a single lock, initialized on first use.
#[derive(Default)]
struct TypeRegistry {
    buckets: HashMap<u64, Vec<Arc<FuncType>>>,
}

impl TypeRegistry {
    fn intern(&mut self, ty: FuncType) -> Arc<FuncType> {
        let key = structural_hash(&ty);
        let bucket = self.buckets.entry(key).or_default();
        if let Some(existing) = bucket.iter().find(|existing| ***existing == ty) {
            return Arc::clone(existing);
        }
        let interned = Arc::new(ty);
        bucket.push(Arc::clone(&interned));
        interned
    }
}

fn registry() -> &'static Mutex<TypeRegistry> {
    static REGISTRY: OnceLock<Mutex<TypeRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(Mutex::default)
}

fn structural_hash(ty: &FuncType) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    ty.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_types_share_an_allocation() {
        let a = InternedFuncType::from_parts(&[ValueType::I32], &[ValueType::I32]);
        let b = InternedFuncType::from_parts(&[ValueType::I32], &[ValueType::I32]);
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn distinct_types_do_not() {
        let a = InternedFuncType::from_parts(&[ValueType::I32], &[]);
        let b = InternedFuncType::from_parts(&[ValueType::I64], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn display_reads_like_a_signature() {
        let ty = FuncType::new([ValueType::I32, ValueType::F64], [ValueType::I64]);
        assert_eq!(ty.to_string(), "[i32, f64] -> [i64]");
    }
}
