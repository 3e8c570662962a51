// type_arena/term.rs
//
// TypeTerm: the canonical structural type representation. Terms are
// immutable; children are TypeId handles into the same arena.

use karst_frontend::{PrimType, PtrKind, Symbol};

use crate::decl::DeclId;

use super::type_id::{TypeId, TypeIdVec};

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeTerm {
    /// The type of already-reported errors; absorbing under unification.
    Error,
    Prim(PrimType),
    Ptr {
        kind: PtrKind,
        mutable: bool,
        addr_space: u32,
        pointee: TypeId,
    },
    /// Lvalue marker. Only ever the immediate type of an lvalue expression;
    /// never nested inside another term.
    Ref {
        mutable: bool,
        addr_space: u32,
        pointee: TypeId,
    },
    DefArray {
        elem: TypeId,
        dim: u64,
    },
    IndefArray {
        elem: TypeId,
    },
    Simd {
        elem: TypeId,
        lanes: u64,
    },
    Tuple(TypeIdVec),
    /// Function type in continuation style; the last op is the return
    /// continuation (itself a `Fn`) when the function returns normally.
    Fn(TypeIdVec),
    /// Nominal struct type; field types live in the field declarations.
    Struct {
        decl: DeclId,
    },
    /// Type-level abstraction binding one de Bruijn variable.
    Lambda {
        body: TypeId,
        name: Symbol,
    },
    /// De Bruijn variable; index 0 is bound by the innermost `Lambda`.
    Var(u32),
    /// Placeholder with identity equality, resolved by unification.
    Unknown(u32),
    /// The type of expressions that never return.
    NoRet,
}

impl TypeTerm {
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeTerm::Unknown(_))
    }

    /// Number of child type operands.
    pub fn num_ops(&self) -> usize {
        match self {
            TypeTerm::Error
            | TypeTerm::Prim(_)
            | TypeTerm::Struct { .. }
            | TypeTerm::Var(_)
            | TypeTerm::Unknown(_)
            | TypeTerm::NoRet => 0,
            TypeTerm::Ptr { .. }
            | TypeTerm::Ref { .. }
            | TypeTerm::DefArray { .. }
            | TypeTerm::IndefArray { .. }
            | TypeTerm::Simd { .. }
            | TypeTerm::Lambda { .. } => 1,
            TypeTerm::Tuple(ops) | TypeTerm::Fn(ops) => ops.len(),
        }
    }

    /// Child type operands in order.
    pub fn ops(&self) -> TypeIdVec {
        match self {
            TypeTerm::Ptr { pointee, .. } | TypeTerm::Ref { pointee, .. } => {
                std::iter::once(*pointee).collect()
            }
            TypeTerm::DefArray { elem, .. }
            | TypeTerm::IndefArray { elem }
            | TypeTerm::Simd { elem, .. } => std::iter::once(*elem).collect(),
            TypeTerm::Lambda { body, .. } => std::iter::once(*body).collect(),
            TypeTerm::Tuple(ops) | TypeTerm::Fn(ops) => ops.clone(),
            _ => TypeIdVec::new(),
        }
    }
}
