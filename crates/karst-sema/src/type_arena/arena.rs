// type_arena/arena.rs
//
// TypeArena: per-compilation type storage with interning, pre-registered
// primitives, compound type builders, and type-level beta reduction.

use rustc_hash::FxHashMap;

use karst_frontend::{PrimType, PtrKind, Symbol};

use crate::decl::DeclId;

use super::term::TypeTerm;
use super::type_id::{TypeId, TypeIdVec};

/// Per-compilation type arena with automatic interning/deduplication.
///
/// Known-ness (whether a term transitively contains an `Unknown`) is computed
/// once at interning time and memoized alongside the term.
pub struct TypeArena {
    types: Vec<TypeTerm>,
    known: Vec<bool>,
    intern_map: FxHashMap<TypeTerm, TypeId>,
    /// Serial counter giving every `unknown()` a fresh identity.
    unknown_serial: u32,
    /// Memoized one-level beta reductions, keyed by (lambda, argument).
    app_cache: FxHashMap<(TypeId, TypeId), TypeId>,
}

impl std::fmt::Debug for TypeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeArena")
            .field("types_count", &self.types.len())
            .finish_non_exhaustive()
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    /// Create a new arena with all reserved types pre-interned.
    pub fn new() -> Self {
        let mut arena = Self {
            types: Vec::new(),
            known: Vec::new(),
            intern_map: FxHashMap::default(),
            unknown_serial: 0,
            app_cache: FxHashMap::default(),
        };

        let error = arena.intern(TypeTerm::Error);
        debug_assert_eq!(error, TypeId::ERROR);

        for prim in [
            PrimType::Bool,
            PrimType::I8,
            PrimType::I16,
            PrimType::I32,
            PrimType::I64,
            PrimType::ISize,
            PrimType::U8,
            PrimType::U16,
            PrimType::U32,
            PrimType::U64,
            PrimType::USize,
            PrimType::F32,
            PrimType::F64,
        ] {
            let id = arena.intern(TypeTerm::Prim(prim));
            debug_assert_eq!(id, TypeId::for_prim(prim));
        }

        let unit = arena.intern(TypeTerm::Tuple(TypeIdVec::new()));
        debug_assert_eq!(unit, TypeId::UNIT);
        let noret = arena.intern(TypeTerm::NoRet);
        debug_assert_eq!(noret, TypeId::NORET);
        debug_assert_eq!(arena.types.len() as u32, TypeId::FIRST_DYNAMIC);

        arena
    }

    fn intern(&mut self, term: TypeTerm) -> TypeId {
        if let Some(&id) = self.intern_map.get(&term) {
            return id;
        }
        let id = TypeId::from_raw(self.types.len() as u32);
        let known = self.compute_known(&term);
        self.intern_map.insert(term.clone(), id);
        self.types.push(term);
        self.known.push(known);
        id
    }

    fn compute_known(&self, term: &TypeTerm) -> bool {
        match term {
            TypeTerm::Unknown(_) => false,
            _ => term.ops().iter().all(|&op| self.is_known(op)),
        }
    }

    /// Get the term for a TypeId.
    pub fn term(&self, id: TypeId) -> &TypeTerm {
        &self.types[id.raw() as usize]
    }

    /// A type is known iff it contains no `Unknown`.
    #[inline]
    pub fn is_known(&self, id: TypeId) -> bool {
        self.known[id.raw() as usize]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn error(&self) -> TypeId {
        TypeId::ERROR
    }

    pub fn unit(&self) -> TypeId {
        TypeId::UNIT
    }

    pub fn noret(&self) -> TypeId {
        TypeId::NORET
    }

    pub fn prim(&self, prim: PrimType) -> TypeId {
        TypeId::for_prim(prim)
    }

    /// A fresh placeholder. Never equal to any other term.
    pub fn unknown(&mut self) -> TypeId {
        let serial = self.unknown_serial;
        self.unknown_serial += 1;
        self.intern(TypeTerm::Unknown(serial))
    }

    pub fn ptr(&mut self, kind: PtrKind, pointee: TypeId, mutable: bool, addr_space: u32) -> TypeId {
        self.intern(TypeTerm::Ptr {
            kind,
            mutable,
            addr_space,
            pointee,
        })
    }

    pub fn borrowed_ptr(&mut self, pointee: TypeId, mutable: bool, addr_space: u32) -> TypeId {
        self.ptr(PtrKind::Borrowed, pointee, mutable, addr_space)
    }

    pub fn owned_ptr(&mut self, pointee: TypeId, addr_space: u32) -> TypeId {
        self.ptr(PtrKind::Owned, pointee, true, addr_space)
    }

    pub fn ref_type(&mut self, pointee: TypeId, mutable: bool, addr_space: u32) -> TypeId {
        self.intern(TypeTerm::Ref {
            mutable,
            addr_space,
            pointee,
        })
    }

    pub fn def_array(&mut self, elem: TypeId, dim: u64) -> TypeId {
        self.intern(TypeTerm::DefArray { elem, dim })
    }

    pub fn indef_array(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeTerm::IndefArray { elem })
    }

    pub fn simd(&mut self, elem: TypeId, lanes: u64) -> TypeId {
        self.intern(TypeTerm::Simd { elem, lanes })
    }

    pub fn tuple(&mut self, ops: TypeIdVec) -> TypeId {
        self.intern(TypeTerm::Tuple(ops))
    }

    pub fn fn_type(&mut self, ops: TypeIdVec) -> TypeId {
        self.intern(TypeTerm::Fn(ops))
    }

    pub fn struct_type(&mut self, decl: DeclId) -> TypeId {
        self.intern(TypeTerm::Struct { decl })
    }

    pub fn lambda(&mut self, body: TypeId, name: Symbol) -> TypeId {
        self.intern(TypeTerm::Lambda { body, name })
    }

    pub fn var(&mut self, depth: u32) -> TypeId {
        self.intern(TypeTerm::Var(depth))
    }

    /// Canonicalize a return-continuation argument list: a tuple becomes the
    /// continuation's operand list, anything else a single operand.
    pub fn fn_from_type(&mut self, ty: TypeId) -> TypeId {
        match self.term(ty) {
            TypeTerm::Tuple(ops) => {
                let ops = ops.clone();
                self.fn_type(ops)
            }
            _ => self.fn_type(std::iter::once(ty).collect()),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn as_prim(&self, id: TypeId) -> Option<PrimType> {
        match self.term(id) {
            TypeTerm::Prim(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_ptr(&self, id: TypeId) -> Option<(PtrKind, TypeId, bool, u32)> {
        match self.term(id) {
            TypeTerm::Ptr {
                kind,
                pointee,
                mutable,
                addr_space,
            } => Some((*kind, *pointee, *mutable, *addr_space)),
            _ => None,
        }
    }

    pub fn as_ref_type(&self, id: TypeId) -> Option<(TypeId, bool, u32)> {
        match self.term(id) {
            TypeTerm::Ref {
                pointee,
                mutable,
                addr_space,
            } => Some((*pointee, *mutable, *addr_space)),
            _ => None,
        }
    }

    pub fn as_fn(&self, id: TypeId) -> Option<TypeIdVec> {
        match self.term(id) {
            TypeTerm::Fn(ops) => Some(ops.clone()),
            _ => None,
        }
    }

    pub fn as_tuple(&self, id: TypeId) -> Option<TypeIdVec> {
        match self.term(id) {
            TypeTerm::Tuple(ops) => Some(ops.clone()),
            _ => None,
        }
    }

    pub fn as_lambda(&self, id: TypeId) -> Option<(TypeId, Symbol)> {
        match self.term(id) {
            TypeTerm::Lambda { body, name } => Some((*body, *name)),
            _ => None,
        }
    }

    pub fn as_struct(&self, id: TypeId) -> Option<DeclId> {
        match self.term(id) {
            TypeTerm::Struct { decl } => Some(*decl),
            _ => None,
        }
    }

    pub fn is_unknown(&self, id: TypeId) -> bool {
        self.term(id).is_unknown()
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        self.as_prim(id).is_some_and(|p| p.is_int())
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        self.as_prim(id).is_some_and(|p| p.is_float())
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        id == TypeId::BOOL
    }

    /// Element type of either array form.
    pub fn array_elem(&self, id: TypeId) -> Option<TypeId> {
        match self.term(id) {
            TypeTerm::DefArray { elem, .. } | TypeTerm::IndefArray { elem } => Some(*elem),
            _ => None,
        }
    }

    /// Rebuild `proto`'s term with new child operands.
    pub fn rebuild(&mut self, proto: TypeId, ops: &[TypeId]) -> TypeId {
        debug_assert_eq!(self.term(proto).num_ops(), ops.len());
        match self.term(proto).clone() {
            TypeTerm::Ptr {
                kind,
                mutable,
                addr_space,
                ..
            } => self.ptr(kind, ops[0], mutable, addr_space),
            TypeTerm::Ref {
                mutable,
                addr_space,
                ..
            } => self.ref_type(ops[0], mutable, addr_space),
            TypeTerm::DefArray { dim, .. } => self.def_array(ops[0], dim),
            TypeTerm::IndefArray { .. } => self.indef_array(ops[0]),
            TypeTerm::Simd { lanes, .. } => self.simd(ops[0], lanes),
            TypeTerm::Tuple(_) => self.tuple(ops.iter().copied().collect()),
            TypeTerm::Fn(_) => self.fn_type(ops.iter().copied().collect()),
            TypeTerm::Lambda { name, .. } => self.lambda(ops[0], name),
            _ => proto,
        }
    }

    // ========================================================================
    // Function return conventions
    // ========================================================================

    /// The result type a call through this function type produces: the last
    /// operand's unpacked return when it is a continuation, `NoRet` otherwise.
    pub fn return_type(&mut self, fn_ty: TypeId) -> TypeId {
        if let Some(ops) = self.as_fn(fn_ty) {
            if let Some(&last) = ops.last() {
                if self.as_fn(last).is_some() {
                    return self.unpack_return_type(last);
                }
            }
        }
        self.noret()
    }

    /// Unpack a return continuation: one operand yields that operand, any
    /// other arity yields the tuple of operands.
    pub fn unpack_return_type(&mut self, cont_ty: TypeId) -> TypeId {
        match self.as_fn(cont_ty) {
            Some(ops) if ops.len() == 1 => ops[0],
            Some(ops) => self.tuple(ops),
            None => cont_ty,
        }
    }

    // ========================================================================
    // Type-level abstraction
    // ========================================================================

    /// Wrap `body` in `n` nested lambdas.
    pub fn close(&mut self, n: usize, body: TypeId, name: Symbol) -> TypeId {
        let mut result = body;
        for _ in 0..n {
            result = self.lambda(result, name);
        }
        result
    }

    /// Number of directly nested lambdas.
    pub fn num_lambdas(&self, mut ty: TypeId) -> usize {
        let mut num = 0;
        while let TypeTerm::Lambda { body, .. } = self.term(ty) {
            ty = *body;
            num += 1;
        }
        num
    }

    /// One-level beta reduction: strip the outermost lambda of `lambda_ty`
    /// and substitute `arg` for its variable. Results are cached.
    pub fn app(&mut self, lambda_ty: TypeId, arg: TypeId) -> TypeId {
        if let Some(&cached) = self.app_cache.get(&(lambda_ty, arg)) {
            return cached;
        }
        let result = match self.term(lambda_ty) {
            TypeTerm::Lambda { body, .. } => {
                let body = *body;
                self.subst(body, 0, arg)
            }
            _ => self.error(),
        };
        self.app_cache.insert((lambda_ty, arg), result);
        result
    }

    /// Substitute `arg` for `Var(target)` in `ty`, decrementing variables
    /// bound outside the eliminated binder.
    fn subst(&mut self, ty: TypeId, target: u32, arg: TypeId) -> TypeId {
        match self.term(ty).clone() {
            TypeTerm::Var(d) if d == target => arg,
            TypeTerm::Var(d) if d > target => self.var(d - 1),
            TypeTerm::Lambda { body, name } => {
                let body = self.subst(body, target + 1, arg);
                self.lambda(body, name)
            }
            term if term.num_ops() > 0 => {
                let ops: Vec<TypeId> = term
                    .ops()
                    .iter()
                    .map(|&op| self.subst(op, target, arg))
                    .collect();
                self.rebuild(ty, &ops)
            }
            _ => ty,
        }
    }
}
