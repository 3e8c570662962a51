// infer/unify.rs
//
// Disjoint-set forest over interned types and the unification algorithm.
// https://en.wikipedia.org/wiki/Disjoint-set_data_structure#Disjoint-set_forests

use rustc_hash::FxHashMap;

use karst_frontend::PtrKind;

use crate::type_arena::{TypeArena, TypeId, TypeTerm};

use super::InferSema;

#[derive(Debug, Clone, Copy)]
struct ReprNode {
    parent: u32,
    ty: TypeId,
    rank: u32,
}

/// Union-find forest with path compression and union by rank. Every type
/// encountered during inference maps to exactly one node.
#[derive(Debug, Default)]
pub(crate) struct UnionFind {
    nodes: Vec<ReprNode>,
    repr_of: FxHashMap<TypeId, u32>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node for `ty`, created on first sight.
    pub fn representative(&mut self, ty: TypeId) -> u32 {
        match self.repr_of.get(&ty) {
            Some(&idx) => idx,
            None => {
                let idx = self.nodes.len() as u32;
                self.nodes.push(ReprNode {
                    parent: idx,
                    ty,
                    rank: 0,
                });
                self.repr_of.insert(ty, idx);
                idx
            }
        }
    }

    /// Root of `idx`'s set, compressing the path. Following any non-root
    /// link counts as progress for the fixpoint driver.
    pub fn find(&mut self, idx: u32, todo: &mut bool) -> u32 {
        let parent = self.nodes[idx as usize].parent;
        if parent != idx {
            *todo = true;
            let root = self.find(parent, todo);
            self.nodes[idx as usize].parent = root;
            root
        } else {
            idx
        }
    }

    pub fn find_type(&mut self, ty: TypeId, todo: &mut bool) -> TypeId {
        let repr = self.representative(ty);
        let root = self.find(repr, todo);
        self.ty(root)
    }

    pub fn ty(&self, idx: u32) -> TypeId {
        self.nodes[idx as usize].ty
    }

    /// Merge so that `x` becomes the representative of both sets.
    pub fn union_into(&mut self, x: u32, y: u32, todo: &mut bool) -> u32 {
        debug_assert!(self.is_root(x) && self.is_root(y));
        if x == y {
            return x;
        }
        self.nodes[x as usize].rank += 1;
        *todo = true;
        self.nodes[y as usize].parent = x;
        x
    }

    /// Merge by rank; either node may end up the representative.
    pub fn union_by_rank(&mut self, x: u32, y: u32) -> u32 {
        debug_assert!(self.is_root(x) && self.is_root(y));
        if x == y {
            return x;
        }
        let (xr, yr) = (self.nodes[x as usize].rank, self.nodes[y as usize].rank);
        if xr < yr {
            self.nodes[x as usize].parent = y;
            y
        } else if xr > yr {
            self.nodes[y as usize].parent = x;
            x
        } else {
            self.nodes[x as usize].rank += 1;
            self.nodes[y as usize].parent = x;
            x
        }
    }

    fn is_root(&self, idx: u32) -> bool {
        self.nodes[idx as usize].parent == idx
    }
}

/// Unify two types under the current equations, returning a canonical type.
///
/// The result prefers `dst`'s shape on success and falls back to `dst`
/// unchanged when unification fails; failures surface later as mismatches or
/// stuck unknowns rather than diagnostics here.
pub(super) fn unify(sema: &mut InferSema<'_>, dst: TypeId, src: TypeId) -> TypeId {
    let dst_repr = {
        let repr = sema.uf.representative(dst);
        sema.uf.find(repr, &mut sema.todo)
    };
    let src_repr = {
        let repr = sema.uf.representative(src);
        sema.uf.find(repr, &mut sema.todo)
    };

    let mut dst = sema.uf.ty(dst_repr);
    let mut src = sema.uf.ty(src_repr);

    // Normalize singleton tuples to their element.
    if let Some(ops) = sema.arena.as_tuple(dst) {
        if ops.len() == 1 {
            dst = ops[0];
        }
    }
    if let Some(ops) = sema.arena.as_tuple(src) {
        if ops.len() == 1 {
            src = ops[0];
        }
    }

    // Return-continuation inference for functions whose return typedef is a
    // tuple leaves one side as `Fn([Unknown])` while the other side already
    // has the full arity; prefer the known side as representative.
    if let (Some(dst_ops), Some(src_ops)) = (sema.arena.as_fn(dst), sema.arena.as_fn(src)) {
        if dst_ops.len() != 1
            && src_ops.len() == 1
            && sema.arena.is_unknown(src_ops[0])
            && sema.arena.is_known(dst)
        {
            let root = sema.uf.union_into(dst_repr, src_repr, &mut sema.todo);
            return sema.uf.ty(root);
        }
        if src_ops.len() != 1
            && dst_ops.len() == 1
            && sema.arena.is_unknown(dst_ops[0])
            && sema.arena.is_known(src)
        {
            let root = sema.uf.union_into(src_repr, dst_repr, &mut sema.todo);
            return sema.uf.ty(root);
        }
    }

    if dst == src && sema.arena.is_known(dst) {
        return dst;
    }
    if dst.is_error() {
        return src;
    }
    if src.is_error() {
        return dst;
    }

    let dst_unknown = sema.arena.is_unknown(dst);
    let src_unknown = sema.arena.is_unknown(src);
    if dst_unknown && src_unknown {
        let root = sema.uf.union_by_rank(dst_repr, src_repr);
        return sema.uf.ty(root);
    }
    if dst_unknown {
        let root = sema.uf.union_into(src_repr, dst_repr, &mut sema.todo);
        return sema.uf.ty(root);
    }
    if src_unknown {
        let root = sema.uf.union_into(dst_repr, src_repr, &mut sema.todo);
        return sema.uf.ty(root);
    }

    let dst_term = sema.arena.term(dst).clone();
    let src_term = sema.arena.term(src).clone();

    if dst_term.num_ops() == src_term.num_ops() {
        let dst_ops = dst_term.ops();
        let src_ops = src_term.ops();
        let ops: Vec<TypeId> = dst_ops
            .iter()
            .zip(src_ops.iter())
            .map(|(&a, &b)| unify(sema, a, b))
            .collect();

        // Pointer kind narrowing: owned unifies against borrowed as
        // borrowed, keeping the borrowed side's mutability.
        if let (
            TypeTerm::Ptr {
                kind: dst_kind,
                mutable: dst_mut,
                addr_space: dst_as,
                ..
            },
            TypeTerm::Ptr {
                kind: src_kind,
                mutable: src_mut,
                addr_space: src_as,
                ..
            },
        ) = (&dst_term, &src_term)
        {
            if dst_as == src_as {
                if *dst_kind == PtrKind::Borrowed && *src_kind == PtrKind::Owned {
                    return sema.arena.borrowed_ptr(ops[0], *dst_mut, *dst_as);
                }
                if *dst_kind == PtrKind::Owned && *src_kind == PtrKind::Borrowed {
                    return sema.arena.borrowed_ptr(ops[0], *src_mut, *src_as);
                }
            }
        }

        // Array coercion: a definite array unifies against an indefinite one
        // as indefinite.
        let dst_def = matches!(dst_term, TypeTerm::DefArray { .. });
        let dst_indef = matches!(dst_term, TypeTerm::IndefArray { .. });
        let src_def = matches!(src_term, TypeTerm::DefArray { .. });
        let src_indef = matches!(src_term, TypeTerm::IndefArray { .. });
        if (dst_indef && src_def) || (dst_def && src_indef) {
            return sema.arena.indef_array(ops[0]);
        }

        if same_tag(&dst_term, &src_term) {
            return sema.arena.rebuild(dst, &ops);
        }
    }

    dst
}

/// Whether two terms agree on their top constructor (pointer kinds count as
/// distinct constructors).
fn same_tag(a: &TypeTerm, b: &TypeTerm) -> bool {
    match (a, b) {
        (TypeTerm::Ptr { kind: ka, .. }, TypeTerm::Ptr { kind: kb, .. }) => ka == kb,
        (TypeTerm::Struct { decl: da }, TypeTerm::Struct { decl: db }) => da == db,
        _ => std::mem::discriminant(a) == std::mem::discriminant(b),
    }
}

/// `src <: dst` strictly: pointer-kind narrowing (owned to borrowed) or
/// array definite-to-indefinite, recursively through matching constructors,
/// and `src != dst`.
pub(crate) fn is_strict_subtype(arena: &TypeArena, dst: TypeId, src: TypeId) -> bool {
    dst != src && is_subtype_or_eq(arena, dst, src)
}

fn is_subtype_or_eq(arena: &TypeArena, dst: TypeId, src: TypeId) -> bool {
    if dst == src {
        return true;
    }
    let dst_term = arena.term(dst);
    let src_term = arena.term(src);
    match (dst_term, src_term) {
        (
            TypeTerm::Ptr {
                kind: PtrKind::Borrowed,
                addr_space: dst_as,
                pointee: dst_p,
                ..
            },
            TypeTerm::Ptr {
                kind: PtrKind::Owned,
                addr_space: src_as,
                pointee: src_p,
                ..
            },
        ) => dst_as == src_as && is_subtype_or_eq(arena, *dst_p, *src_p),
        (
            TypeTerm::IndefArray { elem: dst_elem },
            TypeTerm::DefArray { elem: src_elem, .. },
        ) => is_subtype_or_eq(arena, *dst_elem, *src_elem),
        _ => {
            if !same_shape(dst_term, src_term) {
                return false;
            }
            dst_term
                .ops()
                .iter()
                .zip(src_term.ops().iter())
                .all(|(&a, &b)| is_subtype_or_eq(arena, a, b))
        }
    }
}

/// Terms equal up to their child operands.
fn same_shape(a: &TypeTerm, b: &TypeTerm) -> bool {
    if !same_tag(a, b) || a.num_ops() != b.num_ops() {
        return false;
    }
    match (a, b) {
        (
            TypeTerm::Ptr {
                mutable: ma,
                addr_space: sa,
                ..
            },
            TypeTerm::Ptr {
                mutable: mb,
                addr_space: sb,
                ..
            },
        ) => ma == mb && sa == sb,
        (
            TypeTerm::Ref {
                mutable: ma,
                addr_space: sa,
                ..
            },
            TypeTerm::Ref {
                mutable: mb,
                addr_space: sb,
                ..
            },
        ) => ma == mb && sa == sb,
        (TypeTerm::DefArray { dim: da, .. }, TypeTerm::DefArray { dim: db, .. }) => da == db,
        (TypeTerm::Simd { lanes: la, .. }, TypeTerm::Simd { lanes: lb, .. }) => la == lb,
        (TypeTerm::Prim(pa), TypeTerm::Prim(pb)) => pa == pb,
        (TypeTerm::Var(va), TypeTerm::Var(vb)) => va == vb,
        (TypeTerm::Unknown(ua), TypeTerm::Unknown(ub)) => ua == ub,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use karst_frontend::PrimType;

    use crate::decl::{DeclTable, Resolutions};
    use crate::node_types::NodeTypes;
    use crate::type_arena::{TypeArena, TypeIdVec};

    use super::super::InferSema;
    use super::*;

    fn with_sema(f: impl FnOnce(&mut InferSema<'_>)) {
        let mut arena = TypeArena::new();
        let mut decls = DeclTable::new();
        let res = Resolutions::new();
        let mut node_types = NodeTypes::new();
        let mut sema = InferSema {
            arena: &mut arena,
            decls: &mut decls,
            res: &res,
            node_types: &mut node_types,
            type_args: FxHashMap::default(),
            literals: FxHashMap::default(),
            uf: UnionFind::new(),
            todo: false,
            next_node_id: 0,
            type_binder_depth: 0,
        };
        f(&mut sema);
    }

    fn ops(ids: &[TypeId]) -> TypeIdVec {
        ids.iter().copied().collect()
    }

    #[test]
    fn find_is_idempotent_after_unification() {
        with_sema(|sema| {
            let u1 = sema.arena.unknown();
            let u2 = sema.arena.unknown();
            sema.unify(u1, u2);
            sema.unify(u1, TypeId::I32);

            for ty in [u1, u2, TypeId::I32] {
                let once = sema.find(ty);
                let twice = sema.find(once);
                assert_eq!(once, twice);
            }
        });
    }

    #[test]
    fn unify_resolves_unknown_to_known() {
        with_sema(|sema| {
            let unknown = sema.arena.unknown();
            let result = sema.unify(unknown, TypeId::I64);
            assert_eq!(result, TypeId::I64);
            assert_eq!(sema.find(unknown), TypeId::I64);
        });
    }

    #[test]
    fn unify_joins_both_classes() {
        with_sema(|sema| {
            let u1 = sema.arena.unknown();
            let u2 = sema.arena.unknown();
            sema.unify(u1, u2);
            sema.unify(u2, TypeId::BOOL);
            assert_eq!(sema.find(u1), sema.find(u2));
            assert_eq!(sema.find(u1), TypeId::BOOL);
        });
    }

    #[test]
    fn unify_recurses_into_children() {
        with_sema(|sema| {
            let unknown = sema.arena.unknown();
            let open = sema.arena.borrowed_ptr(unknown, false, 0);
            let closed = sema.arena.borrowed_ptr(TypeId::I32, false, 0);
            let result = sema.unify(open, closed);
            assert_eq!(result, closed);
            assert_eq!(sema.find(unknown), TypeId::I32);
        });
    }

    #[test]
    fn owned_narrows_to_borrowed() {
        with_sema(|sema| {
            let owned = sema.arena.owned_ptr(TypeId::I32, 0);
            let borrowed = sema.arena.borrowed_ptr(TypeId::I32, false, 0);
            assert_eq!(sema.unify(borrowed, owned), borrowed);
            assert_eq!(sema.unify(owned, borrowed), borrowed);
        });
    }

    #[test]
    fn definite_array_unifies_as_indefinite() {
        with_sema(|sema| {
            let def = sema.arena.def_array(TypeId::I32, 3);
            let indef = sema.arena.indef_array(TypeId::I32);
            assert_eq!(sema.unify(indef, def), indef);
            assert_eq!(sema.unify(def, indef), indef);
        });
    }

    #[test]
    fn singleton_tuples_normalize() {
        with_sema(|sema| {
            let singleton = sema.arena.tuple(ops(&[TypeId::I32]));
            assert_eq!(sema.unify(singleton, TypeId::I32), TypeId::I32);
        });
    }

    #[test]
    fn unknown_singleton_continuation_prefers_known_arity() {
        with_sema(|sema| {
            let unknown = sema.arena.unknown();
            let open_cont = sema.arena.fn_type(ops(&[unknown]));
            let full = sema.arena.fn_type(ops(&[TypeId::I32, TypeId::BOOL]));
            assert_eq!(sema.unify(full, open_cont), full);
            assert_eq!(sema.find(open_cont), full);
        });
    }

    #[test]
    fn error_is_absorbing() {
        with_sema(|sema| {
            assert_eq!(sema.unify(TypeId::ERROR, TypeId::I32), TypeId::I32);
            assert_eq!(sema.unify(TypeId::I32, TypeId::ERROR), TypeId::I32);
        });
    }

    #[test]
    fn mismatch_returns_destination() {
        with_sema(|sema| {
            assert_eq!(sema.unify(TypeId::I32, TypeId::BOOL), TypeId::I32);
        });
    }

    #[test]
    fn strict_subtyping_rules() {
        let mut arena = TypeArena::new();
        let owned = arena.owned_ptr(TypeId::I32, 0);
        let borrowed = arena.borrowed_ptr(TypeId::I32, false, 0);
        let def = arena.def_array(TypeId::I32, 3);
        let indef = arena.indef_array(TypeId::I32);
        let f32_ty = arena.prim(PrimType::F32);

        assert!(is_strict_subtype(&arena, borrowed, owned));
        assert!(!is_strict_subtype(&arena, owned, borrowed));
        assert!(is_strict_subtype(&arena, indef, def));
        assert!(!is_strict_subtype(&arena, def, indef));
        assert!(!is_strict_subtype(&arena, TypeId::I32, f32_ty));
        assert!(!is_strict_subtype(&arena, borrowed, borrowed));

        // Recursion through matching constructors.
        let tup_owned = arena.tuple(ops(&[owned, TypeId::BOOL]));
        let tup_borrowed = arena.tuple(ops(&[borrowed, TypeId::BOOL]));
        assert!(is_strict_subtype(&arena, tup_borrowed, tup_owned));
    }
}

