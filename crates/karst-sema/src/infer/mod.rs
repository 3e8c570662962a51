// infer/mod.rs
//
// Fixpoint type inference. A visitor refines every node's and declaration's
// type slot through a union-find equivalence over interned types, rewriting
// the AST in place with implicit coercion nodes as it goes. The driver
// re-runs the whole visitor until a pass leaves every slot untouched.

mod expr;
mod item;
mod unify;

use rustc_hash::FxHashMap;

use karst_frontend::{Expr, ExprKind, Module, NodeId};

use crate::decl::{DeclId, DeclTable, Resolutions};
use crate::node_types::NodeTypes;
use crate::type_arena::{TypeArena, TypeId};

use unify::UnionFind;

/// Upper bound on fixpoint iterations. Inference is monotone, so the loop
/// terminates long before this; the bound turns a monotonicity bug into a
/// diagnosable stall instead of a hang.
const MAX_ITERATIONS: usize = 10_000;

/// Run type inference to fixpoint over a whole module.
pub fn infer(
    module: &mut Module,
    arena: &mut TypeArena,
    decls: &mut DeclTable,
    res: &Resolutions,
    node_types: &mut NodeTypes,
) {
    let mut sema = InferSema {
        arena,
        decls,
        res,
        node_types,
        type_args: FxHashMap::default(),
        literals: FxHashMap::default(),
        uf: UnionFind::new(),
        todo: true,
        next_node_id: module.next_node_id,
        type_binder_depth: 0,
    };

    let mut iterations = 0;
    while sema.todo && iterations < MAX_ITERATIONS {
        sema.todo = false;
        sema.check_module(module);
        iterations += 1;
    }

    // Literals nothing constrained fall back to their default types; settle
    // the remaining slots with a second fixpoint.
    if sema.default_literals() {
        while sema.todo && iterations < MAX_ITERATIONS {
            sema.todo = false;
            sema.check_module(module);
            iterations += 1;
        }
    }

    if iterations == MAX_ITERATIONS {
        tracing::warn!("type inference did not converge");
    }
    tracing::debug!(iterations, "iterations needed for type inference");

    module.next_node_id = sema.next_node_id;
}

pub(crate) struct InferSema<'a> {
    pub arena: &'a mut TypeArena,
    pub decls: &'a mut DeclTable,
    pub res: &'a Resolutions,
    pub node_types: &'a mut NodeTypes,
    /// Inferred type arguments of `TypeApp` expressions and applied AST
    /// types, keyed by node. Persists across passes.
    pub type_args: FxHashMap<NodeId, Vec<TypeId>>,
    /// Unsuffixed literal nodes (value is whether the literal is a float),
    /// for post-fixpoint defaulting.
    pub(crate) literals: FxHashMap<NodeId, bool>,
    pub(crate) uf: UnionFind,
    /// Set whenever a representative or slot moves; cleared by the driver
    /// before each pass.
    pub todo: bool,
    next_node_id: u32,
    /// Number of type-parameter binders in scope at the current visit point.
    type_binder_depth: u32,
}

impl InferSema<'_> {
    // ========================================================================
    // Slots
    // ========================================================================

    /// Allocate a node id for a synthesized wrapper node.
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    /// Representative lookup; `find(find(t)) == find(t)`.
    pub fn find(&mut self, ty: TypeId) -> TypeId {
        self.uf.find_type(ty, &mut self.todo)
    }

    /// The node's current type, path-compressed; initializes an empty slot
    /// with a fresh `Unknown`.
    pub fn find_node_type(&mut self, node: NodeId) -> TypeId {
        match self.node_types.get(node) {
            None => {
                let unknown = self.arena.unknown();
                self.node_types.set(node, unknown);
                unknown
            }
            Some(ty) => {
                let found = self.find(ty);
                if found != ty {
                    self.node_types.set(node, found);
                }
                found
            }
        }
    }

    /// The declaration's current type, path-compressed; initializes an empty
    /// slot with a fresh `Unknown`.
    pub fn find_decl_type(&mut self, decl: DeclId) -> TypeId {
        match self.decls.get(decl).ty {
            None => {
                let unknown = self.arena.unknown();
                self.decls.get_mut(decl).ty = Some(unknown);
                unknown
            }
            Some(ty) => {
                let found = self.find(ty);
                if found != ty {
                    self.decls.get_mut(decl).ty = Some(found);
                }
                found
            }
        }
    }

    /// One-sided unify into a node slot; initializes an empty slot.
    pub fn constrain_node(&mut self, node: NodeId, ty: TypeId) -> TypeId {
        let new = match self.node_types.get(node) {
            None => self.find(ty),
            Some(old) => self.unify(old, ty),
        };
        self.node_types.set(node, new);
        new
    }

    /// One-sided unify into a declaration slot; initializes an empty slot.
    pub fn constrain_decl(&mut self, decl: DeclId, ty: TypeId) -> TypeId {
        let new = match self.decls.get(decl).ty {
            None => self.find(ty),
            Some(old) => self.unify(old, ty),
        };
        self.decls.get_mut(decl).ty = Some(new);
        new
    }

    // ========================================================================
    // Rvalues and coercion
    // ========================================================================

    /// Infer `expr`; when it is reference-typed, strip the reference by
    /// wrapping the expression in a `Ref2RValue` node.
    pub fn rvalue(&mut self, expr: &mut Expr) -> TypeId {
        self.check_expr(expr);
        let ty = self.find_node_type(expr.id);
        if let Some((pointee, _, _)) = self.arena.as_ref_type(ty) {
            let wrapper_id = self.fresh_id();
            expr.wrap_in_place(wrapper_id, ExprKind::Ref2RValue);
            self.constrain_node(expr.id, pointee)
        } else {
            ty
        }
    }

    pub fn rvalue_with(&mut self, expr: &mut Expr, ty: TypeId) -> TypeId {
        self.rvalue(expr);
        self.constrain_node(expr.id, ty)
    }

    /// Re-attach a reference wrapper stripped from an operand.
    pub fn wrap_ref(&mut self, ref_info: Option<(bool, u32)>, ty: TypeId) -> TypeId {
        match ref_info {
            Some((mutable, addr_space)) => self.arena.ref_type(ty, mutable, addr_space),
            None => ty,
        }
    }

    /// Adjust `expr` to flow into a position of type `dst`, obeying
    /// subtyping: a known strict subtype is wrapped in an implicit cast
    /// before unification.
    pub fn coerce(&mut self, dst: TypeId, expr: &mut Expr) -> TypeId {
        let (inner_dst, ref_info) = match self.arena.as_ref_type(dst) {
            Some((pointee, mutable, addr_space)) => (pointee, Some((mutable, addr_space))),
            None => (dst, None),
        };

        let src_ty = self.find_node_type(expr.id);

        if self.arena.is_known(inner_dst)
            && self.arena.is_known(src_ty)
            && unify::is_strict_subtype(self.arena, inner_dst, src_ty)
        {
            let wrapper_id = self.fresh_id();
            expr.wrap_in_place(wrapper_id, ExprKind::ImplicitCast);
            self.node_types.set(expr.id, inner_dst);
            self.check_expr(expr);
        }

        let src_ty = self.find_node_type(expr.id);
        let ty = self.unify(inner_dst, src_ty);
        self.wrap_ref(ref_info, ty)
    }

    /// Coerce `expr` into the type slot of `node`, writing the result back.
    pub fn coerce_node(&mut self, node: NodeId, expr: &mut Expr) -> TypeId {
        let dst = self.find_node_type(node);
        let ty = self.coerce(dst, expr);
        self.node_types.set(node, ty);
        ty
    }

    // ========================================================================
    // Type-level application
    // ========================================================================

    /// De Bruijn index for a type-parameter use at the current visit point.
    pub fn var_for(&mut self, binder_index: u32) -> TypeId {
        debug_assert!(binder_index < self.type_binder_depth);
        let index = self.type_binder_depth - 1 - binder_index;
        self.arena.var(index)
    }

    pub fn open_type_params(&mut self, n: usize) {
        self.type_binder_depth += n as u32;
    }

    pub fn close_type_params(&mut self, n: usize) {
        self.type_binder_depth -= n as u32;
    }

    /// Instantiate a polymorphic type: constrain explicit type arguments,
    /// pad with fresh unknowns, then beta-reduce one lambda per argument.
    /// Declaration-order arguments bind outermost-first.
    pub fn reduce(
        &mut self,
        lambda_ty: TypeId,
        ast_args: &mut [karst_frontend::AstType],
        type_args: &mut Vec<TypeId>,
    ) -> TypeId {
        let num = self.arena.num_lambdas(lambda_ty);
        if ast_args.len() > num {
            return self.arena.error();
        }

        for (i, ast_arg) in ast_args.iter_mut().enumerate() {
            let ty = self.check_ast_type(ast_arg);
            if i < type_args.len() {
                let merged = self.unify(type_args[i], ty);
                type_args[i] = merged;
            } else {
                let found = self.find(ty);
                type_args.push(found);
            }
        }
        while type_args.len() < num {
            let unknown = self.arena.unknown();
            type_args.push(unknown);
        }

        let mut ty = lambda_ty;
        let mut i = 0;
        while self.arena.as_lambda(ty).is_some() {
            ty = self.arena.app(ty, type_args[i]);
            i += 1;
        }
        ty
    }

    /// Unify `dst` and `src`, returning a type canonical for both under the
    /// accumulated equations. See `unify.rs` for the algorithm.
    pub fn unify(&mut self, dst: TypeId, src: TypeId) -> TypeId {
        unify::unify(self, dst, src)
    }

    /// Give still-unknown unsuffixed literals their default types (`i32`,
    /// `f64`). Returns whether anything changed.
    fn default_literals(&mut self) -> bool {
        let literals: Vec<(NodeId, bool)> =
            self.literals.iter().map(|(&n, &f)| (n, f)).collect();
        let mut changed = false;
        for (node, is_float) in literals {
            let ty = self.find_node_type(node);
            if self.arena.is_unknown(ty) {
                let default = if is_float {
                    self.arena.prim(karst_frontend::PrimType::F64)
                } else {
                    self.arena.prim(karst_frontend::PrimType::I32)
                };
                self.constrain_node(node, default);
                changed = true;
            }
        }
        if changed {
            self.todo = true;
        }
        changed
    }

    /// Wrap `body` in one lambda per type parameter, outermost binder first
    /// in declaration order.
    pub fn close_over(&mut self, params: &[karst_frontend::TypeParam], body: TypeId) -> TypeId {
        let mut result = body;
        for param in params.iter().rev() {
            result = self.arena.lambda(result, param.symbol);
        }
        result
    }
}
