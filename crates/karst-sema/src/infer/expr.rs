// infer/expr.rs
//
// Inference over expressions and AST types. This is where the implicit AST
// rewrites happen: lvalue-to-rvalue wrappers, auto-derefs on field/index
// receivers, implicit subtyping casts and synthesized type applications.

use karst_frontend::{
    AstType, AstTypeKind, Expr, ExprKind, InfixOp, Lit, LocalDecl, PrefixOp, PrimType, PtrKind,
    StmtKind, TypeAppExpr,
};

use crate::decl::DeclKind;
use crate::type_arena::{TypeId, TypeIdVec, TypeTerm};

use super::InferSema;

impl InferSema<'_> {
    /// Infer `expr` and constrain its type slot with the result.
    pub fn check_expr(&mut self, expr: &mut Expr) -> TypeId {
        let ty = self.infer_expr(expr);
        self.constrain_node(expr.id, ty)
    }

    fn infer_expr(&mut self, expr: &mut Expr) -> TypeId {
        let id = expr.id;
        match &mut expr.kind {
            ExprKind::Empty => self.arena.unit(),

            ExprKind::Lit(lit) => match lit {
                Lit::Bool(_) => self.arena.prim(PrimType::Bool),
                Lit::Int(_, Some(suffix)) | Lit::Float(_, Some(suffix)) => {
                    self.arena.prim(*suffix)
                }
                // Unsuffixed literals are typed by their context, with a
                // default applied after the fixpoint if nothing constrained
                // them.
                Lit::Int(_, None) => {
                    self.literals.insert(id, false);
                    self.find_node_type(id)
                }
                Lit::Float(_, None) => {
                    self.literals.insert(id, true);
                    self.find_node_type(id)
                }
            },

            ExprKind::Char(_) => self.arena.prim(PrimType::U8),

            ExprKind::Str(bytes) => {
                let u8_ty = self.arena.prim(PrimType::U8);
                self.arena.def_array(u8_ty, bytes.len() as u64 + 1)
            }

            ExprKind::Path(_) => match self.res.use_of(id) {
                Some(decl) if self.decls.get(decl).kind.is_value() => {
                    let mutable = self.decls.get(decl).mutable;
                    let ty = self.find_decl_type(decl);
                    self.arena.ref_type(ty, mutable, 0)
                }
                _ => self.arena.error(),
            },

            ExprKind::Prefix(op, rhs) => match op {
                PrefixOp::Ref | PrefixOp::RefMut => {
                    let mutable = *op == PrefixOp::RefMut;
                    let ty = self.check_expr(rhs);
                    let ty = self.find(ty);
                    match self.arena.as_ref_type(ty) {
                        Some((pointee, _, addr_space)) => {
                            self.arena.borrowed_ptr(pointee, mutable, addr_space)
                        }
                        None => self.arena.borrowed_ptr(ty, mutable, 0),
                    }
                }
                PrefixOp::Tilde => {
                    let ty = self.rvalue(rhs);
                    self.arena.owned_ptr(ty, 0)
                }
                PrefixOp::Deref => {
                    let ty = self.rvalue(rhs);
                    let ty = self.find(ty);
                    match self.arena.as_ptr(ty) {
                        Some((_, pointee, mutable, addr_space)) => {
                            self.arena.ref_type(pointee, mutable, addr_space)
                        }
                        None if self.arena.is_known(ty) => self.arena.error(),
                        None => self.find_node_type(id),
                    }
                }
                PrefixOp::Inc | PrefixOp::Dec => self.check_expr(rhs),
                PrefixOp::Plus
                | PrefixOp::Minus
                | PrefixOp::Not
                | PrefixOp::Run
                | PrefixOp::Hlt => self.rvalue(rhs),
            },

            ExprKind::Infix(op, lhs, rhs) => match op {
                InfixOp::Eq
                | InfixOp::Ne
                | InfixOp::Lt
                | InfixOp::Le
                | InfixOp::Gt
                | InfixOp::Ge => {
                    let lhs_ty = self.rvalue(lhs);
                    let rhs_ty = self.rvalue(rhs);
                    self.constrain_node(lhs.id, rhs_ty);
                    self.constrain_node(rhs.id, lhs_ty);
                    let rhs_ty = self.find_node_type(rhs.id);
                    if let TypeTerm::Simd { lanes, .. } = self.arena.term(rhs_ty) {
                        let lanes = *lanes;
                        let bool_ty = self.arena.prim(PrimType::Bool);
                        self.arena.simd(bool_ty, lanes)
                    } else if self.arena.is_known(rhs_ty) {
                        self.arena.prim(PrimType::Bool)
                    } else {
                        self.find_node_type(id)
                    }
                }
                InfixOp::AndAnd | InfixOp::OrOr => {
                    let bool_ty = self.arena.prim(PrimType::Bool);
                    self.rvalue_with(lhs, bool_ty);
                    self.rvalue_with(rhs, bool_ty);
                    bool_ty
                }
                InfixOp::Add
                | InfixOp::Sub
                | InfixOp::Mul
                | InfixOp::Div
                | InfixOp::Rem
                | InfixOp::Shl
                | InfixOp::Shr
                | InfixOp::BitAnd
                | InfixOp::BitOr
                | InfixOp::BitXor => {
                    let lhs_ty = self.rvalue(lhs);
                    let rhs_ty = self.rvalue(rhs);
                    self.constrain_node(lhs.id, rhs_ty);
                    self.constrain_node(rhs.id, lhs_ty);
                    self.find_node_type(rhs.id)
                }
                _ => {
                    // Assignments, simple and compound.
                    self.check_expr(lhs);
                    self.rvalue(rhs);
                    self.coerce_node(lhs.id, rhs);
                    self.arena.unit()
                }
            },

            ExprKind::Postfix(_, lhs) => self.check_expr(lhs),

            ExprKind::Cast(src, ast_type) => {
                self.rvalue(src);
                self.check_ast_type(ast_type)
            }

            ExprKind::ImplicitCast(src) => {
                self.rvalue(src);
                self.find_node_type(id)
            }

            ExprKind::Ref2RValue(src) => {
                let ty = self.check_expr(src);
                let ty = self.find(ty);
                match self.arena.as_ref_type(ty) {
                    Some((pointee, _, _)) => pointee,
                    None if ty.is_error() => self.arena.error(),
                    None => ty,
                }
            }

            ExprKind::Field(lhs, symbol) => {
                let symbol = *symbol;
                let mut lhs_ty = self.check_expr(lhs);
                lhs_ty = self.find(lhs_ty);
                if self.is_ptr_like(lhs_ty) {
                    let wrapper_id = self.fresh_id();
                    lhs.wrap_in_place(wrapper_id, |inner| {
                        ExprKind::Prefix(PrefixOp::Deref, inner)
                    });
                    lhs_ty = self.check_expr(lhs);
                    lhs_ty = self.find(lhs_ty);
                }

                let ref_info = self
                    .arena
                    .as_ref_type(lhs_ty)
                    .map(|(_, mutable, addr_space)| (mutable, addr_space));
                let inner = match self.arena.as_ref_type(lhs_ty) {
                    Some((pointee, _, _)) => self.find(pointee),
                    None => lhs_ty,
                };

                if let Some(struct_decl) = self.arena.as_struct(inner) {
                    if let Some(index) = self.decls.field_index(struct_decl, symbol) {
                        let field_decl = self.decls.get(struct_decl).members[index];
                        let field_ty = self.find_decl_type(field_decl);
                        return self.wrap_ref(ref_info, field_ty);
                    }
                }

                let fallback = if self.arena.is_known(inner) {
                    self.arena.error()
                } else {
                    self.find_node_type(id)
                };
                self.wrap_ref(ref_info, fallback)
            }

            ExprKind::DefArray(args) => {
                let mut expected = match self.node_types.get(id) {
                    None => self.arena.unknown(),
                    Some(ty) => {
                        let ty = self.find(ty);
                        match self.arena.term(ty) {
                            TypeTerm::DefArray { elem, .. } => *elem,
                            _ => self.arena.error(),
                        }
                    }
                };
                for arg in args.iter_mut() {
                    self.rvalue(arg);
                }
                for arg in args.iter_mut() {
                    expected = self.coerce(expected, arg);
                }
                self.arena.def_array(expected, args.len() as u64)
            }

            ExprKind::Simd(args) => {
                let mut expected = match self.node_types.get(id) {
                    None => self.arena.unknown(),
                    Some(ty) => {
                        let ty = self.find(ty);
                        match self.arena.term(ty) {
                            TypeTerm::Simd { elem, .. } => *elem,
                            _ => self.arena.error(),
                        }
                    }
                };
                for arg in args.iter_mut() {
                    self.rvalue(arg);
                }
                for arg in args.iter_mut() {
                    expected = self.coerce(expected, arg);
                }
                self.arena.simd(expected, args.len() as u64)
            }

            ExprKind::RepeatArray(value, count) => {
                let count = *count;
                let elem = self.rvalue(value);
                self.arena.def_array(elem, count)
            }

            ExprKind::IndefArray(dim, elem_ty) => {
                self.rvalue(dim);
                let elem = self.check_ast_type(elem_ty);
                self.arena.indef_array(elem)
            }

            ExprKind::Tuple(args) => {
                let ops: TypeIdVec = args.iter_mut().map(|arg| self.rvalue(arg)).collect();
                self.arena.tuple(ops)
            }

            ExprKind::StructLit(lit) => {
                let ty = self.check_ast_type(&mut lit.ty);
                let found = self.find(ty);
                match self.arena.as_struct(found) {
                    Some(struct_decl) => {
                        for field in &mut lit.fields {
                            self.rvalue(&mut field.expr);
                            if let Some(index) =
                                self.decls.field_index(struct_decl, field.symbol)
                            {
                                let field_decl = self.decls.get(struct_decl).members[index];
                                let field_ty = self.find_decl_type(field_decl);
                                self.coerce(field_ty, &mut field.expr);
                            }
                        }
                    }
                    None => {
                        for field in &mut lit.fields {
                            self.rvalue(&mut field.expr);
                        }
                    }
                }
                ty
            }

            ExprKind::TypeApp(app) => {
                let lhs_ty = self.rvalue(&mut app.lhs);
                let lhs_ty = self.find(lhs_ty);
                if self.arena.as_lambda(lhs_ty).is_none() {
                    return self.arena.error();
                }

                let num = self.arena.num_lambdas(lhs_ty);
                let mut ty_args = self.type_args.remove(&id).unwrap_or_default();
                if ty_args.len() < num {
                    for ast_arg in app.ty_args.iter_mut() {
                        let ty = self.check_ast_type(ast_arg);
                        let ty = self.find(ty);
                        ty_args.push(ty);
                    }
                    while ty_args.len() < num {
                        let unknown = self.arena.unknown();
                        ty_args.push(unknown);
                    }
                }
                for ty_arg in ty_args.iter_mut() {
                    *ty_arg = self.find(*ty_arg);
                }
                let result = self.reduce(lhs_ty, &mut app.ty_args, &mut ty_args);
                self.type_args.insert(id, ty_args);
                result
            }

            ExprKind::Map(map) => {
                let self_ty = self.find_node_type(id);
                let mut lhs_ty = self.check_expr(&mut map.lhs);
                lhs_ty = self.find(lhs_ty);
                if self.is_ptr_like(lhs_ty) {
                    let wrapper_id = self.fresh_id();
                    map.lhs.wrap_in_place(wrapper_id, |inner| {
                        ExprKind::Prefix(PrefixOp::Deref, inner)
                    });
                    lhs_ty = self.check_expr(&mut map.lhs);
                    lhs_ty = self.find(lhs_ty);
                }

                let ref_info = self
                    .arena
                    .as_ref_type(lhs_ty)
                    .map(|(_, mutable, addr_space)| (mutable, addr_space));
                let inner = match self.arena.as_ref_type(lhs_ty) {
                    Some((pointee, _, _)) => self.find(pointee),
                    None => lhs_ty,
                };

                for arg in map.args.iter_mut() {
                    self.rvalue(arg);
                }

                if self.arena.is_unknown(inner) {
                    return self_ty;
                }

                if let Some(elem) = self.arena.array_elem(inner) {
                    return self.wrap_ref(ref_info, elem);
                }

                if let Some(ops) = self.arena.as_tuple(inner) {
                    let elem = match map.args.first().map(|arg| &arg.kind) {
                        Some(ExprKind::Lit(Lit::Int(value, _))) => ops
                            .get(*value as usize)
                            .copied()
                            .unwrap_or_else(|| self.arena.error()),
                        _ => self.arena.error(),
                    };
                    return self.wrap_ref(ref_info, elem);
                }

                if let TypeTerm::Simd { elem, .. } = self.arena.term(inner) {
                    let elem = *elem;
                    return self.wrap_ref(ref_info, elem);
                }

                // From here on the receiver is a callee; strip the reference.
                let mut callee_ty = inner;
                if ref_info.is_some() {
                    let wrapper_id = self.fresh_id();
                    map.lhs.wrap_in_place(wrapper_id, ExprKind::Ref2RValue);
                    callee_ty = self.check_expr(&mut map.lhs);
                    callee_ty = self.find(callee_ty);
                }

                if self.arena.as_lambda(callee_ty).is_some() {
                    if !matches!(map.lhs.kind, ExprKind::TypeApp(_)) {
                        let wrapper_id = self.fresh_id();
                        map.lhs.wrap_in_place(wrapper_id, |inner| {
                            ExprKind::TypeApp(TypeAppExpr {
                                lhs: inner,
                                ty_args: Vec::new(),
                            })
                        });
                    }
                    callee_ty = self.check_expr(&mut map.lhs);
                    callee_ty = self.find(callee_ty);
                }

                if self.arena.as_fn(callee_ty).is_some() {
                    return self.check_call(&mut map.lhs, &mut map.args, None, self_ty);
                }

                self.arena.error()
            }

            ExprKind::Block(block) => {
                for stmt in block.stmts.iter_mut() {
                    if let StmtKind::Item(item) = &mut stmt.kind {
                        self.check_item_head(item);
                    }
                }
                for stmt in block.stmts.iter_mut() {
                    self.check_stmt(stmt);
                }
                match &mut block.tail {
                    Some(tail) => self.rvalue(tail),
                    None => self.arena.unit(),
                }
            }

            ExprKind::If(if_expr) => {
                let bool_ty = self.arena.prim(PrimType::Bool);
                self.rvalue_with(&mut if_expr.cond, bool_ty);
                let then_ty = self.rvalue(&mut if_expr.then_expr);
                let else_ty = self.rvalue(&mut if_expr.else_expr);

                // A diverging arm is absorbed by the other.
                if then_ty.is_noret() {
                    return else_ty;
                }
                if else_ty.is_noret() {
                    return then_ty;
                }

                self.constrain_node(if_expr.then_expr.id, else_ty);
                self.constrain_node(if_expr.else_expr.id, then_ty)
            }

            ExprKind::While(while_expr) => {
                let bool_ty = self.arena.prim(PrimType::Bool);
                self.rvalue_with(&mut while_expr.cond, bool_ty);
                self.check_loop_decl(&while_expr.break_decl);
                self.check_loop_decl(&while_expr.continue_decl);
                self.rvalue(&mut while_expr.body);
                self.arena.unit()
            }

            ExprKind::For(for_expr) => {
                let self_ty = self.find_node_type(id);
                match &mut for_expr.expr.kind {
                    ExprKind::Prefix(PrefixOp::Run | PrefixOp::Hlt, rhs) => self.infer_for(
                        rhs,
                        &mut for_expr.fn_expr,
                        &for_expr.break_decl,
                        self_ty,
                    ),
                    _ => self.infer_for(
                        &mut for_expr.expr,
                        &mut for_expr.fn_expr,
                        &for_expr.break_decl,
                        self_ty,
                    ),
                }
            }

            ExprKind::Closure(closure) => {
                let count = closure.params.len();
                let slot_fn_ops = self
                    .node_types
                    .get(id)
                    .map(|ty| self.find(ty))
                    .and_then(|ty| self.arena.as_fn(ty));
                let mut param_types: Vec<TypeId> = Vec::with_capacity(count);
                for (i, param) in closure.params.iter_mut().enumerate() {
                    let ty = self.check_local(param);
                    param_types.push(ty);
                    if let Some(ops) = &slot_fn_ops {
                        if i < ops.len() {
                            if let Some(param_decl) = self.res.decl_of(param.id) {
                                self.constrain_decl(param_decl, ops[i]);
                            }
                        }
                    }
                }

                let body_ty = self.rvalue(&mut closure.body);
                let body_ty = self.find(body_ty);
                if !body_ty.is_noret() && !self.arena.is_unknown(body_ty) && count > 0 {
                    let cont = self.arena.fn_from_type(body_ty);
                    let last = count - 1;
                    let ty = match self.res.decl_of(closure.params[last].id) {
                        Some(param_decl) => self.constrain_decl(param_decl, cont),
                        None => cont,
                    };
                    param_types[last] = ty;
                }
                self.arena.fn_type(param_types.into_iter().collect())
            }
        }
    }

    /// Loop continuations have the empty continuation type `fn()`.
    fn check_loop_decl(&mut self, local: &LocalDecl) {
        if let Some(decl) = self.res.decl_of(local.id) {
            let cont = self.arena.fn_type(TypeIdVec::new());
            self.constrain_decl(decl, cont);
        }
    }

    fn infer_for(
        &mut self,
        target: &mut Expr,
        fn_expr: &mut Expr,
        break_decl: &LocalDecl,
        self_ty: TypeId,
    ) -> TypeId {
        if let ExprKind::Map(map) = &mut target.kind {
            let lhs_ty = self.rvalue(&mut map.lhs);
            let lhs_ty = self.find(lhs_ty);
            if let Some(ops) = self.arena.as_fn(lhs_ty) {
                if let Some(&last) = ops.last() {
                    let last = self.find(last);
                    // The loop body's return continuation doubles as `break`.
                    if self.arena.as_fn(last).is_some() {
                        if let Some(decl) = self.res.decl_of(break_decl.id) {
                            self.constrain_decl(decl, last);
                        }
                    }
                }
                return self.check_call(&mut map.lhs, &mut map.args, Some(fn_expr), self_ty);
            }
            for arg in map.args.iter_mut() {
                self.rvalue(arg);
            }
        }
        self.rvalue(fn_expr);
        self.arena.unit()
    }

    /// Infer a call through a continuation-style function type. A call that
    /// fills every operand including the return continuation has type
    /// `NoRet`; a call missing exactly the continuation evaluates to the
    /// continuation's unpacked return type.
    pub(super) fn check_call(
        &mut self,
        lhs: &mut Expr,
        args: &mut [Expr],
        mut extra: Option<&mut Expr>,
        call_ty: TypeId,
    ) -> TypeId {
        let lhs_ty = self.find_node_type(lhs.id);
        let fn_ops = match self.arena.as_fn(lhs_ty) {
            Some(ops) => ops,
            None => return self.arena.error(),
        };
        let arity = fn_ops.len();
        let total = args.len() + usize::from(extra.is_some());

        for arg in args.iter_mut() {
            self.rvalue(arg);
        }
        if let Some(extra) = extra.as_deref_mut() {
            self.rvalue(extra);
        }

        if total == arity {
            let mut types = TypeIdVec::new();
            for (i, arg) in args.iter_mut().enumerate() {
                types.push(self.coerce(fn_ops[i], arg));
            }
            if let Some(extra) = extra.as_deref_mut() {
                types.push(self.coerce(fn_ops[total - 1], extra));
            }
            let refined = self.arena.fn_type(types);
            self.constrain_node(lhs.id, refined);
            return self.arena.noret();
        }

        if total + 1 == arity {
            let mut types = TypeIdVec::new();
            for (i, arg) in args.iter_mut().enumerate() {
                types.push(self.coerce(fn_ops[i], arg));
            }
            if let Some(extra) = extra.as_deref_mut() {
                types.push(self.coerce(fn_ops[total - 1], extra));
            }
            types.push(fn_ops[arity - 1]);
            let refined = self.arena.fn_type(types);
            let result = self.constrain_node(lhs.id, refined);
            if self.arena.as_fn(result).is_some() {
                return self.arena.return_type(result);
            }
            return call_ty;
        }

        self.arena.error()
    }

    fn is_ptr_like(&mut self, ty: TypeId) -> bool {
        if self.arena.as_ptr(ty).is_some() {
            return true;
        }
        if let Some((pointee, _, _)) = self.arena.as_ref_type(ty) {
            let pointee = self.find(pointee);
            return self.arena.as_ptr(pointee).is_some();
        }
        false
    }

    // ========================================================================
    // AST types
    // ========================================================================

    /// Infer an AST type and constrain its type slot with the result.
    pub fn check_ast_type(&mut self, ast_type: &mut AstType) -> TypeId {
        let ty = self.infer_ast_type(ast_type);
        self.constrain_node(ast_type.id, ty)
    }

    fn infer_ast_type(&mut self, ast_type: &mut AstType) -> TypeId {
        let id = ast_type.id;
        match &mut ast_type.kind {
            AstTypeKind::Prim(prim) => self.arena.prim(*prim),
            AstTypeKind::Ptr {
                kind,
                mutable,
                addr_space,
                pointee,
            } => {
                let kind = *kind;
                let mutable = *mutable;
                let addr_space = *addr_space;
                let pointee = self.check_ast_type(pointee);
                match kind {
                    PtrKind::Borrowed => self.arena.borrowed_ptr(pointee, mutable, addr_space),
                    PtrKind::Owned => self.arena.owned_ptr(pointee, addr_space),
                }
            }
            AstTypeKind::IndefArray(elem) => {
                let elem = self.check_ast_type(elem);
                self.arena.indef_array(elem)
            }
            AstTypeKind::DefArray(elem, dim) => {
                let dim = *dim;
                let elem = self.check_ast_type(elem);
                self.arena.def_array(elem, dim)
            }
            AstTypeKind::Simd(elem, lanes) => {
                let lanes = *lanes;
                let elem = self.check_ast_type(elem);
                self.arena.simd(elem, lanes)
            }
            AstTypeKind::Tuple(elems) => {
                let ops: TypeIdVec = elems
                    .iter_mut()
                    .map(|elem| self.check_ast_type(elem))
                    .collect();
                self.arena.tuple(ops)
            }
            AstTypeKind::Fn(fn_type) => {
                let num = fn_type.type_params.len();
                self.open_type_params(num);
                for param in &mut fn_type.type_params {
                    for bound in &mut param.bounds {
                        self.check_ast_type(bound);
                    }
                }
                let ops: TypeIdVec = fn_type
                    .args
                    .iter_mut()
                    .map(|arg| self.check_ast_type(arg))
                    .collect();
                let fn_ty = self.arena.fn_type(ops);
                let closed = self.close_over(&fn_type.type_params, fn_ty);
                self.close_type_params(num);
                closed
            }
            AstTypeKind::Typeof(expr) => self.rvalue(expr),
            AstTypeKind::App(_, args) => {
                let decl = match self.res.use_of(id) {
                    Some(decl) => decl,
                    None => return self.arena.error(),
                };
                let (kind, binder_index) = {
                    let d = self.decls.get(decl);
                    (d.kind, d.binder_index)
                };
                if kind == DeclKind::TypeParam {
                    return self.var_for(binder_index);
                }
                if !kind.is_type() {
                    return self.arena.error();
                }
                let ty = self.find_decl_type(decl);
                if self.arena.as_lambda(ty).is_some() {
                    let mut ty_args = self.type_args.remove(&id).unwrap_or_default();
                    let result = self.reduce(ty, args, &mut ty_args);
                    self.type_args.insert(id, ty_args);
                    result
                } else {
                    ty
                }
            }
            AstTypeKind::Error => self.arena.error(),
        }
    }
}
