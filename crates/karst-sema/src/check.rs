// check.rs
//
// Post-inference type checking. Runs once after the fixpoint converges,
// never refines types, and reports everything the inferencer left implicit:
// operand kinds, lvalue-ness, cast legality, arities, struct literal
// completeness, unknown residue, and the warning set.

use karst_frontend::{
    AstType, AstTypeKind, Expr, ExprKind, FnItem, InfixOp, Interner, Item, ItemKind, Lit,
    LocalDecl, Module, NodeId, PostfixOp, PrefixOp, Ptrn, PtrnKind, Stmt, StmtKind,
};

use crate::decl::{DeclId, DeclKind, DeclTable, Resolutions};
use crate::errors::{Diagnostics, SemaError, SemaWarning};
use crate::node_types::NodeTypes;
use crate::type_arena::{TypeArena, TypeId, TypeTerm};
use crate::type_display::display_type;
use crate::AnalysisOptions;

/// Run the type checker over a fully inferred module.
#[allow(clippy::too_many_arguments)]
pub fn check_types(
    module: &Module,
    arena: &mut TypeArena,
    decls: &mut DeclTable,
    res: &Resolutions,
    node_types: &NodeTypes,
    interner: &Interner,
    diags: &mut Diagnostics,
    options: &AnalysisOptions,
) {
    let mut check = TypeCheck {
        arena,
        decls,
        res,
        node_types,
        interner,
        diags,
        nossa: options.nossa,
        cur_fn: None,
        block_locals: Vec::new(),
    };
    for item in &module.items {
        check.check_item(item);
    }
}

struct TypeCheck<'a> {
    arena: &'a mut TypeArena,
    decls: &'a mut DeclTable,
    res: &'a Resolutions,
    node_types: &'a NodeTypes,
    interner: &'a Interner,
    diags: &'a mut Diagnostics,
    nossa: bool,
    /// The function or closure whose body is being checked.
    cur_fn: Option<NodeId>,
    /// Locals declared per enclosing block, for the unused-mut warning.
    block_locals: Vec<Vec<DeclId>>,
}

impl TypeCheck<'_> {
    // ========================================================================
    // Helpers
    // ========================================================================

    fn ty(&self, node: NodeId) -> TypeId {
        self.node_types.get(node).unwrap_or(TypeId::ERROR)
    }

    fn display(&self, ty: TypeId) -> String {
        display_type(self.arena, self.decls, self.interner, ty)
    }

    fn name(&self, decl: DeclId) -> String {
        self.interner.resolve(self.decls.get(decl).symbol).to_string()
    }

    /// The operand type used for kind checks: lvalue references are
    /// transparent, and simd vectors check their element type.
    fn scalar(&self, expr: &Expr) -> TypeId {
        let ty = self.strip_ref(self.ty(expr.id));
        match self.arena.term(ty) {
            TypeTerm::Simd { elem, .. } => *elem,
            _ => ty,
        }
    }

    fn expect(
        &mut self,
        expr: &Expr,
        pred: impl Fn(&TypeArena, TypeId) -> bool,
        what: &'static str,
        context: String,
    ) {
        let ty = self.scalar(expr);
        if !ty.is_error() && !pred(self.arena, ty) {
            self.diags.error(SemaError::InvalidOperand {
                expected: what,
                found: self.display(ty),
                context,
                span: expr.span.into(),
            });
        }
    }

    fn expect_bool(&mut self, expr: &Expr, context: String) {
        self.expect(expr, |a, t| a.is_bool(t), "boolean type", context);
    }

    fn expect_int(&mut self, expr: &Expr, context: String) {
        self.expect(expr, |a, t| a.is_int(t), "integer type", context);
    }

    fn expect_int_or_bool(&mut self, expr: &Expr, context: String) {
        self.expect(
            expr,
            |a, t| a.is_int(t) || a.is_bool(t),
            "integer or boolean type",
            context,
        );
    }

    fn expect_num(&mut self, expr: &Expr, context: String) {
        self.expect(
            expr,
            |a, t| a.is_int(t) || a.is_float(t),
            "number type",
            context,
        );
    }

    fn expect_num_or_bool(&mut self, expr: &Expr, context: String) {
        self.expect(
            expr,
            |a, t| a.is_int(t) || a.is_float(t) || a.is_bool(t),
            "number or boolean type",
            context,
        );
    }

    fn expect_ptr(&mut self, expr: &Expr, context: String) {
        self.expect(expr, |a, t| a.as_ptr(t).is_some(), "pointer type", context);
    }

    fn expect_lvalue(&mut self, expr: &Expr, context: String) {
        if !self.is_lvalue(expr) {
            self.diags.error(SemaError::LvalueRequired {
                context,
                span: expr.span.into(),
            });
        }
    }

    fn expect_known(&mut self, decl: DeclId, span: karst_frontend::Span) {
        let known = match self.decls.get(decl).ty {
            Some(ty) => self.arena.is_known(ty),
            None => false,
        };
        if !known {
            self.diags.error(SemaError::CannotInfer {
                name: self.name(decl),
                span: span.into(),
            });
        }
    }

    fn expect_type(&mut self, expr: &Expr, found: TypeId, context: &str) {
        let ty = self.ty(expr.id);
        if ty != found
            && !ty.is_error()
            && !found.is_error()
            && self.arena.is_known(ty)
            && self.arena.is_known(found)
        {
            self.diags.error(SemaError::MismatchedType {
                expected: self.display(ty),
                found: self.display(found),
                context: context.to_string(),
                span: expr.span.into(),
            });
        }
    }

    /// Lvalue expressions: paths to mutable declarations, dereferences of
    /// pointers, fields and indexes of lvalues, and assignments.
    fn is_lvalue(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Path(_) => match self.res.use_of(expr.id) {
                Some(decl) => {
                    let d = self.decls.get(decl);
                    d.kind.is_value() && d.mutable
                }
                None => false,
            },
            ExprKind::Prefix(PrefixOp::Deref, rhs) => {
                self.arena.as_ptr(self.ty(rhs.id)).is_some()
            }
            ExprKind::Field(lhs, _) => self.is_lvalue(lhs),
            ExprKind::Map(map) => {
                let receiver = self.strip_ref(self.ty(map.lhs.id));
                let indexable = matches!(
                    self.arena.term(receiver),
                    TypeTerm::DefArray { .. }
                        | TypeTerm::IndefArray { .. }
                        | TypeTerm::Tuple(_)
                        | TypeTerm::Simd { .. }
                );
                indexable && self.is_lvalue(&map.lhs)
            }
            ExprKind::Infix(op, _, _) => op.is_assign(),
            _ => false,
        }
    }

    fn strip_ref(&self, ty: TypeId) -> TypeId {
        match self.arena.as_ref_type(ty) {
            Some((pointee, _, _)) => pointee,
            None => ty,
        }
    }

    /// Record that an assignment or increment targets `expr`'s root
    /// declaration. Writes through a dereference do not write the pointer.
    fn mark_written(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Path(_) => {
                if let Some(decl) = self.res.use_of(expr.id) {
                    self.decls.get_mut(decl).written = true;
                }
            }
            ExprKind::Field(lhs, _) => self.mark_written(lhs),
            ExprKind::Map(map) => self.mark_written(&map.lhs),
            ExprKind::Ref2RValue(src) | ExprKind::ImplicitCast(src) => self.mark_written(src),
            _ => {}
        }
    }

    /// Record that `expr`'s root declaration has its address observed.
    fn mark_address_taken(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Path(_) => {
                if let Some(decl) = self.res.use_of(expr.id) {
                    self.decls.get_mut(decl).address_taken = true;
                }
            }
            ExprKind::Field(lhs, _) => self.mark_address_taken(lhs),
            ExprKind::Map(map) => self.mark_address_taken(&map.lhs),
            ExprKind::Ref2RValue(src) | ExprKind::ImplicitCast(src) => {
                self.mark_address_taken(src)
            }
            _ => {}
        }
    }

    /// Effectful expressions escape the no-effect warning: assignments,
    /// increments, calls, and anything containing one.
    fn has_side_effect(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Prefix(PrefixOp::Inc | PrefixOp::Dec, _) => true,
            ExprKind::Prefix(_, rhs) => self.has_side_effect(rhs),
            ExprKind::Postfix(PostfixOp::Inc | PostfixOp::Dec, _) => true,
            ExprKind::Infix(op, lhs, rhs) => {
                op.is_assign() || self.has_side_effect(lhs) || self.has_side_effect(rhs)
            }
            ExprKind::Map(map) => {
                self.arena.as_fn(self.ty(map.lhs.id)).is_some()
                    || map.args.iter().any(|arg| self.has_side_effect(arg))
                    || self.has_side_effect(&map.lhs)
            }
            ExprKind::Block(block) => {
                block.stmts.iter().any(|stmt| match &stmt.kind {
                    StmtKind::Expr(expr) => self.has_side_effect(expr),
                    StmtKind::Let(let_stmt) => let_stmt
                        .init
                        .as_ref()
                        .is_some_and(|init| self.has_side_effect(init)),
                    StmtKind::Item(_) => false,
                }) || block
                    .tail
                    .as_ref()
                    .is_some_and(|tail| self.has_side_effect(tail))
            }
            ExprKind::If(if_expr) => {
                self.has_side_effect(&if_expr.cond)
                    || self.has_side_effect(&if_expr.then_expr)
                    || self.has_side_effect(&if_expr.else_expr)
            }
            ExprKind::While(while_expr) => {
                self.has_side_effect(&while_expr.cond) || self.has_side_effect(&while_expr.body)
            }
            ExprKind::For(_) => true,
            ExprKind::Cast(src, _) | ExprKind::ImplicitCast(src) | ExprKind::Ref2RValue(src) => {
                self.has_side_effect(src)
            }
            ExprKind::TypeApp(app) => self.has_side_effect(&app.lhs),
            ExprKind::StructLit(lit) => {
                lit.fields.iter().any(|f| self.has_side_effect(&f.expr))
            }
            ExprKind::DefArray(args) | ExprKind::Simd(args) | ExprKind::Tuple(args) => {
                args.iter().any(|arg| self.has_side_effect(arg))
            }
            ExprKind::RepeatArray(value, _) => self.has_side_effect(value),
            ExprKind::IndefArray(dim, _) => self.has_side_effect(dim),
            _ => false,
        }
    }

    // ========================================================================
    // Items
    // ========================================================================

    fn check_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Module(module) => {
                for item in &module.items {
                    self.check_item(item);
                }
            }
            ItemKind::ExternBlock(block) => {
                if let Some(abi) = block.abi.as_deref() {
                    if abi != "C" && abi != "device" && abi != "thorin" {
                        self.diags.error(SemaError::UnknownAbi {
                            span: item.span.into(),
                        });
                    }
                }
                for f in &block.fns {
                    self.check_fn(f);
                }
            }
            ItemKind::Typedef(t) => self.check_ast_type(&t.ty),
            ItemKind::Struct(s) => {
                for field in &s.fields {
                    self.check_ast_type(&field.ty);
                }
            }
            ItemKind::Enum(_) => {}
            ItemKind::Static(s) => {
                if let Some(ast_type) = &s.ast_type {
                    self.check_ast_type(ast_type);
                }
                if let Some(init) = &s.init {
                    self.check_expr(init);
                }
                if let Some(decl) = self.res.decl_of(item.id) {
                    self.expect_known(decl, item.span);
                }
            }
            ItemKind::Fn(f) => self.check_fn(f),
            // Trait bounds and impl conformance are accepted, not verified.
            ItemKind::Trait(_) | ItemKind::Impl(_) => {}
        }
    }

    fn check_fn(&mut self, f: &FnItem) {
        let prev_fn = self.cur_fn.replace(f.id);
        for param in &f.params {
            self.check_param(param);
        }

        if let Some(body) = &f.body {
            self.check_expr(body);
            self.warn_unused_mut_params(&f.params);
            self.check_return(f, body);
        }
        self.cur_fn = prev_fn;
    }

    fn check_param(&mut self, param: &LocalDecl) {
        if let Some(ast_type) = &param.ast_type {
            self.check_ast_type(ast_type);
        }
        if let Some(decl) = self.res.decl_of(param.id) {
            self.expect_known(decl, param.span);
        }
    }

    fn warn_unused_mut_params(&mut self, params: &[LocalDecl]) {
        for param in params {
            if let Some(decl) = self.res.decl_of(param.id) {
                let d = self.decls.get(decl);
                if d.mutable && !d.written {
                    self.diags.warning(SemaWarning::UnusedMutParam {
                        name: self.name(decl),
                        span: param.span.into(),
                    });
                }
            }
        }
    }

    /// The body's type must agree with the declared return continuation.
    fn check_return(&mut self, f: &FnItem, body: &Expr) {
        let fn_ty = match self.res.decl_of(f.id).and_then(|d| self.decls.get(d).ty) {
            Some(ty) => ty,
            None => return,
        };
        let mut fn_ty = fn_ty;
        while let Some((inner, _)) = self.arena.as_lambda(fn_ty) {
            fn_ty = inner;
        }
        if self.arena.as_fn(fn_ty).is_none() {
            return;
        }
        let ret = self.arena.return_type(fn_ty);
        let body_ty = self.ty(body.id);
        if body_ty != ret
            && !body_ty.is_noret()
            && !body_ty.is_error()
            && !ret.is_error()
            && self.arena.is_known(body_ty)
            && self.arena.is_known(ret)
        {
            self.diags.error(SemaError::ReturnTypeMismatch {
                expected: self.display(ret),
                found: self.display(body_ty),
                span: body.span.into(),
            });
        }
    }

    // ========================================================================
    // Statements and patterns
    // ========================================================================

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
                if self.ty(expr.id).is_noret() {
                    self.diags.warning(SemaWarning::Unreachable {
                        span: expr.span.into(),
                    });
                }
                if !self.has_side_effect(expr) {
                    self.diags.warning(SemaWarning::NoEffect {
                        span: expr.span.into(),
                    });
                }
            }
            StmtKind::Item(item) => self.check_item(item),
            StmtKind::Let(let_stmt) => {
                self.check_ptrn(&let_stmt.ptrn);
                if let Some(init) = &let_stmt.init {
                    self.check_expr(init);
                    let ptrn_ty = self.ty(let_stmt.ptrn.id);
                    let init_ty = self.ty(init.id);
                    if ptrn_ty != init_ty
                        && !ptrn_ty.is_error()
                        && !init_ty.is_error()
                        && self.arena.is_known(ptrn_ty)
                        && self.arena.is_known(init_ty)
                    {
                        self.diags.error(SemaError::MismatchedType {
                            expected: self.display(ptrn_ty),
                            found: self.display(init_ty),
                            context: "initializer type".to_string(),
                            span: init.span.into(),
                        });
                    }
                }
            }
        }
    }

    fn check_ptrn(&mut self, ptrn: &Ptrn) {
        match &ptrn.kind {
            PtrnKind::Id(local) => {
                if let Some(ast_type) = &local.ast_type {
                    self.check_ast_type(ast_type);
                }
                if let Some(decl) = self.res.decl_of(local.id) {
                    if let Some(locals) = self.block_locals.last_mut() {
                        locals.push(decl);
                    }
                    self.expect_known(decl, local.span);
                }
            }
            PtrnKind::Tuple(elems) => {
                for elem in elems {
                    self.check_ptrn(elem);
                }
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Empty | ExprKind::Char(_) | ExprKind::Str(_) => {}

            ExprKind::Lit(lit) => self.check_lit(expr, lit),

            ExprKind::Path(_) => {
                if let Some(decl) = self.res.use_of(expr.id) {
                    let d = self.decls.get(decl);
                    // Mutable locals reachable from nested functions (or any
                    // mutable local under `nossa`) must live in memory.
                    if matches!(d.kind, DeclKind::Local | DeclKind::Param)
                        && d.mutable
                        && (self.nossa || d.owner_fn != self.cur_fn)
                    {
                        self.decls.get_mut(decl).address_taken = true;
                    }
                }
            }

            ExprKind::Prefix(op, rhs) => {
                self.check_expr(rhs);
                match op {
                    PrefixOp::Ref | PrefixOp::RefMut => {
                        if !is_literal_like(rhs) {
                            self.expect_lvalue(rhs, format!("as unary '{}' operand", op.as_str()));
                        }
                        self.mark_address_taken(rhs);
                    }
                    PrefixOp::Tilde => {}
                    PrefixOp::Deref => self.expect_ptr(rhs, "unary '*'".to_string()),
                    PrefixOp::Inc | PrefixOp::Dec => {
                        self.expect_num(rhs, format!("prefix '{}'", op.as_str()));
                        self.expect_lvalue(rhs, format!("prefix '{}'", op.as_str()));
                        self.mark_written(rhs);
                    }
                    PrefixOp::Plus | PrefixOp::Minus => {
                        self.expect_num(rhs, format!("unary '{}'", op.as_str()));
                    }
                    PrefixOp::Not => self.expect_int_or_bool(rhs, "unary '!'".to_string()),
                    PrefixOp::Run | PrefixOp::Hlt => {}
                }
            }

            ExprKind::Infix(op, lhs, rhs) => self.check_infix(expr, *op, lhs, rhs),

            ExprKind::Postfix(op, lhs) => {
                self.check_expr(lhs);
                self.expect_num(lhs, format!("postfix '{}'", op.as_str()));
                self.expect_lvalue(lhs, format!("postfix '{}'", op.as_str()));
                self.mark_written(lhs);
            }

            ExprKind::Cast(src, ast_type) => {
                self.check_expr(src);
                self.check_ast_type(ast_type);
                self.check_cast(expr, src, ast_type);
            }

            ExprKind::ImplicitCast(src) | ExprKind::Ref2RValue(src) => self.check_expr(src),

            ExprKind::Field(lhs, symbol) => {
                self.check_expr(lhs);
                let receiver = self.strip_ref(self.ty(lhs.id));
                if receiver.is_error() || !self.arena.is_known(receiver) {
                    return;
                }
                let found = self
                    .arena
                    .as_struct(receiver)
                    .and_then(|s| self.decls.field_index(s, *symbol))
                    .is_some();
                if !found {
                    self.diags.error(SemaError::NoSuchField {
                        ty: self.display(receiver),
                        field: self.interner.resolve(*symbol).to_string(),
                        span: expr.span.into(),
                    });
                }
            }

            ExprKind::DefArray(args) => {
                let elem = match self.arena.term(self.ty(expr.id)) {
                    TypeTerm::DefArray { elem, .. } => Some(*elem),
                    _ => None,
                };
                for arg in args {
                    self.check_expr(arg);
                    if let Some(elem) = elem {
                        self.expect_type(arg, elem, "element of definite array expression");
                    }
                }
            }

            ExprKind::Simd(args) => {
                let elem = match self.arena.term(self.ty(expr.id)) {
                    TypeTerm::Simd { elem, .. } => Some(*elem),
                    _ => None,
                };
                for arg in args {
                    self.check_expr(arg);
                    if let Some(elem) = elem {
                        self.expect_type(arg, elem, "element of simd expression");
                    }
                }
            }

            ExprKind::RepeatArray(value, _) => self.check_expr(value),

            ExprKind::IndefArray(dim, elem_ty) => {
                self.check_expr(dim);
                self.expect_int(dim, "dimensions in indefinite array expression".to_string());
                self.check_ast_type(elem_ty);
            }

            ExprKind::Tuple(args) => {
                for arg in args {
                    self.check_expr(arg);
                }
            }

            ExprKind::StructLit(lit) => self.check_struct_lit(expr, lit),

            ExprKind::TypeApp(app) => {
                self.check_expr(&app.lhs);
                for arg in &app.ty_args {
                    self.check_ast_type(arg);
                }
                let callee_ty = self.strip_ref(self.ty(app.lhs.id));
                if self.arena.as_lambda(callee_ty).is_some() {
                    let num = self.arena.num_lambdas(callee_ty);
                    if app.ty_args.len() > num {
                        self.diags.error(SemaError::WrongTypeArgCount {
                            expected: num,
                            found: app.ty_args.len(),
                            span: expr.span.into(),
                        });
                    }
                }
            }

            ExprKind::Map(map) => self.check_map(expr, map),

            ExprKind::Block(block) => {
                self.block_locals.push(Vec::new());
                for stmt in &block.stmts {
                    self.check_stmt(stmt);
                }
                if let Some(tail) = &block.tail {
                    self.check_expr(tail);
                }
                let locals = self.block_locals.pop().unwrap_or_default();
                for decl in locals {
                    let d = self.decls.get(decl);
                    if d.mutable && !d.written {
                        let span = d.span;
                        self.diags.warning(SemaWarning::UnusedMut {
                            name: self.name(decl),
                            span: span.into(),
                        });
                    }
                }
            }

            ExprKind::If(if_expr) => {
                self.check_expr(&if_expr.cond);
                self.check_expr(&if_expr.then_expr);
                self.check_expr(&if_expr.else_expr);
            }

            ExprKind::While(while_expr) => {
                self.check_expr(&while_expr.cond);
                self.check_expr(&while_expr.body);
            }

            ExprKind::For(for_expr) => {
                self.check_expr(&for_expr.expr);
                self.check_expr(&for_expr.fn_expr);
            }

            ExprKind::Closure(closure) => {
                let prev_fn = self.cur_fn.replace(expr.id);
                for param in &closure.params {
                    self.check_param(param);
                }
                self.check_expr(&closure.body);
                self.warn_unused_mut_params(&closure.params);
                self.cur_fn = prev_fn;
            }
        }
    }

    /// Literal kind must agree with the inferred type once known.
    fn check_lit(&mut self, expr: &Expr, lit: &Lit) {
        let ty = self.ty(expr.id);
        if ty.is_error() || !self.arena.is_known(ty) {
            return;
        }
        match lit {
            Lit::Int(_, _) => {
                if !self.arena.is_int(ty) && !self.arena.is_float(ty) {
                    self.diags.error(SemaError::InvalidOperand {
                        expected: "number type",
                        found: self.display(ty),
                        context: "integer literal".to_string(),
                        span: expr.span.into(),
                    });
                }
            }
            Lit::Float(_, _) => {
                if !self.arena.is_float(ty) {
                    self.diags.error(SemaError::InvalidOperand {
                        expected: "floating type",
                        found: self.display(ty),
                        context: "float literal".to_string(),
                        span: expr.span.into(),
                    });
                }
            }
            Lit::Bool(_) => {}
        }
    }

    fn check_infix(&mut self, expr: &Expr, op: InfixOp, lhs: &Expr, rhs: &Expr) {
        self.check_expr(lhs);
        self.check_expr(rhs);

        let lhs_ty = self.strip_ref(self.ty(lhs.id));
        let rhs_ty = self.strip_ref(self.ty(rhs.id));
        if lhs_ty != rhs_ty && !lhs_ty.is_error() && !rhs_ty.is_error() {
            self.diags.error(SemaError::OperandsDisagree {
                lhs_ty: self.display(lhs_ty),
                rhs_ty: self.display(rhs_ty),
                span: expr.span.into(),
                lhs_span: lhs.span.into(),
                rhs_span: rhs.span.into(),
            });
        }

        let sides = |check: &mut Self,
                     f: fn(&mut Self, &Expr, String),
                     kind: &str| {
            f(check, lhs, format!("left-hand side of {kind} '{}'", op.as_str()));
            f(check, rhs, format!("right-hand side of {kind} '{}'", op.as_str()));
        };

        match op {
            InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Gt | InfixOp::Le | InfixOp::Ge => {
                sides(self, Self::expect_num_or_bool, "binary");
            }
            InfixOp::Add | InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Rem => {
                sides(self, Self::expect_num, "binary");
            }
            InfixOp::AndAnd | InfixOp::OrOr => {
                sides(self, Self::expect_bool, "logical");
            }
            InfixOp::Shl | InfixOp::Shr => {
                sides(self, Self::expect_int, "binary");
            }
            InfixOp::BitAnd | InfixOp::BitOr | InfixOp::BitXor => {
                sides(self, Self::expect_int_or_bool, "bitwise");
            }
            InfixOp::Assign => {
                self.expect_lvalue(lhs, "assignment".to_string());
                self.mark_written(lhs);
            }
            InfixOp::AddAssign
            | InfixOp::SubAssign
            | InfixOp::MulAssign
            | InfixOp::DivAssign
            | InfixOp::RemAssign => {
                sides(self, Self::expect_num, "binary");
                self.expect_lvalue(lhs, format!("assignment '{}'", op.as_str()));
                self.mark_written(lhs);
            }
            InfixOp::AndAssign | InfixOp::OrAssign | InfixOp::XorAssign => {
                sides(self, Self::expect_int_or_bool, "binary");
                self.expect_lvalue(lhs, format!("assignment '{}'", op.as_str()));
                self.mark_written(lhs);
            }
            InfixOp::ShlAssign | InfixOp::ShrAssign => {
                sides(self, Self::expect_int, "binary");
                self.expect_lvalue(lhs, format!("assignment '{}'", op.as_str()));
                self.mark_written(lhs);
            }
        }
    }

    /// Exactly these casts are legal, some in both directions.
    fn check_cast(&mut self, expr: &Expr, src: &Expr, ast_type: &AstType) {
        let src_ty = self.ty(src.id);
        let dst_ty = self.ty(ast_type.id);
        if src_ty.is_error() || dst_ty.is_error() {
            return;
        }
        if !self.arena.is_known(src_ty) || !self.arena.is_known(dst_ty) {
            return;
        }

        let is_ptr = |a: &TypeArena, t: TypeId| a.as_ptr(t).is_some();
        let a = &*self.arena;
        let symmetric = |f: &dyn Fn(TypeId, TypeId) -> bool| f(src_ty, dst_ty) || f(dst_ty, src_ty);

        let valid = (is_ptr(a, src_ty) && is_ptr(a, dst_ty))
            || (a.is_int(src_ty) && a.is_int(dst_ty))
            || (a.is_float(src_ty) && a.is_float(dst_ty))
            || symmetric(&|x, y| a.is_int(x) && is_ptr(a, y))
            || symmetric(&|x, y| a.is_int(x) && a.is_float(y))
            || symmetric(&|x, y| a.is_int(x) && a.is_bool(y))
            || symmetric(&|x, y| a.is_float(x) && a.is_bool(y));

        if !valid {
            self.diags.error(SemaError::InvalidCast {
                from: self.display(src_ty),
                to: self.display(dst_ty),
                span: expr.span.into(),
            });
        }
    }

    fn check_struct_lit(&mut self, expr: &Expr, lit: &karst_frontend::StructLitExpr) {
        self.check_ast_type(&lit.ty);
        for field in &lit.fields {
            self.check_expr(&field.expr);
        }

        let ty = self.strip_ref(self.ty(lit.ty.id));
        let struct_decl = match self.arena.as_struct(ty) {
            Some(decl) => decl,
            None => {
                if !ty.is_error() && self.arena.is_known(ty) {
                    let name = match &lit.ty.kind {
                        AstTypeKind::App(symbol, _) => {
                            self.interner.resolve(*symbol).to_string()
                        }
                        _ => self.display(ty),
                    };
                    self.diags.error(SemaError::NotAStruct {
                        name,
                        span: expr.span.into(),
                    });
                }
                return;
            }
        };

        // Every declared field initialized exactly once.
        let members = self.decls.get(struct_decl).members.clone();
        let mut done = vec![false; members.len()];
        for field in &lit.fields {
            match self.decls.field_index(struct_decl, field.symbol) {
                Some(index) => {
                    if done[index] {
                        self.diags.error(SemaError::StructFieldDuplicate {
                            field: self.interner.resolve(field.symbol).to_string(),
                            span: field.span.into(),
                        });
                    }
                    done[index] = true;
                }
                None => {
                    self.diags.error(SemaError::StructFieldUnknown {
                        strukt: self.name(struct_decl),
                        field: self.interner.resolve(field.symbol).to_string(),
                        span: field.span.into(),
                    });
                }
            }
        }
        for (index, initialized) in done.iter().enumerate() {
            if !initialized {
                let field = members[index];
                self.diags.error(SemaError::StructFieldMissing {
                    field: self.name(field),
                    span: expr.span.into(),
                });
            }
        }
    }

    fn check_map(&mut self, expr: &Expr, map: &karst_frontend::MapExpr) {
        self.check_expr(&map.lhs);
        for arg in &map.args {
            self.check_expr(arg);
        }

        let receiver = self.strip_ref(self.ty(map.lhs.id));
        if receiver.is_error() {
            return;
        }
        match self.arena.term(receiver).clone() {
            TypeTerm::Fn(ops) => {
                let arity = ops.len();
                let found = map.args.len();
                if found != arity && found + 1 != arity {
                    let relation = if found + 1 < arity { "few" } else { "many" };
                    self.diags.error(SemaError::WrongArgumentCount {
                        relation,
                        expected: arity.saturating_sub(1),
                        found,
                        span: expr.span.into(),
                    });
                }
            }
            TypeTerm::DefArray { .. } | TypeTerm::IndefArray { .. } => {
                if map.args.len() == 1 {
                    self.expect_int(&map.args[0], "for array subscript".to_string());
                } else {
                    self.diags.error(SemaError::TooManySubscripts {
                        what: "array",
                        span: expr.span.into(),
                    });
                }
            }
            TypeTerm::Tuple(_) => {
                if map.args.len() == 1 {
                    self.expect_int(&map.args[0], "for tuple subscript".to_string());
                    if !matches!(map.args[0].kind, ExprKind::Lit(Lit::Int(_, _))) {
                        self.diags.error(SemaError::NonLiteralSubscript {
                            span: map.args[0].span.into(),
                        });
                    }
                } else {
                    self.diags.error(SemaError::TooManySubscripts {
                        what: "tuple",
                        span: expr.span.into(),
                    });
                }
            }
            TypeTerm::Simd { .. } => {
                if map.args.len() == 1 {
                    self.expect_int(&map.args[0], "as vector subscript".to_string());
                } else {
                    self.diags.error(SemaError::TooManySubscripts {
                        what: "simd vector",
                        span: expr.span.into(),
                    });
                }
            }
            _ => {
                self.diags.error(SemaError::BadMapTarget {
                    ty: self.display(receiver),
                    span: expr.span.into(),
                });
            }
        }
    }

    // ========================================================================
    // AST types
    // ========================================================================

    fn check_ast_type(&mut self, ast_type: &AstType) {
        match &ast_type.kind {
            AstTypeKind::Prim(_) | AstTypeKind::Error => {}
            AstTypeKind::Ptr { pointee, .. } => self.check_ast_type(pointee),
            AstTypeKind::IndefArray(elem) | AstTypeKind::DefArray(elem, _) => {
                self.check_ast_type(elem)
            }
            AstTypeKind::Simd(elem, _) => {
                self.check_ast_type(elem);
                if self.arena.as_prim(self.ty(elem.id)).is_none() {
                    self.diags.error(SemaError::SimdElemNotPrim {
                        span: ast_type.span.into(),
                    });
                }
            }
            AstTypeKind::Tuple(elems) => {
                for elem in elems {
                    self.check_ast_type(elem);
                }
            }
            AstTypeKind::Fn(fn_type) => {
                for param in &fn_type.type_params {
                    for bound in &param.bounds {
                        self.check_ast_type(bound);
                    }
                }
                for arg in &fn_type.args {
                    self.check_ast_type(arg);
                }
            }
            AstTypeKind::Typeof(expr) => self.check_expr(expr),
            AstTypeKind::App(symbol, args) => {
                if let Some(decl) = self.res.use_of(ast_type.id) {
                    if !self.decls.get(decl).kind.is_type() {
                        self.diags.error(SemaError::NotAType {
                            name: self.interner.resolve(*symbol).to_string(),
                            span: ast_type.span.into(),
                        });
                    }
                }
                for arg in args {
                    self.check_ast_type(arg);
                }
            }
        }
    }
}

/// Literal-like operands of `&` are materialized as constants rather than
/// requiring an lvalue.
fn is_literal_like(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Lit(_)
            | ExprKind::Char(_)
            | ExprKind::Str(_)
            | ExprKind::DefArray(_)
            | ExprKind::RepeatArray(_, _)
            | ExprKind::Tuple(_)
            | ExprKind::Simd(_)
            | ExprKind::StructLit(_)
    )
}
