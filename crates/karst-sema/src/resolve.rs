// resolve.rs
//
// Name resolution: a single pass over the AST that binds every use site to a
// declaration. Scoping uses an explicit declaration stack with shadow links
// so that popping a scope restores exactly what the scope hid.

use rustc_hash::FxHashMap;

use karst_frontend::{
    AstType, AstTypeKind, Expr, ExprKind, FnItem, Interner, Item, ItemKind, LocalDecl, Module,
    NodeId, Ptrn, PtrnKind, Stmt, StmtKind, Symbol, TypeParam,
};

use crate::decl::{DeclId, DeclKind, DeclTable, Resolutions};
use crate::errors::{Diagnostics, SemaError};

/// Run name resolution over a whole module.
///
/// Fills `decls` with one entry per binding site, `res` with both
/// declaration-node and use-node mappings, and reports undefined and
/// duplicate symbols into `diags`.
pub fn resolve_names(
    module: &Module,
    interner: &mut Interner,
    decls: &mut DeclTable,
    res: &mut Resolutions,
    diags: &mut Diagnostics,
) {
    let mut resolver = NameResolver {
        interner,
        decls,
        res,
        diags,
        symbol_to_decl: FxHashMap::default(),
        decl_stack: Vec::new(),
        levels: Vec::new(),
        type_binders: 0,
        cur_fn: None,
        handles: Vec::new(),
    };

    resolver.push_scope();
    resolver.check_items(&module.items);
    resolver.pop_scope();

    debug_assert!(resolver.decl_stack.is_empty());
    debug_assert!(resolver.levels.is_empty());
    debug_assert!(resolver.symbol_to_decl.is_empty());
}

struct NameResolver<'a> {
    interner: &'a mut Interner,
    decls: &'a mut DeclTable,
    res: &'a mut Resolutions,
    diags: &'a mut Diagnostics,
    symbol_to_decl: FxHashMap<Symbol, DeclId>,
    decl_stack: Vec<DeclId>,
    /// One entry per open scope: (decl stack length, type binder count) at
    /// the time the scope opened.
    levels: Vec<(usize, u32)>,
    /// Number of type-parameter binders currently in scope; assigned to each
    /// type parameter as its binder index.
    type_binders: u32,
    /// The function or closure whose body is being resolved.
    cur_fn: Option<NodeId>,
    /// Per-function local slot counters.
    handles: Vec<usize>,
}

impl NameResolver<'_> {
    // ========================================================================
    // Scope handling
    // ========================================================================

    fn depth(&self) -> usize {
        self.levels.len()
    }

    fn push_scope(&mut self) {
        self.levels.push((self.decl_stack.len(), self.type_binders));
    }

    fn pop_scope(&mut self) {
        let (level, binders) = self.levels.pop().expect("scope stack underflow");
        for i in (level..self.decl_stack.len()).rev() {
            let decl = self.decl_stack[i];
            let symbol = self.decls.get(decl).symbol;
            match self.decls.get(decl).shadows {
                Some(shadowed) => {
                    self.symbol_to_decl.insert(symbol, shadowed);
                }
                None => {
                    self.symbol_to_decl.remove(&symbol);
                }
            }
        }
        self.decl_stack.truncate(level);
        self.type_binders = binders;
    }

    /// The declaration `symbol` would clash with in the current scope.
    fn clash(&self, symbol: Symbol) -> Option<DeclId> {
        self.symbol_to_decl
            .get(&symbol)
            .copied()
            .filter(|&decl| self.decls.get(decl).depth == self.depth())
    }

    /// Map `decl`'s symbol to `decl`, reporting a redefinition when the
    /// current scope already binds it.
    fn insert(&mut self, decl: DeclId) {
        let symbol = self.decls.get(decl).symbol;
        if let Some(other) = self.clash(symbol) {
            self.diags.error(SemaError::Redefinition {
                name: self.interner.resolve(symbol).to_string(),
                span: self.decls.get(decl).span.into(),
                previous: self.decls.get(other).span.into(),
            });
            return;
        }

        let shadows = self.symbol_to_decl.get(&symbol).copied();
        let depth = self.depth();
        {
            let d = self.decls.get_mut(decl);
            d.shadows = shadows;
            d.depth = depth;
        }
        self.decl_stack.push(decl);
        self.symbol_to_decl.insert(symbol, decl);
    }

    /// Look up the current definition of `symbol`, reporting an error at the
    /// use site when it is not bound.
    fn lookup(&mut self, node: NodeId, span: karst_frontend::Span, symbol: Symbol) -> Option<DeclId> {
        match self.symbol_to_decl.get(&symbol).copied() {
            Some(decl) => {
                self.res.record_use(node, decl);
                Some(decl)
            }
            None => {
                self.diags.error(SemaError::Undefined {
                    name: self.interner.resolve(symbol).to_string(),
                    span: span.into(),
                });
                None
            }
        }
    }

    fn next_handle(&mut self) -> usize {
        match self.handles.last_mut() {
            Some(counter) => {
                let handle = *counter;
                *counter += 1;
                handle
            }
            None => 0,
        }
    }

    // ========================================================================
    // Items
    // ========================================================================

    /// Two passes inside one scope: first bind every item's name so that
    /// siblings may forward-reference each other, then resolve bodies.
    fn check_items(&mut self, items: &[Item]) {
        for item in items {
            self.insert_item_head(item);
        }
        for item in items {
            self.check_item(item);
        }
    }

    fn insert_item_head(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Module(module) => {
                self.declare(item.id, module.symbol, item.span, DeclKind::Module);
            }
            ItemKind::ExternBlock(block) => {
                for f in &block.fns {
                    self.declare(f.id, f.symbol, f.span, DeclKind::Fn);
                }
            }
            ItemKind::Typedef(t) => {
                self.declare(item.id, t.symbol, item.span, DeclKind::Typedef);
            }
            ItemKind::Struct(s) => {
                self.declare(item.id, s.symbol, item.span, DeclKind::Struct);
            }
            ItemKind::Enum(e) => {
                self.declare(item.id, e.symbol, item.span, DeclKind::Enum);
            }
            ItemKind::Static(s) => {
                let decl = self.declare(item.id, s.symbol, item.span, DeclKind::Static);
                self.decls.get_mut(decl).mutable = s.mutable;
            }
            ItemKind::Fn(f) => {
                self.declare(f.id, f.symbol, f.span, DeclKind::Fn);
            }
            ItemKind::Trait(t) => {
                self.declare(item.id, t.symbol, item.span, DeclKind::Trait);
            }
            ItemKind::Impl(_) => {}
        }
    }

    fn declare(
        &mut self,
        node: NodeId,
        symbol: Symbol,
        span: karst_frontend::Span,
        kind: DeclKind,
    ) -> DeclId {
        let decl = self.decls.alloc(symbol, span, kind);
        self.res.record_decl(node, decl);
        self.insert(decl);
        decl
    }

    fn check_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Module(module) => {
                self.push_scope();
                self.check_items(&module.items);
                self.pop_scope();
            }
            ItemKind::ExternBlock(block) => {
                for f in &block.fns {
                    self.fn_check(f);
                }
            }
            ItemKind::Typedef(t) => {
                self.push_scope();
                self.check_type_params(&t.type_params);
                self.check_ast_type(&t.ty);
                self.pop_scope();
            }
            ItemKind::Struct(s) => {
                let struct_decl = self.res.decl_of(item.id);
                self.push_scope();
                self.check_type_params(&s.type_params);
                for field in &s.fields {
                    self.check_ast_type(&field.ty);
                    let field_decl =
                        self.declare(field.id, field.symbol, field.span, DeclKind::Field);
                    if let Some(struct_decl) = struct_decl {
                        self.decls.get_mut(struct_decl).members.push(field_decl);
                    }
                }
                self.pop_scope();
            }
            ItemKind::Enum(_) => {}
            ItemKind::Static(s) => {
                if let Some(ast_type) = &s.ast_type {
                    self.check_ast_type(ast_type);
                }
                if let Some(init) = &s.init {
                    self.check_expr(init);
                }
            }
            ItemKind::Fn(f) => self.fn_check(f),
            ItemKind::Trait(t) => {
                self.push_scope();
                self.check_type_params(&t.type_params);
                for super_trait in &t.super_traits {
                    self.check_ast_type(super_trait);
                }
                for method in &t.methods {
                    self.declare(method.id, method.symbol, method.span, DeclKind::Fn);
                    self.fn_check(method);
                }
                self.pop_scope();
            }
            ItemKind::Impl(imp) => {
                self.push_scope();
                self.check_type_params(&imp.type_params);
                if let Some(trait_ty) = &imp.trait_ty {
                    self.check_ast_type(trait_ty);
                }
                self.check_ast_type(&imp.self_ty);
                for method in &imp.methods {
                    self.declare(method.id, method.symbol, method.span, DeclKind::Fn);
                    self.fn_check(method);
                }
                self.pop_scope();
            }
        }
    }

    /// Resolve a function's parameters and body in a fresh scope. Unnamed
    /// parameters are bound as `<i>` so later passes can name them.
    fn fn_check(&mut self, f: &FnItem) {
        self.push_scope();
        self.check_type_params(&f.type_params);

        let prev_fn = self.cur_fn.replace(f.id);
        self.handles.push(0);
        self.check_params(f.id, &f.params);

        if let Some(body) = &f.body {
            self.check_expr(body);
        }

        self.handles.pop();
        self.cur_fn = prev_fn;
        self.pop_scope();
    }

    fn check_params(&mut self, owner: NodeId, params: &[LocalDecl]) {
        for (i, param) in params.iter().enumerate() {
            let symbol = if self.interner.resolve(param.symbol).is_empty() {
                self.interner.intern(&format!("<{i}>"))
            } else {
                param.symbol
            };
            let handle = self.next_handle();
            let decl = self.decls.alloc(symbol, param.span, DeclKind::Param);
            {
                let d = self.decls.get_mut(decl);
                d.mutable = param.mutable;
                d.owner_fn = Some(owner);
                d.handle = handle;
            }
            self.res.record_decl(param.id, decl);
            self.insert(decl);
            if let Some(ast_type) = &param.ast_type {
                self.check_ast_type(ast_type);
            }
        }
    }

    /// Two runs so that mutually recursive bounds like
    /// `fn[A: T[B], B: T[A]](A, B)` resolve: first bind all names, then
    /// resolve the bounds.
    fn check_type_params(&mut self, params: &[TypeParam]) {
        for param in params {
            let binder_index = self.type_binders;
            self.type_binders += 1;
            let decl = self.decls.alloc(param.symbol, param.span, DeclKind::TypeParam);
            self.decls.get_mut(decl).binder_index = binder_index;
            self.res.record_decl(param.id, decl);
            self.insert(decl);
        }
        for param in params {
            for bound in &param.bounds {
                self.check_ast_type(bound);
            }
        }
    }

    // ========================================================================
    // Statements and patterns
    // ========================================================================

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.check_expr(expr),
            StmtKind::Item(item) => self.check_item(item),
            StmtKind::Let(let_stmt) => {
                // The initializer sees the environment before the binding, so
                // `let x = x` refers to an outer `x`.
                if let Some(init) = &let_stmt.init {
                    self.check_expr(init);
                }
                self.check_ptrn(&let_stmt.ptrn);
            }
        }
    }

    fn check_ptrn(&mut self, ptrn: &Ptrn) {
        match &ptrn.kind {
            PtrnKind::Id(local) => self.check_local(local),
            PtrnKind::Tuple(elems) => {
                for elem in elems {
                    self.check_ptrn(elem);
                }
            }
        }
    }

    fn check_local(&mut self, local: &LocalDecl) {
        if let Some(ast_type) = &local.ast_type {
            self.check_ast_type(ast_type);
        }
        let handle = self.next_handle();
        let decl = self.decls.alloc(local.symbol, local.span, DeclKind::Local);
        {
            let d = self.decls.get_mut(decl);
            d.mutable = local.mutable;
            d.owner_fn = self.cur_fn;
            d.handle = handle;
        }
        self.res.record_decl(local.id, decl);
        self.insert(decl);
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Empty | ExprKind::Lit(_) | ExprKind::Char(_) | ExprKind::Str(_) => {}
            ExprKind::Path(symbol) => {
                if let Some(decl) = self.lookup(expr.id, expr.span, *symbol) {
                    if !self.decls.get(decl).kind.is_value() {
                        self.diags.error(SemaError::NotAValue {
                            name: self.interner.resolve(*symbol).to_string(),
                            span: expr.span.into(),
                        });
                    }
                }
            }
            ExprKind::Prefix(_, rhs) => self.check_expr(rhs),
            ExprKind::Infix(_, lhs, rhs) => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            ExprKind::Postfix(_, lhs) => self.check_expr(lhs),
            ExprKind::Cast(src, ast_type) => {
                self.check_expr(src);
                self.check_ast_type(ast_type);
            }
            ExprKind::ImplicitCast(src) | ExprKind::Ref2RValue(src) => self.check_expr(src),
            // The field symbol depends on the type of the receiver; it is
            // resolved during type checking.
            ExprKind::Field(lhs, _) => self.check_expr(lhs),
            ExprKind::DefArray(args) | ExprKind::Simd(args) | ExprKind::Tuple(args) => {
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::RepeatArray(value, _) => self.check_expr(value),
            ExprKind::IndefArray(dim, elem_ty) => {
                self.check_expr(dim);
                self.check_ast_type(elem_ty);
            }
            ExprKind::StructLit(lit) => {
                self.check_ast_type(&lit.ty);
                for field in &lit.fields {
                    self.check_expr(&field.expr);
                }
            }
            ExprKind::TypeApp(app) => {
                self.check_expr(&app.lhs);
                for arg in &app.ty_args {
                    self.check_ast_type(arg);
                }
            }
            ExprKind::Map(map) => {
                self.check_expr(&map.lhs);
                for arg in &map.args {
                    self.check_expr(arg);
                }
            }
            ExprKind::Block(block) => {
                self.push_scope();
                for stmt in &block.stmts {
                    if let StmtKind::Item(item) = &stmt.kind {
                        self.insert_item_head(item);
                    }
                }
                for stmt in &block.stmts {
                    self.check_stmt(stmt);
                }
                if let Some(tail) = &block.tail {
                    self.check_expr(tail);
                }
                self.pop_scope();
            }
            ExprKind::If(if_expr) => {
                self.check_expr(&if_expr.cond);
                self.check_expr(&if_expr.then_expr);
                self.check_expr(&if_expr.else_expr);
            }
            ExprKind::While(while_expr) => {
                self.push_scope();
                self.check_expr(&while_expr.cond);
                self.check_local(&while_expr.break_decl);
                self.check_local(&while_expr.continue_decl);
                self.check_expr(&while_expr.body);
                self.pop_scope();
            }
            ExprKind::For(for_expr) => {
                self.check_expr(&for_expr.expr);
                self.push_scope();
                self.check_local(&for_expr.break_decl);
                self.check_expr(&for_expr.fn_expr);
                self.pop_scope();
            }
            ExprKind::Closure(closure) => {
                self.push_scope();
                let prev_fn = self.cur_fn.replace(expr.id);
                self.handles.push(0);
                self.check_params(expr.id, &closure.params);
                self.check_expr(&closure.body);
                self.handles.pop();
                self.cur_fn = prev_fn;
                self.pop_scope();
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
            AstTypeKind::IndefArray(elem)
            | AstTypeKind::DefArray(elem, _)
            | AstTypeKind::Simd(elem, _) => self.check_ast_type(elem),
            AstTypeKind::Tuple(elems) => {
                for elem in elems {
                    self.check_ast_type(elem);
                }
            }
            AstTypeKind::Fn(fn_type) => {
                self.push_scope();
                self.check_type_params(&fn_type.type_params);
                for arg in &fn_type.args {
                    self.check_ast_type(arg);
                }
                self.pop_scope();
            }
            AstTypeKind::Typeof(expr) => self.check_expr(expr),
            AstTypeKind::App(symbol, args) => {
                self.lookup(ast_type.id, ast_type.span, *symbol);
                for arg in args {
                    self.check_ast_type(arg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use karst_frontend::{
        BlockExpr, Expr, ExprKind, FnItem, Item, ItemKind, LetStmt, Lit, LocalDecl, Module,
        NodeId, Ptrn, PtrnKind, Span, Stmt, StmtKind, StructItem, Symbol,
    };

    use super::*;

    struct Builder {
        next: u32,
        interner: Interner,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                next: 0,
                interner: Interner::new(),
            }
        }

        fn id(&mut self) -> NodeId {
            let id = NodeId::new(self.next);
            self.next += 1;
            id
        }

        fn sym(&mut self, name: &str) -> Symbol {
            self.interner.intern(name)
        }

        fn expr(&mut self, kind: ExprKind) -> Expr {
            Expr {
                id: self.id(),
                span: Span::default(),
                kind,
            }
        }

        fn int(&mut self, value: u64) -> Expr {
            self.expr(ExprKind::Lit(Lit::Int(value, None)))
        }

        fn path(&mut self, name: &str) -> Expr {
            let symbol = self.sym(name);
            self.expr(ExprKind::Path(symbol))
        }

        fn block(&mut self, stmts: Vec<Stmt>, tail: Option<Expr>) -> Expr {
            self.expr(ExprKind::Block(BlockExpr {
                stmts,
                tail: tail.map(Box::new),
            }))
        }

        fn local(&mut self, name: &str) -> LocalDecl {
            LocalDecl {
                id: self.id(),
                span: Span::default(),
                symbol: self.sym(name),
                mutable: false,
                ast_type: None,
            }
        }

        fn let_stmt(&mut self, name: &str, init: Expr) -> Stmt {
            let local = self.local(name);
            let ptrn = Ptrn {
                id: self.id(),
                span: Span::default(),
                kind: PtrnKind::Id(local),
            };
            Stmt {
                id: self.id(),
                span: Span::default(),
                kind: StmtKind::Let(LetStmt {
                    ptrn,
                    init: Some(init),
                }),
            }
        }

        fn expr_stmt(&mut self, expr: Expr) -> Stmt {
            Stmt {
                id: self.id(),
                span: Span::default(),
                kind: StmtKind::Expr(expr),
            }
        }

        fn fn_item(&mut self, name: &str, params: Vec<LocalDecl>, body: Expr) -> Item {
            let f = FnItem {
                id: self.id(),
                span: Span::default(),
                symbol: self.sym(name),
                type_params: Vec::new(),
                params,
                body: Some(body),
            };
            Item {
                id: self.id(),
                span: Span::default(),
                kind: ItemKind::Fn(f),
            }
        }

        fn struct_item(&mut self, name: &str) -> Item {
            let s = StructItem {
                symbol: self.sym(name),
                type_params: Vec::new(),
                fields: Vec::new(),
            };
            Item {
                id: self.id(),
                span: Span::default(),
                kind: ItemKind::Struct(s),
            }
        }

        fn module(&mut self, items: Vec<Item>) -> Module {
            Module {
                items,
                span: Span::default(),
                next_node_id: self.next,
            }
        }
    }

    fn run(builder: &mut Builder, module: &Module) -> (DeclTable, Resolutions, Diagnostics) {
        let mut decls = DeclTable::new();
        let mut res = Resolutions::new();
        let mut diags = Diagnostics::new();
        resolve_names(module, &mut builder.interner, &mut decls, &mut res, &mut diags);
        (decls, res, diags)
    }

    #[test]
    fn undefined_name_is_reported() {
        let mut b = Builder::new();
        let path = b.path("nowhere");
        let body = b.block(vec![], Some(path));
        let item = b.fn_item("main", vec![], body);
        let module = b.module(vec![item]);

        let (_, _, diags) = run(&mut b, &module);
        assert!(diags.has_errors());
        assert!(matches!(diags.errors()[0], SemaError::Undefined { .. }));
    }

    #[test]
    fn duplicate_in_same_scope_is_reported() {
        let mut b = Builder::new();
        let one = b.int(1);
        let two = b.int(2);
        let first = b.let_stmt("x", one);
        let second = b.let_stmt("x", two);
        let body = b.block(vec![first, second], None);
        let item = b.fn_item("main", vec![], body);
        let module = b.module(vec![item]);

        let (_, _, diags) = run(&mut b, &module);
        assert!(diags.has_errors());
        assert!(matches!(
            diags.errors()[0],
            SemaError::Redefinition { .. }
        ));
    }

    #[test]
    fn shadowing_restores_outer_binding() {
        let mut b = Builder::new();
        let one = b.int(1);
        let outer_let = b.let_stmt("x", one);
        let outer_local_id = match &outer_let.kind {
            StmtKind::Let(l) => match &l.ptrn.kind {
                PtrnKind::Id(local) => local.id,
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };

        let two = b.int(2);
        let inner_let = b.let_stmt("x", two);
        let inner_local_id = match &inner_let.kind {
            StmtKind::Let(l) => match &l.ptrn.kind {
                PtrnKind::Id(local) => local.id,
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };

        let inner_use = b.path("x");
        let inner_use_id = inner_use.id;
        let inner_block = b.block(vec![inner_let], Some(inner_use));
        let inner_stmt = b.expr_stmt(inner_block);

        let outer_use = b.path("x");
        let outer_use_id = outer_use.id;

        let body = b.block(vec![outer_let, inner_stmt], Some(outer_use));
        let item = b.fn_item("main", vec![], body);
        let module = b.module(vec![item]);

        let (_, res, diags) = run(&mut b, &module);
        assert!(!diags.has_errors());
        assert_eq!(res.use_of(inner_use_id), res.decl_of(inner_local_id));
        assert_eq!(res.use_of(outer_use_id), res.decl_of(outer_local_id));
        assert_ne!(res.use_of(inner_use_id), res.use_of(outer_use_id));
    }

    #[test]
    fn sibling_items_may_forward_reference() {
        let mut b = Builder::new();
        let call_target = b.path("later");
        let use_id = call_target.id;
        let body_a = b.block(vec![], Some(call_target));
        let item_a = b.fn_item("first", vec![], body_a);

        let body_b = b.block(vec![], None);
        let item_b = b.fn_item("later", vec![], body_b);
        let later_fn_id = match &item_b.kind {
            ItemKind::Fn(f) => f.id,
            _ => unreachable!(),
        };

        let module = b.module(vec![item_a, item_b]);
        let (_, res, diags) = run(&mut b, &module);
        assert!(!diags.has_errors());
        assert_eq!(res.use_of(use_id), res.decl_of(later_fn_id));
    }

    #[test]
    fn type_in_value_position_is_reported() {
        let mut b = Builder::new();
        let strukt = b.struct_item("Point");
        let use_expr = b.path("Point");
        let body = b.block(vec![], Some(use_expr));
        let item = b.fn_item("main", vec![], body);
        let module = b.module(vec![strukt, item]);

        let (_, _, diags) = run(&mut b, &module);
        assert!(diags.has_errors());
        assert!(matches!(diags.errors()[0], SemaError::NotAValue { .. }));
    }

    #[test]
    fn unnamed_params_are_bound_positionally() {
        let mut b = Builder::new();
        let param = LocalDecl {
            id: b.id(),
            span: Span::default(),
            symbol: b.sym(""),
            mutable: false,
            ast_type: None,
        };
        let param_id = param.id;
        let body = b.block(vec![], None);
        let item = b.fn_item("f", vec![param], body);
        let module = b.module(vec![item]);

        let (decls, res, diags) = run(&mut b, &module);
        assert!(!diags.has_errors());
        let decl = res.decl_of(param_id).unwrap();
        assert_eq!(b.interner.resolve(decls.get(decl).symbol), "<0>");
    }
}
