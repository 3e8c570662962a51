// tests/analysis.rs
//
// End-to-end semantic analysis scenarios over hand-built ASTs: inference
// through forward references, implicit coercion rewrites, diagnostics, and
// the address-taken rules.

use karst_frontend::{
    AstType, AstTypeKind, BlockExpr, ClosureExpr, Expr, ExprKind, ExternBlock, FieldDecl,
    FieldInit, FnAstType, FnItem, IfExpr, InfixOp, Interner, Item, ItemKind, LetStmt, Lit,
    LocalDecl, MapExpr, Module, NodeId, PrefixOp, PrimType, Ptrn, PtrnKind, PtrKind, Span, Stmt,
    StmtKind, StructItem, StructLitExpr, Symbol, TypeParam, WhileExpr,
};
use karst_sema::{analyze, Analysis, AnalysisOptions, SemaError, SemaWarning, TypeId};

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

    // ------------------------------------------------------------------ types

    fn ty(&mut self, kind: AstTypeKind) -> AstType {
        AstType {
            id: self.id(),
            span: Span::default(),
            kind,
        }
    }

    fn prim_ty(&mut self, prim: PrimType) -> AstType {
        self.ty(AstTypeKind::Prim(prim))
    }

    fn fn_ty(&mut self, args: Vec<AstType>) -> AstType {
        self.ty(AstTypeKind::Fn(FnAstType {
            type_params: Vec::new(),
            args,
        }))
    }

    fn borrowed_ptr_ty(&mut self, pointee: AstType) -> AstType {
        self.ty(AstTypeKind::Ptr {
            kind: PtrKind::Borrowed,
            mutable: false,
            addr_space: 0,
            pointee: Box::new(pointee),
        })
    }

    fn indef_array_ty(&mut self, elem: AstType) -> AstType {
        self.ty(AstTypeKind::IndefArray(Box::new(elem)))
    }

    fn app_ty(&mut self, name: &str) -> AstType {
        let symbol = self.sym(name);
        self.ty(AstTypeKind::App(symbol, Vec::new()))
    }

    // ------------------------------------------------------------ expressions

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

    fn int_suffixed(&mut self, value: u64, suffix: PrimType) -> Expr {
        self.expr(ExprKind::Lit(Lit::Int(value, Some(suffix))))
    }

    fn bool_lit(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Lit(Lit::Bool(value)))
    }

    fn path(&mut self, name: &str) -> Expr {
        let symbol = self.sym(name);
        self.expr(ExprKind::Path(symbol))
    }

    fn infix(&mut self, op: InfixOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Infix(op, Box::new(lhs), Box::new(rhs)))
    }

    fn prefix(&mut self, op: PrefixOp, rhs: Expr) -> Expr {
        self.expr(ExprKind::Prefix(op, Box::new(rhs)))
    }

    fn cast(&mut self, src: Expr, target: AstType) -> Expr {
        self.expr(ExprKind::Cast(Box::new(src), target))
    }

    fn call(&mut self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Map(MapExpr {
            lhs: Box::new(callee),
            args,
        }))
    }

    fn tuple(&mut self, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(args))
    }

    fn def_array(&mut self, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::DefArray(args))
    }

    fn block(&mut self, stmts: Vec<Stmt>, tail: Option<Expr>) -> Expr {
        self.expr(ExprKind::Block(BlockExpr {
            stmts,
            tail: tail.map(Box::new),
        }))
    }

    fn closure(&mut self, params: Vec<LocalDecl>, body: Expr) -> Expr {
        self.expr(ExprKind::Closure(ClosureExpr {
            params,
            body: Box::new(body),
        }))
    }

    fn while_expr(&mut self, cond: Expr, body: Expr) -> Expr {
        let break_decl = self.local("break", false, None);
        let continue_decl = self.local("continue", false, None);
        self.expr(ExprKind::While(WhileExpr {
            cond: Box::new(cond),
            body: Box::new(body),
            break_decl,
            continue_decl,
        }))
    }

    fn if_expr(&mut self, cond: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        self.expr(ExprKind::If(IfExpr {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }))
    }

    fn struct_lit(&mut self, name: &str, fields: Vec<(&str, Expr)>) -> Expr {
        let ty = self.app_ty(name);
        let fields = fields
            .into_iter()
            .map(|(field, expr)| FieldInit {
                id: self.id(),
                span: Span::default(),
                symbol: self.sym(field),
                expr,
            })
            .collect();
        self.expr(ExprKind::StructLit(StructLitExpr { ty, fields }))
    }

    // ------------------------------------------------------- stmts and items

    fn local(&mut self, name: &str, mutable: bool, ast_type: Option<AstType>) -> LocalDecl {
        LocalDecl {
            id: self.id(),
            span: Span::default(),
            symbol: self.sym(name),
            mutable,
            ast_type,
        }
    }

    fn let_stmt(&mut self, local: LocalDecl, init: Option<Expr>) -> (Stmt, NodeId) {
        let local_id = local.id;
        let ptrn = Ptrn {
            id: self.id(),
            span: Span::default(),
            kind: PtrnKind::Id(local),
        };
        let stmt = Stmt {
            id: self.id(),
            span: Span::default(),
            kind: StmtKind::Let(LetStmt {
                ptrn,
                init,
            }),
        };
        (stmt, local_id)
    }

    fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        Stmt {
            id: self.id(),
            span: Span::default(),
            kind: StmtKind::Expr(expr),
        }
    }

    /// The synthetic `return` continuation parameter for a function whose
    /// result types are `rets`.
    fn ret_param(&mut self, rets: Vec<AstType>) -> LocalDecl {
        let cont = self.fn_ty(rets);
        self.local("return", false, Some(cont))
    }

    fn param(&mut self, name: &str, ast_type: AstType) -> LocalDecl {
        self.local(name, false, Some(ast_type))
    }

    fn fn_item(&mut self, name: &str, params: Vec<LocalDecl>, body: Option<Expr>) -> (Item, NodeId) {
        let f = FnItem {
            id: self.id(),
            span: Span::default(),
            symbol: self.sym(name),
            type_params: Vec::new(),
            params,
            body,
        };
        let fn_id = f.id;
        let item = Item {
            id: self.id(),
            span: Span::default(),
            kind: ItemKind::Fn(f),
        };
        (item, fn_id)
    }

    fn type_param(&mut self, name: &str) -> TypeParam {
        TypeParam {
            id: self.id(),
            span: Span::default(),
            symbol: self.sym(name),
            bounds: Vec::new(),
        }
    }

    fn struct_item(&mut self, name: &str, fields: Vec<(&str, AstType)>) -> Item {
        let fields = fields
            .into_iter()
            .map(|(field, ty)| FieldDecl {
                id: self.id(),
                span: Span::default(),
                symbol: self.sym(field),
                ty,
            })
            .collect();
        let s = StructItem {
            symbol: self.sym(name),
            type_params: Vec::new(),
            fields,
        };
        Item {
            id: self.id(),
            span: Span::default(),
            kind: ItemKind::Struct(s),
        }
    }

    fn extern_block(&mut self, abi: &str, fns: Vec<FnItem>) -> Item {
        Item {
            id: self.id(),
            span: Span::default(),
            kind: ItemKind::ExternBlock(ExternBlock {
                abi: Some(abi.to_string()),
                fns,
            }),
        }
    }

    fn extern_fn(&mut self, name: &str, params: Vec<LocalDecl>) -> FnItem {
        FnItem {
            id: self.id(),
            span: Span::default(),
            symbol: self.sym(name),
            type_params: Vec::new(),
            params,
            body: None,
        }
    }

    /// `fn main() { stmts }` with a unit return continuation.
    fn main_fn(&mut self, stmts: Vec<Stmt>) -> Item {
        let ret = self.ret_param(vec![]);
        let body = self.block(stmts, None);
        let (item, _) = self.fn_item("main", vec![ret], Some(body));
        item
    }

    fn module(&mut self, items: Vec<Item>) -> Module {
        Module {
            items,
            span: Span::default(),
            next_node_id: self.next,
        }
    }

    fn analyze(&mut self, module: &mut Module) -> Analysis {
        analyze(module, &mut self.interner, &AnalysisOptions::default())
    }

    fn analyze_with(&mut self, module: &mut Module, options: AnalysisOptions) -> Analysis {
        analyze(module, &mut self.interner, &options)
    }
}

fn decl_type(analysis: &Analysis, local_id: NodeId) -> TypeId {
    let decl = analysis
        .resolutions
        .decl_of(local_id)
        .expect("declaration was not resolved");
    analysis.decls.get(decl).ty.expect("declaration has no type")
}

#[test]
fn local_type_flows_backwards_from_use() {
    let mut b = Builder::new();
    let one = b.int(1);
    let x = b.local("x", false, None);
    let (let_x, x_id) = b.let_stmt(x, Some(one));

    let i64_ty = b.prim_ty(PrimType::I64);
    let y = b.local("y", false, Some(i64_ty));
    let x_use = b.path("x");
    let (let_y, y_id) = b.let_stmt(y, Some(x_use));

    let main = b.main_fn(vec![let_x, let_y]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert!(analysis.diagnostics.warnings().is_empty());
    assert_eq!(decl_type(&analysis, x_id), TypeId::I64);
    assert_eq!(decl_type(&analysis, y_id), TypeId::I64);
}

#[test]
fn function_type_is_continuation_style() {
    let mut b = Builder::new();
    let i32_a = b.prim_ty(PrimType::I32);
    let i32_b = b.prim_ty(PrimType::I32);
    let i32_r = b.prim_ty(PrimType::I32);
    let a = b.param("a", i32_a);
    let b_param = b.param("b", i32_b);
    let ret = b.ret_param(vec![i32_r]);

    let a_use = b.path("a");
    let b_use = b.path("b");
    let sum = b.infix(InfixOp::Add, a_use, b_use);
    let body = b.block(vec![], Some(sum));
    let (item, fn_id) = b.fn_item("f", vec![a, b_param, ret], Some(body));

    let mut module = b.module(vec![item]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    let fn_decl = analysis.resolutions.decl_of(fn_id).unwrap();
    let fn_ty = analysis.decls.get(fn_decl).ty.unwrap();
    let ops = analysis.types.as_fn(fn_ty).expect("function type expected");
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], TypeId::I32);
    assert_eq!(ops[1], TypeId::I32);
    let cont = analysis.types.as_fn(ops[2]).expect("return continuation");
    assert_eq!(cont.as_slice(), &[TypeId::I32]);
}

#[test]
fn borrowing_a_literal_coerces_into_annotation() {
    let mut b = Builder::new();
    let i32_ty = b.prim_ty(PrimType::I32);
    let ptr_ty = b.borrowed_ptr_ty(i32_ty);
    let p = b.local("p", false, Some(ptr_ty));
    let five = b.int(5);
    let borrow = b.prefix(PrefixOp::Ref, five);
    let (let_p, p_id) = b.let_stmt(p, Some(borrow));

    let main = b.main_fn(vec![let_p]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    let p_ty = decl_type(&analysis, p_id);
    let (kind, pointee, mutable, addr_space) = analysis.types.as_ptr(p_ty).unwrap();
    assert_eq!(kind, PtrKind::Borrowed);
    assert_eq!(pointee, TypeId::I32);
    assert!(!mutable);
    assert_eq!(addr_space, 0);
}

#[test]
fn definite_array_coerces_to_indefinite_with_cast() {
    let mut b = Builder::new();
    let elems = vec![b.int(1), b.int(2), b.int(3)];
    let array = b.def_array(elems);
    let a = b.local("a", false, None);
    let (let_a, a_id) = b.let_stmt(a, Some(array));

    let i32_ty = b.prim_ty(PrimType::I32);
    let slice_ty = b.indef_array_ty(i32_ty);
    let bb = b.local("b", false, Some(slice_ty));
    let a_use = b.path("a");
    let (let_b, b_id) = b.let_stmt(bb, Some(a_use));

    let main = b.main_fn(vec![let_a, let_b]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());

    let a_ty = decl_type(&analysis, a_id);
    assert!(matches!(
        analysis.types.term(a_ty),
        karst_sema::TypeTerm::DefArray { elem, dim } if *elem == TypeId::I32 && *dim == 3
    ));

    let b_ty = decl_type(&analysis, b_id);
    assert!(matches!(
        analysis.types.term(b_ty),
        karst_sema::TypeTerm::IndefArray { elem } if *elem == TypeId::I32
    ));

    // The initializer of `b` was wrapped in an implicit subtyping cast.
    let body = match &module.items[0].kind {
        ItemKind::Fn(f) => f.body.as_ref().unwrap(),
        _ => unreachable!(),
    };
    let stmts = match &body.kind {
        ExprKind::Block(block) => &block.stmts,
        _ => unreachable!(),
    };
    let init = match &stmts[1].kind {
        StmtKind::Let(let_stmt) => let_stmt.init.as_ref().unwrap(),
        _ => unreachable!(),
    };
    assert!(matches!(init.kind, ExprKind::ImplicitCast(_)));
}

#[test]
fn body_type_must_match_declared_return() {
    let mut b = Builder::new();
    let bool_ty = b.prim_ty(PrimType::Bool);
    let ret = b.ret_param(vec![bool_ty]);
    let one = b.int_suffixed(1, PrimType::I32);
    let body = b.block(vec![], Some(one));
    let (item, _) = b.fn_item("g", vec![ret], Some(body));

    let mut module = b.module(vec![item]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis
        .diagnostics
        .errors()
        .iter()
        .any(|e| matches!(e, SemaError::ReturnTypeMismatch { .. })));
}

#[test]
fn no_effect_statement_warns_but_written_mut_does_not() {
    let mut b = Builder::new();
    let zero = b.int(0);
    let x = b.local("x", true, None);
    let (let_x, x_id) = b.let_stmt(x, Some(zero));

    let x_use = b.path("x");
    let one = b.int(1);
    let sum = b.infix(InfixOp::Add, x_use, one);
    let dead = b.expr_stmt(sum);

    let x_lhs = b.path("x");
    let two = b.int(2);
    let assign = b.infix(InfixOp::Assign, x_lhs, two);
    let write = b.expr_stmt(assign);

    let main = b.main_fn(vec![let_x, dead, write]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert!(analysis
        .diagnostics
        .warnings()
        .iter()
        .any(|w| matches!(w, SemaWarning::NoEffect { .. })));
    assert!(!analysis
        .diagnostics
        .warnings()
        .iter()
        .any(|w| matches!(w, SemaWarning::UnusedMut { .. })));
    assert_eq!(decl_type(&analysis, x_id), TypeId::I32);
}

#[test]
fn unconstrained_local_is_unknown_residue() {
    let mut b = Builder::new();
    let x = b.local("x", false, None);
    let (let_x, _) = b.let_stmt(x, None);
    let main = b.main_fn(vec![let_x]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis
        .diagnostics
        .errors()
        .iter()
        .any(|e| matches!(e, SemaError::CannotInfer { .. })));
}

#[test]
fn dereferencing_a_non_pointer_is_reported() {
    let mut b = Builder::new();
    let one = b.int(1);
    let i32_ty = b.prim_ty(PrimType::I32);
    let as_i32 = b.cast(one, i32_ty);
    let deref = b.prefix(PrefixOp::Deref, as_i32);
    let stmt = b.expr_stmt(deref);
    let main = b.main_fn(vec![stmt]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis.diagnostics.errors().iter().any(|e| matches!(
        e,
        SemaError::InvalidOperand {
            expected: "pointer type",
            ..
        }
    )));
}

#[test]
fn invalid_cast_between_families_is_reported() {
    let mut b = Builder::new();
    let flag = b.bool_lit(true);
    let i32_ty = b.prim_ty(PrimType::I32);
    let slice_ty = b.indef_array_ty(i32_ty);
    let bad = b.cast(flag, slice_ty);
    let x = b.local("x", false, None);
    let (let_x, _) = b.let_stmt(x, Some(bad));
    let main = b.main_fn(vec![let_x]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis
        .diagnostics
        .errors()
        .iter()
        .any(|e| matches!(e, SemaError::InvalidCast { .. })));
}

#[test]
fn too_few_call_arguments_is_reported() {
    let mut b = Builder::new();
    let i32_ty = b.prim_ty(PrimType::I32);
    let a = b.param("a", i32_ty);
    let i32_r = b.prim_ty(PrimType::I32);
    let ret = b.ret_param(vec![i32_r]);
    let body = {
        let a_use = b.path("a");
        b.block(vec![], Some(a_use))
    };
    let (f_item, _) = b.fn_item("f", vec![a, ret], Some(body));

    let callee = b.path("f");
    let bad_call = b.call(callee, vec![]);
    let stmt = b.expr_stmt(bad_call);
    let main = b.main_fn(vec![stmt]);

    let mut module = b.module(vec![f_item, main]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis
        .diagnostics
        .errors()
        .iter()
        .any(|e| matches!(e, SemaError::WrongArgumentCount { .. })));
}

#[test]
fn struct_literal_must_cover_all_fields() {
    let mut b = Builder::new();
    let x_ty = b.prim_ty(PrimType::I32);
    let y_ty = b.prim_ty(PrimType::I32);
    let point = b.struct_item("Point", vec![("x", x_ty), ("y", y_ty)]);

    let one = b.int(1);
    let lit = b.struct_lit("Point", vec![("x", one)]);
    let p = b.local("p", false, None);
    let (let_p, _) = b.let_stmt(p, Some(lit));
    let main = b.main_fn(vec![let_p]);

    let mut module = b.module(vec![point, main]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis
        .diagnostics
        .errors()
        .iter()
        .any(|e| matches!(e, SemaError::StructFieldMissing { .. })));
}

#[test]
fn struct_field_access_types_and_completeness() {
    let mut b = Builder::new();
    let x_ty = b.prim_ty(PrimType::I32);
    let y_ty = b.prim_ty(PrimType::Bool);
    let point = b.struct_item("Point", vec![("x", x_ty), ("y", y_ty)]);

    let one = b.int_suffixed(1, PrimType::I32);
    let flag = b.bool_lit(true);
    let lit = b.struct_lit("Point", vec![("x", one), ("y", flag)]);
    let p = b.local("p", false, None);
    let (let_p, _) = b.let_stmt(p, Some(lit));

    let p_use = b.path("p");
    let sym_x = b.sym("x");
    let field = b.expr(ExprKind::Field(Box::new(p_use), sym_x));
    let fx = b.local("fx", false, None);
    let (let_fx, fx_id) = b.let_stmt(fx, Some(field));

    let main = b.main_fn(vec![let_p, let_fx]);
    let mut module = b.module(vec![point, main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert_eq!(decl_type(&analysis, fx_id), TypeId::I32);
}

#[test]
fn unknown_extern_abi_is_reported() {
    let mut b = Builder::new();
    let ret = b.ret_param(vec![]);
    let e = b.extern_fn("e", vec![ret]);
    let block = b.extern_block("js", vec![e]);
    let mut module = b.module(vec![block]);
    let analysis = b.analyze(&mut module);

    assert!(!analysis.success());
    assert!(analysis
        .diagnostics
        .errors()
        .iter()
        .any(|e| matches!(e, SemaError::UnknownAbi { .. })));
}

#[test]
fn continuation_call_is_unreachable_statement() {
    let mut b = Builder::new();
    let code_ty = b.prim_ty(PrimType::I32);
    let code = b.param("code", code_ty);
    let exit = b.extern_fn("exit", vec![code]);
    let block = b.extern_block("C", vec![exit]);

    let callee = b.path("exit");
    let one = b.int_suffixed(1, PrimType::I32);
    let call = b.call(callee, vec![one]);
    let stmt = b.expr_stmt(call);
    let main = b.main_fn(vec![stmt]);

    let mut module = b.module(vec![block, main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert!(analysis
        .diagnostics
        .warnings()
        .iter()
        .any(|w| matches!(w, SemaWarning::Unreachable { .. })));
}

#[test]
fn coercion_is_identity_on_equal_types() {
    let mut b = Builder::new();
    let i32_a = b.prim_ty(PrimType::I32);
    let x = b.local("x", false, Some(i32_a));
    let one = b.int(1);
    let (let_x, _) = b.let_stmt(x, Some(one));

    let i32_b = b.prim_ty(PrimType::I32);
    let y = b.local("y", false, Some(i32_b));
    let x_use = b.path("x");
    let (let_y, _) = b.let_stmt(y, Some(x_use));

    let main = b.main_fn(vec![let_x, let_y]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());

    // No implicit cast: the initializer is only the lvalue-to-rvalue wrapper.
    let body = match &module.items[0].kind {
        ItemKind::Fn(f) => f.body.as_ref().unwrap(),
        _ => unreachable!(),
    };
    let stmts = match &body.kind {
        ExprKind::Block(block) => &block.stmts,
        _ => unreachable!(),
    };
    let init = match &stmts[1].kind {
        StmtKind::Let(let_stmt) => let_stmt.init.as_ref().unwrap(),
        _ => unreachable!(),
    };
    assert!(matches!(init.kind, ExprKind::Ref2RValue(_)));
}

#[test]
fn tuple_subscript_requires_integer_literal() {
    let mut b = Builder::new();
    let one = b.int_suffixed(1, PrimType::I32);
    let flag = b.bool_lit(true);
    let pair = b.tuple(vec![one, flag]);
    let t = b.local("t", false, None);
    let (let_t, _) = b.let_stmt(t, Some(pair));

    let t_use = b.path("t");
    let zero = b.int(0);
    let index = b.call(t_use, vec![zero]);
    let first = b.local("first", false, None);
    let (let_first, first_id) = b.let_stmt(first, Some(index));

    let main = b.main_fn(vec![let_t, let_first]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert_eq!(decl_type(&analysis, first_id), TypeId::I32);
}

#[test]
fn while_loop_with_counter_checks_cleanly() {
    let mut b = Builder::new();
    let zero = b.int(0);
    let i = b.local("i", true, None);
    let (let_i, i_id) = b.let_stmt(i, Some(zero));

    let i_cmp = b.path("i");
    let ten = b.int(10);
    let cond = b.infix(InfixOp::Lt, i_cmp, ten);

    let i_lhs = b.path("i");
    let i_rhs = b.path("i");
    let one = b.int(1);
    let bump = b.infix(InfixOp::Add, i_rhs, one);
    let assign = b.infix(InfixOp::Assign, i_lhs, bump);
    let body_stmt = b.expr_stmt(assign);
    let body = b.block(vec![body_stmt], None);

    let loop_expr = b.while_expr(cond, body);
    let loop_stmt = b.expr_stmt(loop_expr);

    let main = b.main_fn(vec![let_i, loop_stmt]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert!(analysis.diagnostics.warnings().is_empty());
    assert_eq!(decl_type(&analysis, i_id), TypeId::I32);
}

#[test]
fn if_arms_unify_and_condition_must_be_bool() {
    let mut b = Builder::new();
    let bool_ty = b.prim_ty(PrimType::Bool);
    let c = b.param("c", bool_ty);
    let i32_r = b.prim_ty(PrimType::I32);
    let ret = b.ret_param(vec![i32_r]);

    let c_use = b.path("c");
    let one = b.int(1);
    let two = b.int(2);
    let cond_expr = b.if_expr(c_use, one, two);
    let body = b.block(vec![], Some(cond_expr));
    let (item, _) = b.fn_item("pick", vec![c, ret], Some(body));

    let mut module = b.module(vec![item]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
}

#[test]
fn polymorphic_call_instantiates_from_argument() {
    let mut b = Builder::new();
    let t_param = b.type_param("T");
    let t_use_a = b.app_ty("T");
    let x = b.param("x", t_use_a);
    let t_use_r = b.app_ty("T");
    let ret = b.ret_param(vec![t_use_r]);
    let body = {
        let x_use = b.path("x");
        b.block(vec![], Some(x_use))
    };
    let f = FnItem {
        id: b.id(),
        span: Span::default(),
        symbol: b.sym("id"),
        type_params: vec![t_param],
        params: vec![x, ret],
        body: Some(body),
    };
    let id_item = Item {
        id: b.id(),
        span: Span::default(),
        kind: ItemKind::Fn(f),
    };

    let callee = b.path("id");
    let five = b.int_suffixed(5, PrimType::I32);
    let call = b.call(callee, vec![five]);
    let y = b.local("y", false, None);
    let (let_y, y_id) = b.let_stmt(y, Some(call));
    let main = b.main_fn(vec![let_y]);

    let mut module = b.module(vec![id_item, main]);
    let analysis = b.analyze(&mut module);

    assert!(analysis.success(), "{:?}", analysis.diagnostics.errors());
    assert_eq!(decl_type(&analysis, y_id), TypeId::I32);
}

#[test]
fn nossa_marks_every_mutable_local_address_taken() {
    let mut b = Builder::new();
    let zero = b.int_suffixed(0, PrimType::I32);
    let x = b.local("x", true, None);
    let (let_x, x_id) = b.let_stmt(x, Some(zero));

    let x_lhs = b.path("x");
    let one = b.int_suffixed(1, PrimType::I32);
    let assign = b.infix(InfixOp::Assign, x_lhs, one);
    let stmt = b.expr_stmt(assign);

    let main = b.main_fn(vec![let_x, stmt]);
    let mut module = b.module(vec![main]);

    let analysis = b.analyze_with(
        &mut module,
        AnalysisOptions { nossa: true },
    );
    let decl = analysis.resolutions.decl_of(x_id).unwrap();
    assert!(analysis.decls.get(decl).address_taken);
}

#[test]
fn mutable_capture_across_functions_is_address_taken() {
    let mut b = Builder::new();
    let zero = b.int_suffixed(0, PrimType::I32);
    let x = b.local("x", true, None);
    let (let_x, x_id) = b.let_stmt(x, Some(zero));

    // The closure body assigns to the outer local.
    let x_lhs = b.path("x");
    let two = b.int_suffixed(2, PrimType::I32);
    let assign = b.infix(InfixOp::Assign, x_lhs, two);
    let stmt = b.expr_stmt(assign);
    let closure_body = b.block(vec![stmt], None);
    let closure = b.closure(vec![], closure_body);
    let f = b.local("f", false, None);
    let (let_f, _) = b.let_stmt(f, Some(closure));

    let main = b.main_fn(vec![let_x, let_f]);
    let mut module = b.module(vec![main]);
    let analysis = b.analyze(&mut module);

    let decl = analysis.resolutions.decl_of(x_id).unwrap();
    assert!(analysis.decls.get(decl).address_taken);
}
