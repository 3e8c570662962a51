// infer/item.rs
//
// Inference over items, statements and patterns. Items are visited in two
// waves per pass: heads first (so siblings can forward-reference), then
// bodies.

use karst_frontend::{
    FnItem, Item, ItemKind, LocalDecl, Module, Ptrn, PtrnKind, Stmt, StmtKind,
};

use crate::decl::DeclId;
use crate::type_arena::{TypeId, TypeIdVec};

use super::InferSema;

impl InferSema<'_> {
    pub fn check_module(&mut self, module: &mut Module) {
        self.check_items(&mut module.items);
    }

    fn check_items(&mut self, items: &mut [Item]) {
        for item in items.iter_mut() {
            self.check_item_head(item);
        }
        for item in items.iter_mut() {
            self.check_item(item);
        }
    }

    /// Give an item a first type before its body is visited. Only runs while
    /// the item's slot is still empty or unknown.
    pub fn check_item_head(&mut self, item: &mut Item) {
        match &mut item.kind {
            ItemKind::Struct(s) => {
                let decl = match self.res.decl_of(item.id) {
                    Some(decl) => decl,
                    None => return,
                };
                let needs_head = match self.decls.get(decl).ty {
                    None => true,
                    Some(ty) => self.arena.is_unknown(ty),
                };
                if !needs_head {
                    return;
                }
                let num = s.type_params.len();
                self.open_type_params(num);
                let struct_ty = self.arena.struct_type(decl);
                let members: Vec<DeclId> = self.decls.get(decl).members.clone();
                for (field, field_decl) in s.fields.iter_mut().zip(members) {
                    let ty = self.check_ast_type(&mut field.ty);
                    self.constrain_decl(field_decl, ty);
                }
                self.close_type_params(num);
                self.decls.get_mut(decl).ty = Some(struct_ty);
            }
            ItemKind::Static(s) => {
                let decl = match self.res.decl_of(item.id) {
                    Some(decl) => decl,
                    None => return,
                };
                if let Some(ast_type) = &mut s.ast_type {
                    let ty = self.check_ast_type(ast_type);
                    self.constrain_decl(decl, ty);
                } else if self.decls.get(decl).ty.is_none() {
                    let unknown = self.arena.unknown();
                    self.decls.get_mut(decl).ty = Some(unknown);
                }
            }
            ItemKind::Fn(f) => self.check_fn_head(f),
            ItemKind::ExternBlock(block) => {
                for f in &mut block.fns {
                    self.check_fn_head(f);
                }
            }
            ItemKind::Module(_)
            | ItemKind::Typedef(_)
            | ItemKind::Enum(_)
            | ItemKind::Trait(_)
            | ItemKind::Impl(_) => {}
        }
    }

    pub fn check_item(&mut self, item: &mut Item) {
        match &mut item.kind {
            ItemKind::Module(module) => self.check_items(&mut module.items),
            ItemKind::ExternBlock(block) => {
                for f in &mut block.fns {
                    self.check_fn(f);
                }
            }
            ItemKind::Typedef(t) => {
                let decl = match self.res.decl_of(item.id) {
                    Some(decl) => decl,
                    None => return,
                };
                let num = t.type_params.len();
                self.open_type_params(num);
                let body = self.check_ast_type(&mut t.ty);
                let closed = self.close_over(&t.type_params, body);
                self.close_type_params(num);
                self.constrain_decl(decl, closed);
            }
            ItemKind::Struct(s) => {
                let decl = match self.res.decl_of(item.id) {
                    Some(decl) => decl,
                    None => return,
                };
                let num = s.type_params.len();
                self.open_type_params(num);
                let members: Vec<DeclId> = self.decls.get(decl).members.clone();
                for (field, field_decl) in s.fields.iter_mut().zip(members) {
                    let ty = self.check_ast_type(&mut field.ty);
                    self.constrain_decl(field_decl, ty);
                }
                self.close_type_params(num);
            }
            ItemKind::Enum(_) => {}
            ItemKind::Static(s) => {
                let decl = match self.res.decl_of(item.id) {
                    Some(decl) => decl,
                    None => return,
                };
                if let Some(ast_type) = &mut s.ast_type {
                    let ty = self.check_ast_type(ast_type);
                    self.constrain_decl(decl, ty);
                }
                if let Some(init) = &mut s.init {
                    let ty = self.rvalue(init);
                    self.constrain_decl(decl, ty);
                }
            }
            ItemKind::Fn(f) => self.check_fn(f),
            // Trait bounds and impl bodies are accepted without verification.
            ItemKind::Trait(_) | ItemKind::Impl(_) => {}
        }
    }

    fn check_fn_head(&mut self, f: &mut FnItem) {
        let decl = match self.res.decl_of(f.id) {
            Some(decl) => decl,
            None => return,
        };
        let needs_head = match self.decls.get(decl).ty {
            None => true,
            Some(ty) => self.arena.is_unknown(ty),
        };
        if !needs_head {
            return;
        }
        let num = f.type_params.len();
        self.open_type_params(num);
        self.check_type_param_bounds(f);
        let mut param_types = TypeIdVec::new();
        for param in f.params.iter_mut() {
            param_types.push(self.check_local(param));
        }
        let fn_ty = self.arena.fn_type(param_types);
        let closed = self.close_over(&f.type_params, fn_ty);
        self.close_type_params(num);
        self.constrain_decl(decl, closed);
    }

    /// Infer a function: parameter types, the closed function type, and the
    /// body coerced into the declared return continuation.
    pub fn check_fn(&mut self, f: &mut FnItem) {
        let decl = match self.res.decl_of(f.id) {
            Some(decl) => decl,
            None => return,
        };
        let num = f.type_params.len();
        self.open_type_params(num);
        self.check_type_param_bounds(f);

        let count = f.params.len();
        let mut param_types: Vec<TypeId> = vec![self.arena.unit(); count];
        let mut explicit = count;

        // A typedef'd tuple used as return type arrives as a continuation of
        // one tuple operand; flatten it into the continuation's argument
        // list.
        if count > 0 {
            let last_is_cont = {
                let last = &f.params[count - 1];
                self.res
                    .decl_of(last.id)
                    .and_then(|d| self.decls.get(d).ty)
                    .map(|ty| {
                        let ty = self.find(ty);
                        self.arena.as_fn(ty).is_some()
                    })
                    .unwrap_or(false)
            };
            if last_is_cont {
                let ret_ty = {
                    let last = &mut f.params[count - 1];
                    self.check_local(last)
                };
                let ret_ty = self.find(ret_ty);
                if let Some(ops) = self.arena.as_fn(ret_ty) {
                    if ops.len() == 1 {
                        if let Some(tuple_ops) = self.arena.as_tuple(ops[0]) {
                            param_types[count - 1] = self.arena.fn_type(tuple_ops);
                            explicit = count - 1;
                        }
                    }
                }
            }
        }

        let fn_ops = {
            let decl_ty = self.find_decl_type(decl);
            self.arena.as_fn(decl_ty)
        };
        for i in 0..explicit {
            param_types[i] = self.check_local(&mut f.params[i]);
            if let Some(ops) = &fn_ops {
                if i < ops.len() {
                    if let Some(param_decl) = self.res.decl_of(f.params[i].id) {
                        self.constrain_decl(param_decl, ops[i]);
                    }
                }
            }
        }

        let fn_ty = self.arena.fn_type(param_types.into_iter().collect());
        let closed = self.close_over(&f.type_params, fn_ty);
        self.constrain_decl(decl, closed);

        if let Some(body) = &mut f.body {
            self.rvalue(body);
            let decl_ty = self.find_decl_type(decl);
            let stripped = self.strip_lambdas(decl_ty);
            if self.arena.as_fn(stripped).is_some() {
                let ret = self.arena.return_type(stripped);
                self.coerce(ret, body);
            }
        }

        self.close_type_params(num);
    }

    fn check_type_param_bounds(&mut self, f: &mut FnItem) {
        for param in &mut f.type_params {
            for bound in &mut param.bounds {
                self.check_ast_type(bound);
            }
        }
    }

    fn strip_lambdas(&mut self, mut ty: TypeId) -> TypeId {
        while let Some((body, _)) = self.arena.as_lambda(ty) {
            ty = body;
        }
        ty
    }

    /// A local's contribution: its annotated type when present, its current
    /// slot otherwise, a fresh unknown when the slot is still empty.
    pub fn check_local(&mut self, local: &mut LocalDecl) -> TypeId {
        let decl = match self.res.decl_of(local.id) {
            Some(decl) => decl,
            None => return self.arena.error(),
        };
        let ty = if let Some(ast_type) = &mut local.ast_type {
            self.check_ast_type(ast_type)
        } else if let Some(ty) = self.decls.get(decl).ty {
            ty
        } else {
            self.arena.unknown()
        };
        self.constrain_decl(decl, ty)
    }

    // ========================================================================
    // Statements and patterns
    // ========================================================================

    pub fn check_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Item(item) => self.check_item(item),
            StmtKind::Let(let_stmt) => {
                self.check_ptrn(&mut let_stmt.ptrn);
                if let Some(init) = &mut let_stmt.init {
                    self.rvalue(init);
                    self.coerce_node(let_stmt.ptrn.id, init);
                }
            }
        }
    }

    pub fn check_ptrn(&mut self, ptrn: &mut Ptrn) -> TypeId {
        let ty = match &mut ptrn.kind {
            PtrnKind::Id(local) => self.check_local(local),
            PtrnKind::Tuple(elems) => {
                let ops: TypeIdVec = elems
                    .iter_mut()
                    .map(|elem| self.check_ptrn(elem))
                    .collect();
                self.arena.tuple(ops)
            }
        };
        self.constrain_node(ptrn.id, ty)
    }
}
