// decl.rs
//
// Declaration arena. Every binding site in the AST (items, fields, locals,
// parameters, type parameters) owns one Decl; use sites refer to it through
// non-owning DeclIds recorded in `Resolutions`.

use rustc_hash::FxHashMap;

use karst_frontend::{NodeId, Span, Symbol};

use crate::type_arena::TypeId;

/// Handle to a declaration in the `DeclTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(u32);

impl DeclId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Local,
    Param,
    Fn,
    Struct,
    Field,
    Enum,
    Trait,
    Impl,
    Static,
    Typedef,
    Module,
    TypeParam,
}

impl DeclKind {
    /// Declarations that may be referenced from expression position.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            DeclKind::Local | DeclKind::Param | DeclKind::Fn | DeclKind::Static
        )
    }

    /// Declarations that may be referenced from type position.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            DeclKind::Struct
                | DeclKind::Enum
                | DeclKind::Trait
                | DeclKind::Typedef
                | DeclKind::TypeParam
        )
    }
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub symbol: Symbol,
    pub span: Span,
    pub kind: DeclKind,
    /// Resolved type slot, filled by inference.
    pub ty: Option<TypeId>,
    /// The declaration this one hides in an outer scope.
    pub shadows: Option<DeclId>,
    /// Scope depth at insertion time.
    pub depth: usize,
    pub mutable: bool,
    /// Set by the checker when an assignment or increment targets this
    /// declaration.
    pub written: bool,
    /// Set by the checker when the declaration must live in memory.
    pub address_taken: bool,
    /// For locals and parameters: the function or closure node owning them.
    pub owner_fn: Option<NodeId>,
    /// For locals and parameters: stack slot index within the owning
    /// function.
    pub handle: usize,
    /// For type parameters: number of type binders opened before this one.
    pub binder_index: u32,
    /// For structs: field declarations in declaration order.
    pub members: Vec<DeclId>,
}

impl Decl {
    fn new(symbol: Symbol, span: Span, kind: DeclKind) -> Self {
        Self {
            symbol,
            span,
            kind,
            ty: None,
            shadows: None,
            depth: 0,
            mutable: false,
            written: false,
            address_taken: false,
            owner_fn: None,
            handle: 0,
            binder_index: 0,
            members: Vec::new(),
        }
    }
}

/// Arena of declarations for one compilation unit.
#[derive(Debug, Default)]
pub struct DeclTable {
    decls: Vec<Decl>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, symbol: Symbol, span: Span, kind: DeclKind) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl::new(symbol, span, kind));
        id
    }

    pub fn get(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i as u32), d))
    }

    /// Position of `symbol` among a struct's fields.
    pub fn field_index(&self, struct_decl: DeclId, symbol: Symbol) -> Option<usize> {
        self.get(struct_decl)
            .members
            .iter()
            .position(|&f| self.get(f).symbol == symbol)
    }
}

/// Name resolution results: maps from AST nodes to declarations.
#[derive(Debug, Default)]
pub struct Resolutions {
    /// Declaration node -> its Decl.
    decl_of: FxHashMap<NodeId, DeclId>,
    /// Use-site node -> the Decl it refers to.
    use_of: FxHashMap<NodeId, DeclId>,
}

impl Resolutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decl(&mut self, node: NodeId, decl: DeclId) {
        self.decl_of.insert(node, decl);
    }

    pub fn record_use(&mut self, node: NodeId, decl: DeclId) {
        self.use_of.insert(node, decl);
    }

    pub fn decl_of(&self, node: NodeId) -> Option<DeclId> {
        self.decl_of.get(&node).copied()
    }

    pub fn use_of(&self, node: NodeId) -> Option<DeclId> {
        self.use_of.get(&node).copied()
    }
}
