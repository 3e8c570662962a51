//! Karst frontend data: AST, string interner, and source spans.
//!
//! The lexer and parser live upstream; semantic analysis consumes the types
//! in this crate and rewrites the AST in place.

pub mod ast;
pub mod intern;
pub mod span;

pub use ast::{
    AstType, AstTypeKind, BlockExpr, ClosureExpr, EnumItem, Expr, ExprKind, ExternBlock,
    FieldDecl, FieldInit, FnAstType, FnItem, ForExpr, IfExpr, ImplItem, InfixOp, Item, ItemKind,
    LetStmt, Lit, LocalDecl, MapExpr, Module, ModuleDecl, NodeId, PostfixOp, PrefixOp, PrimType,
    Ptrn, PtrnKind, PtrKind, StaticItem, Stmt, StmtKind, StructItem, StructLitExpr, Symbol,
    TraitItem, TypeAppExpr, TypeParam, TypedefItem, WhileExpr,
};
pub use intern::Interner;
pub use span::Span;
