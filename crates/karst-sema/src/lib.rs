//! Karst semantic analysis: name resolution, fixpoint type inference, and
//! type checking over the parser's AST.
//!
//! The pipeline runs in three strictly ordered passes:
//!
//! 1. [`resolve`] binds every identifier use to a declaration through lexical
//!    scoping.
//! 2. [`infer`] refines type slots to a fixpoint using union-find over
//!    interned types, rewriting the AST in place with implicit coercions.
//! 3. [`check`] enforces operator, lvalue, cast, arity and completeness rules
//!    and emits every diagnostic.
//!
//! A run succeeds iff no error-severity diagnostic was emitted; warnings
//! never fail a run, and no pass stops at the first problem.

pub mod check;
pub mod decl;
pub mod errors;
pub mod infer;
pub mod node_types;
pub mod resolve;
pub mod type_arena;
pub mod type_display;

use karst_frontend::{Interner, Module};

pub use decl::{Decl, DeclId, DeclKind, DeclTable, Resolutions};
pub use errors::{Diagnostics, SemaError, SemaWarning};
pub use node_types::NodeTypes;
pub use type_arena::{TypeArena, TypeId, TypeIdVec, TypeTerm};

/// Analysis configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Mark every referenced mutable local address-taken instead of only
    /// those used across function-nesting boundaries, forcing memory
    /// allocation at code generation time.
    pub nossa: bool,
}

/// Everything semantic analysis produced for one module.
#[derive(Debug)]
pub struct Analysis {
    pub types: TypeArena,
    pub decls: DeclTable,
    pub resolutions: Resolutions,
    pub node_types: NodeTypes,
    pub diagnostics: Diagnostics,
}

impl Analysis {
    /// True iff no error-severity diagnostic was emitted.
    pub fn success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Analyze `module` in place: resolve names, infer types to fixpoint, check.
///
/// On return every identifier use carries a declaration, every node and
/// declaration carries a type, and implicit coercion wrappers have been
/// spliced into the tree where required.
pub fn analyze(
    module: &mut Module,
    interner: &mut Interner,
    options: &AnalysisOptions,
) -> Analysis {
    let mut types = TypeArena::new();
    let mut decls = DeclTable::new();
    let mut resolutions = Resolutions::new();
    let mut node_types = NodeTypes::new();
    let mut diagnostics = Diagnostics::new();

    resolve::resolve_names(module, interner, &mut decls, &mut resolutions, &mut diagnostics);
    infer::infer(module, &mut types, &mut decls, &resolutions, &mut node_types);
    check::check_types(
        module,
        &mut types,
        &mut decls,
        &resolutions,
        &node_types,
        interner,
        &mut diagnostics,
        options,
    );

    Analysis {
        types,
        decls,
        resolutions,
        node_types,
        diagnostics,
    }
}
