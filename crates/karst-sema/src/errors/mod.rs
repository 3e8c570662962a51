// errors/mod.rs
//! Semantic analysis errors (E2xxx) and warnings (W3xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemaError {
    #[error("'{name}' not found in current scope")]
    #[diagnostic(code(E2001))]
    Undefined {
        name: String,
        #[label("not found")]
        span: SourceSpan,
    },

    #[error("symbol '{name}' already defined")]
    #[diagnostic(code(E2002))]
    Redefinition {
        name: String,
        #[label("redefined here")]
        span: SourceSpan,
        #[label("previous definition here")]
        previous: SourceSpan,
    },

    #[error("'{name}' is not a value")]
    #[diagnostic(code(E2003))]
    NotAValue {
        name: String,
        #[label("used in value position")]
        span: SourceSpan,
    },

    #[error("'{name}' does not name a type")]
    #[diagnostic(code(E2004))]
    NotAType {
        name: String,
        #[label("used in type position")]
        span: SourceSpan,
    },

    #[error("both left-hand side and right-hand side of expression must agree on the same type")]
    #[diagnostic(code(E2005))]
    OperandsDisagree {
        lhs_ty: String,
        rhs_ty: String,
        #[label("operator here")]
        span: SourceSpan,
        #[label("left-hand side type is '{lhs_ty}'")]
        lhs_span: SourceSpan,
        #[label("right-hand side type is '{rhs_ty}'")]
        rhs_span: SourceSpan,
    },

    #[error("expected {expected} (have '{found}') for {context}")]
    #[diagnostic(code(E2006))]
    InvalidOperand {
        expected: &'static str,
        found: String,
        context: String,
        #[label("wrong operand type")]
        span: SourceSpan,
    },

    #[error("lvalue required for {context}")]
    #[diagnostic(code(E2007))]
    LvalueRequired {
        context: String,
        #[label("not an lvalue")]
        span: SourceSpan,
    },

    #[error("cannot infer type for '{name}'")]
    #[diagnostic(code(E2008), help("add a type annotation"))]
    CannotInfer {
        name: String,
        #[label("type remains unknown")]
        span: SourceSpan,
    },

    #[error("mismatched types: expected '{expected}' but found '{found}' as {context}")]
    #[diagnostic(code(E2009))]
    MismatchedType {
        expected: String,
        found: String,
        context: String,
        #[label("type mismatch")]
        span: SourceSpan,
    },

    #[error("invalid source and destination types for cast operator, got '{from}' and '{to}'")]
    #[diagnostic(code(E2010))]
    InvalidCast {
        from: String,
        to: String,
        #[label("invalid cast")]
        span: SourceSpan,
    },

    #[error("too many {what} subscripts")]
    #[diagnostic(code(E2011))]
    TooManySubscripts {
        what: &'static str,
        #[label("extra subscripts")]
        span: SourceSpan,
    },

    #[error("require literal as tuple subscript")]
    #[diagnostic(code(E2012))]
    NonLiteralSubscript {
        #[label("not an integer literal")]
        span: SourceSpan,
    },

    #[error("too {relation} arguments: {found} for {expected}")]
    #[diagnostic(code(E2013))]
    WrongArgumentCount {
        relation: &'static str,
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("too many type arguments: {found} for {expected}")]
    #[diagnostic(code(E2014))]
    WrongTypeArgCount {
        expected: usize,
        found: usize,
        #[label("wrong number of type arguments")]
        span: SourceSpan,
    },

    #[error("attempted access of field '{field}' on type '{ty}', but no field with that name was found")]
    #[diagnostic(code(E2015))]
    NoSuchField {
        ty: String,
        field: String,
        #[label("unknown field")]
        span: SourceSpan,
    },

    #[error("missing field '{field}'")]
    #[diagnostic(code(E2016))]
    StructFieldMissing {
        field: String,
        #[label("in this struct literal")]
        span: SourceSpan,
    },

    #[error("field '{field}' specified more than once")]
    #[diagnostic(code(E2017))]
    StructFieldDuplicate {
        field: String,
        #[label("duplicate initializer")]
        span: SourceSpan,
    },

    #[error("structure '{strukt}' has no field named '{field}'")]
    #[diagnostic(code(E2018))]
    StructFieldUnknown {
        strukt: String,
        field: String,
        #[label("no such field")]
        span: SourceSpan,
    },

    #[error("'{name}' does not name a structure")]
    #[diagnostic(code(E2019))]
    NotAStruct {
        name: String,
        #[label("not a structure")]
        span: SourceSpan,
    },

    #[error("unknown extern specification")]
    #[diagnostic(code(E2020), help("supported ABIs are \"C\", \"device\" and \"thorin\""))]
    UnknownAbi {
        #[label("unsupported ABI")]
        span: SourceSpan,
    },

    #[error("non primitive types forbidden in simd type")]
    #[diagnostic(code(E2021))]
    SimdElemNotPrim {
        #[label("element type must be primitive")]
        span: SourceSpan,
    },

    #[error("incorrect type '{ty}' for map expression")]
    #[diagnostic(code(E2022))]
    BadMapTarget {
        ty: String,
        #[label("neither callable nor indexable")]
        span: SourceSpan,
    },

    #[error("mismatched types: expected '{expected}' but found '{found}' as function body")]
    #[diagnostic(code(E2023))]
    ReturnTypeMismatch {
        expected: String,
        found: String,
        #[label("body type disagrees with declared return type")]
        span: SourceSpan,
    },
}

/// Semantic warnings (W3xxx) - they never fail the run.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemaWarning {
    #[error("variable '{name}' declared mutable but variable is never written to")]
    #[diagnostic(code(W3001))]
    UnusedMut {
        name: String,
        #[label("never written")]
        span: SourceSpan,
    },

    #[error("parameter '{name}' declared mutable but parameter is never written to")]
    #[diagnostic(code(W3002))]
    UnusedMutParam {
        name: String,
        #[label("never written")]
        span: SourceSpan,
    },

    #[error("statement with no effect")]
    #[diagnostic(code(W3003))]
    NoEffect {
        #[label("result is discarded")]
        span: SourceSpan,
    },

    #[error("expression does not return; subsequent statements are unreachable")]
    #[diagnostic(code(W3004))]
    Unreachable {
        #[label("diverges here")]
        span: SourceSpan,
    },
}

/// Collecting sink for semantic diagnostics.
///
/// Analysis never stops at the first problem; every pass keeps going and
/// reports everything it finds. A run is successful iff no error-severity
/// diagnostic was recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<SemaError>,
    warnings: Vec<SemaWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: SemaError) {
        tracing::trace!(%error, "semantic error");
        self.errors.push(error);
    }

    pub fn warning(&mut self, warning: SemaWarning) {
        tracing::trace!(%warning, "semantic warning");
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[SemaError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[SemaWarning] {
        &self.warnings
    }
}
