// type_arena/tests.rs

use karst_frontend::{Interner, PrimType, PtrKind, Span};

use crate::decl::{DeclKind, DeclTable};

use super::{TypeArena, TypeId, TypeIdVec};

fn ops(ids: &[TypeId]) -> TypeIdVec {
    ids.iter().copied().collect()
}

#[test]
fn primitives_are_reserved() {
    let arena = TypeArena::new();
    assert_eq!(arena.prim(PrimType::I32), TypeId::I32);
    assert_eq!(arena.prim(PrimType::Bool), TypeId::BOOL);
    assert_eq!(arena.unit(), TypeId::UNIT);
    assert_eq!(arena.noret(), TypeId::NORET);
    assert!(arena.error().is_error());
}

#[test]
fn compound_constructors_intern() {
    let mut arena = TypeArena::new();
    let a = arena.borrowed_ptr(TypeId::I32, false, 0);
    let b = arena.borrowed_ptr(TypeId::I32, false, 0);
    assert_eq!(a, b);

    let t1 = arena.tuple(ops(&[TypeId::I32, TypeId::BOOL]));
    let t2 = arena.tuple(ops(&[TypeId::I32, TypeId::BOOL]));
    assert_eq!(t1, t2);

    let d1 = arena.def_array(TypeId::U8, 4);
    let d2 = arena.def_array(TypeId::U8, 4);
    let d3 = arena.def_array(TypeId::U8, 5);
    assert_eq!(d1, d2);
    assert_ne!(d1, d3);
}

#[test]
fn unknowns_have_identity() {
    let mut arena = TypeArena::new();
    let u1 = arena.unknown();
    let u2 = arena.unknown();
    assert_ne!(u1, u2);
    assert!(arena.is_unknown(u1));
    assert!(!arena.is_known(u1));
}

#[test]
fn known_is_memoized_structurally() {
    let mut arena = TypeArena::new();
    let unknown = arena.unknown();
    let open_ptr = arena.borrowed_ptr(unknown, false, 0);
    let closed_ptr = arena.borrowed_ptr(TypeId::I32, false, 0);
    assert!(!arena.is_known(open_ptr));
    assert!(arena.is_known(closed_ptr));

    let open_fn = arena.fn_type(ops(&[TypeId::I32, open_ptr]));
    assert!(!arena.is_known(open_fn));
}

#[test]
fn struct_types_are_nominal() {
    let mut interner = Interner::new();
    let mut arena = TypeArena::new();
    let mut decls = DeclTable::new();
    let s = interner.intern("Vec3");
    let d1 = decls.alloc(s, Span::default(), DeclKind::Struct);
    let d2 = decls.alloc(s, Span::default(), DeclKind::Struct);

    let t1 = arena.struct_type(d1);
    let t1_again = arena.struct_type(d1);
    let t2 = arena.struct_type(d2);
    assert_eq!(t1, t1_again);
    assert_ne!(t1, t2);
    assert!(arena.is_known(t1));
}

#[test]
fn fn_from_type_flattens_tuples() {
    let mut arena = TypeArena::new();
    let pair = arena.tuple(ops(&[TypeId::I32, TypeId::BOOL]));
    let flat = arena.fn_from_type(pair);
    let expected = arena.fn_type(ops(&[TypeId::I32, TypeId::BOOL]));
    assert_eq!(flat, expected);

    let single = arena.fn_from_type(TypeId::I64);
    let expected = arena.fn_type(ops(&[TypeId::I64]));
    assert_eq!(single, expected);
}

#[test]
fn return_type_unpacks_continuation() {
    let mut arena = TypeArena::new();
    let cont = arena.fn_type(ops(&[TypeId::I32]));
    let f = arena.fn_type(ops(&[TypeId::I32, TypeId::I32, cont]));
    assert_eq!(arena.return_type(f), TypeId::I32);

    // A continuation of any other arity returns the operand tuple.
    let pair_cont = arena.fn_type(ops(&[TypeId::I32, TypeId::BOOL]));
    let g = arena.fn_type(ops(&[pair_cont]));
    let pair = arena.tuple(ops(&[TypeId::I32, TypeId::BOOL]));
    assert_eq!(arena.return_type(g), pair);

    // No trailing continuation means the function never returns.
    let h = arena.fn_type(ops(&[TypeId::I32]));
    assert_eq!(arena.return_type(h), TypeId::NORET);
}

#[test]
fn close_then_count_lambdas() {
    let mut interner = Interner::new();
    let mut arena = TypeArena::new();
    let name = interner.intern("T");
    let body = arena.fn_type(ops(&[TypeId::I32]));
    let closed = arena.close(2, body, name);
    assert_eq!(arena.num_lambdas(closed), 2);
    assert_eq!(arena.num_lambdas(body), 0);
}

#[test]
fn app_substitutes_outermost_binder() {
    let mut interner = Interner::new();
    let mut arena = TypeArena::new();
    let name = interner.intern("T");

    // [A][B] fn(A, B) with A bound by the outer lambda: Var(1) under two
    // binders.
    let var_a = arena.var(1);
    let var_b = arena.var(0);
    let body = arena.fn_type(ops(&[var_a, var_b]));
    let closed = arena.close(2, body, name);

    let once = arena.app(closed, TypeId::I32);
    assert_eq!(arena.num_lambdas(once), 1);
    let twice = {
        let inner = once;
        arena.app(inner, TypeId::BOOL)
    };
    let expected = arena.fn_type(ops(&[TypeId::I32, TypeId::BOOL]));
    assert_eq!(twice, expected);
}

#[test]
fn app_results_are_cached() {
    let mut interner = Interner::new();
    let mut arena = TypeArena::new();
    let name = interner.intern("T");
    let var = arena.var(0);
    let body = arena.indef_array(var);
    let lambda = arena.lambda(body, name);

    let first = arena.app(lambda, TypeId::I32);
    let second = arena.app(lambda, TypeId::I32);
    assert_eq!(first, second);
    let expected = arena.indef_array(TypeId::I32);
    assert_eq!(first, expected);
}

#[test]
fn ptr_owned_is_mutable() {
    let mut arena = TypeArena::new();
    let owned = arena.owned_ptr(TypeId::I32, 0);
    let (kind, pointee, mutable, addr_space) = arena.as_ptr(owned).unwrap();
    assert_eq!(kind, PtrKind::Owned);
    assert_eq!(pointee, TypeId::I32);
    assert!(mutable);
    assert_eq!(addr_space, 0);
}
