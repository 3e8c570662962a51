// type_display.rs
//
// Human-readable rendering of interned types for diagnostics.

use karst_frontend::{Interner, PtrKind};

use crate::decl::DeclTable;
use crate::type_arena::{TypeArena, TypeId, TypeTerm};

/// Render `ty` for use in a diagnostic message.
pub fn display_type(
    arena: &TypeArena,
    decls: &DeclTable,
    interner: &Interner,
    ty: TypeId,
) -> String {
    let mut out = String::new();
    write_type(arena, decls, interner, ty, &mut out);
    out
}

fn write_type(
    arena: &TypeArena,
    decls: &DeclTable,
    interner: &Interner,
    ty: TypeId,
    out: &mut String,
) {
    let list = |out: &mut String, ops: &[TypeId], open: &str, close: &str| {
        out.push_str(open);
        for (i, &op) in ops.iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            write_type(arena, decls, interner, op, out);
        }
        out.push_str(close);
    };

    match arena.term(ty) {
        TypeTerm::Error => out.push_str("<error>"),
        TypeTerm::Prim(p) => out.push_str(p.as_str()),
        TypeTerm::Ptr {
            kind,
            mutable,
            addr_space,
            pointee,
        } => {
            match kind {
                PtrKind::Owned => out.push('~'),
                PtrKind::Borrowed if *mutable => out.push_str("&mut "),
                PtrKind::Borrowed => out.push('&'),
            }
            if *addr_space != 0 {
                out.push_str(&format!("[{addr_space}]"));
            }
            write_type(arena, decls, interner, *pointee, out);
        }
        TypeTerm::Ref {
            mutable, pointee, ..
        } => {
            out.push_str(if *mutable { "ref mut " } else { "ref " });
            write_type(arena, decls, interner, *pointee, out);
        }
        TypeTerm::DefArray { elem, dim } => {
            out.push('[');
            write_type(arena, decls, interner, *elem, out);
            out.push_str(&format!(" * {dim}]"));
        }
        TypeTerm::IndefArray { elem } => {
            out.push('[');
            write_type(arena, decls, interner, *elem, out);
            out.push(']');
        }
        TypeTerm::Simd { elem, lanes } => {
            out.push_str("simd[");
            write_type(arena, decls, interner, *elem, out);
            out.push_str(&format!(" * {lanes}]"));
        }
        TypeTerm::Tuple(ops) => list(out, ops, "(", ")"),
        TypeTerm::Fn(ops) => list(out, ops, "fn(", ")"),
        TypeTerm::Struct { decl } => {
            out.push_str(interner.resolve(decls.get(*decl).symbol));
        }
        TypeTerm::Lambda { body, name } => {
            out.push_str(&format!("[{}]", interner.resolve(*name)));
            write_type(arena, decls, interner, *body, out);
        }
        TypeTerm::Var(depth) => out.push_str(&format!("'{depth}")),
        TypeTerm::Unknown(serial) => out.push_str(&format!("?{serial}")),
        TypeTerm::NoRet => out.push('!'),
    }
}
