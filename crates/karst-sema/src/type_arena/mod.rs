// type_arena/mod.rs
//
// Interned type system using TypeId handles for O(1) equality and minimal
// allocations. The arena is the only producer of types; two handles are
// equal iff they denote the same interned term (fresh `Unknown`s excepted,
// which have identity).

mod arena;
mod term;
mod type_id;

#[cfg(test)]
mod tests;

pub use arena::TypeArena;
pub use term::TypeTerm;
pub use type_id::{TypeId, TypeIdVec};
