// type_arena/type_id.rs
//
// TypeId: u32 handle to an interned type term.

use smallvec::SmallVec;

use karst_frontend::PrimType;

/// Concrete type identity in the `TypeArena`.
///
/// Primitives and the special types below are pre-interned at fixed indices
/// so they can be compared and produced without touching the arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeId(u32);

impl TypeId {
    // Reserved TypeIds, guaranteed to be interned at these indices by
    // TypeArena::new().

    /// The absorbing error type (must be 0 for `is_error`).
    pub const ERROR: TypeId = TypeId(0);

    pub const BOOL: TypeId = TypeId(1);
    pub const I8: TypeId = TypeId(2);
    pub const I16: TypeId = TypeId(3);
    pub const I32: TypeId = TypeId(4);
    pub const I64: TypeId = TypeId(5);
    pub const ISIZE: TypeId = TypeId(6);
    pub const U8: TypeId = TypeId(7);
    pub const U16: TypeId = TypeId(8);
    pub const U32: TypeId = TypeId(9);
    pub const U64: TypeId = TypeId(10);
    pub const USIZE: TypeId = TypeId(11);
    pub const F32: TypeId = TypeId(12);
    pub const F64: TypeId = TypeId(13);

    /// The unit type, `Tuple([])`.
    pub const UNIT: TypeId = TypeId(14);
    /// The type of expressions that never return.
    pub const NORET: TypeId = TypeId(15);

    /// First non-reserved index.
    pub(super) const FIRST_DYNAMIC: u32 = 16;

    pub(super) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }

    #[inline]
    pub fn is_unit(self) -> bool {
        self == Self::UNIT
    }

    #[inline]
    pub fn is_noret(self) -> bool {
        self == Self::NORET
    }

    /// The reserved id for a primitive kind.
    pub fn for_prim(prim: PrimType) -> TypeId {
        match prim {
            PrimType::Bool => Self::BOOL,
            PrimType::I8 => Self::I8,
            PrimType::I16 => Self::I16,
            PrimType::I32 => Self::I32,
            PrimType::I64 => Self::I64,
            PrimType::ISize => Self::ISIZE,
            PrimType::U8 => Self::U8,
            PrimType::U16 => Self::U16,
            PrimType::U32 => Self::U32,
            PrimType::U64 => Self::U64,
            PrimType::USize => Self::USIZE,
            PrimType::F32 => Self::F32,
            PrimType::F64 => Self::F64,
        }
    }
}

/// SmallVec for type children - inline up to 4 (covers most tuples and
/// argument lists).
pub type TypeIdVec = SmallVec<[TypeId; 4]>;
