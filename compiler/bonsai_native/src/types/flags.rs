//! Pre-computed runtime type properties.
//!
//! Computed once when a type is interned, so classification queries made
//! by the factory and the interpreter never walk the type.

use bitflags::bitflags;

bitflags! {
    /// Cached classification of a [`RuntimeType`](super::RuntimeType).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u32 {
        // === Category (bits 0-7) ===

        /// One of the built-in scalar types, `String`, `Object` or `Void`.
        const IS_PRIMITIVE = 1 << 0;
        /// Vector or multi-dimensional array.
        const IS_ARRAY = 1 << 1;
        /// Function (delegate) type.
        const IS_FUNCTION = 1 << 2;
        /// Open generic definition such as `List`1`.
        const IS_GENERIC_DEFINITION = 1 << 3;
        /// Closed construction of a generic definition.
        const IS_CONSTRUCTED = 1 << 4;
        /// Generic parameter placeholder.
        const IS_GENERIC_PARAMETER = 1 << 5;
        /// `System.Void`.
        const IS_VOID = 1 << 6;

        // === Semantics (bits 8-15) ===

        /// Copied by value; never `null` unless nullable.
        const IS_VALUE_TYPE = 1 << 8;
        /// `Nullable`1` construction.
        const IS_NULLABLE = 1 << 9;
        /// Integer or floating point primitive.
        const IS_NUMERIC = 1 << 10;
        /// Integer primitive.
        const IS_INTEGER = 1 << 11;

        // === Presence (bits 16-23) ===

        /// A generic parameter occurs somewhere inside.
        const HAS_GENERIC_PARAMETER = 1 << 16;
    }
}

impl TypeFlags {
    /// Flags inherited by a compound type from its components.
    pub const PROPAGATE_MASK: Self = Self::HAS_GENERIC_PARAMETER;

    #[inline]
    pub const fn is_value_type(self) -> bool {
        self.contains(Self::IS_VALUE_TYPE)
    }

    /// Whether values of this type can be `null`.
    #[inline]
    pub const fn admits_null(self) -> bool {
        !self.contains(Self::IS_VALUE_TYPE) || self.contains(Self::IS_NULLABLE)
    }
}
