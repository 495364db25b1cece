//! Field type tags, flag bits and default values
//!
//! Everything in here is `const`-constructible so schemas can live in
//! `static` items.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Per-field access, persistence, relation and statistics flags
    ///
    /// Bits are assigned in ascending order and are independent of each other.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u32 {
        /// Field is hidden from every outer surface
        const NOT_ACCESSIBLE = 1 << 0;
        /// Field can be read but not written by clients
        const READ_ONLY = 1 << 1;
        /// Field can be written by clients
        const WRITABLE = 1 << 2;
        /// Field must be supplied when a record is created from input
        const REQUIRED = 1 << 3;
        /// Field is saved to and loaded from persistence files
        const PERSIST = 1 << 4;
        /// Field value is recomputed and never cached
        const VOLATILE = 1 << 5;
        /// Field refers to a resource
        const IS_A_RESOURCE = 1 << 6;
        /// Field is the record's identity (at most one per schema)
        const PRIMARY_KEY = 1 << 7;
        /// Field holds children owned exclusively by this record
        const PURE_CHILD = 1 << 8;
        /// Field holds the parent id of a pure child
        const PARENT_ID_OF_PURE_CHILD = 1 << 9;
        /// Command accepts any sub-command
        const WILDCARD_COMMAND = 1 << 10;
        /// Field is tracked for statistics
        const HAS_STATISTICS = 1 << 11;
        /// Field refers to records it does not own
        const FOREIGN_KEY = 1 << 12;
        /// Statistics field that can be reset
        const HAS_RESETTABLE_STATISTICS = 1 << 13;
        /// Statistics field that survives restarts
        const HAS_PERSISTENT_STATISTICS = 1 << 14;
        /// Reading requires authorization
        const REQUIRES_READ_AUTHORIZATION = 1 << 15;
        /// Writing requires authorization
        const REQUIRES_WRITE_AUTHORIZATION = 1 << 16;
        /// Executing requires authorization
        const REQUIRES_EXECUTE_AUTHORIZATION = 1 << 17;
        /// Field is a parameter of an authorization descriptor
        const IS_AN_AUTHORIZATION_PARAMETER = 1 << 18;
    }
}

impl FieldFlags {
    /// Every flag that marks a field as a statistics field
    pub const STATISTICS: Self = Self::HAS_STATISTICS
        .union(Self::HAS_RESETTABLE_STATISTICS)
        .union(Self::HAS_PERSISTENT_STATISTICS);

    /// Returns true if any statistics flag is set
    pub const fn is_statistics(self) -> bool {
        self.intersects(Self::STATISTICS)
    }

    /// Include/exclude test shared by the JSON bridge and the matcher
    ///
    /// `include == FieldFlags::all()` bypasses the inclusion test.
    pub fn passes(self, include: FieldFlags, exclude: FieldFlags) -> bool {
        let included = include == FieldFlags::all() || self.intersects(include);
        included && !self.intersects(exclude)
    }
}

/// Declared storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
    /// Owned string
    String,
    /// Owned JSON value (shared handle)
    Json,
    /// Raw pointer, never owned
    Pointer,
    /// Owned list of child records
    List,
    /// Owned iterator over related records
    Iterator,
    /// Nested generic resource
    Resource,
    /// Nested command descriptor
    Command,
    /// Nested authorization descriptor
    Auth,
    /// Terminates a schema
    Sentinel,
}

impl FieldType {
    /// Bytes of record storage for this type, excluding the metadata word
    ///
    /// Owned and reference kinds occupy a host-pointer-sized slot; the owned
    /// memory itself lives outside the record. `None` for the sentinel.
    pub const fn storage_size(self) -> Option<usize> {
        const PTR: usize = std::mem::size_of::<usize>();
        match self {
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double => Some(8),
            Self::Bool => Some(1),
            Self::String
            | Self::Json
            | Self::Pointer
            | Self::List
            | Self::Iterator
            | Self::Resource
            | Self::Command
            | Self::Auth => Some(PTR),
            Self::Sentinel => None,
        }
    }

    /// Lowercase name used in descriptor documents and diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Json => "json",
            Self::Pointer => "pointer",
            Self::List => "list",
            Self::Iterator => "iterator",
            Self::Resource => "resource",
            Self::Command => "command",
            Self::Auth => "auth",
            Self::Sentinel => "sentinel",
        }
    }

    /// List or iterator: references an ordered collection of records
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::List | Self::Iterator)
    }

    /// One of the nested-schema markers
    pub const fn is_nested(self) -> bool {
        matches!(self, Self::Resource | Self::Command | Self::Auth)
    }

    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::UInt32 | Self::Int64 | Self::UInt64 | Self::Float | Self::Double
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default value declared on a field descriptor
///
/// Interpreted against the field's type when applied; `Json` holds JSON text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    None,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(&'static str),
    Json(&'static str),
}

/// Fixed display metadata used only when rendering tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMeta {
    /// Column header
    pub header: &'static str,
    /// Column width
    pub width: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_ascending() {
        assert_eq!(FieldFlags::NOT_ACCESSIBLE.bits(), 1);
        assert_eq!(FieldFlags::PERSIST.bits(), 1 << 4);
        assert_eq!(FieldFlags::PRIMARY_KEY.bits(), 1 << 7);
        assert_eq!(FieldFlags::IS_AN_AUTHORIZATION_PARAMETER.bits(), 1 << 18);
    }

    #[test]
    fn test_statistics_flags() {
        assert!(FieldFlags::HAS_STATISTICS.is_statistics());
        assert!(FieldFlags::HAS_PERSISTENT_STATISTICS.is_statistics());
        assert!(!FieldFlags::PERSIST.is_statistics());
    }

    #[test]
    fn test_passes_filter() {
        let flags = FieldFlags::PERSIST | FieldFlags::WRITABLE;
        assert!(flags.passes(FieldFlags::PERSIST, FieldFlags::empty()));
        assert!(!flags.passes(FieldFlags::VOLATILE, FieldFlags::empty()));
        assert!(!flags.passes(FieldFlags::all(), FieldFlags::WRITABLE));
        assert!(FieldFlags::empty().passes(FieldFlags::all(), FieldFlags::empty()));
    }

    #[test]
    fn test_storage_sizes() {
        assert_eq!(FieldType::Int32.storage_size(), Some(4));
        assert_eq!(FieldType::Double.storage_size(), Some(8));
        assert_eq!(FieldType::Bool.storage_size(), Some(1));
        assert_eq!(
            FieldType::String.storage_size(),
            Some(std::mem::size_of::<usize>())
        );
        assert_eq!(FieldType::Sentinel.storage_size(), None);
    }
}
