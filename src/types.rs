//! Type OID to type-name resolution.
//!
//! RowDescription reports each column's type as a numeric OID. The result
//! assembler turns it into a readable name through a [`TypeLookup`]; OIDs the
//! lookup does not know resolve to [`UNKNOWN_TYPE`], never to an error.

/// Name used for any OID the lookup cannot resolve.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Source of type names, keyed by OID.
///
/// Implement this to resolve user-defined types (enums, domains, extensions)
/// from a catalog snapshot; [`BuiltinTypes`] covers the built-in ones.
pub trait TypeLookup: Send + Sync {
    fn type_name(&self, oid: u32) -> Option<&str>;
}

/// Static table of PostgreSQL built-in type OIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTypes;

impl TypeLookup for BuiltinTypes {
    fn type_name(&self, oid: u32) -> Option<&str> {
        builtin_type_name(oid)
    }
}

/// Resolve `oid` through `lookup`, falling back to [`UNKNOWN_TYPE`].
pub fn resolve(lookup: &dyn TypeLookup, oid: u32) -> &str {
    lookup.type_name(oid).unwrap_or(UNKNOWN_TYPE)
}

pub const fn builtin_type_name(oid: u32) -> Option<&'static str> {
    let name = match oid {
        16 => "bool",
        17 => "bytea",
        18 => "char",
        19 => "name",
        20 => "int8",
        21 => "int2",
        23 => "int4",
        24 => "regproc",
        25 => "text",
        26 => "oid",
        28 => "xid",
        29 => "cid",
        114 => "json",
        142 => "xml",
        194 => "pg_node_tree",
        600 => "point",
        601 => "lseg",
        602 => "path",
        603 => "box",
        604 => "polygon",
        628 => "line",
        650 => "cidr",
        700 => "float4",
        701 => "float8",
        705 => "unknown",
        718 => "circle",
        774 => "macaddr8",
        790 => "money",
        829 => "macaddr",
        869 => "inet",
        1000 => "bool[]",
        1001 => "bytea[]",
        1002 => "char[]",
        1003 => "name[]",
        1005 => "int2[]",
        1007 => "int4[]",
        1009 => "text[]",
        1015 => "varchar[]",
        1016 => "int8[]",
        1021 => "float4[]",
        1022 => "float8[]",
        1028 => "oid[]",
        1033 => "aclitem",
        1034 => "aclitem[]",
        1042 => "bpchar",
        1043 => "varchar",
        1082 => "date",
        1083 => "time",
        1114 => "timestamp",
        1115 => "timestamp[]",
        1182 => "date[]",
        1183 => "time[]",
        1184 => "timestamptz",
        1185 => "timestamptz[]",
        1186 => "interval",
        1187 => "interval[]",
        1231 => "numeric[]",
        1266 => "timetz",
        1560 => "bit",
        1562 => "varbit",
        1700 => "numeric",
        2205 => "regclass",
        2206 => "regtype",
        2249 => "record",
        2275 => "cstring",
        2278 => "void",
        2950 => "uuid",
        2951 => "uuid[]",
        3220 => "pg_lsn",
        3614 => "tsvector",
        3615 => "tsquery",
        3802 => "jsonb",
        3807 => "jsonb[]",
        3904 => "int4range",
        3906 => "numrange",
        3908 => "tsrange",
        3910 => "tstzrange",
        3912 => "daterange",
        3926 => "int8range",
        199 => "json[]",
        _ => return None,
    };
    Some(name)
}
