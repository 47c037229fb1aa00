use std::fmt;

/// Kind of table, fixed when the table is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableType {
    MySql,
    Odbc,
    /// Native table managed by Doris itself.
    Olap,
    /// System view of information schema.
    Schema,
    InlineView,
    View,
    Broker,
    Elasticsearch,
    Hive,
    Iceberg,
    Hudi,
    TableValuedFunction,
}

impl TableType {
    pub const ALL: [TableType; 12] = [
        TableType::MySql,
        TableType::Odbc,
        TableType::Olap,
        TableType::Schema,
        TableType::InlineView,
        TableType::View,
        TableType::Broker,
        TableType::Elasticsearch,
        TableType::Hive,
        TableType::Iceberg,
        TableType::Hudi,
        TableType::TableValuedFunction,
    ];

    /// Engine name shown by `SHOW TABLE STATUS` and information schema.
    /// Returns None for types without a defined engine name.
    #[inline]
    pub const fn engine_label(self) -> Option<&'static str> {
        let label = match self {
            TableType::MySql => "MySQL",
            TableType::Odbc => "Odbc",
            TableType::Olap => "Doris",
            TableType::Schema => "MEMORY",
            TableType::InlineView => "InlineView",
            TableType::View => "View",
            TableType::Broker => "Broker",
            TableType::Elasticsearch => "ElasticSearch",
            TableType::Hive => "Hive",
            TableType::Hudi => "Hudi",
            TableType::TableValuedFunction => "Table_Valued_Function",
            TableType::Iceberg => return None,
        };
        Some(label)
    }

    /// MySQL compatible table kind, e.g. `BASE TABLE`, `VIEW`.
    /// Returns None for types without a defined kind.
    #[inline]
    pub const fn catalog_kind_label(self) -> Option<&'static str> {
        let label = match self {
            TableType::Olap => "BASE TABLE",
            TableType::Schema => "SYSTEM VIEW",
            TableType::InlineView | TableType::View => "VIEW",
            TableType::MySql
            | TableType::Odbc
            | TableType::Broker
            | TableType::Elasticsearch
            | TableType::Hive
            | TableType::Hudi
            | TableType::TableValuedFunction => "EXTERNAL TABLE",
            TableType::Iceberg => return None,
        };
        Some(label)
    }

    #[inline]
    pub fn is_external(self) -> bool {
        self.catalog_kind_label() == Some("EXTERNAL TABLE")
    }
}

impl fmt::Display for TableType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
