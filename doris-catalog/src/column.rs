use bitflags::bitflags;
use indexmap::IndexMap;
use semistr::SemiStr;
use std::sync::Arc;

/// Name prefix of columns added by an ongoing schema change.
pub const SHADOW_NAME_PREFIX: &str = "__doris_shadow_";
/// Name of hidden column which marks deleted rows.
pub const DELETE_SIGN_COL_NAME: &str = "__DORIS_DELETE_SIGN__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    LargeInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Date,
    DateTime,
    Char(u32),
    Varchar(u32),
    String,
}

bitflags! {
    pub struct ColumnAttributes: u32 {
        // whether value can be null.
        const NULLABLE = 0x01;
        // whether it is part of the key.
        const KEY = 0x02;
        // system column which is never shown to users.
        const HIDDEN = 0x04;
        // column being added by schema change, not visible until finished.
        const SHADOW = 0x08;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: SemiStr,
    pub col_type: ColumnType,
    pub attr: ColumnAttributes,
    pub default_value: Option<SemiStr>,
    pub comment: SemiStr,
}

impl Column {
    #[inline]
    pub fn new(name: &str, col_type: ColumnType) -> Self {
        Column {
            name: SemiStr::new(name),
            col_type,
            attr: ColumnAttributes::empty(),
            default_value: None,
            comment: SemiStr::new(""),
        }
    }

    #[inline]
    pub fn attr(mut self, attr: ColumnAttributes) -> Self {
        self.attr |= attr;
        self
    }

    #[inline]
    pub fn default_value(mut self, default_value: &str) -> Self {
        self.default_value = Some(SemiStr::new(default_value));
        self
    }

    #[inline]
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = SemiStr::new(comment);
        self
    }

    /// Hidden column marking deleted rows of unique key tables.
    #[inline]
    pub fn delete_sign() -> Self {
        Column::new(DELETE_SIGN_COL_NAME, ColumnType::TinyInt)
            .attr(ColumnAttributes::HIDDEN)
            .default_value("0")
    }

    /// Shadow copy of this column, used while schema change is running.
    #[inline]
    pub fn shadow(&self, col_type: ColumnType) -> Self {
        let name = format!("{}{}", SHADOW_NAME_PREFIX, self.name.as_str());
        Column {
            name: SemiStr::new(&name),
            col_type,
            attr: self.attr | ColumnAttributes::SHADOW,
            default_value: self.default_value.clone(),
            comment: self.comment.clone(),
        }
    }

    /// Returns whether the column is visible to users.
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self
            .attr
            .intersects(ColumnAttributes::HIDDEN | ColumnAttributes::SHADOW)
    }

    #[inline]
    pub fn is_key(&self) -> bool {
        self.attr.contains(ColumnAttributes::KEY)
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.attr.contains(ColumnAttributes::NULLABLE)
    }
}

/// Column list of a table.
///
/// Full schema contains columns in every state, including hidden
/// and shadow columns. Base schema is the user-visible subset and
/// is always derived from full schema, with relative order kept.
#[derive(Debug, Clone)]
pub struct TableSchema {
    full: Arc<[Column]>,
    base: Arc<[Column]>,
    // lower-case column name to position in full schema.
    name_to_idx: IndexMap<String, usize>,
}

impl TableSchema {
    #[inline]
    pub fn new(columns: Vec<Column>) -> Self {
        let base: Vec<Column> = columns.iter().filter(|c| c.is_visible()).cloned().collect();
        let name_to_idx = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.as_str().to_lowercase(), idx))
            .collect();
        TableSchema {
            full: Arc::from(columns),
            base: Arc::from(base),
            name_to_idx,
        }
    }

    #[inline]
    pub fn full(&self) -> &Arc<[Column]> {
        &self.full
    }

    #[inline]
    pub fn base(&self) -> &Arc<[Column]> {
        &self.base
    }

    /// Returns full schema if hidden columns are included,
    /// otherwise base schema.
    #[inline]
    pub fn columns(&self, include_hidden: bool) -> &Arc<[Column]> {
        if include_hidden { &self.full } else { &self.base }
    }

    /// Find column in full schema by name, case-insensitive.
    #[inline]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.name_to_idx
            .get(&name.to_lowercase())
            .map(|idx| &self.full[*idx])
    }
}
