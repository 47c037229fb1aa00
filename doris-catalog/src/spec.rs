use crate::column::Column;
use crate::table_type::TableType;
use semistr::SemiStr;

#[derive(Debug)]
pub struct TableSpec {
    pub table_name: SemiStr,
    pub table_type: TableType,
    pub columns: Vec<Column>,
    pub comment: SemiStr,
}

impl TableSpec {
    #[inline]
    pub fn new(table_name: &str, table_type: TableType, columns: Vec<Column>) -> Self {
        TableSpec {
            table_name: SemiStr::new(table_name),
            table_type,
            columns,
            comment: SemiStr::new(""),
        }
    }

    #[inline]
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = SemiStr::new(comment);
        self
    }
}
