pub mod column;
pub mod conf;
pub mod error;
pub mod mem_impl;
pub mod object;
pub mod spec;
pub mod table_type;

pub use column::*;
pub use conf::CatalogConfig;
pub use mem_impl::MemDatabase;
pub use object::{CatalogObject, TableReadGuard, TableWriteGuard};
pub use spec::TableSpec;
pub use table_type::TableType;

pub type ObjID = u64;
pub type TableID = ObjID;
