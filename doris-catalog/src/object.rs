use crate::TableID;
use crate::column::{Column, TableSchema};
use crate::error::{AlterCancelled, DdlError, MetaNotFound};
use crate::spec::TableSpec;
use crate::table_type::TableType;
use doris_latch::LockableHandle;
use log::{trace, warn};
use semistr::SemiStr;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// CatalogObject is a table owned by catalog and shared by
/// concurrent sessions.
///
/// Identity and type never change. Everything else is metadata which
/// can only be reached through a lock guard: `TableReadGuard` for
/// shared access, `TableWriteGuard` for exclusive access.
///
/// Exclusive access is reentrant per thread. Read accessors of guards
/// return owned values, so nested write guards of one thread never
/// observe each other's references.
pub struct CatalogObject {
    id: TableID,
    table_type: TableType,
    handle: LockableHandle,
    meta: UnsafeCell<TableMeta>,
}

// metadata is only accessed through guards of the handle.
unsafe impl Sync for CatalogObject {}

struct TableMeta {
    name: SemiStr,
    schema: TableSchema,
    comment: SemiStr,
    // seconds since unix epoch.
    create_time: u64,
    update_time: u64,
    last_check_time: u64,
    row_count: u64,
    data_length: u64,
    avg_row_length: u64,
}

impl CatalogObject {
    #[inline]
    pub fn new(id: TableID, spec: TableSpec) -> Self {
        let now = now_secs();
        CatalogObject {
            id,
            table_type: spec.table_type,
            handle: LockableHandle::new(),
            meta: UnsafeCell::new(TableMeta {
                name: spec.table_name,
                schema: TableSchema::new(spec.columns),
                comment: spec.comment,
                create_time: now,
                update_time: now,
                last_check_time: 0,
                row_count: 0,
                data_length: 0,
                avg_row_length: 0,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> TableID {
        self.id
    }

    #[inline]
    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    /// Returns whether the table is still registered in its catalog.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Acquire shared access, blocking while a writer holds or waits
    /// for the lock. A thread already holding shared access passes
    /// waiting writers, so nested read guards never deadlock. Taking a
    /// write lock while holding a read guard of the same table waits
    /// for itself.
    #[inline]
    pub fn read_lock(&self) -> TableReadGuard<'_> {
        self.handle.acquire_shared();
        TableReadGuard::new(self)
    }

    #[inline]
    pub fn try_read_lock(&self, timeout: Duration) -> Option<TableReadGuard<'_>> {
        if self.handle.try_acquire_shared(timeout) {
            return Some(TableReadGuard::new(self));
        }
        None
    }

    #[inline]
    pub fn write_lock(&self) -> TableWriteGuard<'_> {
        self.handle.acquire_exclusive();
        TableWriteGuard::new(self)
    }

    #[inline]
    pub fn try_write_lock(&self, timeout: Duration) -> Option<TableWriteGuard<'_>> {
        if self.handle.try_acquire_exclusive(timeout) {
            return Some(TableWriteGuard::new(self));
        }
        None
    }

    /// Acquire write lock unless the table has been dropped,
    /// before or while waiting.
    #[inline]
    pub fn write_lock_if_live(&self) -> Option<TableWriteGuard<'_>> {
        if self.handle.acquire_exclusive_if_live() {
            return Some(TableWriteGuard::new(self));
        }
        None
    }

    #[inline]
    pub fn try_write_lock_if_live(&self, timeout: Duration) -> Option<TableWriteGuard<'_>> {
        if self.handle.try_acquire_exclusive_if_live(timeout) {
            return Some(TableWriteGuard::new(self));
        }
        None
    }

    #[inline]
    pub fn is_write_lock_held_by_current_thread(&self) -> bool {
        self.handle.is_exclusive_held_by_caller()
    }

    /// Acquire write lock, or return the caller supplied error
    /// if the table has been dropped.
    #[inline]
    pub fn lock_exclusive_or<E>(&self, err: E) -> Result<TableWriteGuard<'_>, E> {
        match self.write_lock_if_live() {
            Some(g) => Ok(g),
            None => {
                trace!("table {} is dropped, reject write lock", self.id);
                Err(err)
            }
        }
    }

    /// Acquire write lock within `timeout`, or return the caller
    /// supplied error on timeout or if the table has been dropped.
    #[inline]
    pub fn lock_exclusive_or_timeout_error<E>(
        &self,
        timeout: Duration,
        err: E,
    ) -> Result<TableWriteGuard<'_>, E> {
        match self.try_write_lock_if_live(timeout) {
            Some(g) => Ok(g),
            None => {
                if self.is_live() {
                    warn!(
                        "failed to write lock table {} in {:?}",
                        self.id, timeout
                    );
                } else {
                    trace!("table {} is dropped, reject write lock", self.id);
                }
                Err(err)
            }
        }
    }

    #[inline]
    pub fn write_lock_or_ddl_error(&self) -> Result<TableWriteGuard<'_>, DdlError> {
        self.lock_exclusive_or(DdlError(format!("unknown table, tableId={}", self.id)))
    }

    #[inline]
    pub fn write_lock_or_meta_error(&self) -> Result<TableWriteGuard<'_>, MetaNotFound> {
        self.lock_exclusive_or(MetaNotFound(format!("unknown table, tableId={}", self.id)))
    }

    #[inline]
    pub fn write_lock_or_alter_cancel(&self) -> Result<TableWriteGuard<'_>, AlterCancelled> {
        self.lock_exclusive_or(AlterCancelled(format!(
            "table {} does not exist",
            self.id
        )))
    }

    #[inline]
    pub fn try_write_lock_or_meta_error(
        &self,
        timeout: Duration,
    ) -> Result<TableWriteGuard<'_>, MetaNotFound> {
        self.lock_exclusive_or_timeout_error(
            timeout,
            MetaNotFound(format!("table {} has been dropped", self.id)),
        )
    }
}

impl fmt::Debug for CatalogObject {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogObject")
            .field("id", &self.id)
            .field("table_type", &self.table_type)
            .field("handle", &self.handle.state())
            .finish()
    }
}

/// Shared access to table metadata, released on drop.
///
/// Guard is bound to the thread which acquires it.
#[must_use = "if unused the table lock will immediately unlock"]
pub struct TableReadGuard<'a> {
    obj: &'a CatalogObject,
    // shared holders are tracked by thread.
    marker: PhantomData<*const ()>,
}

impl<'a> TableReadGuard<'a> {
    #[inline]
    fn new(obj: &'a CatalogObject) -> Self {
        TableReadGuard {
            obj,
            marker: PhantomData,
        }
    }
}

impl Drop for TableReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.obj.handle.release_shared();
    }
}

/// Exclusive access to table metadata, released on drop.
///
/// Guard is bound to the thread which acquires it.
#[must_use = "if unused the table lock will immediately unlock"]
pub struct TableWriteGuard<'a> {
    obj: &'a CatalogObject,
    // exclusive ownership is tracked by thread.
    marker: PhantomData<*const ()>,
}

impl<'a> TableWriteGuard<'a> {
    #[inline]
    fn new(obj: &'a CatalogObject) -> Self {
        TableWriteGuard {
            obj,
            marker: PhantomData,
        }
    }

    #[inline]
    fn meta_mut(&mut self) -> &mut TableMeta {
        unsafe { &mut *self.obj.meta.get() }
    }

    #[inline]
    pub fn set_name(&mut self, name: &str) {
        self.meta_mut().name = SemiStr::new(name);
    }

    /// Replace full schema, base schema is recomputed along with it.
    #[inline]
    pub fn replace_schema(&mut self, columns: Vec<Column>) {
        self.meta_mut().schema = TableSchema::new(columns);
    }

    #[inline]
    pub fn set_comment(&mut self, comment: &str) {
        self.meta_mut().comment = SemiStr::new(comment);
    }

    /// Update row count and data length, average row length
    /// is derived from both.
    #[inline]
    pub fn update_statistics(&mut self, row_count: u64, data_length: u64) {
        let meta = self.meta_mut();
        meta.row_count = row_count;
        meta.data_length = data_length;
        meta.avg_row_length = data_length.checked_div(row_count).unwrap_or(0);
    }

    #[inline]
    pub fn touch_update_time(&mut self) {
        self.meta_mut().update_time = now_secs();
    }

    #[inline]
    pub fn touch_last_check_time(&mut self) {
        self.meta_mut().last_check_time = now_secs();
    }

    /// Mark the table as dropped. Any later live-conditioned
    /// acquisition fails. Returns whether it was live.
    #[inline]
    pub fn mark_dropped(&mut self) -> bool {
        self.obj.handle.mark_dropped()
    }
}

impl Drop for TableWriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.obj.handle.release_exclusive();
    }
}

macro_rules! impl_table_read {
    ($guard:ident) => {
        impl $guard<'_> {
            #[inline]
            fn meta(&self) -> &TableMeta {
                unsafe { &*self.obj.meta.get() }
            }

            #[inline]
            pub fn id(&self) -> TableID {
                self.obj.id
            }

            #[inline]
            pub fn table_type(&self) -> TableType {
                self.obj.table_type
            }

            #[inline]
            pub fn name(&self) -> SemiStr {
                self.meta().name.clone()
            }

            /// Returns all columns, including hidden and shadow ones.
            #[inline]
            pub fn full_schema(&self) -> Arc<[Column]> {
                Arc::clone(self.meta().schema.full())
            }

            /// Returns user-visible columns.
            #[inline]
            pub fn base_schema(&self) -> Arc<[Column]> {
                Arc::clone(self.meta().schema.base())
            }

            #[inline]
            pub fn get_base_schema(&self, include_hidden: bool) -> Arc<[Column]> {
                Arc::clone(self.meta().schema.columns(include_hidden))
            }

            /// Find column by name, case-insensitive.
            #[inline]
            pub fn get_column(&self, name: &str) -> Option<Column> {
                self.meta().schema.column(name).cloned()
            }

            #[inline]
            pub fn engine(&self) -> Option<&'static str> {
                self.obj.table_type.engine_label()
            }

            #[inline]
            pub fn mysql_type(&self) -> Option<&'static str> {
                self.obj.table_type.catalog_kind_label()
            }

            #[inline]
            pub fn comment(&self) -> SemiStr {
                self.meta().comment.clone()
            }

            /// Comment with double quotes escaped, to be embedded in
            /// generated statements.
            #[inline]
            pub fn comment_escaped(&self) -> String {
                self.meta().comment.as_str().replace('"', "\\\"")
            }

            #[inline]
            pub fn create_time(&self) -> u64 {
                self.meta().create_time
            }

            #[inline]
            pub fn update_time(&self) -> u64 {
                self.meta().update_time
            }

            #[inline]
            pub fn last_check_time(&self) -> u64 {
                self.meta().last_check_time
            }

            #[inline]
            pub fn row_count(&self) -> u64 {
                self.meta().row_count
            }

            #[inline]
            pub fn data_length(&self) -> u64 {
                self.meta().data_length
            }

            #[inline]
            pub fn avg_row_length(&self) -> u64 {
                self.meta().avg_row_length
            }
        }
    };
}

impl_table_read!(TableReadGuard);
impl_table_read!(TableWriteGuard);

#[inline]
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
