use crate::column::Column;
use crate::conf::CatalogConfig;
use crate::error::{DdlError, Error, MetaNotFound, Result};
use crate::object::{CatalogObject, TableWriteGuard};
use crate::spec::TableSpec;
use crate::{ObjID, TableID};
use indexmap::IndexMap;
use log::debug;
use parking_lot::RwLock;
use semistr::SemiStr;
use std::collections::HashMap;
use std::sync::Arc;

/// MemDatabase owns a set of tables in memory.
///
/// The database lock only protects the name and id mappings and is
/// never held while waiting for a table lock. Dropping a table marks
/// it dropped under its write lock before unregistering, so sessions
/// still holding the table reference fail on their next
/// live-conditioned lock.
#[derive(Debug)]
pub struct MemDatabase {
    config: CatalogConfig,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: IndexMap<SemiStr, Arc<CatalogObject>>,
    table_names: HashMap<TableID, SemiStr>,
    obj_id_gen: ObjID,
}

impl MemDatabase {
    #[inline]
    pub fn new(config: CatalogConfig) -> Self {
        MemDatabase {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    #[inline]
    pub fn create_table(&self, spec: TableSpec) -> Result<Arc<CatalogObject>> {
        let mut inner = self.inner.write();
        if inner.tables.contains_key(spec.table_name.as_str()) {
            return Err(Error::TableAlreadyExists(spec.table_name.as_str().to_string()));
        }
        inner.obj_id_gen += 1;
        let table_id = inner.obj_id_gen;
        let table_name = spec.table_name.clone();
        let table = Arc::new(CatalogObject::new(table_id, spec));
        inner.tables.insert(table_name.clone(), Arc::clone(&table));
        inner.table_names.insert(table_id, table_name);
        debug!("create table {:?}", table);
        Ok(table)
    }

    #[inline]
    pub fn get_table(&self, table_id: TableID) -> Option<Arc<CatalogObject>> {
        let inner = self.inner.read();
        inner
            .table_names
            .get(&table_id)
            .and_then(|name| inner.tables.get(name))
            .cloned()
    }

    #[inline]
    pub fn get_table_by_name(&self, table_name: &str) -> Option<Arc<CatalogObject>> {
        let inner = self.inner.read();
        inner.tables.get(table_name).cloned()
    }

    /// Returns all tables in creation order.
    #[inline]
    pub fn all_tables(&self) -> Vec<Arc<CatalogObject>> {
        let inner = self.inner.read();
        inner.tables.values().cloned().collect()
    }

    #[inline]
    pub fn drop_table(&self, table_name: &str) -> Result<()> {
        let table = self.must_get_table(table_name)?;
        let timeout = self.config.try_lock_timeout();
        let mut g = table
            .lock_exclusive_or_timeout_error(
                timeout,
                DdlError(format!(
                    "failed to lock table {} for drop in {:?}",
                    table_name, timeout
                )),
            )
            .map_err(|e| lock_failure(&table, table_name, e))?;
        check_name(&g, table_name)?;
        let name = g.name();
        let was_live = g.mark_dropped();
        debug_assert!(was_live);
        let mut inner = self.inner.write();
        inner.tables.shift_remove(name.as_str());
        inner.table_names.remove(&table.id());
        debug!("drop table {}, id={}", name.as_str(), table.id());
        Ok(())
    }

    #[inline]
    pub fn rename_table(&self, table_name: &str, new_name: &str) -> Result<()> {
        if self.get_table_by_name(new_name).is_some() {
            return Err(Error::TableAlreadyExists(new_name.to_string()));
        }
        let table = self.must_get_table(table_name)?;
        let timeout = self.config.try_lock_timeout();
        let mut g = table
            .lock_exclusive_or_timeout_error(
                timeout,
                DdlError(format!(
                    "failed to lock table {} for rename in {:?}",
                    table_name, timeout
                )),
            )
            .map_err(|e| lock_failure(&table, table_name, e))?;
        check_name(&g, table_name)?;
        let mut inner = self.inner.write();
        if inner.tables.contains_key(new_name) {
            return Err(Error::TableAlreadyExists(new_name.to_string()));
        }
        let new_name = SemiStr::new(new_name);
        inner.tables.shift_remove(table_name);
        inner.tables.insert(new_name.clone(), Arc::clone(&table));
        inner.table_names.insert(table.id(), new_name.clone());
        g.set_name(new_name.as_str());
        g.touch_update_time();
        debug!(
            "rename table {} to {}, id={}",
            table_name,
            new_name.as_str(),
            table.id()
        );
        Ok(())
    }

    /// Replace table schema as the final step of a schema change job.
    /// The job is cancelled if the table has been dropped meanwhile.
    #[inline]
    pub fn alter_table_schema(&self, table_name: &str, columns: Vec<Column>) -> Result<()> {
        let table = self.must_get_table(table_name)?;
        let mut g = table.write_lock_or_alter_cancel()?;
        check_name(&g, table_name)?;
        g.replace_schema(columns);
        g.touch_update_time();
        Ok(())
    }

    #[inline]
    pub fn set_table_comment(&self, table_name: &str, comment: &str) -> Result<()> {
        let table = self.must_get_table(table_name)?;
        let mut g = table.write_lock_or_ddl_error()?;
        check_name(&g, table_name)?;
        g.set_comment(comment);
        g.touch_update_time();
        Ok(())
    }

    /// Report statistics collected for the table.
    #[inline]
    pub fn update_table_statistics(
        &self,
        table_name: &str,
        row_count: u64,
        data_length: u64,
    ) -> Result<()> {
        let table = self.must_get_table(table_name)?;
        let mut g = table.try_write_lock_or_meta_error(self.config.try_lock_timeout())?;
        check_name(&g, table_name)?;
        g.update_statistics(row_count, data_length);
        Ok(())
    }

    /// Record a consistency check of the table.
    #[inline]
    pub fn check_table(&self, table_name: &str) -> Result<()> {
        let table = self.must_get_table(table_name)?;
        let mut g = table.write_lock_or_meta_error()?;
        check_name(&g, table_name)?;
        g.touch_last_check_time();
        Ok(())
    }

    /// Resolve columns of the table. Hidden and shadow columns are
    /// included only if configured.
    #[inline]
    pub fn describe_table(&self, table_name: &str) -> Result<Arc<[Column]>> {
        let unknown = || MetaNotFound(format!("unknown table, tableName={}", table_name));
        let table = self.get_table_by_name(table_name).ok_or_else(unknown)?;
        let timeout = self.config.try_lock_timeout();
        let g = table.try_read_lock(timeout).ok_or_else(|| {
            MetaNotFound(format!(
                "failed to read lock table {} in {:?}",
                table_name, timeout
            ))
        })?;
        // liveness can not change while shared lock is held.
        if !table.is_live() {
            return Err(unknown().into());
        }
        Ok(g.get_base_schema(self.config.show_hidden_columns))
    }

    #[inline]
    fn must_get_table(&self, table_name: &str) -> Result<Arc<CatalogObject>> {
        self.get_table_by_name(table_name)
            .ok_or_else(|| Error::TableNotExists(table_name.to_string()))
    }
}

/// The table may be renamed by others while we wait for its lock,
/// then the name we looked up no longer refers to it.
#[inline]
fn check_name(g: &TableWriteGuard<'_>, table_name: &str) -> Result<()> {
    if g.name().as_str() != table_name {
        return Err(Error::TableNotExists(table_name.to_string()));
    }
    Ok(())
}

/// A table dropped while we were waiting is reported as not existing.
#[inline]
fn lock_failure<E: Into<Error>>(table: &CatalogObject, table_name: &str, err: E) -> Error {
    if table.is_live() {
        err.into()
    } else {
        Error::TableNotExists(table_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnAttributes, ColumnType};
    use crate::table_type::TableType;
    use easy_parallel::Parallel;
    use std::thread;
    use std::time::Duration;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn spec(name: &str) -> TableSpec {
        TableSpec::new(
            name,
            TableType::Olap,
            vec![
                Column::new("id", ColumnType::BigInt).attr(ColumnAttributes::KEY),
                Column::new("val", ColumnType::String).attr(ColumnAttributes::NULLABLE),
                Column::delete_sign(),
            ],
        )
    }

    #[test]
    fn test_mem_database_tables() {
        init_log();
        let db = CatalogConfig::default().build();
        let t1 = db.create_table(spec("t1")).unwrap();
        let t2 = db.create_table(spec("t2")).unwrap();
        assert_ne!(t1.id(), t2.id());
        assert_eq!(
            db.create_table(spec("t1")).unwrap_err(),
            Error::TableAlreadyExists("t1".to_string())
        );
        assert!(Arc::ptr_eq(&db.get_table(t1.id()).unwrap(), &t1));
        assert!(Arc::ptr_eq(&db.get_table_by_name("t2").unwrap(), &t2));
        assert!(db.get_table_by_name("T1").is_none());
        let names: Vec<_> = db
            .all_tables()
            .iter()
            .map(|t| t.read_lock().name())
            .collect();
        assert_eq!(names, vec![SemiStr::new("t1"), SemiStr::new("t2")]);
    }

    #[test]
    fn test_mem_database_drop_table() {
        init_log();
        let db = CatalogConfig::default().build();
        let t1 = db.create_table(spec("t1")).unwrap();
        db.drop_table("t1").unwrap();
        assert!(db.get_table(t1.id()).is_none());
        assert!(db.get_table_by_name("t1").is_none());
        assert!(db.all_tables().is_empty());
        assert_eq!(
            db.drop_table("t1").unwrap_err(),
            Error::TableNotExists("t1".to_string())
        );

        // session still holding the reference can not modify it.
        assert!(!t1.is_live());
        assert!(t1.write_lock_or_ddl_error().is_err());
        assert!(t1.write_lock_or_alter_cancel().is_err());

        // the name can be reused by a new table.
        let t1_new = db.create_table(spec("t1")).unwrap();
        assert_ne!(t1.id(), t1_new.id());
        assert!(t1_new.is_live());
    }

    #[test]
    fn test_drop_table_waits_for_readers() {
        init_log();
        let db = Arc::new(CatalogConfig::default().try_lock_timeout_ms(50).build());
        let t1 = db.create_table(spec("t1")).unwrap();

        let g = t1.read_lock();
        let db2 = Arc::clone(&db);
        let res = thread::spawn(move || db2.drop_table("t1")).join().unwrap();
        assert!(matches!(res, Err(Error::Ddl(_))));
        assert!(t1.is_live());
        drop(g);

        db.drop_table("t1").unwrap();
        assert!(!t1.is_live());
    }

    #[test]
    fn test_concurrent_drop_table() {
        init_log();
        let db = CatalogConfig::default().build();
        db.create_table(spec("t1")).unwrap();
        let res = Parallel::new()
            .each(0..4, |_| db.drop_table("t1"))
            .run();
        assert_eq!(res.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            res.iter()
                .filter(|r| r.is_err())
                .all(|r| *r == Err(Error::TableNotExists("t1".to_string())))
        );
    }

    #[test]
    fn test_drop_table_after_concurrent_rename() {
        init_log();
        let db = CatalogConfig::default().build();
        let t1 = db.create_table(spec("t1")).unwrap();
        let g = t1.write_lock();
        thread::scope(|s| {
            let dropper = s.spawn(|| db.drop_table("t1"));
            thread::sleep(Duration::from_millis(50));
            // rename reenters the write lock held by this thread.
            db.rename_table("t1", "t3").unwrap();
            drop(g);
            assert_eq!(
                dropper.join().unwrap().unwrap_err(),
                Error::TableNotExists("t1".to_string())
            );
        });
        assert!(t1.is_live());
        assert!(db.get_table_by_name("t1").is_none());
        assert!(Arc::ptr_eq(&db.get_table_by_name("t3").unwrap(), &t1));
        assert!(Arc::ptr_eq(&db.get_table(t1.id()).unwrap(), &t1));
    }

    #[test]
    fn test_alter_after_concurrent_rename() {
        init_log();
        let db = CatalogConfig::default().build();
        let t1 = db.create_table(spec("t1")).unwrap();
        let g = t1.write_lock();
        thread::scope(|s| {
            let commenter = s.spawn(|| db.set_table_comment("t1", "stale"));
            let checker = s.spawn(|| db.check_table("t1"));
            thread::sleep(Duration::from_millis(50));
            db.rename_table("t1", "t3").unwrap();
            drop(g);
            let not_exists = Error::TableNotExists("t1".to_string());
            assert_eq!(commenter.join().unwrap().unwrap_err(), not_exists);
            assert_eq!(checker.join().unwrap().unwrap_err(), not_exists);
        });
        let g = t1.read_lock();
        assert_eq!(g.name().as_str(), "t3");
        assert_eq!(g.comment().as_str(), "");
        assert_eq!(g.last_check_time(), 0);
    }

    #[test]
    fn test_mem_database_rename_table() {
        init_log();
        let db = CatalogConfig::default().build();
        let t1 = db.create_table(spec("t1")).unwrap();
        db.create_table(spec("t2")).unwrap();
        let create_time = t1.read_lock().create_time();

        assert_eq!(
            db.rename_table("t1", "t2").unwrap_err(),
            Error::TableAlreadyExists("t2".to_string())
        );
        assert_eq!(
            db.rename_table("t3", "t4").unwrap_err(),
            Error::TableNotExists("t3".to_string())
        );
        db.rename_table("t1", "t3").unwrap();
        assert!(db.get_table_by_name("t1").is_none());
        assert!(Arc::ptr_eq(&db.get_table_by_name("t3").unwrap(), &t1));
        assert!(Arc::ptr_eq(&db.get_table(t1.id()).unwrap(), &t1));
        let g = t1.read_lock();
        assert_eq!(g.name().as_str(), "t3");
        assert!(g.update_time() >= create_time);
        drop(g);

        db.drop_table("t3").unwrap();
        assert!(db.get_table(t1.id()).is_none());
    }

    #[test]
    fn test_describe_table() {
        init_log();
        let db = CatalogConfig::default().build();
        db.create_table(spec("t1")).unwrap();
        let cols = db.describe_table("t1").unwrap();
        assert_eq!(cols.len(), 2);
        assert!(cols.iter().all(|c| c.is_visible()));

        let db = CatalogConfig::default().show_hidden_columns(true).build();
        db.create_table(spec("t1")).unwrap();
        assert_eq!(db.describe_table("t1").unwrap().len(), 3);
        assert!(matches!(
            db.describe_table("t2"),
            Err(Error::MetaNotFound(_))
        ));
    }

    #[test]
    fn test_schema_change_and_statistics() {
        init_log();
        let db = CatalogConfig::default().build();
        let t1 = db.create_table(spec("t1")).unwrap();

        let mut full = t1.read_lock().full_schema().to_vec();
        full.push(Column::new("val2", ColumnType::Double).attr(ColumnAttributes::NULLABLE));
        db.alter_table_schema("t1", full).unwrap();
        assert_eq!(db.describe_table("t1").unwrap().len(), 3);

        db.set_table_comment("t1", "say \"hi\"").unwrap();
        db.update_table_statistics("t1", 4, 400).unwrap();
        db.check_table("t1").unwrap();
        let g = t1.read_lock();
        assert_eq!(g.comment_escaped(), "say \\\"hi\\\"");
        assert_eq!(g.avg_row_length(), 100);
        assert!(g.last_check_time() > 0);
        drop(g);

        db.drop_table("t1").unwrap();
        assert_eq!(
            db.alter_table_schema("t1", vec![]).unwrap_err(),
            Error::TableNotExists("t1".to_string())
        );
    }

    #[test]
    fn test_statistics_timeout() {
        init_log();
        let db = Arc::new(CatalogConfig::default().try_lock_timeout_ms(20).build());
        let t1 = db.create_table(spec("t1")).unwrap();
        let _g = t1.write_lock();
        let db2 = Arc::clone(&db);
        let res = thread::spawn(move || db2.update_table_statistics("t1", 1, 1))
            .join()
            .unwrap();
        assert!(matches!(res, Err(Error::MetaNotFound(_))));
        assert_eq!(db.config().try_lock_timeout(), Duration::from_millis(20));
    }
}
