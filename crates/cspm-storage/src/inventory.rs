use crate::{CascadeCounts, DepartmentNode, DepartmentRank, GroupNode, MonthlyCount, ProviderCount};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use cspm_common::types::{
    CloudAccount, CloudAccountUpdate, Department, DepartmentUpdate, MonitorGroup,
    MonitorGroupUpdate, NewCloudAccount, UNSET_CONTACT,
};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DEPARTMENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS departments (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    memo TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const MONITOR_GROUPS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS monitor_groups (
    id TEXT PRIMARY KEY,
    department_id TEXT NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    group_id TEXT,
    responsible_contact TEXT NOT NULL,
    cc_contact TEXT NOT NULL DEFAULT '',
    alert_email TEXT NOT NULL,
    report_email TEXT NOT NULL,
    memo TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(department_id, name)
);
CREATE INDEX IF NOT EXISTS idx_monitor_groups_department ON monitor_groups(department_id);
";

const CLOUD_ACCOUNTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cloud_accounts (
    id TEXT PRIMARY KEY,
    monitor_group_id TEXT NOT NULL REFERENCES monitor_groups(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    provider TEXT NOT NULL,
    account_id TEXT NOT NULL UNIQUE,
    request_date TEXT,
    connection_date TEXT,
    status TEXT NOT NULL DEFAULT 'Waiting',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cloud_accounts_group ON cloud_accounts(monitor_group_id);
CREATE INDEX IF NOT EXISTS idx_cloud_accounts_request_date ON cloud_accounts(request_date);
CREATE INDEX IF NOT EXISTS idx_cloud_accounts_status ON cloud_accounts(status);
";

const ACCOUNT_COLUMNS: &str =
    "id, monitor_group_id, name, provider, account_id, request_date, connection_date, status, created_at, updated_at";

const GROUP_COLUMNS: &str =
    "id, department_id, name, group_id, responsible_contact, cc_contact, alert_email, report_email, memo, created_at, updated_at";

/// Single-database store for the department → monitor group → cloud account
/// ownership tree.
///
/// Foreign keys are enforced on the connection, so parent deletes cascade
/// transitively and no orphan rows can exist. `departments.name` and
/// `(monitor_groups.department_id, name)` are unique, which makes the
/// get-or-create path in [`InventoryStore::create_account`] race-safe: two
/// concurrent creators converge on the same row.
pub struct InventoryStore {
    conn: Mutex<Connection>,
    _db_path: PathBuf,
}

impl InventoryStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("inventory.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(DEPARTMENTS_SCHEMA)?;
        conn.execute_batch(MONITOR_GROUPS_SCHEMA)?;
        conn.execute_batch(CLOUD_ACCOUNTS_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized inventory store");
        Ok(Self {
            conn: Mutex::new(conn),
            _db_path: db_path,
        })
    }

    // ---- Departments ----

    pub fn count_departments(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM departments", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn list_departments(&self) -> Result<Vec<Department>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, memo, created_at, updated_at FROM departments ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_department(row)))?;
        let mut departments = Vec::new();
        for row in rows {
            departments.push(row??);
        }
        Ok(departments)
    }

    pub fn get_department_by_id(&self, id: &str) -> Result<Option<Department>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, memo, created_at, updated_at FROM departments WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| {
            Ok(Self::row_to_department(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(d))) => Ok(Some(d)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    pub fn update_department(&self, id: &str, update: &DepartmentUpdate) -> Result<Option<Department>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE departments SET name = ?1, memo = ?2, updated_at = ?3 WHERE id = ?4",
            rusqlite::params![update.name, update.memo, now, id],
        )?;
        drop(conn);
        if updated == 0 {
            return Ok(None);
        }
        self.get_department_by_id(id)
    }

    pub fn delete_department(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM departments WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(deleted > 0)
    }

    /// Group/account totals a department delete would cascade over.
    /// `None` when the department itself does not exist.
    pub fn department_cascade_counts(&self, id: &str) -> Result<Option<CascadeCounts>> {
        if self.get_department_by_id(id)?.is_none() {
            return Ok(None);
        }
        let conn = self.conn.lock().unwrap();
        let groups: i64 = conn.query_row(
            "SELECT COUNT(*) FROM monitor_groups WHERE department_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )?;
        let accounts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cloud_accounts WHERE monitor_group_id IN \
             (SELECT id FROM monitor_groups WHERE department_id = ?1)",
            rusqlite::params![id],
            |row| row.get(0),
        )?;
        Ok(Some(CascadeCounts {
            monitor_groups: groups as u64,
            cloud_accounts: accounts as u64,
        }))
    }

    // ---- Monitor groups ----

    pub fn count_groups(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM monitor_groups", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn get_group_by_id(&self, id: &str) -> Result<Option<MonitorGroup>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM monitor_groups WHERE id = ?1"
        ))?;
        let mut rows =
            stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_group(row)))?;
        match rows.next() {
            Some(Ok(Ok(g))) => Ok(Some(g)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Update the mutable group fields. `department_id` is not part of
    /// [`MonitorGroupUpdate`]; ownership never changes after creation.
    pub fn update_group(&self, id: &str, update: &MonitorGroupUpdate) -> Result<Option<MonitorGroup>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE monitor_groups SET name = ?1, group_id = ?2, responsible_contact = ?3, \
             cc_contact = ?4, alert_email = ?5, report_email = ?6, memo = ?7, updated_at = ?8 \
             WHERE id = ?9",
            rusqlite::params![
                update.name,
                update.group_id,
                update.responsible_contact,
                update.cc_contact,
                update.alert_email,
                update.report_email,
                update.memo,
                now,
                id
            ],
        )?;
        drop(conn);
        if updated == 0 {
            return Ok(None);
        }
        self.get_group_by_id(id)
    }

    pub fn delete_group(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM monitor_groups WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(deleted > 0)
    }

    /// Account total a group delete would cascade over. `None` when the
    /// group does not exist.
    pub fn group_cascade_counts(&self, id: &str) -> Result<Option<u64>> {
        if self.get_group_by_id(id)?.is_none() {
            return Ok(None);
        }
        let conn = self.conn.lock().unwrap();
        let accounts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cloud_accounts WHERE monitor_group_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )?;
        Ok(Some(accounts as u64))
    }

    // ---- Cloud accounts ----

    /// Register a cloud account, resolving its department and monitor group
    /// by name in the same transaction.
    ///
    /// Both resolutions are get-or-create keyed on the unique name columns:
    /// a conflict-ignoring insert followed by the keyed select. An existing
    /// group is reused as-is — the supplied external `monitor_group_id` and
    /// the placeholder contacts only apply when the group is newly created.
    pub fn create_account(&self, req: &NewCloudAccount) -> Result<CloudAccount> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().timestamp();

        tx.execute(
            "INSERT INTO departments (id, name, memo, created_at, updated_at) \
             VALUES (?1, ?2, '', ?3, ?3) ON CONFLICT(name) DO NOTHING",
            rusqlite::params![cspm_common::id::next_id(), req.department_name, now],
        )?;
        let department_id: String = tx.query_row(
            "SELECT id FROM departments WHERE name = ?1",
            rusqlite::params![req.department_name],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO monitor_groups (id, department_id, name, group_id, responsible_contact, \
             cc_contact, alert_email, report_email, memo, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, '', ?5, ?5, '', ?6, ?6) \
             ON CONFLICT(department_id, name) DO NOTHING",
            rusqlite::params![
                cspm_common::id::next_id(),
                department_id,
                req.monitor_group_name,
                req.monitor_group_id,
                UNSET_CONTACT,
                now
            ],
        )?;
        let group_pk: String = tx.query_row(
            "SELECT id FROM monitor_groups WHERE department_id = ?1 AND name = ?2",
            rusqlite::params![department_id, req.monitor_group_name],
            |row| row.get(0),
        )?;

        let account_pk = cspm_common::id::next_id();
        tx.execute(
            &format!("INSERT INTO cloud_accounts ({ACCOUNT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"),
            rusqlite::params![
                account_pk,
                group_pk,
                req.name,
                req.provider.as_str(),
                req.account_id,
                req.request_date.map(|d| d.to_string()),
                req.connection_date.map(|d| d.to_string()),
                req.status.as_str(),
                now
            ],
        )?;
        tx.commit()?;
        drop(conn);

        self.get_account_by_id(&account_pk)?
            .ok_or_else(|| anyhow::anyhow!("Failed to read back created account"))
    }

    pub fn count_accounts(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM cloud_accounts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn get_account_by_id(&self, id: &str) -> Result<Option<CloudAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM cloud_accounts WHERE id = ?1"
        ))?;
        let mut rows =
            stmt.query_map(rusqlite::params![id], |row| Ok(Self::row_to_account(row)))?;
        match rows.next() {
            Some(Ok(Ok(a))) => Ok(Some(a)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    pub fn get_account_by_account_id(&self, account_id: &str) -> Result<Option<CloudAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM cloud_accounts WHERE account_id = ?1"
        ))?;
        let mut rows = stmt.query_map(rusqlite::params![account_id], |row| {
            Ok(Self::row_to_account(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(a))) => Ok(Some(a)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Update the mutable account fields. `monitor_group_id` is not part of
    /// [`CloudAccountUpdate`]; ownership never changes after creation.
    pub fn update_account(&self, id: &str, update: &CloudAccountUpdate) -> Result<Option<CloudAccount>> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE cloud_accounts SET name = ?1, provider = ?2, account_id = ?3, \
             request_date = ?4, connection_date = ?5, status = ?6, updated_at = ?7 WHERE id = ?8",
            rusqlite::params![
                update.name,
                update.provider.as_str(),
                update.account_id,
                update.request_date.map(|d| d.to_string()),
                update.connection_date.map(|d| d.to_string()),
                update.status.as_str(),
                now,
                id
            ],
        )?;
        drop(conn);
        if updated == 0 {
            return Ok(None);
        }
        self.get_account_by_id(id)
    }

    pub fn delete_account(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM cloud_accounts WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(deleted > 0)
    }

    // ---- Dashboard aggregation ----
    //
    // `range` filters on request_date (inclusive), except the connection
    // trend which filters on connection_date. Rows with a NULL date fall out
    // of any BETWEEN comparison, which is exactly the intended semantics.

    pub fn count_accounts_in_range(&self, range: Option<(NaiveDate, NaiveDate)>) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = match range {
            Some((start, end)) => conn.query_row(
                "SELECT COUNT(*) FROM cloud_accounts WHERE request_date BETWEEN ?1 AND ?2",
                rusqlite::params![start.to_string(), end.to_string()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM cloud_accounts", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    pub fn count_connected_in_range(&self, range: Option<(NaiveDate, NaiveDate)>) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = match range {
            Some((start, end)) => conn.query_row(
                "SELECT COUNT(*) FROM cloud_accounts WHERE status = 'Connected' \
                 AND request_date BETWEEN ?1 AND ?2",
                rusqlite::params![start.to_string(), end.to_string()],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM cloud_accounts WHERE status = 'Connected'",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    pub fn provider_counts(&self, range: Option<(NaiveDate, NaiveDate)>) -> Result<Vec<ProviderCount>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from("SELECT provider, COUNT(*) FROM cloud_accounts");
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some((start, end)) = range {
            sql.push_str(" WHERE request_date BETWEEN ?1 AND ?2");
            params.push(Box::new(start.to_string()));
            params.push(Box::new(end.to_string()));
        }
        sql.push_str(" GROUP BY provider ORDER BY provider");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (provider, count) = row?;
            counts.push(ProviderCount {
                provider: provider
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!(e))?,
                count: count as u64,
            });
        }
        Ok(counts)
    }

    /// Accounts with a connection date, bucketed per calendar month and
    /// ordered ascending. Dates are ISO text, so the month bucket is the
    /// `YYYY-MM` prefix.
    pub fn monthly_connection_trend(&self, range: Option<(NaiveDate, NaiveDate)>) -> Result<Vec<MonthlyCount>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT substr(connection_date, 1, 7) AS month, COUNT(*) FROM cloud_accounts \
             WHERE connection_date IS NOT NULL",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some((start, end)) = range {
            sql.push_str(" AND connection_date BETWEEN ?1 AND ?2");
            params.push(Box::new(start.to_string()));
            params.push(Box::new(end.to_string()));
        }
        sql.push_str(" GROUP BY month ORDER BY month");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut buckets = Vec::new();
        for row in rows {
            let (month, count) = row?;
            buckets.push(MonthlyCount {
                month,
                count: count as u64,
            });
        }
        Ok(buckets)
    }

    /// Filtered accounts still needing attention (status ≠ Connected), in
    /// insertion order.
    pub fn attention_accounts(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
        limit: usize,
    ) -> Result<Vec<CloudAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM cloud_accounts WHERE status <> 'Connected'"
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut idx = 1;
        if let Some((start, end)) = range {
            sql.push_str(&format!(" AND request_date BETWEEN ?{idx} AND ?{}", idx + 1));
            params.push(Box::new(start.to_string()));
            params.push(Box::new(end.to_string()));
            idx += 2;
        }
        sql.push_str(&format!(" ORDER BY rowid LIMIT ?{idx}"));
        params.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| Ok(Self::row_to_account(row)))?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row??);
        }
        Ok(accounts)
    }

    /// Departments ranked by how many filtered accounts they own, descending.
    ///
    /// Inner joins all the way down: a department with no matching account
    /// is absent from the result, not listed with zero.
    pub fn department_ranking(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
        limit: usize,
    ) -> Result<Vec<DepartmentRank>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT d.id, d.name, COUNT(a.id) AS acc_count FROM departments d \
             JOIN monitor_groups g ON g.department_id = d.id \
             JOIN cloud_accounts a ON a.monitor_group_id = g.id",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut idx = 1;
        if let Some((start, end)) = range {
            sql.push_str(&format!(" WHERE a.request_date BETWEEN ?{idx} AND ?{}", idx + 1));
            params.push(Box::new(start.to_string()));
            params.push(Box::new(end.to_string()));
            idx += 2;
        }
        sql.push_str(&format!(
            " GROUP BY d.id, d.name ORDER BY acc_count DESC LIMIT ?{idx}"
        ));
        params.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut ranking = Vec::new();
        for row in rows {
            let (id, name, count) = row?;
            ranking.push(DepartmentRank {
                id,
                name,
                account_count: count as u64,
            });
        }
        Ok(ranking)
    }

    // ---- Search & nested listing ----

    /// The department tree for the listing page.
    ///
    /// Without a query word: every department with all of its groups and all
    /// of their accounts. With one: case-insensitive substring search where
    /// an account is visible when one of its own fields (name, account_id,
    /// provider) matches or its group's name matches; a group is visible
    /// when its name matches or it contains a directly matching account; a
    /// department is visible when it owns a visible group. Children are
    /// filtered at every level and each entity appears at most once.
    pub fn search_tree(&self, q: Option<&str>) -> Result<Vec<DepartmentNode>> {
        let word = q.map(str::trim).filter(|s| !s.is_empty());

        let (groups, accounts) = match word {
            None => (self.all_groups()?, self.all_accounts()?),
            Some(word) => {
                let pattern = format!("%{word}%");
                (
                    self.visible_groups(&pattern)?,
                    self.visible_accounts(&pattern)?,
                )
            }
        };

        let mut accounts_by_group: HashMap<String, Vec<CloudAccount>> = HashMap::new();
        for account in accounts {
            accounts_by_group
                .entry(account.monitor_group_id.clone())
                .or_default()
                .push(account);
        }

        let mut groups_by_department: HashMap<String, Vec<GroupNode>> = HashMap::new();
        for group in groups {
            let accounts = accounts_by_group.remove(&group.id).unwrap_or_default();
            groups_by_department
                .entry(group.department_id.clone())
                .or_default()
                .push(GroupNode { group, accounts });
        }

        let departments = self.list_departments()?;
        let tree = match word {
            // Full tree: every department, even the empty ones.
            None => departments
                .into_iter()
                .map(|department| DepartmentNode {
                    groups: groups_by_department
                        .remove(&department.id)
                        .unwrap_or_default(),
                    department,
                })
                .collect(),
            // Search: only departments that own a visible group.
            Some(_) => departments
                .into_iter()
                .filter_map(|department| {
                    groups_by_department
                        .remove(&department.id)
                        .map(|groups| DepartmentNode { department, groups })
                })
                .collect(),
        };
        Ok(tree)
    }

    fn all_groups(&self) -> Result<Vec<MonitorGroup>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM monitor_groups ORDER BY rowid"
        ))?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_group(row)))?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row??);
        }
        Ok(groups)
    }

    fn all_accounts(&self) -> Result<Vec<CloudAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM cloud_accounts ORDER BY rowid"
        ))?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_account(row)))?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row??);
        }
        Ok(accounts)
    }

    /// Direct matches plus every account of a name-matched group.
    fn visible_accounts(&self, pattern: &str) -> Result<Vec<CloudAccount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.id, a.monitor_group_id, a.name, a.provider, a.account_id, \
             a.request_date, a.connection_date, a.status, a.created_at, a.updated_at \
             FROM cloud_accounts a \
             JOIN monitor_groups g ON g.id = a.monitor_group_id \
             WHERE a.name LIKE ?1 OR a.account_id LIKE ?1 OR a.provider LIKE ?1 \
                OR g.name LIKE ?1 \
             ORDER BY a.rowid",
        )?;
        let rows = stmt.query_map(rusqlite::params![pattern], |row| {
            Ok(Self::row_to_account(row))
        })?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row??);
        }
        Ok(accounts)
    }

    /// Name matches plus every group holding a directly matching account.
    fn visible_groups(&self, pattern: &str) -> Result<Vec<MonitorGroup>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM monitor_groups \
             WHERE name LIKE ?1 OR EXISTS (\
                 SELECT 1 FROM cloud_accounts a WHERE a.monitor_group_id = monitor_groups.id \
                 AND (a.name LIKE ?1 OR a.account_id LIKE ?1 OR a.provider LIKE ?1)) \
             ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(rusqlite::params![pattern], |row| {
            Ok(Self::row_to_group(row))
        })?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row??);
        }
        Ok(groups)
    }

    // ---- Row mapping ----

    fn row_to_department(row: &rusqlite::Row) -> Result<Department> {
        let created: i64 = row.get(3)?;
        let updated: i64 = row.get(4)?;
        Ok(Department {
            id: row.get(0)?,
            name: row.get(1)?,
            memo: row.get(2)?,
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }

    fn row_to_group(row: &rusqlite::Row) -> Result<MonitorGroup> {
        let created: i64 = row.get(9)?;
        let updated: i64 = row.get(10)?;
        Ok(MonitorGroup {
            id: row.get(0)?,
            department_id: row.get(1)?,
            name: row.get(2)?,
            group_id: row.get(3)?,
            responsible_contact: row.get(4)?,
            cc_contact: row.get(5)?,
            alert_email: row.get(6)?,
            report_email: row.get(7)?,
            memo: row.get(8)?,
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }

    fn row_to_account(row: &rusqlite::Row) -> Result<CloudAccount> {
        let provider: String = row.get(3)?;
        let request_date: Option<String> = row.get(5)?;
        let connection_date: Option<String> = row.get(6)?;
        let status: String = row.get(7)?;
        let created: i64 = row.get(8)?;
        let updated: i64 = row.get(9)?;
        Ok(CloudAccount {
            id: row.get(0)?,
            monitor_group_id: row.get(1)?,
            name: row.get(2)?,
            provider: provider.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            account_id: row.get(4)?,
            request_date: request_date.as_deref().map(parse_iso_date).transpose()?,
            connection_date: connection_date.as_deref().map(parse_iso_date).transpose()?,
            status: status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }
}

fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("Invalid date '{s}' in store: {e}"))
}
