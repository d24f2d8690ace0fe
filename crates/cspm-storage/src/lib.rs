//! Relational inventory store for the cspm service.
//!
//! The single implementation ([`inventory::InventoryStore`]) keeps the three
//! ownership-tree tables (departments → monitor groups → cloud accounts) in
//! one SQLite database with WAL mode and enforced foreign keys, so deleting
//! a parent row cascades to every descendant.

pub mod inventory;


pub use inventory::InventoryStore;

use cspm_common::types::{CloudAccount, Department, MonitorGroup, Provider};
use serde::Serialize;

/// Per-provider account count from the dashboard aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCount {
    pub provider: Provider,
    pub count: u64,
}

/// One calendar-month bucket of the connection trend, labeled `YYYY-MM`.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: u64,
}

/// Department ranked by how many (filtered) cloud accounts it owns.
///
/// Produced by an inner join, so a department with zero matching accounts
/// never appears at all.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentRank {
    pub id: String,
    pub name: String,
    pub account_count: u64,
}

/// How many descendants a department delete would take with it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CascadeCounts {
    pub monitor_groups: u64,
    pub cloud_accounts: u64,
}

/// A department with only its visible groups attached; see
/// [`InventoryStore::search_tree`].
#[derive(Debug, Clone)]
pub struct DepartmentNode {
    pub department: Department,
    pub groups: Vec<GroupNode>,
}

/// A monitor group with only its visible accounts attached.
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub group: MonitorGroup,
    pub accounts: Vec<CloudAccount>,
}
