use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored in contact fields of monitor groups that were created
/// implicitly during account registration ("未設定" = unset).
pub const UNSET_CONTACT: &str = "未設定";

/// Cloud provider of a tracked account.
///
/// Serialized with the exact strings the store persists.
///
/// # Examples
///
/// ```
/// use cspm_common::types::Provider;
///
/// let p: Provider = "GCP".parse().unwrap();
/// assert_eq!(p, Provider::Gcp);
/// assert_eq!(p.to_string(), "GCP");
/// assert!("openstack".parse::<Provider>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "AWS")]
    Aws,
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
    #[serde(rename = "OCI")]
    Oci,
    Other,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Azure => "Azure",
            Provider::Gcp => "GCP",
            Provider::Oci => "OCI",
            Provider::Other => "Other",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "azure" => Ok(Provider::Azure),
            "gcp" => Ok(Provider::Gcp),
            "oci" => Ok(Provider::Oci),
            "other" => Ok(Provider::Other),
            _ => Err(format!("unknown provider: {s}")),
        }
    }
}

/// Connection lifecycle state of a cloud account.
///
/// # Examples
///
/// ```
/// use cspm_common::types::ConnectionStatus;
///
/// let s: ConnectionStatus = "Connected".parse().unwrap();
/// assert_eq!(s, ConnectionStatus::Connected);
/// assert_eq!(ConnectionStatus::default(), ConnectionStatus::Waiting);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// 未接続 — requested but not yet wired up.
    #[default]
    Waiting,
    /// 接続済み — monitoring connection established.
    Connected,
    /// 解除済み — connection has been torn down.
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Waiting => "Waiting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(ConnectionStatus::Waiting),
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            _ => Err(format!("unknown connection status: {s}")),
        }
    }
}

/// 申請部署 — root of the ownership tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub memo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 監視グループ — a named collection of cloud accounts under one department.
///
/// Contact fields hold comma-separated address lists as free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorGroup {
    pub id: String,
    pub department_id: String,
    pub name: String,
    /// External group identifier, assigned by the monitoring platform.
    pub group_id: Option<String>,
    pub responsible_contact: String,
    pub cc_contact: String,
    pub alert_email: String,
    pub report_email: String,
    pub memo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single tracked cloud-provider account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudAccount {
    pub id: String,
    pub monitor_group_id: String,
    pub name: String,
    pub provider: Provider,
    /// Provider-side account identifier, unique across the whole inventory.
    pub account_id: String,
    /// 依頼日 — date the connection was requested.
    pub request_date: Option<NaiveDate>,
    /// 接続日 — date the connection went live.
    pub connection_date: Option<NaiveDate>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for registering a cloud account.
///
/// Department and monitor group are referenced by name and resolved
/// (or created) by the store; see `InventoryStore::create_account`.
#[derive(Debug, Clone)]
pub struct NewCloudAccount {
    pub department_name: String,
    pub monitor_group_name: String,
    /// External group id, persisted only when the group is newly created.
    pub monitor_group_id: Option<String>,
    pub name: String,
    pub provider: Provider,
    pub account_id: String,
    pub request_date: Option<NaiveDate>,
    pub connection_date: Option<NaiveDate>,
    pub status: ConnectionStatus,
}

/// Mutable cloud-account fields. The owning group is fixed at creation and
/// deliberately absent here.
#[derive(Debug, Clone)]
pub struct CloudAccountUpdate {
    pub name: String,
    pub provider: Provider,
    pub account_id: String,
    pub request_date: Option<NaiveDate>,
    pub connection_date: Option<NaiveDate>,
    pub status: ConnectionStatus,
}

/// Mutable monitor-group fields. The owning department is fixed at creation
/// and deliberately absent here.
#[derive(Debug, Clone)]
pub struct MonitorGroupUpdate {
    pub name: String,
    pub group_id: Option<String>,
    pub responsible_contact: String,
    pub cc_contact: String,
    pub alert_email: String,
    pub report_email: String,
    pub memo: String,
}

/// Mutable department fields.
#[derive(Debug, Clone)]
pub struct DepartmentUpdate {
    pub name: String,
    pub memo: String,
}
