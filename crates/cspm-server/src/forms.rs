//! Field-level validation for the write endpoints.
//!
//! Each form mirrors the submittable fields of one entity; `validate`
//! either yields the typed store request or a field → message map that the
//! handler returns to the submitter, so the client can re-render the form
//! with the entered values and per-field errors.

use chrono::NaiveDate;
use cspm_common::types::{
    CloudAccountUpdate, ConnectionStatus, DepartmentUpdate, MonitorGroupUpdate, NewCloudAccount,
    Provider,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Field name → validation message.
pub type FieldErrors = BTreeMap<String, String>;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_BAD_DATE: &str = "Enter a valid date (YYYY-MM-DD).";
pub const MSG_BAD_PROVIDER: &str = "Select a valid provider (AWS, Azure, GCP, OCI, Other).";
pub const MSG_BAD_STATUS: &str = "Select a valid status (Waiting, Connected, Disconnected).";
pub const MSG_DUPLICATE_ACCOUNT_ID: &str = "An account with this account ID already exists.";

/// アカウント登録フォーム。部署・監視グループは名前で指定し、
/// 既存行があれば紐付け、なければ新規作成される。
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct AccountCreateForm {
    /// 申請部署名
    pub department_name: Option<String>,
    /// 監視グループ名
    pub monitor_group_name: Option<String>,
    /// 監視グループID（新規作成時のみ保存、任意）
    pub monitor_group_id: Option<String>,
    /// アカウント名
    pub name: Option<String>,
    /// 種別（AWS / Azure / GCP / OCI / Other）
    pub provider: Option<String>,
    /// アカウントID（全体で一意）
    pub account_id: Option<String>,
    /// 依頼日（YYYY-MM-DD）
    pub request_date: Option<String>,
    /// 接続日（YYYY-MM-DD）
    pub connection_date: Option<String>,
    /// 状態（省略時は Waiting）
    pub status: Option<String>,
}

impl AccountCreateForm {
    pub fn validate(self) -> Result<NewCloudAccount, FieldErrors> {
        let mut errors = FieldErrors::new();

        let department_name = required(&mut errors, "department_name", self.department_name);
        let monitor_group_name = required(&mut errors, "monitor_group_name", self.monitor_group_name);
        let monitor_group_id = optional_text(self.monitor_group_id);
        let name = required(&mut errors, "name", self.name);
        let provider = parse_provider(&mut errors, "provider", self.provider);
        let account_id = required(&mut errors, "account_id", self.account_id);
        let request_date = parse_date(&mut errors, "request_date", self.request_date);
        let connection_date = parse_date(&mut errors, "connection_date", self.connection_date);
        let status = parse_status(&mut errors, "status", self.status);

        match (department_name, monitor_group_name, name, provider, account_id, status) {
            (
                Some(department_name),
                Some(monitor_group_name),
                Some(name),
                Some(provider),
                Some(account_id),
                Some(status),
            ) if errors.is_empty() => Ok(NewCloudAccount {
                department_name,
                monitor_group_name,
                monitor_group_id,
                name,
                provider,
                account_id,
                request_date,
                connection_date,
                status,
            }),
            _ => Err(errors),
        }
    }
}

/// アカウント編集フォーム。所属監視グループは変更不可のため存在しない。
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct AccountEditForm {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub account_id: Option<String>,
    pub request_date: Option<String>,
    pub connection_date: Option<String>,
    pub status: Option<String>,
}

impl AccountEditForm {
    pub fn validate(self) -> Result<CloudAccountUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required(&mut errors, "name", self.name);
        let provider = parse_provider(&mut errors, "provider", self.provider);
        let account_id = required(&mut errors, "account_id", self.account_id);
        let request_date = parse_date(&mut errors, "request_date", self.request_date);
        let connection_date = parse_date(&mut errors, "connection_date", self.connection_date);
        let status = parse_status(&mut errors, "status", self.status);

        match (name, provider, account_id, status) {
            (Some(name), Some(provider), Some(account_id), Some(status)) if errors.is_empty() => {
                Ok(CloudAccountUpdate {
                    name,
                    provider,
                    account_id,
                    request_date,
                    connection_date,
                    status,
                })
            }
            _ => Err(errors),
        }
    }
}

/// 監視グループ編集フォーム。申請部署は変更不可のため存在しない。
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct GroupEditForm {
    pub name: Option<String>,
    pub group_id: Option<String>,
    /// 責任者連絡先（カンマ区切り）
    pub responsible_contact: Option<String>,
    /// CC用連絡先（任意）
    pub cc_contact: Option<String>,
    /// アラート通知先
    pub alert_email: Option<String>,
    /// レポート送付先
    pub report_email: Option<String>,
    pub memo: Option<String>,
}

impl GroupEditForm {
    pub fn validate(self) -> Result<MonitorGroupUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required(&mut errors, "name", self.name);
        let group_id = optional_text(self.group_id);
        let responsible_contact = required(&mut errors, "responsible_contact", self.responsible_contact);
        let cc_contact = self.cc_contact.unwrap_or_default();
        let alert_email = required(&mut errors, "alert_email", self.alert_email);
        let report_email = required(&mut errors, "report_email", self.report_email);
        let memo = self.memo.unwrap_or_default();

        match (name, responsible_contact, alert_email, report_email) {
            (Some(name), Some(responsible_contact), Some(alert_email), Some(report_email))
                if errors.is_empty() =>
            {
                Ok(MonitorGroupUpdate {
                    name,
                    group_id,
                    responsible_contact,
                    cc_contact,
                    alert_email,
                    report_email,
                    memo,
                })
            }
            _ => Err(errors),
        }
    }
}

/// 部署編集フォーム。
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct DepartmentEditForm {
    pub name: Option<String>,
    pub memo: Option<String>,
}

impl DepartmentEditForm {
    pub fn validate(self) -> Result<DepartmentUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = required(&mut errors, "name", self.name);
        let memo = self.memo.unwrap_or_default();

        match name {
            Some(name) if errors.is_empty() => Ok(DepartmentUpdate { name, memo }),
            _ => Err(errors),
        }
    }
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    match optional_text(value) {
        Some(v) => Some(v),
        None => {
            errors.insert(field.to_string(), MSG_REQUIRED.to_string());
            None
        }
    }
}

/// Trim, treating empty and whitespace-only input as absent.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_provider(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<Provider> {
    let raw = required(errors, field, value)?;
    match raw.parse::<Provider>() {
        Ok(p) => Some(p),
        Err(_) => {
            errors.insert(field.to_string(), MSG_BAD_PROVIDER.to_string());
            None
        }
    }
}

/// Status defaults to `Waiting` when absent, matching the model default.
fn parse_status(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<ConnectionStatus> {
    let raw = match optional_text(value) {
        Some(raw) => raw,
        None => return Some(ConnectionStatus::Waiting),
    };
    match raw.parse::<ConnectionStatus>() {
        Ok(s) => Some(s),
        Err(_) => {
            errors.insert(field.to_string(), MSG_BAD_STATUS.to_string());
            None
        }
    }
}

fn parse_date(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<NaiveDate> {
    let raw = optional_text(value)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert(field.to_string(), MSG_BAD_DATE.to_string());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_form_collects_all_field_errors_at_once() {
        let form = AccountCreateForm {
            provider: Some("openstack".to_string()),
            request_date: Some("01/05/2024".to_string()),
            status: Some("pending".to_string()),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("department_name").map(String::as_str), Some(MSG_REQUIRED));
        assert_eq!(errors.get("monitor_group_name").map(String::as_str), Some(MSG_REQUIRED));
        assert_eq!(errors.get("name").map(String::as_str), Some(MSG_REQUIRED));
        assert_eq!(errors.get("account_id").map(String::as_str), Some(MSG_REQUIRED));
        assert_eq!(errors.get("provider").map(String::as_str), Some(MSG_BAD_PROVIDER));
        assert_eq!(errors.get("request_date").map(String::as_str), Some(MSG_BAD_DATE));
        assert_eq!(errors.get("status").map(String::as_str), Some(MSG_BAD_STATUS));
    }

    #[test]
    fn create_form_defaults_status_and_trims_input() {
        let form = AccountCreateForm {
            department_name: Some("  Eng  ".to_string()),
            monitor_group_name: Some("Infra".to_string()),
            name: Some("prod-db".to_string()),
            provider: Some("AWS".to_string()),
            account_id: Some("123456789012".to_string()),
            ..Default::default()
        };
        let req = form.validate().unwrap();
        assert_eq!(req.department_name, "Eng");
        assert_eq!(req.status, ConnectionStatus::Waiting);
        assert!(req.request_date.is_none());
    }

    #[test]
    fn group_form_requires_contact_fields_but_not_cc_or_memo() {
        let form = GroupEditForm {
            name: Some("Infra".to_string()),
            responsible_contact: Some("alice@example.com".to_string()),
            alert_email: Some("alerts@example.com".to_string()),
            report_email: Some("reports@example.com".to_string()),
            ..Default::default()
        };
        let update = form.validate().unwrap();
        assert_eq!(update.cc_contact, "");
        assert_eq!(update.memo, "");
        assert!(update.group_id.is_none());

        let errors = GroupEditForm::default().validate().unwrap_err();
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("responsible_contact"));
        assert!(errors.contains_key("alert_email"));
        assert!(errors.contains_key("report_email"));
        assert!(!errors.contains_key("cc_contact"));
        assert!(!errors.contains_key("memo"));
    }
}
