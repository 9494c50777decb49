//! Transact portal wire types and the records extracted from its reports.
//!
//! ## Observed shapes
//!
//! ### Favorites
//! `GET .../JSON/GetFavorites` wraps the saved report definitions in
//! `{"GetFavoritesResult": {"RootResults": [...]}}`. Each definition is a flat
//! object with many provider-specific fields; only `name` (string) and `id`
//! (a JSON number, sometimes serialized as `42.0`) are interpreted. Everything
//! else is round-tripped untouched when the report is resubmitted.
//!
//! ### Report readiness
//! `POST .../JSON/IsReportReady` answers
//! `{"IsReportReadyResult": {"success": bool, "reportReady": bool, "reportFile": string|null}}`.
//! `reportFile` is a bare filename relative to the `QuadPoint POS` folder.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A product record sourced from the Transact inventory report.
///
/// "Partial" because thumbnails, nutrition and other metadata live in the
/// application database and are merged in by the REST layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialProduct {
    pub id: String,
    pub name: String,
    pub quantity: u32,
}

/// A saved "favorite report" definition as returned by the portal.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDescriptor {
    pub name: String,
    pub id: i64,
    /// The complete original definition, including `name` and `id`.
    pub fields: Map<String, Value>,
}

impl ReportDescriptor {
    /// Validates a raw favorite definition.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when `name` is missing or not a
    /// string, or `id` is missing or not an integral number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, String> {
        let name = match fields.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err("invalid 'name' field".to_string()),
            None => return Err("no 'name' field".to_string()),
        };

        let id = match fields.get("id") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .ok_or_else(|| format!("invalid 'id' field {n}"))?,
            Some(other) => return Err(format!("invalid 'id' field {other}")),
            None => return Err("no 'id' field".to_string()),
        };

        Ok(Self { name, id, fields })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoritesResponse {
    #[serde(rename = "GetFavoritesResult")]
    pub result: FavoritesResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoritesResult {
    #[serde(rename = "RootResults", default)]
    pub items: Vec<Map<String, Value>>,
}

/// Login payload for `JSON/Authenticate`.
///
/// `reset` and `id` are placeholders the portal's own web client always sends.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthenticateRequest<'a> {
    pub is_persistent: bool,
    pub custom_data: &'a str,
    pub dot_net_logic_ver: u32,
    pub client_version: &'a str,
    pub user_name: &'a str,
    pub password: &'a str,
    pub reset: &'a str,
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitChangesBody {
    #[serde(rename = "changeSet")]
    pub change_set: Vec<SubmitChange>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitChange {
    #[serde(rename = "Entity")]
    pub entity: Map<String, Value>,
    #[serde(rename = "OriginalEntity")]
    pub original_entity: OriginalEntity,
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Operation")]
    pub operation: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct OriginalEntity {
    #[serde(rename = "__type")]
    pub type_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct IsReportReadyRequest {
    #[serde(rename = "scheduleId")]
    pub schedule_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IsReportReadyResponse {
    #[serde(rename = "IsReportReadyResult")]
    pub result: IsReportReadyResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IsReportReadyResult {
    #[serde(rename = "reportFile", default)]
    pub file: Option<String>,
    #[serde(rename = "reportReady", default)]
    pub ready: bool,
    #[serde(default)]
    pub success: bool,
}
