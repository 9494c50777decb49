//! Report request/poll/download protocol, layered on [`SessionManager`].
//!
//! A fetch cycle looks up the configured favorite report, resubmits it for
//! generation, optionally finalizes the job, polls until the portal names the
//! output file, downloads it and parses it into rows.

use std::time::Duration;

use pantry_core::TransactConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, StatusCode};
use serde_json::{Map, Value};

use crate::error::TransactError;
use crate::humanize::human_duration;
use crate::session::SessionManager;
use crate::types::{
    FavoritesResponse, IsReportReadyRequest, IsReportReadyResponse, OriginalEntity,
    ReportDescriptor, SubmitChange, SubmitChangesBody,
};

const GET_FAVORITES_PATH: &str = "QPWebOffice-Web-QuadPointDomain.svc/JSON/GetFavorites";
const SUBMIT_CHANGES_PATH: &str = "QPWebOffice-Web-QuadPointDomain.svc/JSON/SubmitChanges";
const IS_REPORT_READY_PATH: &str = "QPWebOffice-Web-BusinessService.svc/JSON/IsReportReady";
const DOWNLOAD_PATH: &str = "BinaryDataService.svc/HistoryReport";

/// Folder the portal writes generated reports into.
const REPORT_FOLDER: &str = "QuadPoint POS";

/// Operation code the portal's web client sends for "run this report".
const SUBMIT_OPERATION: i64 = 3;

/// Everything but RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Which report to run and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub report_name: String,
    /// `__type` discriminator sent with the submitted entity.
    pub report_type: String,
    pub poll_period: Duration,
    pub poll_timeout: Duration,
    /// Whether to POST the per-job finalize endpoint after submitting.
    pub finalize: bool,
}

impl ReportRequest {
    #[must_use]
    pub fn from_config(config: &TransactConfig) -> Self {
        Self {
            report_name: config.report_name.clone(),
            report_type: config.report_type.clone(),
            poll_period: Duration::from_secs(config.report_poll_period_secs),
            poll_timeout: Duration::from_secs(config.report_poll_timeout_secs),
            finalize: config.finalize_report,
        }
    }
}

impl SessionManager {
    /// Fetches every saved favorite report definition, unvalidated.
    ///
    /// Takes the session lock only long enough to copy the client and token.
    ///
    /// # Errors
    ///
    /// Returns [`TransactError::NotReady`] before a successful reload,
    /// [`TransactError::Http`] on network or non-2xx status, or
    /// [`TransactError::Deserialize`] if the body is not the expected shape.
    pub async fn list_favorite_reports(&self) -> Result<Vec<Map<String, Value>>, TransactError> {
        let (client, token) = {
            let session = self.lock().await;
            (session.client.clone(), session.token()?.to_string())
        };

        let url = self.endpoint(GET_FAVORITES_PATH);
        tracing::info!(url = %url, method = "GET", "getting favorite reports from Transact");

        let body = client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let parsed: FavoritesResponse =
            serde_json::from_str(&body).map_err(|source| TransactError::Deserialize {
                context: "favorite reports".to_string(),
                source,
            })?;
        Ok(parsed.result.items)
    }

    /// Runs one full report cycle and returns the parsed rows.
    ///
    /// Submit, finalize, poll and download all happen under a single hold of
    /// the session lock, so a reload cannot swap the token mid-cycle.
    ///
    /// # Errors
    ///
    /// - [`TransactError::ReportNotFound`] if no favorite carries the
    ///   configured name. Nothing is submitted in that case.
    /// - [`TransactError::InvalidDescriptor`] if the match lacks a usable id.
    /// - [`TransactError::SubmissionFailed`], [`TransactError::FinalizeFailed`],
    ///   [`TransactError::PollFailed`], [`TransactError::ReportCreationFailed`]
    ///   or [`TransactError::PollTimedOut`] for protocol failures.
    /// - [`TransactError::Csv`] if the download is not delimited text.
    pub async fn fetch_report_rows(
        &self,
        request: &ReportRequest,
    ) -> Result<Vec<Vec<String>>, TransactError> {
        let favorites = self.list_favorite_reports().await?;
        tracing::info!(
            all_reports = ?report_names(&favorites),
            "favorite reports scraped from Transact"
        );

        let fields = favorites
            .into_iter()
            .find(|fields| {
                fields.get("name").and_then(Value::as_str) == Some(request.report_name.as_str())
            })
            .ok_or_else(|| TransactError::ReportNotFound {
                name: request.report_name.clone(),
            })?;
        let descriptor =
            ReportDescriptor::from_fields(fields).map_err(|reason| TransactError::InvalidDescriptor {
                name: request.report_name.clone(),
                reason,
            })?;

        let contents = {
            let session = self.lock().await;
            let token = session.token()?;
            let client = &session.client;

            self.submit_report(client, token, &descriptor, &request.report_type)
                .await?;
            if request.finalize {
                self.finalize_report(client, token, &descriptor).await?;
            }
            let file = self.wait_for_report(client, token, &descriptor, request).await?;
            self.download_report(client, token, &file).await?
        };

        parse_report_csv(&contents)
    }

    async fn submit_report(
        &self,
        client: &Client,
        token: &str,
        descriptor: &ReportDescriptor,
        report_type: &str,
    ) -> Result<(), TransactError> {
        let body = SubmitChangesBody {
            change_set: vec![SubmitChange {
                entity: build_submit_entity(descriptor, report_type, &self.username),
                original_entity: OriginalEntity {
                    type_name: report_type.to_string(),
                },
                id: 0,
                operation: SUBMIT_OPERATION,
            }],
        };

        let url = self.endpoint(SUBMIT_CHANGES_PATH);
        tracing::info!(
            url = %url,
            method = "POST",
            report_name = %descriptor.name,
            report_id = descriptor.id,
            report_type = %report_type,
            "requesting report to be generated"
        );

        let response = client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TransactError::SubmissionFailed {
                name: descriptor.name.clone(),
                status: response.status().as_u16(),
            });
        }

        tracing::info!(report_name = %descriptor.name, "successfully requested report to be generated");
        Ok(())
    }

    async fn finalize_report(
        &self,
        client: &Client,
        token: &str,
        descriptor: &ReportDescriptor,
    ) -> Result<(), TransactError> {
        let url = format!(
            "{}/api/v2/tenants/{}/reportjobs/{}/finalize",
            self.base_url,
            utf8_percent_encode(&self.tenant, PATH_SEGMENT),
            descriptor.id
        );
        tracing::info!(
            url = %url,
            method = "POST",
            report_name = %descriptor.name,
            report_id = descriptor.id,
            "finalizing report request"
        );

        let response = client.post(&url).bearer_auth(token).send().await?;
        if response.status() != StatusCode::OK {
            return Err(TransactError::FinalizeFailed {
                name: descriptor.name.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Polls every `poll_period` until the report file is named or
    /// `poll_timeout` elapses. The first poll happens after one period.
    async fn wait_for_report(
        &self,
        client: &Client,
        token: &str,
        descriptor: &ReportDescriptor,
        request: &ReportRequest,
    ) -> Result<String, TransactError> {
        let polling = async {
            loop {
                tokio::time::sleep(request.poll_period).await;
                if let Some(file) = self.is_report_ready(client, token, descriptor).await? {
                    return Ok::<_, TransactError>(file);
                }
            }
        };

        match tokio::time::timeout(request.poll_timeout, polling).await {
            Ok(result) => result,
            Err(_) => Err(TransactError::PollTimedOut {
                name: descriptor.name.clone(),
                timeout: human_duration(request.poll_timeout),
            }),
        }
    }

    async fn is_report_ready(
        &self,
        client: &Client,
        token: &str,
        descriptor: &ReportDescriptor,
    ) -> Result<Option<String>, TransactError> {
        let url = self.endpoint(IS_REPORT_READY_PATH);
        tracing::debug!(
            url = %url,
            report_name = %descriptor.name,
            report_id = descriptor.id,
            "polling report readiness"
        );

        let response = client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .json(&IsReportReadyRequest {
                schedule_id: descriptor.id,
            })
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TransactError::PollFailed {
                name: descriptor.name.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: IsReportReadyResponse =
            serde_json::from_str(&body).map_err(|source| TransactError::Deserialize {
                context: format!("report readiness for '{}'", descriptor.name),
                source,
            })?;
        let result = parsed.result;

        if !result.success {
            return Err(TransactError::ReportCreationFailed {
                name: descriptor.name.clone(),
            });
        }

        match result.file {
            Some(file) if result.ready => {
                tracing::info!(
                    report_name = %descriptor.name,
                    report_file = %file,
                    "report is ready"
                );
                Ok(Some(file))
            }
            _ => Ok(None),
        }
    }

    /// The token travels as the `jwthidden` query parameter; this endpoint
    /// ignores the `Authorization` header.
    async fn download_report(
        &self,
        client: &Client,
        token: &str,
        file: &str,
    ) -> Result<String, TransactError> {
        let url_without_auth = format!(
            "{}/{DOWNLOAD_PATH}/{}/CSV",
            self.base_url,
            report_download_path(file)
        );
        tracing::info!(
            url_without_auth = %url_without_auth,
            method = "GET",
            report_file = %file,
            "downloading report file from Transact"
        );

        // Strip the URL from errors so the token never reaches the logs.
        let contents = client
            .get(&url_without_auth)
            .query(&[("jwthidden", token)])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .error_for_status()
            .map_err(reqwest::Error::without_url)?
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;

        tracing::info!(
            file_length = contents.len(),
            report_file = %file,
            "successfully downloaded report file from Transact"
        );
        Ok(contents)
    }
}

/// Names of all favorites that carry a string `name`.
#[must_use]
pub fn report_names(favorites: &[Map<String, Value>]) -> Vec<String> {
    favorites
        .iter()
        .filter_map(|fields| fields.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Copy of the descriptor with the fields the portal expects rewritten on
/// resubmission.
pub(crate) fn build_submit_entity(
    descriptor: &ReportDescriptor,
    report_type: &str,
    username: &str,
) -> Map<String, Value> {
    let mut entity = descriptor.fields.clone();

    let report_name_field = match entity.get("report_name") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    };

    entity.insert("__type".to_string(), Value::String(report_type.to_string()));
    entity.insert("last_filename".to_string(), Value::String(String::new()));
    entity.insert("last_run".to_string(), Value::Null);
    entity.insert("subject".to_string(), Value::String(String::new()));
    entity.insert("enabled".to_string(), Value::Bool(true));
    entity.insert(
        "all_fields".to_string(),
        Value::String(format!("{} {report_name_field} {username}", descriptor.name)),
    );
    entity.remove("queue_time");
    entity
}

/// `QuadPoint POS/<file>` with each `/`-separated segment percent-encoded
/// on its own.
pub(crate) fn report_download_path(file: &str) -> String {
    format!("{REPORT_FOLDER}/{file}")
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parses the report export into rows of cells.
///
/// The export is loosely quoted and has no header row; rows may differ in
/// length. A quote inside a quoted cell is kept literally unless it is
/// doubled or ends the cell.
///
/// # Errors
///
/// Returns [`TransactError::Csv`] if the reader cannot make sense of a record.
pub fn parse_report_csv(contents: &str) -> Result<Vec<Vec<String>>, TransactError> {
    let escaped = escape_bare_quotes(contents);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(escaped.as_bytes());

    reader
        .records()
        .map(|record| {
            let record = record?;
            Ok(record.iter().map(str::to_string).collect())
        })
        .collect()
}

/// Doubles every bare quote inside a quoted cell so the reader keeps it in
/// place. Inside a quoted cell a quote closes the cell only when followed by
/// a comma, a line break or the end of input.
fn escape_bare_quotes(contents: &str) -> String {
    let mut out = String::with_capacity(contents.len());
    let mut chars = contents.chars().peekable();
    let mut field_start = true;
    let mut quoted = false;

    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                match chars.peek() {
                    Some('"') => {
                        chars.next();
                        out.push_str("\"\"");
                    }
                    None | Some(',' | '\n' | '\r') => {
                        quoted = false;
                        out.push('"');
                    }
                    Some(_) => out.push_str("\"\""),
                }
            } else {
                out.push(c);
            }
            continue;
        }

        match c {
            '"' if field_start => {
                quoted = true;
                field_start = false;
            }
            ',' | '\n' | '\r' => field_start = true,
            _ => field_start = false,
        }
        out.push(c);
    }

    // Unterminated quoted cell: the rest of the input belongs to it.
    if quoted {
        out.push('"');
    }
    out
}
