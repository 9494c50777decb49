use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub transact: TransactConfig,
}

/// Settings for the Transact point-of-sale portal integration.
///
/// Column offsets are signed and relative to the cell carrying the
/// profit-center prefix in each exported report row.
#[derive(Clone)]
pub struct TransactConfig {
    pub base_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    pub report_name: String,
    pub report_type: String,
    pub profit_center_prefix: String,
    pub name_column_offset: i64,
    pub id_column_offset: i64,
    pub quantity_column_offset: i64,
    pub fetch_period_secs: u64,
    pub reload_session_period_secs: u64,
    pub report_poll_period_secs: u64,
    pub report_poll_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub title_prefixes: Vec<String>,
    pub finalize_report: bool,
}

impl std::fmt::Debug for TransactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactConfig")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("report_name", &self.report_name)
            .field("report_type", &self.report_type)
            .field("profit_center_prefix", &self.profit_center_prefix)
            .field("name_column_offset", &self.name_column_offset)
            .field("id_column_offset", &self.id_column_offset)
            .field("quantity_column_offset", &self.quantity_column_offset)
            .field("fetch_period_secs", &self.fetch_period_secs)
            .field(
                "reload_session_period_secs",
                &self.reload_session_period_secs,
            )
            .field("report_poll_period_secs", &self.report_poll_period_secs)
            .field("report_poll_timeout_secs", &self.report_poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("title_prefixes", &self.title_prefixes)
            .field("finalize_report", &self.finalize_report)
            .finish()
    }
}
