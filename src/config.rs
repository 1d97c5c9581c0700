//! Gateway setup surface. All configuration is validated once here and then
//! carried immutably (behind `Arc`) in `GateState`; nothing configuration-
//! related can fail at request time.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use crate::error::{GateError, GateResult};
use crate::identity::{MemorySessionStore, SessionStore};
use crate::server::GateState;

pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// CAS protocol version. Each version has its own validation endpoint and
/// response shape; anything outside 1..=3 is refused at setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasVersion {
    V1,
    V2,
    V3,
}

impl CasVersion {
    /// Validation endpoint suffix, joined onto the CAS root URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            CasVersion::V1 => "validate",
            CasVersion::V2 => "serviceValidate",
            CasVersion::V3 => "p3/serviceValidate",
        }
    }
}

impl FromStr for CasVersion {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(CasVersion::V1),
            "2" => Ok(CasVersion::V2),
            "3" => Ok(CasVersion::V3),
            other => Err(GateError::Config(format!("unsupported CAS version '{other}'"))),
        }
    }
}

/// Immutable gateway configuration, shared across handlers via `GateState`.
#[derive(Debug, Clone)]
pub struct CasConfig {
    pub version: CasVersion,
    pub root_url: Url,
    pub login_route: String,
    pub logout_route: String,
    pub on_success: String,
    pub on_logout: String,
    pub validation_timeout: Duration,
}

impl CasConfig {
    /// The CAS login page URL users are redirected to, carrying the service
    /// callback so CAS knows where to send the ticket.
    pub fn cas_login_url(&self, service: &str) -> GateResult<Url> {
        let mut url = self
            .root_url
            .join("login")
            .map_err(|e| GateError::Config(format!("invalid CAS login URL: {e}")))?;
        url.query_pairs_mut().append_pair("service", service);
        Ok(url)
    }
}

/// Builder for the gateway. `host` and `version` are required; everything
/// else has the conventional defaults.
pub struct CasSetup {
    host: String,
    version: String,
    host_prefix: String,
    host_scheme: String,
    login_route: String,
    logout_route: String,
    on_success: String,
    on_logout: String,
    validation_timeout: Duration,
    session_store: Option<Arc<dyn SessionStore>>,
}

impl CasSetup {
    pub fn new(host: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            version: version.into(),
            host_prefix: String::new(),
            host_scheme: "https".to_string(),
            login_route: "/login".to_string(),
            logout_route: "/logout".to_string(),
            on_success: "/".to_string(),
            on_logout: "/".to_string(),
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
            session_store: None,
        }
    }

    /// Path prefix the CAS server runs under (e.g. "cas").
    pub fn host_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.host_prefix = prefix.into();
        self
    }

    pub fn host_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.host_scheme = scheme.into();
        self
    }

    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn logout_route(mut self, route: impl Into<String>) -> Self {
        self.logout_route = route.into();
        self
    }

    /// Default redirect after a successful login, used when no redirect
    /// target is pending on the session.
    pub fn on_success(mut self, url: impl Into<String>) -> Self {
        self.on_success = url.into();
        self
    }

    pub fn on_logout(mut self, url: impl Into<String>) -> Self {
        self.on_logout = url.into();
        self
    }

    /// Bound on the outbound validation call. The CAS server being down must
    /// fail the request, not hang it.
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Swap the in-memory session store for an external one.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn build(self) -> GateResult<GateState> {
        let version: CasVersion = self.version.parse()?;
        for route in [&self.login_route, &self.logout_route] {
            if !route.starts_with('/') {
                return Err(GateError::Config(format!("route '{route}' must start with '/'")));
            }
        }

        // Normalize the prefix so the root URL always ends with a separator
        let mut prefix = self.host_prefix;
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        let root = format!("{}://{}{}", self.host_scheme, self.host, prefix);
        let root_url = Url::parse(&root)
            .map_err(|e| GateError::Config(format!("invalid CAS root URL '{root}': {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(self.validation_timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(GateState {
            config: Arc::new(CasConfig {
                version,
                root_url,
                login_route: self.login_route,
                logout_route: self.logout_route,
                on_success: self.on_success,
                on_logout: self.on_logout,
                validation_timeout: self.validation_timeout,
            }),
            sessions: self.session_store.unwrap_or_else(|| Arc::new(MemorySessionStore::default())),
            http,
        })
    }
}
