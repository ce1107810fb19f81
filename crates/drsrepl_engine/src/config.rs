//! Configuration for replication sessions.

use crate::binding::BindingString;
use drsrepl_protocol::{DEFAULT_MAX_NDR_SIZE, DEFAULT_MAX_OBJECT_COUNT};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// RPC protocol sequence used when none is configured.
pub const DEFAULT_PROTOCOL: &str = "ncacn_ip_tcp";

/// Log level from which the transport is asked to dump packets.
pub const PRINT_LOG_LEVEL: u32 = 5;

/// Configuration for connections and pull requests.
#[derive(Debug, Clone)]
pub struct DrsConfig {
    /// RPC protocol sequence.
    pub protocol: String,
    /// Caller's log level; `PRINT_LOG_LEVEL` and above add packet dumps.
    pub log_level: u32,
    /// Maximum objects per reply.
    pub max_object_count: u32,
    /// Maximum encoded reply size, in bytes.
    pub max_ndr_size: u32,
}

impl DrsConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            log_level: 0,
            max_object_count: DEFAULT_MAX_OBJECT_COUNT,
            max_ndr_size: DEFAULT_MAX_NDR_SIZE,
        }
    }

    /// Sets the protocol sequence.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Sets the log level.
    pub fn with_log_level(mut self, level: u32) -> Self {
        self.log_level = level;
        self
    }

    /// Sets the maximum objects per reply.
    pub fn with_max_object_count(mut self, count: u32) -> Self {
        self.max_object_count = count;
        self
    }

    /// Sets the maximum encoded reply size.
    pub fn with_max_ndr_size(mut self, size: u32) -> Self {
        self.max_ndr_size = size;
        self
    }

    /// Builds the binding string for `server`.
    pub fn binding_for(&self, server: &str) -> BindingString {
        let mut options = vec!["seal".to_string()];
        if self.log_level >= PRINT_LOG_LEVEL {
            options.push("print".to_string());
        }
        BindingString::new(self.protocol.clone(), server, options)
    }
}

impl Default for DrsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Account used to authenticate the RPC connection.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    domain: Option<String>,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: None,
            password: password.into(),
        }
    }

    /// Sets the account domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Account name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account domain.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}
