//! RPC binding strings of the form `protocol:host[option,option]`.

use crate::error::DrsError;
use std::fmt;
use std::str::FromStr;

/// Target description handed to the transport when opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingString {
    protocol: String,
    host: String,
    options: Vec<String>,
}

impl BindingString {
    /// Creates a binding string.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            options,
        }
    }

    /// Protocol sequence.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Server host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Connection options.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns true if `option` is present.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Returns true if the connection must be encrypted.
    pub fn is_sealed(&self) -> bool {
        self.has_option("seal")
    }
}

impl fmt::Display for BindingString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.host)?;
        if !self.options.is_empty() {
            write!(f, "[{}]", self.options.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for BindingString {
    type Err = DrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DrsError::InvalidArgument(format!("malformed binding string: {s}"));

        let (protocol, rest) = s.split_once(':').ok_or_else(invalid)?;
        if protocol.is_empty() {
            return Err(invalid());
        }

        let (host, options) = match rest.find('[') {
            Some(open) => {
                let inner = rest[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                let options = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                (&rest[..open], options)
            }
            None => (rest, Vec::new()),
        };

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(protocol, host, options))
    }
}
