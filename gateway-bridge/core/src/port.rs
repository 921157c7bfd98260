use std::{fmt, str::FromStr};

/// A `<protocol>/<port>` pair, e.g. `TCP/80`.
///
/// Protocols are compared case-sensitively, as they appear on the resources.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortProtocol {
    pub protocol: String,
    pub port: u16,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParsePortProtocolError {
    #[error("expected <protocol>/<port>, got {0:?}")]
    Format(String),

    #[error("invalid port {0:?}")]
    Port(String),
}

impl PortProtocol {
    pub fn new(protocol: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            port,
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.port)
    }
}

impl FromStr for PortProtocol {
    type Err = ParsePortProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, port) = s
            .split_once('/')
            .filter(|(proto, _)| !proto.is_empty())
            .ok_or_else(|| ParsePortProtocolError::Format(s.to_string()))?;
        let port = port
            .parse()
            .map_err(|_| ParsePortProtocolError::Port(port.to_string()))?;
        Ok(Self::new(protocol, port))
    }
}
