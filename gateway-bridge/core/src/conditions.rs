//! Condition vocabulary written to Gateway status.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Pending,
    PortConflict,
    UnsupportedProtocol,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    InvalidGatewayClass,
    InvalidMatchLabels,
    UnidentifiedController,
    InvalidAddress,
    PortConflict,
    UnsupportedProtocol,
}

// === impl ConditionType ===

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PortConflict => "PortConflict",
            Self::UnsupportedProtocol => "UnsupportedProtocol",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Reason ===

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidGatewayClass => "InvalidGatewayClass",
            Self::InvalidMatchLabels => "InvalidMatchLabels",
            Self::UnidentifiedController => "UnidentifiedController",
            Self::InvalidAddress => "InvalidAddress",
            Self::PortConflict => "PortConflict",
            Self::UnsupportedProtocol => "UnsupportedProtocol",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
