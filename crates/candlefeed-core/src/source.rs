use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical identifiers for the supported upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Binance,
    Cryptocompare,
    Coingecko,
    Yahoo,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [
        Self::Binance,
        Self::Cryptocompare,
        Self::Coingecko,
        Self::Yahoo,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Cryptocompare => "cryptocompare",
            Self::Coingecko => "coingecko",
            Self::Yahoo => "yahoo",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "cryptocompare" => Ok(Self::Cryptocompare),
            "coingecko" => Ok(Self::Coingecko),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}
