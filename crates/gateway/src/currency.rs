//! Currency support gate
//!
//! Every rate, balance and trade operation passes its currency codes through
//! here first. A rejected code is not an error: callers log it at debug level
//! and answer with a neutral default.

use cashgate_core::CurrencyCode;
use std::collections::{BTreeSet, HashMap};

use crate::config::GatewayConfig;

/// Which configured set a code is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Crypto,
    Fiat,
}

impl CurrencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crypto => "cryptocurrency",
            Self::Fiat => "fiat currency",
        }
    }
}

/// Validates and normalizes currency codes for one exchange
#[derive(Debug, Clone, Default)]
pub struct CurrencyGate {
    crypto: BTreeSet<CurrencyCode>,
    fiat: BTreeSet<CurrencyCode>,
    aliases: HashMap<CurrencyCode, CurrencyCode>,
}

impl CurrencyGate {
    pub fn new(
        crypto: BTreeSet<CurrencyCode>,
        fiat: BTreeSet<CurrencyCode>,
        aliases: HashMap<CurrencyCode, CurrencyCode>,
    ) -> Self {
        Self {
            crypto,
            fiat,
            aliases,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.crypto_currencies.clone(),
            config.fiat_currencies.clone(),
            config.currency_aliases.clone(),
        )
    }

    /// Map a caller's code to the exchange's code
    pub fn map(&self, code: &str) -> CurrencyCode {
        let code = code.trim();
        match self.aliases.get(code) {
            Some(mapped) => mapped.clone(),
            None => code.to_string(),
        }
    }

    /// Normalize `code` against the set for `kind`; `None` if unsupported
    pub fn normalize(&self, code: &str, kind: CurrencyKind) -> Option<CurrencyCode> {
        let mapped = self.map(code);
        let supported = match kind {
            CurrencyKind::Crypto => &self.crypto,
            CurrencyKind::Fiat => &self.fiat,
        };
        supported.contains(&mapped).then_some(mapped)
    }

    pub fn check_crypto(&self, code: &str) -> Option<CurrencyCode> {
        self.normalize(code, CurrencyKind::Crypto)
    }

    pub fn check_fiat(&self, code: &str) -> Option<CurrencyCode> {
        self.normalize(code, CurrencyKind::Fiat)
    }

    /// Accept a code from either set, crypto first
    pub fn check_any(&self, code: &str) -> Option<(CurrencyCode, CurrencyKind)> {
        self.check_crypto(code)
            .map(|c| (c, CurrencyKind::Crypto))
            .or_else(|| self.check_fiat(code).map(|c| (c, CurrencyKind::Fiat)))
    }

    pub fn crypto_currencies(&self) -> &BTreeSet<CurrencyCode> {
        &self.crypto
    }

    pub fn fiat_currencies(&self) -> &BTreeSet<CurrencyCode> {
        &self.fiat
    }
}
