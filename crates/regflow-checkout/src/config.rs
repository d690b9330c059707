//! # Checkout Configuration
//!
//! Fee mode, processor rate tables, currency and registration rules.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     REGFLOW_FEE_MODE=absorbed                                          │
//! │     REGFLOW_DOMESTIC_RATE_BPS=175                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/regflow/checkout.toml (Linux)                            │
//! │     ~/Library/Application Support/org.regflow.regflow/checkout.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     passed_to_customer, grossed_up, AUD, lodge minimum 3               │
//! │     NO default rate tables: they must be configured                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [fees]
//! mode = "passed_to_customer"   # absorbed | passed_to_customer
//! basis = "grossed_up"          # grossed_up | subtotal
//!
//! [fees.domestic]
//! rate_bps = 175
//! fixed_minor_units = 30
//!
//! [fees.international]
//! rate_bps = 350
//! fixed_minor_units = 30
//!
//! [currency]
//! code = "AUD"
//! symbol = "$"
//! decimals = 2
//! domestic_country = "AU"
//!
//! [registration]
//! lodge_minimum = 3
//! ```

use regflow_core::pricing::{FeeBasis, FeeMode, FeeSchedule, RateTable};
use regflow_core::registration::RegistrationRules;
use regflow_core::{FeeRate, Money, DEFAULT_LODGE_MINIMUM};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Fee Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSettings {
    #[serde(default)]
    pub mode: FeeMode,

    #[serde(default)]
    pub basis: FeeBasis,

    /// Rate for cards issued in the domestic country.
    #[serde(default)]
    pub domestic: Option<RateTable>,

    #[serde(default)]
    pub international: Option<RateTable>,
}

impl FeeSettings {
    pub fn schedule(&self) -> FeeSchedule {
        FeeSchedule {
            basis: self.basis,
            domestic: self.domestic,
            international: self.international,
        }
    }
}

// =============================================================================
// Currency Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// ISO 4217 code sent with every payment request.
    #[serde(default = "default_currency_code")]
    pub code: String,

    #[serde(default = "default_currency_symbol")]
    pub symbol: String,

    /// Minor units per major unit, as a power of ten.
    #[serde(default = "default_decimals")]
    pub decimals: u8,

    /// Billing country that gets the domestic rate.
    #[serde(default = "default_domestic_country")]
    pub domestic_country: String,
}

fn default_currency_code() -> String {
    "AUD".to_string()
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_decimals() -> u8 {
    2
}

fn default_domestic_country() -> String {
    "AU".to_string()
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        CurrencyConfig {
            code: default_currency_code(),
            symbol: default_currency_symbol(),
            decimals: default_decimals(),
            domestic_country: default_domestic_country(),
        }
    }
}

impl CurrencyConfig {
    /// Formats minor units for display.
    ///
    /// ```rust
    /// use regflow_checkout::config::CurrencyConfig;
    /// use regflow_core::Money;
    ///
    /// let currency = CurrencyConfig::default();
    /// assert_eq!(currency.format_minor(Money::from_minor(10_205)), "$102.05");
    /// ```
    pub fn format_minor(&self, amount: Money) -> String {
        let minor = amount.minor();
        let divisor = 10_i64.pow(u32::from(self.decimals));
        let whole = (minor / divisor).abs();
        let frac = (minor % divisor).abs();

        format!(
            "{}{}{}",
            if minor < 0 { "-" } else { "" },
            self.symbol,
            if self.decimals > 0 {
                format!("{}.{:0width$}", whole, frac, width = self.decimals as usize)
            } else {
                whole.to_string()
            }
        )
    }
}

// =============================================================================
// Registration Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSettings {
    #[serde(default = "default_lodge_minimum")]
    pub lodge_minimum: u32,
}

fn default_lodge_minimum() -> u32 {
    DEFAULT_LODGE_MINIMUM
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        RegistrationSettings {
            lodge_minimum: default_lodge_minimum(),
        }
    }
}

// =============================================================================
// Draft Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSettings {
    /// Where file drafts are kept. Defaults to the platform data directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// =============================================================================
// Main Checkout Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub fees: FeeSettings,

    #[serde(default)]
    pub currency: CurrencyConfig,

    #[serde(default)]
    pub registration: RegistrationSettings,

    #[serde(default)]
    pub drafts: DraftSettings,
}

impl CheckoutConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (checkout.toml)
    /// 3. Environment variables
    ///
    /// Fails if either rate table is missing after all three: checkout must
    /// never run with an unknown fee.
    pub fn load(config_path: Option<PathBuf>) -> CheckoutResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> CheckoutResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CheckoutError::ConfigLoadFailed(e.to_string()))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> CheckoutResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CheckoutError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CheckoutError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| CheckoutError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Checkout config saved");
        Ok(())
    }

    pub fn validate(&self) -> CheckoutResult<()> {
        self.fees.schedule().validate()?;

        let code = &self.currency.code;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CheckoutError::InvalidConfig(format!(
                "currency code must be three upper-case letters, got '{}'",
                code
            )));
        }
        if self.currency.decimals > 4 {
            return Err(CheckoutError::InvalidConfig(
                "currency decimals must be between 0 and 4".into(),
            ));
        }
        let country = &self.currency.domestic_country;
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CheckoutError::InvalidConfig(format!(
                "domestic_country must be a two-letter country code, got '{}'",
                country
            )));
        }
        if self.registration.lodge_minimum == 0 {
            return Err(CheckoutError::InvalidConfig(
                "lodge_minimum must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> CheckoutResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `REGFLOW_*` overrides read through `var`.
    ///
    /// Unparseable fee values are errors; anything else unparseable is
    /// logged and ignored.
    pub(crate) fn apply_overrides<F>(&mut self, var: F) -> CheckoutResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = var("REGFLOW_FEE_MODE") {
            debug!(mode = %mode, "Overriding fee mode from environment");
            self.fees.mode = mode.parse()?;
        }

        if let Some(basis) = var("REGFLOW_FEE_BASIS") {
            debug!(basis = %basis, "Overriding fee basis from environment");
            self.fees.basis = basis.parse()?;
        }

        override_table(
            &mut self.fees.domestic,
            var("REGFLOW_DOMESTIC_RATE_BPS"),
            var("REGFLOW_DOMESTIC_FIXED_FEE"),
            "domestic",
        )?;
        override_table(
            &mut self.fees.international,
            var("REGFLOW_INTERNATIONAL_RATE_BPS"),
            var("REGFLOW_INTERNATIONAL_FIXED_FEE"),
            "international",
        )?;

        if let Some(code) = var("REGFLOW_CURRENCY") {
            self.currency.code = code.trim().to_uppercase();
        }

        if let Some(minimum) = var("REGFLOW_LODGE_MINIMUM") {
            match minimum.parse::<u32>() {
                Ok(m) => self.registration.lodge_minimum = m,
                Err(_) => warn!(value = %minimum, "Ignoring invalid REGFLOW_LODGE_MINIMUM"),
            }
        }

        if let Some(dir) = var("REGFLOW_DRAFT_DIR") {
            self.drafts.directory = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "regflow", "regflow")
            .map(|dirs| dirs.config_dir().join("checkout.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn fee_schedule(&self) -> FeeSchedule {
        self.fees.schedule()
    }

    pub fn fee_mode(&self) -> FeeMode {
        self.fees.mode
    }

    pub fn rules(&self) -> RegistrationRules {
        RegistrationRules {
            lodge_minimum: self.registration.lodge_minimum,
        }
    }

    /// The configured draft directory, or the platform data directory.
    pub fn draft_directory(&self) -> Option<PathBuf> {
        self.drafts.directory.clone().or_else(|| {
            directories::ProjectDirs::from("org", "regflow", "regflow")
                .map(|dirs| dirs.data_dir().join("drafts"))
        })
    }
}

/// Replaces a rate table's fields from a pair of environment values.
///
/// Setting only one half of a table that does not exist yet is an error.
fn override_table(
    table: &mut Option<RateTable>,
    rate: Option<String>,
    fixed: Option<String>,
    label: &str,
) -> CheckoutResult<()> {
    if rate.is_none() && fixed.is_none() {
        return Ok(());
    }

    let parse = |value: Option<String>, what: &str| -> CheckoutResult<Option<i64>> {
        value
            .map(|v| {
                v.trim().parse::<i64>().map_err(|_| {
                    CheckoutError::InvalidConfig(format!(
                        "{} {} must be an integer, got '{}'",
                        label, what, v
                    ))
                })
            })
            .transpose()
    };
    let rate = parse(rate, "rate")?;
    let fixed = parse(fixed, "fixed fee")?;

    let current = *table;
    let rate_bps = match (rate, current) {
        (Some(r), _) => u32::try_from(r).map_err(|_| {
            CheckoutError::InvalidConfig(format!("{} rate cannot be negative", label))
        })?,
        (None, Some(t)) => t.rate.bps(),
        (None, None) => {
            return Err(CheckoutError::InvalidConfig(format!(
                "{} fixed fee set without a rate",
                label
            )))
        }
    };
    let fixed_minor = match (fixed, current) {
        (Some(f), _) => f,
        (None, Some(t)) => t.fixed.minor(),
        (None, None) => {
            return Err(CheckoutError::InvalidConfig(format!(
                "{} rate set without a fixed fee",
                label
            )))
        }
    };

    debug!(label, rate_bps, fixed_minor, "Overriding rate table from environment");
    *table = Some(RateTable {
        rate: FeeRate::from_bps(rate_bps),
        fixed: Money::from_minor(fixed_minor),
    });
    Ok(())
}
