use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::PromotionType;

/// Upper bound for any slot count, configured or requested
pub const MAX_SLOTS: usize = 50;

/// Longest configurable promotion term
pub const MAX_DURATION_DAYS: i64 = 3650;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    /// Present when the postgres backend is selected
    pub database: Option<DatabaseConfig>,
    pub rotation: RotationConfig,
    pub pricing: PricingConfig,
    pub security: SecurityConfig,
}

/// Which promotion store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Upper bound for every individual storage call
    pub timeout: Duration,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Rotation tuning. Passed by value into the scheduler on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationConfig {
    pub featured_slots: usize,
    pub top_spot_slots: usize,
    pub boost_slots: usize,
    pub urgent_slots: usize,
    /// Score penalty per lifetime impression
    pub impression_weight: f64,
    /// Upper bound (exclusive) of the uniform jitter added to every score
    pub random_factor: f64,
    /// Score penalty per selection since the last daily reset (0 = reporting only)
    pub daily_exposure_weight: f64,
    /// Width of the boost shuffle bucket, in hours
    pub boost_rotation_interval_hours: i64,
}

/// List price and validity of one promotion type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypePricing {
    /// Whole currency units
    pub price: i64,
    pub duration_days: i64,
}

/// Bundle pricing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub featured: TypePricing,
    pub top_spot: TypePricing,
    pub boost: TypePricing,
    pub urgent: TypePricing,
    pub discount_two: i64,
    pub discount_three: i64,
    pub discount_four: i64,
}

/// Shared secrets for the internal and payment-gateway endpoints
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Bearer secret for maintenance and activation calls
    pub maintenance_secret: String,
    /// HMAC key for payment confirmation webhooks
    pub payment_webhook_secret: String,
    /// Maximum age of a signed webhook timestamp
    pub webhook_tolerance: Duration,
}

/// Reads `key` and parses it, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage = StorageConfig::from_env()?;
        let database = match storage.backend {
            StorageBackend::Postgres => Some(DatabaseConfig::from_env()?),
            StorageBackend::Memory => None,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            storage,
            database,
            rotation: RotationConfig::from_env()?,
            pricing: PricingConfig::from_env()?,
            security: SecurityConfig::from_env()?,
        })
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        Ok(Self {
            backend,
            timeout: Duration::from_millis(env_or("STORAGE_TIMEOUT_MS", 2000)),
        })
    }
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout: Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)),
            idle_timeout: Duration::from_secs(env_or("DATABASE_IDLE_TIMEOUT_SECS", 600)),
            max_lifetime: Duration::from_secs(env_or("DATABASE_MAX_LIFETIME_SECS", 1800)),
        })
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            featured_slots: 2,
            top_spot_slots: 2,
            boost_slots: 10,
            urgent_slots: 4,
            impression_weight: 0.1,
            random_factor: 10.0,
            daily_exposure_weight: 0.0,
            boost_rotation_interval_hours: 1,
        }
    }
}

impl RotationConfig {
    /// Load rotation tuning from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            featured_slots: env_or("FEATURED_SLOTS", defaults.featured_slots),
            top_spot_slots: env_or("TOP_SPOT_SLOTS", defaults.top_spot_slots),
            boost_slots: env_or("BOOST_SLOTS", defaults.boost_slots),
            urgent_slots: env_or("URGENT_SLOTS", defaults.urgent_slots),
            impression_weight: env_or("IMPRESSION_WEIGHT", defaults.impression_weight),
            random_factor: env_or("RANDOM_FACTOR", defaults.random_factor),
            daily_exposure_weight: env_or("DAILY_EXPOSURE_WEIGHT", defaults.daily_exposure_weight),
            boost_rotation_interval_hours: env_or(
                "BOOST_ROTATION_INTERVAL_HOURS",
                defaults.boost_rotation_interval_hours,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, slots) in [
            ("FEATURED_SLOTS", self.featured_slots),
            ("TOP_SPOT_SLOTS", self.top_spot_slots),
            ("BOOST_SLOTS", self.boost_slots),
            ("URGENT_SLOTS", self.urgent_slots),
        ] {
            if !(1..=MAX_SLOTS).contains(&slots) {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: "must be between 1 and 50",
                });
            }
        }
        if self.boost_rotation_interval_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "BOOST_ROTATION_INTERVAL_HOURS",
                reason: "must be at least 1",
            });
        }
        for (key, value) in [
            ("IMPRESSION_WEIGHT", self.impression_weight),
            ("RANDOM_FACTOR", self.random_factor),
            ("DAILY_EXPOSURE_WEIGHT", self.daily_exposure_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: "must be a non-negative number",
                });
            }
        }
        Ok(())
    }

    /// Default number of visible slots for a promotion type
    pub fn slots_for(&self, promotion_type: PromotionType) -> usize {
        match promotion_type {
            PromotionType::Featured => self.featured_slots,
            PromotionType::TopSpot => self.top_spot_slots,
            PromotionType::Boost => self.boost_slots,
            PromotionType::Urgent => self.urgent_slots,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            featured: TypePricing {
                price: 500,
                duration_days: 7,
            },
            top_spot: TypePricing {
                price: 800,
                duration_days: 7,
            },
            boost: TypePricing {
                price: 300,
                duration_days: 3,
            },
            urgent: TypePricing {
                price: 200,
                duration_days: 5,
            },
            discount_two: 200,
            discount_three: 400,
            discount_four: 600,
        }
    }
}

impl PricingConfig {
    /// Load prices, durations and bundle discounts from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let type_pricing = |prefix: &str, default: TypePricing| TypePricing {
            price: env_or(&format!("{}_PRICE", prefix), default.price),
            duration_days: env_or(&format!("{}_DURATION_DAYS", prefix), default.duration_days),
        };

        let config = Self {
            featured: type_pricing("FEATURED", defaults.featured),
            top_spot: type_pricing("TOP_SPOT", defaults.top_spot),
            boost: type_pricing("BOOST", defaults.boost),
            urgent: type_pricing("URGENT", defaults.urgent),
            discount_two: env_or("BUNDLE_DISCOUNT_2", defaults.discount_two),
            discount_three: env_or("BUNDLE_DISCOUNT_3", defaults.discount_three),
            discount_four: env_or("BUNDLE_DISCOUNT_4", defaults.discount_four),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for t in PromotionType::ALL {
            let pricing = self.for_type(t);
            if pricing.price < 0 {
                return Err(ConfigError::InvalidValue {
                    key: "*_PRICE",
                    reason: "prices must not be negative",
                });
            }
            if !(1..=MAX_DURATION_DAYS).contains(&pricing.duration_days) {
                return Err(ConfigError::InvalidValue {
                    key: "*_DURATION_DAYS",
                    reason: "durations must be between 1 and 3650 days",
                });
            }
        }
        if self.discount_two < 0 || self.discount_three < 0 || self.discount_four < 0 {
            return Err(ConfigError::InvalidValue {
                key: "BUNDLE_DISCOUNT_*",
                reason: "discounts must not be negative",
            });
        }
        Ok(())
    }

    pub fn for_type(&self, promotion_type: PromotionType) -> TypePricing {
        match promotion_type {
            PromotionType::Featured => self.featured,
            PromotionType::TopSpot => self.top_spot,
            PromotionType::Boost => self.boost,
            PromotionType::Urgent => self.urgent,
        }
    }

    /// Bundle discount as a step function of the number of types
    pub fn discount_for(&self, bundle_size: usize) -> i64 {
        match bundle_size {
            0 | 1 => 0,
            2 => self.discount_two,
            3 => self.discount_three,
            _ => self.discount_four,
        }
    }
}

impl SecurityConfig {
    /// Load security configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let maintenance_secret = env::var("MAINTENANCE_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("MAINTENANCE_SECRET"))?;
        let payment_webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret("PAYMENT_WEBHOOK_SECRET"))?;

        Ok(Self {
            maintenance_secret,
            payment_webhook_secret,
            webhook_tolerance: Duration::from_secs(env_or("PAYMENT_WEBHOOK_TOLERANCE_SECS", 300)),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
    MissingSecret(&'static str),
    UnknownBackend(String),
    InvalidValue {
        key: &'static str,
        reason: &'static str,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(
                    f,
                    "DATABASE_URL environment variable is required for the postgres backend"
                )
            }
            ConfigError::MissingSecret(key) => {
                write!(f, "{} environment variable is required", key)
            }
            ConfigError::UnknownBackend(backend) => {
                write!(
                    f,
                    "STORAGE_BACKEND '{}' is not supported (use 'postgres' or 'memory')",
                    backend
                )
            }
            ConfigError::InvalidValue { key, reason } => write!(f, "{} {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}
