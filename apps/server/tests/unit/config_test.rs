//! Unit tests for configuration parsing
//!
//! Tests environment variable parsing and default values.
//!
//! Note: These tests modify global environment variables and must run serially.

use promoslot::config::{
    ConfigError, PricingConfig, RotationConfig, SecurityConfig, StorageBackend, StorageConfig,
};
use promoslot::models::PromotionType;
use serial_test::serial;
use std::time::Duration;

const ROTATION_VARS: [&str; 8] = [
    "FEATURED_SLOTS",
    "TOP_SPOT_SLOTS",
    "BOOST_SLOTS",
    "URGENT_SLOTS",
    "IMPRESSION_WEIGHT",
    "RANDOM_FACTOR",
    "DAILY_EXPOSURE_WEIGHT",
    "BOOST_ROTATION_INTERVAL_HOURS",
];

fn clear(vars: &[&str]) {
    for var in vars {
        std::env::remove_var(var);
    }
}

// =============================================================================
// Rotation Config Tests
// =============================================================================

#[test]
#[serial]
fn test_rotation_config_defaults() {
    clear(&ROTATION_VARS);

    let config = RotationConfig::from_env().unwrap();

    assert_eq!(config, RotationConfig::default());
    assert_eq!(config.slots_for(PromotionType::Featured), 2);
    assert_eq!(config.slots_for(PromotionType::TopSpot), 2);
    assert_eq!(config.slots_for(PromotionType::Boost), 10);
    assert_eq!(config.slots_for(PromotionType::Urgent), 4);
    assert_eq!(config.impression_weight, 0.1);
    assert_eq!(config.random_factor, 10.0);
    assert_eq!(config.daily_exposure_weight, 0.0);
}

#[test]
#[serial]
fn test_rotation_config_custom_values() {
    std::env::set_var("FEATURED_SLOTS", "3");
    std::env::set_var("IMPRESSION_WEIGHT", "0.25");
    std::env::set_var("DAILY_EXPOSURE_WEIGHT", "1.5");
    std::env::set_var("BOOST_ROTATION_INTERVAL_HOURS", "6");

    let config = RotationConfig::from_env().unwrap();

    assert_eq!(config.featured_slots, 3);
    assert_eq!(config.impression_weight, 0.25);
    assert_eq!(config.daily_exposure_weight, 1.5);
    assert_eq!(config.boost_rotation_interval_hours, 6);

    clear(&ROTATION_VARS);
}

#[test]
#[serial]
fn test_rotation_config_invalid_values_use_defaults() {
    std::env::set_var("FEATURED_SLOTS", "many");
    std::env::set_var("RANDOM_FACTOR", "abc");

    let config = RotationConfig::from_env().unwrap();

    assert_eq!(config.featured_slots, 2);
    assert_eq!(config.random_factor, 10.0);

    clear(&ROTATION_VARS);
}

#[test]
#[serial]
fn test_rotation_config_rejects_negative_weights() {
    std::env::set_var("IMPRESSION_WEIGHT", "-1");

    let result = RotationConfig::from_env();
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue {
            key: "IMPRESSION_WEIGHT",
            ..
        })
    ));

    clear(&ROTATION_VARS);
}

#[test]
#[serial]
fn test_rotation_config_rejects_zero_boost_interval() {
    std::env::set_var("BOOST_ROTATION_INTERVAL_HOURS", "0");

    assert!(RotationConfig::from_env().is_err());

    clear(&ROTATION_VARS);
}

#[test]
#[serial]
fn test_rotation_config_rejects_out_of_range_slots() {
    std::env::set_var("FEATURED_SLOTS", "0");

    assert!(matches!(
        RotationConfig::from_env(),
        Err(ConfigError::InvalidValue {
            key: "FEATURED_SLOTS",
            ..
        })
    ));

    clear(&ROTATION_VARS);
    std::env::set_var("BOOST_SLOTS", "51");

    assert!(matches!(
        RotationConfig::from_env(),
        Err(ConfigError::InvalidValue {
            key: "BOOST_SLOTS",
            ..
        })
    ));

    std::env::set_var("BOOST_SLOTS", "50");
    assert_eq!(RotationConfig::from_env().unwrap().boost_slots, 50);

    clear(&ROTATION_VARS);
}

// =============================================================================
// Pricing Config Tests
// =============================================================================

#[test]
#[serial]
fn test_pricing_config_overrides() {
    std::env::set_var("BOOST_PRICE", "350");
    std::env::set_var("URGENT_DURATION_DAYS", "10");
    std::env::set_var("BUNDLE_DISCOUNT_2", "150");

    let config = PricingConfig::from_env().unwrap();

    assert_eq!(config.boost.price, 350);
    assert_eq!(config.urgent.duration_days, 10);
    assert_eq!(config.discount_for(2), 150);
    assert_eq!(config.featured.price, 500);

    clear(&["BOOST_PRICE", "URGENT_DURATION_DAYS", "BUNDLE_DISCOUNT_2"]);
}

#[test]
#[serial]
fn test_pricing_config_rejects_zero_duration() {
    std::env::set_var("FEATURED_DURATION_DAYS", "0");

    assert!(PricingConfig::from_env().is_err());

    clear(&["FEATURED_DURATION_DAYS"]);
}

#[test]
#[serial]
fn test_pricing_config_rejects_unbounded_duration() {
    std::env::set_var("FEATURED_DURATION_DAYS", "200000000");

    assert!(matches!(
        PricingConfig::from_env(),
        Err(ConfigError::InvalidValue { .. })
    ));

    std::env::set_var("FEATURED_DURATION_DAYS", "3650");
    assert_eq!(PricingConfig::from_env().unwrap().featured.duration_days, 3650);

    clear(&["FEATURED_DURATION_DAYS"]);
}

// =============================================================================
// Storage & Security Config Tests
// =============================================================================

#[test]
#[serial]
fn test_storage_config_backend_selection() {
    std::env::set_var("STORAGE_BACKEND", "memory");
    std::env::set_var("STORAGE_TIMEOUT_MS", "250");

    let config = StorageConfig::from_env().unwrap();
    assert_eq!(config.backend, StorageBackend::Memory);
    assert_eq!(config.timeout, Duration::from_millis(250));

    std::env::set_var("STORAGE_BACKEND", "redis");
    assert!(matches!(
        StorageConfig::from_env(),
        Err(ConfigError::UnknownBackend(_))
    ));

    clear(&["STORAGE_BACKEND", "STORAGE_TIMEOUT_MS"]);
    assert_eq!(
        StorageConfig::from_env().unwrap().backend,
        StorageBackend::Postgres
    );
}

#[test]
#[serial]
fn test_security_config_requires_secrets() {
    clear(&["MAINTENANCE_SECRET", "PAYMENT_WEBHOOK_SECRET"]);
    assert!(matches!(
        SecurityConfig::from_env(),
        Err(ConfigError::MissingSecret("MAINTENANCE_SECRET"))
    ));

    std::env::set_var("MAINTENANCE_SECRET", "m");
    std::env::set_var("PAYMENT_WEBHOOK_SECRET", "   ");
    assert!(matches!(
        SecurityConfig::from_env(),
        Err(ConfigError::MissingSecret("PAYMENT_WEBHOOK_SECRET"))
    ));

    std::env::set_var("PAYMENT_WEBHOOK_SECRET", "w");
    let config = SecurityConfig::from_env().unwrap();
    assert_eq!(config.maintenance_secret, "m");
    assert_eq!(config.webhook_tolerance, Duration::from_secs(300));

    clear(&["MAINTENANCE_SECRET", "PAYMENT_WEBHOOK_SECRET"]);
}
