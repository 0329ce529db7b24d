//! Integration-level coverage of the error taxonomy actually surfaced
//! across a crate boundary: `PolicyManager::load` is the only fallible
//! public entry point that returns `ConfigError`/`EvoError` (spec §7).

use evochora_core::error::{ConfigError, EvoError};
use evochora_core::isa::registry::Registry;
use evochora_core::policy::config::{OverridesConfig, PolicyClassConfig, ThermodynamicsConfig};
use evochora_core::policy::manager::PolicyManager;

fn registry() -> Registry {
    Registry::init()
}

#[test]
fn unknown_policy_class_name_is_rejected() {
    let config = ThermodynamicsConfig {
        default: PolicyClassConfig {
            class_name: "NoSuchPolicy".into(),
            options: serde_json::Value::Null,
        },
        overrides: OverridesConfig::default(),
    };

    let err = PolicyManager::load(&config, &registry()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownPolicyClass(ref name) if name == "NoSuchPolicy"));
    assert!(err.to_string().contains("NoSuchPolicy"));
}

#[test]
fn config_error_wraps_into_evo_error_with_a_stable_message() {
    let config = ThermodynamicsConfig {
        default: PolicyClassConfig {
            class_name: "NotReal".into(),
            options: serde_json::Value::Null,
        },
        overrides: OverridesConfig::default(),
    };

    let evo_err: EvoError = PolicyManager::load(&config, &registry()).unwrap_err().into();
    assert!(matches!(evo_err, EvoError::Config(ConfigError::UnknownPolicyClass(_))));
    assert!(evo_err.to_string().contains("thermodynamic policy configuration error"));
}

#[test]
fn family_override_for_an_unknown_class_is_rejected_the_same_way_as_default() {
    let mut config = ThermodynamicsConfig {
        default: PolicyClassConfig {
            class_name: "FixedCost".into(),
            options: serde_json::json!({ "energy": 1, "entropy": 1 }),
        },
        overrides: OverridesConfig::default(),
    };
    config
        .overrides
        .families
        .insert("WorldAccess".into(), PolicyClassConfig { class_name: "NotAClass".into(), options: serde_json::Value::Null });

    let err = PolicyManager::load(&config, &registry()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownPolicyClass(ref name) if name == "NotAClass"));
}

#[test]
fn universal_policy_rule_without_a_fixed_or_permille_amount_is_rejected() {
    let config = ThermodynamicsConfig {
        default: PolicyClassConfig {
            class_name: "Universal".into(),
            options: serde_json::json!({
                "base-energy": 1,
                "base-entropy": 1,
                "read-rules": { "own._default": { "energy": {}, "entropy": {} } },
                "write-rules": {},
            }),
        },
        overrides: OverridesConfig::default(),
    };

    let err = PolicyManager::load(&config, &registry()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEntropySpec { .. }), "a rule with neither fixed nor permille set must be rejected, not silently zeroed");
}

#[test]
fn a_well_formed_default_loads_successfully_for_every_registered_opcode() {
    let registry = registry();
    let config = ThermodynamicsConfig {
        default: PolicyClassConfig {
            class_name: "FixedCost".into(),
            options: serde_json::json!({ "energy": 2, "entropy": 3 }),
        },
        overrides: OverridesConfig::default(),
    };

    let policies = PolicyManager::load(&config, &registry).unwrap();
    for def in registry.all() {
        assert!(policies.resolve(def.opcode).is_some(), "every registered opcode must resolve to a policy");
    }
}
