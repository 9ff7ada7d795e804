use quitguard::auth::{LockPolicy, PolicyConfig};
use quitguard::clock::ManualClock;
use quitguard::error::SecurityError;
use quitguard::store::{KeyValueStore, MemoryStore, ALL_SECURITY_KEYS, LAST_ACTIVITY_KEY};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const LOCKOUT: Duration = Duration::from_secs(300);
const AUTO_LOCK: Duration = Duration::from_secs(300);

fn setup() -> (Arc<LockPolicy>, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let policy = LockPolicy::new(store.clone(), clock.clone(), PolicyConfig::default());
    (Arc::new(policy), store, clock)
}

fn fail_times(policy: &LockPolicy, pin: &str, n: usize) {
    for _ in 0..n {
        assert!(policy.verify_pin(pin).is_err());
    }
}

#[test]
fn test_setup_then_verify() {
    let (policy, _, _) = setup();
    for pin in ["1234", "0000", "123456", "abcd", "৯৮৭৬"] {
        policy.setup_pin(pin).expect("setup should succeed");
        policy.verify_pin(pin).expect("verify should succeed");
    }
    assert!(policy.is_pin_enabled().unwrap());
}

#[test]
fn test_short_pin_rejected_and_nothing_persisted() {
    let (policy, store, _) = setup();
    for pin in ["", "1", "12", "123"] {
        let err = policy.setup_pin(pin).unwrap_err();
        assert!(matches!(err, SecurityError::WeakInput { min_len: 4 }));
    }
    assert!(store.is_empty(), "No state should be persisted for weak PINs");
    assert!(!policy.is_pin_enabled().unwrap());
}

#[test]
fn test_verify_without_pin() {
    let (policy, _, _) = setup();
    assert!(matches!(
        policy.verify_pin("1234"),
        Err(SecurityError::PinNotSet)
    ));
    assert_eq!(policy.failed_attempts().unwrap(), 0);
}

#[test]
fn test_wrong_pin_counts_down() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();

    for expected_remaining in (1..=4).rev() {
        match policy.verify_pin("0000") {
            Err(SecurityError::VerificationFailed {
                remaining_attempts,
                locked_for: None,
            }) => assert_eq!(remaining_attempts, expected_remaining),
            other => panic!("unexpected result: {:?}", other),
        }
    }
    assert_eq!(policy.failed_attempts().unwrap(), 4);
    assert!(!policy.is_locked().unwrap());
}

#[test]
fn test_correct_pin_resets_counter() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 3);

    policy.verify_pin("1234").unwrap();
    assert_eq!(policy.failed_attempts().unwrap(), 0);
}

#[test]
fn test_lockout_after_five_failures() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 4);

    // Fifth failure starts the lockout
    match policy.verify_pin("0000") {
        Err(SecurityError::VerificationFailed {
            remaining_attempts: 0,
            locked_for: Some(d),
        }) => assert_eq!(d, LOCKOUT),
        other => panic!("unexpected result: {:?}", other),
    }

    // Sixth call fails even with the correct PIN, without consuming an attempt
    assert!(matches!(
        policy.verify_pin("1234"),
        Err(SecurityError::LockedOut { .. })
    ));
    assert!(policy.is_locked().unwrap());
    assert!(policy.remaining_lock_time().unwrap() > Duration::ZERO);
    assert_eq!(policy.failed_attempts().unwrap(), 5);
}

#[test]
fn test_lockout_remaining_time_counts_down() {
    let (policy, _, clock) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 5);

    assert_eq!(policy.remaining_lock_time().unwrap(), LOCKOUT);
    clock.advance(Duration::from_secs(120));
    assert_eq!(
        policy.remaining_lock_time().unwrap(),
        Duration::from_secs(180)
    );

    match policy.verify_pin("1234") {
        Err(SecurityError::LockedOut { remaining }) => {
            assert_eq!(remaining, Duration::from_secs(180))
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_lockout_expiry() {
    let (policy, _, clock) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 5);
    assert!(policy.is_locked().unwrap());

    clock.advance(LOCKOUT + Duration::from_millis(1));

    assert!(!policy.is_locked().unwrap());
    assert_eq!(policy.remaining_lock_time().unwrap(), Duration::ZERO);
    assert_eq!(policy.failed_attempts().unwrap(), 0, "Expired lockout resets attempts");

    policy.verify_pin("1234").expect("correct PIN after expiry");
    assert_eq!(policy.failed_attempts().unwrap(), 0);
}

#[test]
fn test_lockout_scenario_1234() {
    let (policy, _, clock) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 5);

    assert!(matches!(
        policy.verify_pin("1234"),
        Err(SecurityError::LockedOut { .. })
    ));

    clock.advance(LOCKOUT);
    policy.verify_pin("1234").expect("should succeed once the window has passed");
}

#[test]
fn test_wrong_pin_after_expiry_starts_fresh_count() {
    let (policy, _, clock) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 5);
    clock.advance(LOCKOUT);

    match policy.verify_pin("0000") {
        Err(SecurityError::VerificationFailed {
            remaining_attempts, ..
        }) => assert_eq!(remaining_attempts, 4),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_change_pin_wrong_old() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();

    assert!(matches!(
        policy.change_pin("9999", "5678"),
        Err(SecurityError::VerificationFailed { .. })
    ));
    assert_eq!(policy.failed_attempts().unwrap(), 1, "Failed change consumes an attempt");

    policy.verify_pin("1234").expect("original PIN still valid");
    assert!(policy.verify_pin("5678").is_err());
}

#[test]
fn test_change_pin_correct_old() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();

    policy.change_pin("1234", "5678").unwrap();

    policy.verify_pin("5678").expect("new PIN valid");
    assert!(policy.verify_pin("1234").is_err(), "old PIN no longer valid");
}

#[test]
fn test_change_pin_weak_new_pin_consumes_nothing() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();

    assert!(matches!(
        policy.change_pin("0000", "12"),
        Err(SecurityError::WeakInput { .. })
    ));
    assert_eq!(policy.failed_attempts().unwrap(), 0);
    policy.verify_pin("1234").unwrap();
}

#[test]
fn test_disable_pin() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();

    assert!(policy.disable_pin("0000").is_err());
    assert!(policy.is_pin_enabled().unwrap());

    policy.disable_pin("1234").unwrap();
    assert!(!policy.is_pin_enabled().unwrap());
    assert_eq!(policy.failed_attempts().unwrap(), 0);
    assert!(matches!(
        policy.verify_pin("1234"),
        Err(SecurityError::PinNotSet)
    ));
}

#[test]
fn test_disable_refused_during_lockout() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();
    fail_times(&policy, "0000", 5);

    assert!(matches!(
        policy.disable_pin("1234"),
        Err(SecurityError::LockedOut { .. })
    ));
    assert!(policy.is_pin_enabled().unwrap());
}

#[test]
fn test_biometric_flag() {
    let (policy, _, _) = setup();
    assert!(!policy.is_biometric_enabled().unwrap());
    policy.enable_biometric().unwrap();
    assert!(policy.is_biometric_enabled().unwrap());
    policy.disable_biometric().unwrap();
    assert!(!policy.is_biometric_enabled().unwrap());
}

#[test]
fn test_auto_lock_requires_pin() {
    let (policy, _, clock) = setup();
    policy.update_last_activity().unwrap();
    clock.advance(Duration::from_secs(3600));
    assert!(!policy.should_auto_lock().unwrap(), "No PIN, never auto-lock");
}

#[test]
fn test_auto_lock_without_recorded_activity() {
    let (policy, _, clock) = setup();
    policy.setup_pin("1234").unwrap();
    clock.advance(Duration::from_secs(3600));
    assert!(!policy.should_auto_lock().unwrap());
}

#[test]
fn test_auto_lock_timing() {
    let (policy, _, clock) = setup();
    policy.setup_pin("1234").unwrap();
    policy.update_last_activity().unwrap();

    clock.advance(AUTO_LOCK - Duration::from_secs(1));
    assert!(!policy.should_auto_lock().unwrap());

    clock.advance(Duration::from_secs(1));
    assert!(policy.should_auto_lock().unwrap(), "Exactly at the timeout locks");

    policy.update_last_activity().unwrap();
    assert!(!policy.should_auto_lock().unwrap(), "Reset by new activity");
}

#[test]
fn test_auto_lock_custom_timeout() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let config = PolicyConfig {
        auto_lock_timeout: Duration::from_secs(60),
        ..PolicyConfig::default()
    };
    let policy = LockPolicy::new(store, clock.clone(), config);
    policy.setup_pin("1234").unwrap();
    policy.update_last_activity().unwrap();

    clock.advance(Duration::from_secs(60));
    assert!(policy.should_auto_lock().unwrap());
    assert_eq!(
        policy.security_settings().unwrap().auto_lock_timeout,
        Duration::from_secs(60)
    );
}

#[test]
fn test_security_settings() {
    let (policy, _, _) = setup();
    let settings = policy.security_settings().unwrap();
    assert!(!settings.pin_enabled);
    assert!(!settings.biometric_enabled);
    assert!(settings.auto_lock_enabled);
    assert_eq!(settings.auto_lock_timeout, AUTO_LOCK);

    policy.setup_pin("1234").unwrap();
    policy.enable_biometric().unwrap();
    let settings = policy.security_settings().unwrap();
    assert!(settings.pin_enabled);
    assert!(settings.biometric_enabled);
}

#[test]
fn test_clear_security_data() {
    let (policy, store, _) = setup();
    policy.setup_pin("1234").unwrap();
    policy.enable_biometric().unwrap();
    policy.update_last_activity().unwrap();
    fail_times(&policy, "0000", 2);
    store.set("journal.day1", "kept").unwrap();

    policy.clear_security_data().unwrap();

    for key in ALL_SECURITY_KEYS {
        assert_eq!(store.get(key).unwrap(), None, "{} should be cleared", key);
    }
    assert_eq!(store.get("journal.day1").unwrap(), Some("kept".to_string()));
    assert_eq!(store.get(LAST_ACTIVITY_KEY).unwrap(), None);
    assert!(!policy.is_pin_enabled().unwrap());
}

#[test]
fn test_concurrent_wrong_attempts_all_counted() {
    let (policy, _, _) = setup();
    policy.setup_pin("1234").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let policy = policy.clone();
            thread::spawn(move || {
                let _ = policy.verify_pin("0000");
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(policy.failed_attempts().unwrap(), 4);
    assert!(!policy.is_locked().unwrap());
}
