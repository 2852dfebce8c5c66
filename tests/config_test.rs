use genq::config::Config;
use std::time::Duration;

// Env vars are process-global, so every case runs inside one test.
#[test]
fn config_from_env() {
    let vars = [
        "GENQ_GENERATOR_URL",
        "GENQ_API_KEY",
        "GENQ_CONCURRENCY",
        "GENQ_COOLDOWN_MS",
        "GENQ_EVENT_CAPACITY",
        "GENQ_REQUEST_TIMEOUT_SECS",
    ];
    let clear = || {
        for var in vars {
            unsafe { std::env::remove_var(var) };
        }
    };

    // Missing required URL
    clear();
    assert!(Config::from_env().is_err());

    // Defaults
    unsafe {
        std::env::set_var("GENQ_GENERATOR_URL", "http://localhost:9000/generate");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.generator_url, "http://localhost:9000/generate");
    assert_eq!(config.queue.concurrency, 4);
    assert_eq!(config.queue.cooldown, Duration::from_millis(2000));
    assert!(config.api_key.is_none());
    assert!(config.request_timeout.is_none());
    assert!(!config.log_level.is_empty());

    // Overrides
    unsafe {
        std::env::set_var("GENQ_API_KEY", "sk-test-key");
        std::env::set_var("GENQ_CONCURRENCY", "2");
        std::env::set_var("GENQ_COOLDOWN_MS", "500");
        std::env::set_var("GENQ_REQUEST_TIMEOUT_SECS", "30");
    }
    let config = Config::from_env().unwrap();
    assert!(config.api_key.is_some());
    assert_eq!(config.queue.concurrency, 2);
    assert_eq!(config.queue.cooldown, Duration::from_millis(500));
    assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    // The key must not leak through Debug.
    assert!(!format!("{config:?}").contains("sk-test-key"));

    // Malformed numbers fail fast
    unsafe {
        std::env::set_var("GENQ_COOLDOWN_MS", "soon");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("GENQ_COOLDOWN_MS", "500");
        std::env::set_var("GENQ_CONCURRENCY", "0");
    }
    assert!(Config::from_env().is_err());

    clear();
}
