//! Basic retry and circuit breaker usage example

use retry_machines::{CircuitBreaker, RetryPolicy};
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retry_machines=debug".into()),
        )
        .init();

    println!("=== Retry Basic Example ===\n");

    let policy = RetryPolicy::builder()
        .max_attempts(4)
        .sleep_fn(|_attempt, previous| {
            if previous.is_zero() {
                Duration::from_millis(50)
            } else {
                (previous * 2).min(Duration::from_millis(200))
            }
        })
        .on_retry(|error: &String, ctx| println!("🔁 attempt {} failed: {}", ctx.attempt(), error))
        .on_failure(|error| println!("💥 giving up: {}", error))
        .build();

    let mut calls = 0;
    match policy.call(|| {
        calls += 1;
        if calls < 3 {
            Err(format!("Payment gateway timeout {}", calls))
        } else {
            Ok(format!("Payment accepted after {} calls", calls))
        }
    }) {
        Ok(result) => println!("✓ {}\n", result),
        Err(e) => println!("✗ {}\n", e),
    }

    println!("=== Circuit Breaker Basic Example ===\n");

    let mut circuit = CircuitBreaker::builder("payment_api")
        .threshold(3)
        .cooldown_secs(1.0)
        .sleep_sequence([Duration::from_millis(20)])
        .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
        .on_close(|name| println!("🟢 Circuit '{}' closed!", name))
        .build();

    println!("Initial state: {}\n", circuit.state_name());

    println!("--- Triggering failures ---");
    let receipt = circuit.call(
        |ctx| format!("fallback ({})", ctx.reason),
        || Err::<String, _>("Payment failed".to_string()),
    );
    println!("Result: {}", receipt);
    println!("State: {} (circuit opened)\n", circuit.state_name());

    println!("--- Attempting call while open ---");
    let receipt = circuit.call(
        |ctx| format!("fallback ({})", ctx.reason),
        || Ok::<_, String>("Should be skipped".to_string()),
    );
    println!("Result: {}\n", receipt);

    println!("--- Waiting for cooldown ---");
    std::thread::sleep(Duration::from_millis(1100));
    let receipt = circuit.call(
        |ctx| format!("fallback ({})", ctx.reason),
        || Ok::<_, String>("Payment successful".to_string()),
    );
    println!("Result: {}", receipt);
    println!("State: {}", circuit.state_name());
}
