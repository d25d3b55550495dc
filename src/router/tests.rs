//! 上游路由器测试
//!
//! 脚本化后端 + 暂停时钟，退避等待不占用真实时间。

use crate::backends::scripted::{Scripted, ScriptedBackend};
use crate::backends::BackendError;
use crate::credential::{ConfiguredSecrets, CredentialPool, PoolBuilder};
use crate::models::{ChatMessage, Dialect, DialectSet, ModelEntry, RoutingClass};
use crate::resilience::{FailureClass, RetryConfig, TimeoutConfig};
use crate::router::state::{after_outcome, CallVerdict, RouteState};
use crate::router::UpstreamRouter;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const BASE_URL: &str = "https://upstream.test/v1";

fn chat_only() -> ModelEntry {
    ModelEntry::chat("gpt-4o", RoutingClass::Reverse, "openai")
}

fn responses_first() -> ModelEntry {
    ModelEntry::new(
        "gpt-5.2",
        DialectSet::Both,
        Dialect::Responses,
        RoutingClass::Reverse,
        "openai",
    )
}

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage::new("user", "hi")]
}

fn pool(pairs: &[(&str, &str)], class: RoutingClass) -> CredentialPool {
    let mut secrets = ConfiguredSecrets::new();
    for (name, raw) in pairs {
        secrets.insert_raw(name, raw);
    }
    PoolBuilder::default().build(class, &secrets)
}

fn router(backend: Arc<ScriptedBackend>) -> UpstreamRouter {
    UpstreamRouter::new(
        backend,
        BASE_URL,
        RetryConfig::default(),
        TimeoutConfig::new(60_000, 0),
    )
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_then_success_on_third_attempt() {
    let backend = Arc::new(ScriptedBackend::new().script(
        "r1",
        vec![
            Scripted::error(429, "Too many requests"),
            Scripted::error(429, "Too many requests"),
            Scripted::chat_ok("third time lucky"),
        ],
    ));
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);

    let started = Instant::now();
    let result = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &pool)
        .await;

    assert!(result.succeeded);
    assert_eq!(result.text, "third time lucky");
    assert_eq!(result.diagnostics.attempt, 3);
    assert_eq!(result.diagnostics.credential_index, Some(0));
    assert_eq!(result.diagnostics.pool.as_deref(), Some("reverse"));
    assert_eq!(result.diagnostics.calls, 3);
    // base 500ms：第 1 次后 1000ms，第 2 次后 2000ms
    assert_eq!(result.diagnostics.backoff_ms, 3000);
    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert!(backend.calls().iter().all(|c| c.credential == "r1"));
}

#[tokio::test(start_paused = true)]
async fn test_auth_rejected_advances_without_backoff() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("r1", vec![Scripted::error(401, "invalid api key")])
            .script("o1", vec![Scripted::chat_ok("from official")]),
    );
    let pool = pool(&[("reverse", "r1"), ("official", "o1")], RoutingClass::Reverse);

    let started = Instant::now();
    let result = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &pool)
        .await;

    assert!(result.succeeded);
    assert_eq!(result.text, "from official");
    assert_eq!(result.diagnostics.pool.as_deref(), Some("official"));
    assert_eq!(result.diagnostics.credential_index, Some(0));
    assert_eq!(result.diagnostics.attempt, 1);
    assert_eq!(result.diagnostics.backoff_ms, 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_model_not_found_400_advances_without_backoff() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script(
                "r1",
                vec![Scripted::error(400, "The model `gpt-4o` does not exist")],
            )
            .script("r2", vec![Scripted::chat_ok("ok")]),
    );
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);

    let result = router(backend).route(&chat_only(), &messages(), 0.7, &pool).await;

    assert!(result.succeeded);
    assert_eq!(result.diagnostics.credential_index, Some(1));
    assert_eq!(result.diagnostics.backoff_ms, 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_exhaust_all_credentials() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script(
                "r1",
                vec![
                    Scripted::error(500, "boom r1-1"),
                    Scripted::error(500, "boom r1-2"),
                    Scripted::error(500, "boom r1-3"),
                ],
            )
            .script(
                "r2",
                vec![
                    Scripted::error(502, "boom r2-1"),
                    Scripted::error(500, "boom r2-2"),
                    Scripted::error(500, "last boom"),
                ],
            ),
    );
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);

    let result = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &pool)
        .await;

    assert!(!result.succeeded);
    assert!(result.text.is_empty());
    assert_eq!(result.status_code(), 503);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.detail, "last boom");
    assert_eq!(failure.raw["error"]["message"], "last boom");
    assert_eq!(result.diagnostics.calls, 6);
    assert_eq!(result.diagnostics.credential_index, Some(1));
    assert_eq!(result.diagnostics.attempt, 3);
    assert_eq!(result.diagnostics.backoff_ms, 6000);
    assert_eq!(backend.calls().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_rate_limit_maps_to_429() {
    let backend = Arc::new(ScriptedBackend::new().script(
        "r1",
        vec![
            Scripted::error(429, "slow down"),
            Scripted::error(429, "slow down"),
            Scripted::error(429, "still slow"),
        ],
    ));
    let pool = pool(&[("reverse", "r1")], RoutingClass::Reverse);

    let result = router(backend).route(&chat_only(), &messages(), 0.7, &pool).await;

    assert!(!result.succeeded);
    assert_eq!(result.status_code(), 429);
    assert_eq!(result.failure.unwrap().detail, "still slow");
}

#[tokio::test(start_paused = true)]
async fn test_chat_only_model_never_sends_responses_payload() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("r1", vec![Scripted::error(500, "down"); 3])
            .script("o1", vec![Scripted::error(404, "gone")]),
    );
    let pool = pool(&[("reverse", "r1"), ("official", "o1")], RoutingClass::Reverse);

    let _ = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &pool)
        .await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 4);
    for call in calls {
        assert_eq!(call.dialect, Dialect::Chat);
        assert!(call.url.ends_with("/chat/completions"));
        assert!(call.payload.get("input").is_none());
        assert!(call.payload.get("messages").is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_dialect_fallback_shares_attempt_slot() {
    let backend = Arc::new(ScriptedBackend::new().script(
        "r1",
        vec![
            Scripted::error(404, "unknown endpoint /responses"),
            Scripted::chat_ok("chat shape answer"),
        ],
    ));
    let pool = pool(&[("reverse", "r1")], RoutingClass::Reverse);

    let result = router(backend.clone())
        .route(&responses_first(), &messages(), 0.7, &pool)
        .await;

    assert!(result.succeeded);
    assert_eq!(result.text, "chat shape answer");
    assert_eq!(result.diagnostics.dialect, Some(Dialect::Chat));
    assert_eq!(result.diagnostics.attempt, 1);
    assert_eq!(result.diagnostics.calls, 2);

    let calls = backend.calls();
    assert_eq!(calls[0].dialect, Dialect::Responses);
    assert!(calls[0].payload.get("input").is_some());
    assert_eq!(calls[1].dialect, Dialect::Chat);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_dialect_rate_limit_backs_off_before_next_attempt() {
    let backend = Arc::new(ScriptedBackend::new().script(
        "r1",
        vec![
            Scripted::Transport(BackendError::network("connection reset")),
            Scripted::error(429, "busy"),
            Scripted::responses_ok("second attempt"),
        ],
    ));
    let pool = pool(&[("reverse", "r1")], RoutingClass::Reverse);

    let result = router(backend).route(&responses_first(), &messages(), 0.7, &pool).await;

    assert!(result.succeeded);
    assert_eq!(result.diagnostics.attempt, 2);
    assert_eq!(result.diagnostics.dialect, Some(Dialect::Responses));
    assert_eq!(result.diagnostics.calls, 3);
    assert_eq!(result.diagnostics.backoff_ms, 1000);
}

#[tokio::test(start_paused = true)]
async fn test_empty_200_advances_without_backoff_or_dialect_fallback() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("r1", vec![Scripted::responses_ok("   ")])
            .script("r2", vec![Scripted::responses_ok("real text")]),
    );
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);

    let result = router(backend.clone())
        .route(&responses_first(), &messages(), 0.7, &pool)
        .await;

    assert!(result.succeeded);
    assert_eq!(result.diagnostics.credential_index, Some(1));
    assert_eq!(result.diagnostics.backoff_ms, 0);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_all_empty_is_never_a_success() {
    let backend = Arc::new(ScriptedBackend::new().script("r1", vec![Scripted::chat_ok("")]));
    let pool = pool(&[("reverse", "r1")], RoutingClass::Reverse);

    let result = router(backend).route(&chat_only(), &messages(), 0.7, &pool).await;

    assert!(!result.succeeded);
    assert_eq!(result.status_code(), 503);
    assert!(result.text.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_pool_is_exhausted_immediately() {
    let backend = Arc::new(ScriptedBackend::new());
    let result = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &CredentialPool::default())
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.diagnostics.calls, 0);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_gemini_key_degrades_to_reverse() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("g1", vec![Scripted::error(401, "invalid key")])
            .script("r1", vec![Scripted::chat_ok("via reverse")]),
    );
    let pool = pool(&[("gemini", "g1"), ("reverse", "r1")], RoutingClass::Gemini);
    let gemini = ModelEntry::chat("gemini-3-pro-preview", RoutingClass::Gemini, "google");

    let result = router(backend.clone()).route(&gemini, &messages(), 0.7, &pool).await;

    assert!(result.succeeded);
    assert_eq!(result.text, "via reverse");
    assert_eq!(result.diagnostics.pool.as_deref(), Some("reverse"));
    assert_eq!(result.diagnostics.backoff_ms, 0);
    let order: Vec<String> = backend.calls().into_iter().map(|c| c.credential).collect();
    assert_eq!(order, vec!["g1", "r1"]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_advances_without_backoff() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script(
                "r1",
                vec![Scripted::Transport(BackendError::invalid_request("bad url")); 3],
            )
            .script("r2", vec![Scripted::chat_ok("second key works")]),
    );
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);

    let started = Instant::now();
    let result = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &pool)
        .await;

    assert!(result.succeeded);
    assert_eq!(result.diagnostics.credential_index, Some(1));
    assert_eq!(result.diagnostics.calls, 2);
    assert_eq!(result.diagnostics.backoff_ms, 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
    let r1_calls = backend.calls().iter().filter(|c| c.credential == "r1").count();
    assert_eq!(r1_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_exhausts_single_credential_once() {
    let backend = Arc::new(ScriptedBackend::new().script(
        "r1",
        vec![Scripted::Transport(BackendError::invalid_request("bad url")); 3],
    ));
    let pool = pool(&[("reverse", "r1")], RoutingClass::Reverse);

    let result = router(backend.clone())
        .route(&chat_only(), &messages(), 0.7, &pool)
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.status_code(), 503);
    assert_eq!(result.diagnostics.calls, 1);
    assert_eq!(result.diagnostics.backoff_ms, 0);
    let failure = result.failure.expect("failure detail");
    assert_eq!(failure.detail, "InvalidRequest: bad url");
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_is_transient() {
    let backend = Arc::new(ScriptedBackend::new().script(
        "r1",
        vec![Scripted::Hang, Scripted::chat_ok("after timeout")],
    ));
    let pool = pool(&[("reverse", "r1")], RoutingClass::Reverse);
    let router = UpstreamRouter::new(
        backend,
        BASE_URL,
        RetryConfig::default(),
        TimeoutConfig::new(1000, 0),
    );

    let result = router.route(&chat_only(), &messages(), 0.7, &pool).await;

    assert!(result.succeeded);
    assert_eq!(result.diagnostics.attempt, 2);
    assert_eq!(result.diagnostics.backoff_ms, 1000);
}

#[tokio::test(start_paused = true)]
async fn test_request_budget_bounds_total_latency() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("r1", vec![Scripted::Hang; 3])
            .script("r2", vec![Scripted::Hang; 3]),
    );
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);
    let router = UpstreamRouter::new(
        backend.clone(),
        BASE_URL,
        RetryConfig::default(),
        TimeoutConfig::new(1000, 1500),
    );

    let started = Instant::now();
    let result = router.route(&chat_only(), &messages(), 0.7, &pool).await;

    assert!(!result.succeeded);
    assert_eq!(result.status_code(), 503);
    assert!(started.elapsed() <= Duration::from_millis(1500));
    assert_eq!(backend.calls().len(), 2);
    assert!(result.failure.unwrap().detail.contains("超时"));
}

#[tokio::test(start_paused = true)]
async fn test_cumulative_backoff_cap_stops_retries() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("r1", vec![Scripted::error(503, "busy"); 3])
            .script("r2", vec![Scripted::chat_ok("second credential")]),
    );
    let pool = pool(&[("reverse", "r1,r2")], RoutingClass::Reverse);
    let router = UpstreamRouter::new(
        backend.clone(),
        BASE_URL,
        RetryConfig {
            max_total_backoff_ms: 1500,
            ..RetryConfig::default()
        },
        TimeoutConfig::new(60_000, 0),
    );

    let result = router.route(&chat_only(), &messages(), 0.7, &pool).await;

    assert!(result.succeeded);
    assert_eq!(result.diagnostics.credential_index, Some(1));
    // 第一次退避 1000ms 在预算内，第二次 2000ms 超出
    assert_eq!(result.diagnostics.backoff_ms, 1000);
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_echo_roundtrip_through_router() {
    for entry in [chat_only(), responses_first()] {
        let backend = Arc::new(ScriptedBackend::new());
        let router = router(backend.clone());
        // 先跑一次拿到实际 payload，再用它构造回声响应
        let single = pool(&[("reverse", "k1")], RoutingClass::Reverse);
        let _ = router.route(&entry, &messages(), 0.7, &single).await;
        let sent = backend.calls().remove(0);
        let echoed = match sent.dialect {
            Dialect::Chat => Scripted::chat_ok(
                sent.payload["messages"][0]["content"].as_str().unwrap_or_default(),
            ),
            Dialect::Responses => Scripted::responses_ok(
                sent.payload["input"][0]["content"].as_str().unwrap_or_default(),
            ),
        };

        let backend = Arc::new(ScriptedBackend::new().script("echo", vec![echoed]));
        let echo_pool = pool(&[("reverse", "echo")], RoutingClass::Reverse);
        let result = super::UpstreamRouter::new(
            backend,
            BASE_URL,
            RetryConfig::default(),
            TimeoutConfig::new(60_000, 0),
        )
        .route(&entry, &messages(), 0.7, &echo_pool)
        .await;
        assert!(result.succeeded);
        assert_eq!(result.text, "hi");
    }
}

fn arb_class() -> impl Strategy<Value = FailureClass> {
    prop_oneof![
        Just(FailureClass::Success),
        Just(FailureClass::RateLimited),
        Just(FailureClass::AuthRejected),
        Just(FailureClass::Transient),
        Just(FailureClass::ContentEmpty),
        Just(FailureClass::Other),
    ]
}

proptest! {
    /// 只有可重试类别且仍有尝试次数时才进入退避
    #[test]
    fn prop_backoff_only_for_retryable(
        class in arb_class(),
        wants_fallback in any::<bool>(),
        has_fallback in any::<bool>(),
        attempts_left in any::<bool>(),
        slot in 0usize..8,
        attempt in 1u32..5,
    ) {
        let verdict = CallVerdict {
            class,
            wants_dialect_fallback: wants_fallback,
            has_fallback_dialect: has_fallback,
            attempts_left,
        };
        let state = RouteState::TryFallbackDialect { slot, attempt };
        let next = after_outcome(state, &verdict);
        if matches!(next, RouteState::BackoffWait { .. }) {
            prop_assert!(class.is_retryable() && attempts_left);
        }
        if class == FailureClass::Success {
            prop_assert_eq!(next, RouteState::Success);
        }
    }

    /// 回退方言状态不会再次进入回退方言
    #[test]
    fn prop_fallback_dialect_at_most_once(
        class in arb_class(),
        attempts_left in any::<bool>(),
        attempt in 1u32..5,
    ) {
        let verdict = CallVerdict {
            class,
            wants_dialect_fallback: true,
            has_fallback_dialect: true,
            attempts_left,
        };
        let next = after_outcome(RouteState::TryFallbackDialect { slot: 0, attempt }, &verdict);
        let is_fallback = matches!(next, RouteState::TryFallbackDialect { .. });
        prop_assert!(!is_fallback);
    }
}
