//! Navigation retries, challenge waits and viability, driven by a scripted engine.

mod common;

use std::sync::Arc;

use prodscrape::{
    Engine, ExtractionError, NavigationController, NavigationError, NavigationOutcome,
    ProductAssembler, ResourceKind,
};
use url::Url;

use common::{fast_config, NavFault, ScriptedEngine, PRODUCT_URL, SHORT};

const NAME_ONLY: &str = r#"<html><body><span id="productTitle">Acme Kettle</span></body></html>"#;
const EMPTY_PAGE: &str = r#"<html><body><div id="nav">Hello, sign in</div></body></html>"#;

fn product_url() -> Url {
    Url::parse(PRODUCT_URL).unwrap()
}

// ─────────────────────── retries ───────────────────────

#[tokio::test]
async fn test_two_detachments_then_success_uses_three_sessions() {
    let engine =
        Arc::new(ScriptedEngine::serving(NAME_ONLY).with_faults(&[NavFault::Detach, NavFault::Detach]));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let record = assembler.assemble(PRODUCT_URL).await.unwrap();

    assert_eq!(record.product_name.as_deref(), Some("Acme Kettle"));
    assert_eq!(engine.created(), 3);
    assert_eq!(engine.closed(), 3);
    assert_eq!(engine.navigations(), 3);
}

#[tokio::test]
async fn test_retry_reports_the_attempt_that_succeeded() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY).with_faults(&[NavFault::Detach]));
    let controller = NavigationController::new(engine.clone(), fast_config());

    let ready = controller.navigate(&product_url()).await.unwrap();
    assert_eq!(ready.attempts, 2);
    assert_eq!(ready.ready_marker.as_deref(), Some("#productTitle"));
    assert_eq!(engine.closed(), 1, "the detached session is released before retrying");

    ready.close().await.unwrap();
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_detachment_budget_exhausts() {
    let engine = Arc::new(
        ScriptedEngine::serving(NAME_ONLY)
            .with_faults(&[NavFault::Detach, NavFault::Detach, NavFault::Detach]),
    );
    let controller = NavigationController::new(engine.clone(), fast_config());

    let err = controller.navigate(&product_url()).await.err().unwrap();
    match err {
        NavigationError::ExhaustedRetries { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, NavigationError::Detachment(_)));
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
    assert_eq!(engine.created(), 3);
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_timeout_is_terminal_by_default() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY).with_faults(&[NavFault::Timeout]));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let err = assembler.assemble(PRODUCT_URL).await.unwrap_err();
    assert!(matches!(
        err,
        ExtractionError::NavigationFailed(NavigationError::Timeout(_))
    ));
    assert_eq!(engine.created(), 1);
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_timeout_retried_when_configured() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY).with_faults(&[NavFault::Timeout]));
    let config = prodscrape::ScrapeConfig {
        retry_on_timeout: true,
        ..fast_config()
    };
    let assembler = ProductAssembler::new(engine.clone(), config);

    assert!(assembler.assemble(PRODUCT_URL).await.is_ok());
    assert_eq!(engine.created(), 2);
}

#[tokio::test]
async fn test_unrecognised_engine_error_is_not_retried() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY).with_faults(&[NavFault::Crash]));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let err = assembler.assemble(PRODUCT_URL).await.unwrap_err();
    assert!(matches!(
        err,
        ExtractionError::NavigationFailed(NavigationError::Engine(_))
    ));
    assert_eq!(engine.created(), 1);
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_setup_failure_is_not_retried() {
    let engine = Arc::new(ScriptedEngine::failing_sessions(NAME_ONLY));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let err = assembler.assemble(PRODUCT_URL).await.unwrap_err();
    assert!(matches!(err, ExtractionError::Setup(_)));
    assert_eq!(err.stage(), "setup");
    assert_eq!(engine.created(), 0);
}

// ─────────────────────── challenge ───────────────────────

#[tokio::test]
async fn test_challenge_clears_after_two_polls() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY).with_challenge(2));
    let controller = NavigationController::new(engine.clone(), fast_config());

    let ready = tokio::time::timeout(SHORT, controller.navigate(&product_url()))
        .await
        .expect("challenge wait should end once the marker is gone")
        .unwrap();

    assert_eq!(ready.outcome, NavigationOutcome::ChallengeResolved { polls: 2 });
    assert_eq!(ready.attempts, 1);
    ready.close().await.unwrap();
}

// ─────────────────────── session preparation ───────────────────────

#[tokio::test]
async fn test_every_session_gets_gate_and_cookie() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY).with_faults(&[NavFault::Detach]));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());
    assembler.assemble(PRODUCT_URL).await.unwrap();

    let gates = engine.gates();
    assert_eq!(gates.len(), 2);
    for gate in &gates {
        assert_eq!(gate.storefront_domain(), "amazon.in");
        assert!(!gate.allow(ResourceKind::Image, "https://ads.example.net/banner.png"));
        assert!(gate.allow(ResourceKind::Image, "https://m.media-amazon.com/images/I/a.jpg"));
    }

    let cookies = engine.cookies();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.domain == ".amazon.in"));
}

// ─────────────────────── viability ───────────────────────

#[tokio::test]
async fn test_no_name_and_no_price_is_not_viable() {
    let engine = Arc::new(ScriptedEngine::serving(EMPTY_PAGE));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let err = assembler.assemble(PRODUCT_URL).await.unwrap_err();
    assert!(matches!(err, ExtractionError::NoViableData { .. }));
    assert_eq!(err.stage(), "extraction");
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_name_alone_is_viable() {
    let engine = Arc::new(ScriptedEngine::serving(NAME_ONLY));
    let assembler = ProductAssembler::new(engine.clone(), fast_config());

    let record = assembler.assemble(PRODUCT_URL).await.unwrap();
    assert_eq!(record.product_name.as_deref(), Some("Acme Kettle"));
    assert!(record.selling_price.is_none());
    assert!(record.bank_offers.is_empty());
    assert_eq!(engine.active_sessions(), 0);
}
