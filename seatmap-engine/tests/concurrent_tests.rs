//! Concurrency, timeout and backend-failure tests for the orchestrator

mod helpers;

use helpers::*;
use seatmap_engine::recognition::{RecognitionError, RoleIndicators};
use seatmap_engine::types::SELF_MARKER;
use seatmap_engine::{
    CallerTier, DiscardReason, EngineError, EvidenceImage, MappingJob, MappingOrchestrator,
};
use std::sync::Arc;
use std::time::Duration;

fn many_images(count: usize) -> Vec<EvidenceImage> {
    (0..count).map(|i| image(&format!("shot{:02}.png", i))).collect()
}

#[tokio::test]
async fn test_standard_tier_never_exceeds_ceiling() {
    let recognizer = Arc::new(ScriptedRecognizer::new().with_delay(Duration::from_millis(20)));
    let config = test_config();
    let ceiling = config.standard_concurrency;
    let orchestrator = MappingOrchestrator::new(recognizer.clone(), config).unwrap();

    let output = orchestrator
        .run(MappingJob {
            records: vec![role_fixture_record()],
            evidence: many_images(12),
            tier: CallerTier::Standard,
        })
        .await
        .unwrap();

    assert!(recognizer.peak_in_flight() <= ceiling);
    assert!(output.statistics.calls.peak_in_flight <= ceiling);
    assert_eq!(output.statistics.calls.ceiling, ceiling);
    // Unscripted identity fails twice per evidence
    assert_eq!(output.statistics.calls.identity_calls, 24);
    assert_eq!(output.discards().len(), 12);
}

#[tokio::test]
async fn test_priority_tier_uses_higher_ceiling() {
    let recognizer = Arc::new(ScriptedRecognizer::new().with_delay(Duration::from_millis(50)));
    let config = test_config();
    let (standard, priority) = (config.standard_concurrency, config.priority_concurrency);
    let orchestrator = MappingOrchestrator::new(recognizer.clone(), config).unwrap();

    let output = orchestrator
        .run(MappingJob {
            records: vec![],
            evidence: many_images(12),
            tier: CallerTier::Priority,
        })
        .await
        .unwrap();

    let peak = recognizer.peak_in_flight();
    assert!(peak <= priority, "peak {} above ceiling {}", peak, priority);
    assert!(peak > standard, "peak {} never rose above the standard ceiling", peak);
    assert_eq!(output.statistics.calls.ceiling, priority);
}

#[tokio::test]
async fn test_timeout_is_an_ordinary_failure() {
    let recognizer = Arc::new(
        ScriptedRecognizer::new()
            .with_delay(Duration::from_millis(300))
            .identity("slow.png", identified("RC100")),
    );
    let mut config = test_config();
    config.recognition.timeout = Duration::from_millis(30);
    let orchestrator = MappingOrchestrator::new(recognizer.clone(), config).unwrap();

    let output = orchestrator
        .run(MappingJob {
            records: vec![role_fixture_record()],
            evidence: vec![image("slow.png")],
            ..MappingJob::default()
        })
        .await
        .unwrap();

    let audit = output.evidence_audit("slow.png").unwrap();
    assert_eq!(audit.discard_reason(), Some(DiscardReason::IdentityFailed));
    assert_eq!(audit.identity_error.as_deref(), Some("timeout"));
    assert_eq!(output.statistics.calls.timeouts, 2);
    assert_eq!(recognizer.detail_calls("slow.png"), 0);
}

#[tokio::test]
async fn test_configuration_error_aborts_job() {
    let recognizer = Arc::new(
        ScriptedRecognizer::new()
            .identity("ok.png", identified("RC100"))
            .identity(
                "bad.png",
                Err(RecognitionError::Configuration("credentials refused".to_string())),
            ),
    );
    let orchestrator = MappingOrchestrator::new(recognizer, test_config()).unwrap();

    let result = orchestrator
        .run(MappingJob {
            records: vec![role_fixture_record()],
            evidence: vec![image("ok.png"), image("bad.png")],
            ..MappingJob::default()
        })
        .await;

    assert!(matches!(
        result,
        Err(EngineError::RecognitionBackend(RecognitionError::Configuration(_)))
    ));
}

#[tokio::test]
async fn test_unavailable_backend_in_detail_pass_aborts_job() {
    let recognizer = Arc::new(
        ScriptedRecognizer::new()
            .identity("a.png", identified("RC100"))
            .details(
                "a.png",
                Err(RecognitionError::Unavailable("connection refused".to_string())),
            ),
    );
    let orchestrator = MappingOrchestrator::new(recognizer, test_config()).unwrap();

    let result = orchestrator
        .run(MappingJob {
            records: vec![role_fixture_record()],
            evidence: vec![image("a.png")],
            ..MappingJob::default()
        })
        .await;

    assert!(matches!(
        result,
        Err(EngineError::RecognitionBackend(RecognitionError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn test_concurrent_jobs_are_isolated() {
    let seats = [(1, SELF_MARKER, 100.0), (2, "a1b2c3", 100.0)];
    let recognizer = Arc::new(
        ScriptedRecognizer::new()
            .with_delay(Duration::from_millis(5))
            .identity("x.png", identified("RC1"))
            .details(
                "x.png",
                detailed(
                    vec![player("Hero", 100.0, 1), player("Foo", 100.0, 2)],
                    "Hero",
                    RoleIndicators::default(),
                ),
            ),
    );
    let orchestrator = Arc::new(MappingOrchestrator::new(recognizer, test_config()).unwrap());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let orchestrator = Arc::clone(&orchestrator);
        let records = vec![record("RC1", "Aurora", 1, &seats)];
        tasks.spawn(async move {
            orchestrator
                .run(MappingJob {
                    records,
                    evidence: vec![image("x.png")],
                    ..MappingJob::default()
                })
                .await
        });
    }

    let mut job_ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let output = joined.unwrap().unwrap();
        assert_eq!(output.name_maps()["Aurora"]["a1b2c3"], "Foo");
        assert_eq!(output.statistics.calls.identity_calls, 1);
        job_ids.push(output.job_id);
    }

    job_ids.sort();
    job_ids.dedup();
    assert_eq!(job_ids.len(), 4);
}
