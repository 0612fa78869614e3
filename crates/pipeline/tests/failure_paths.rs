//! Failure and retry scenarios: every path must end with a terminal
//! audit record, a clean scratch area, and no partial output file.

mod common;

use assert_matches::assert_matches;

use reelforge_core::{ErrorKind, PipelineError, RunStatus, Stage};
use reelforge_pipeline::review_channel;
use reelforge_store::StageEventStatus;

#[tokio::test]
async fn zero_scene_script_fails_without_reaching_assembly() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness(tmp.path(), 0);
    let (_handle, gate) = review_channel();

    let err = harness
        .orchestrator
        .execute(common::request(true), gate)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        PipelineError::InvalidStageOutput {
            stage: Stage::Script,
            ..
        }
    );

    let record = common::read_audit(&harness.config.logs_dir).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error.as_ref().unwrap().kind, ErrorKind::InvalidStageOutput);

    // One failed script attempt (invalid output is not retried), and no
    // later stage was ever invoked.
    let script_events = common::stage_events(&record, Stage::Script);
    assert_eq!(script_events.len(), 1);
    assert_eq!(script_events[0].status, StageEventStatus::Failed);
    assert!(common::stage_events(&record, Stage::Visual).is_empty());
    assert!(common::stage_events(&record, Stage::Assembly).is_empty());
    assert!(record.approval.is_none());

    // No output, no leftover scratch.
    assert_eq!(common::dir_file_count(&harness.config.output_dir).await, 0);
    let scratch = harness.config.scratch_dir.join(record.run_id.as_str());
    assert!(tokio::fs::metadata(&scratch).await.is_err());
}

#[tokio::test]
async fn invalid_caller_supplied_script_fails_without_retry() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness(tmp.path(), 4);
    let (_handle, gate) = review_channel();

    let mut request = common::request(true);
    request.custom_script = Some(common::custom_script(0));

    let err = harness.orchestrator.execute(request, gate).await.unwrap_err();
    assert_matches!(
        err,
        PipelineError::InvalidStageOutput {
            stage: Stage::Script,
            ..
        }
    );

    let record = common::read_audit(&harness.config.logs_dir).await;
    assert_eq!(record.status, RunStatus::Failed);
    let script_events = common::stage_events(&record, Stage::Script);
    assert_eq!(script_events.len(), 1);
    assert_eq!(script_events[0].status, StageEventStatus::Failed);
    assert!(common::stage_events(&record, Stage::Visual).is_empty());

    let scratch = harness.config.scratch_dir.join(record.run_id.as_str());
    assert!(tokio::fs::metadata(&scratch).await.is_err());
}

#[tokio::test]
async fn transient_visual_failures_retry_to_the_same_outcome() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness_with(
        tmp.path(),
        common::StaticScript { scenes: 4 },
        common::FlakyImages::failing(2),
    );
    let (_handle, gate) = review_channel();

    let result = harness
        .orchestrator
        .execute(common::request(true), gate)
        .await
        .unwrap();

    // Same terminal status as a run that succeeded on the first attempt.
    assert_eq!(result.status, RunStatus::Approved);
    assert!(result.output.is_some());

    let record = common::read_audit(&harness.config.logs_dir).await;
    let visual_events = common::stage_events(&record, Stage::Visual);
    assert_eq!(visual_events.len(), 3);
    assert_eq!(visual_events[0].status, StageEventStatus::Failed);
    assert_eq!(visual_events[1].status, StageEventStatus::Failed);
    assert_eq!(visual_events[2].status, StageEventStatus::Completed);
    assert_eq!(visual_events[2].attempt, 3);
}

#[tokio::test]
async fn visual_exhaustion_fails_the_run_but_siblings_are_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness_with(
        tmp.path(),
        common::StaticScript { scenes: 4 },
        common::FlakyImages::failing(u32::MAX),
    );
    let (_handle, gate) = review_channel();

    let err = harness
        .orchestrator
        .execute(common::request(true), gate)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        PipelineError::StageUnavailable {
            stage: Stage::Visual,
            ..
        }
    );

    let record = common::read_audit(&harness.config.logs_dir).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error.as_ref().unwrap().kind, ErrorKind::StageUnavailable);

    // Exactly `bound` failed visual attempts.
    let visual_events = common::stage_events(&record, Stage::Visual);
    assert_eq!(visual_events.len(), 3);
    assert!(visual_events.iter().all(|e| e.status == StageEventStatus::Failed));

    // The independent branches still ran to completion and recorded
    // their own outcomes before the barrier failed the run.
    let voice_events = common::stage_events(&record, Stage::Voice);
    assert_eq!(voice_events.len(), 1);
    assert_eq!(voice_events[0].status, StageEventStatus::Completed);
    let music_events = common::stage_events(&record, Stage::Music);
    assert_eq!(music_events.len(), 1);
    assert_eq!(music_events[0].status, StageEventStatus::Completed);

    // Assembly never started; nothing was produced or left behind.
    assert!(common::stage_events(&record, Stage::Assembly).is_empty());
    assert!(record.approval.is_none());
    assert_eq!(common::dir_file_count(&harness.config.output_dir).await, 0);
    let scratch = harness.config.scratch_dir.join(record.run_id.as_str());
    assert!(tokio::fs::metadata(&scratch).await.is_err());
}

#[tokio::test]
async fn broken_assembly_exhausts_retries_and_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness_with_broken_assembly(tmp.path(), 3);
    let (_handle, gate) = review_channel();

    let err = harness
        .orchestrator
        .execute(common::request(true), gate)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        PipelineError::StageUnavailable {
            stage: Stage::Assembly,
            ..
        }
    );

    let record = common::read_audit(&harness.config.logs_dir).await;
    let assembly_events = common::stage_events(&record, Stage::Assembly);
    assert_eq!(assembly_events.len(), 3);
    assert!(record.approval.is_none());
    assert_eq!(common::dir_file_count(&harness.config.output_dir).await, 0);
}

#[tokio::test]
async fn unknown_mood_fails_fast_with_a_terminal_record() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness(tmp.path(), 4);
    let (_handle, gate) = review_channel();

    let mut request = common::request(true);
    request.mood = "furious".into();

    let err = harness.orchestrator.execute(request, gate).await.unwrap_err();
    assert_matches!(err, PipelineError::Configuration(_));

    // Even a run rejected before its first stage leaves a terminal,
    // diagnosable record.
    let record = common::read_audit(&harness.config.logs_dir).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.mood, "furious");
    assert_eq!(record.error.as_ref().unwrap().kind, ErrorKind::Configuration);
    assert!(record.stages.is_empty());
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn empty_topic_fails_fast() {
    let tmp = tempfile::tempdir().unwrap();
    let harness = common::harness(tmp.path(), 4);
    let (_handle, gate) = review_channel();

    let mut request = common::request(true);
    request.topic = "   ".into();

    let err = harness.orchestrator.execute(request, gate).await.unwrap_err();
    assert_matches!(err, PipelineError::Configuration(_));

    let record = common::read_audit(&harness.config.logs_dir).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert!(record.stages.is_empty());
}
