//! Job lifecycle against real processes: start, completion, output capture,
//! stop, and the race between the two.


use std::collections::HashSet;
use std::time::Duration;

use job_worker::error::JobError;
use job_worker::registry::JobStatus;
use test_harness::{args, assert_eventually, test_service, wait_for_terminal};

const FINISH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_echo_succeeds_with_exact_output() {
    let service = test_service();

    let id = service
        .start_job("echo", &args(&["hello world"]))
        .await
        .expect("echo should start");
    assert!(!id.is_empty());

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.stdout, "hello world\n");
    assert_eq!(job.stderr, "");
    assert_eq!(job.command, "echo");
    assert_eq!(job.args, vec!["hello world".to_string()]);
    assert!(job.finished_at.is_some());

    let output = service.output(&id).await.unwrap();
    assert_eq!(output.stdout, "hello world\n");
    assert_eq!(output.stderr, "");
}

#[tokio::test]
async fn test_non_zero_exit_is_failed() {
    let service = test_service();

    let id = service
        .start_job("sh", &args(&["-c", "echo 'error message' >&2; exit 3"]))
        .await
        .unwrap();

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.exit_code, Some(3));
    assert_eq!(job.stdout, "");
    assert_eq!(job.stderr, "error message\n");
}

#[tokio::test]
async fn test_large_output_is_captured_completely() {
    let service = test_service();

    let id = service.start_job("seq", &args(&["1", "20000"])).await.unwrap();

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.stdout.lines().count(), 20000);
    assert_eq!(job.stdout.lines().last(), Some("20000"));
}

#[tokio::test]
async fn test_missing_executable_is_start_failure() {
    let service = test_service();

    let err = service
        .start_job("nonexistent_command_12345", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::StartFailure { ref command, .. } if command == "nonexistent_command_12345"));

    // Nothing was registered under the id that was allocated for it.
    assert!(service.registry().is_empty().await);
    assert!(matches!(
        service.status("1").await,
        Err(JobError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let service = test_service();

    assert!(matches!(
        service.status("nonexistent").await,
        Err(JobError::NotFound(id)) if id == "nonexistent"
    ));
    assert!(matches!(
        service.output("nonexistent").await,
        Err(JobError::NotFound(_))
    ));
    assert!(matches!(
        service.stop_job("nonexistent").await,
        Err(JobError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_running_job_reports_running_and_empty_output() {
    let service = test_service();

    let id = service
        .start_job("sh", &args(&["-c", "echo early; echo oops >&2; sleep 10"]))
        .await
        .unwrap();

    // Let the process write its first lines; they must stay invisible.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(service.status(&id).await.unwrap(), JobStatus::Running);
    let output = service.output(&id).await.unwrap();
    assert_eq!(output.stdout, "");
    assert_eq!(output.stderr, "");
    assert_eq!(service.job(&id).await.unwrap().exit_code, None);

    service.stop_job(&id).await.unwrap();
    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.stdout, "early\n");
    assert_eq!(job.stderr, "oops\n");
}

#[tokio::test]
async fn test_stop_sleep_is_stopped() {
    let service = test_service();

    let id = service.start_job("sleep", &args(&["10"])).await.unwrap();
    service.stop_job(&id).await.expect("stop should succeed");

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Stopped);
    // Killed by a signal, so the OS reports no exit code.
    assert_eq!(job.exit_code, None);
}

#[tokio::test]
async fn test_stop_is_never_reported_as_failed() {
    let service = test_service();

    // Exits non-zero when it receives SIGTERM.
    let id = service
        .start_job("sh", &args(&["-c", "trap 'exit 7' TERM; while true; do sleep 0.05; done"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    service.stop_job(&id).await.unwrap();

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Stopped);
}

#[tokio::test]
async fn test_sigterm_ignoring_process_is_killed_after_grace() {
    let service = test_service();

    let id = service
        .start_job("sh", &args(&["-c", "trap '' TERM; sleep 30"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = tokio::time::Instant::now();
    service.stop_job(&id).await.unwrap();

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(
        started.elapsed() >= Duration::from_millis(400),
        "SIGKILL should only follow the grace period"
    );
}

#[tokio::test]
async fn test_stop_reaches_background_children_holding_output() {
    let service = test_service();

    // The shell exits at once; the background sleep keeps stdout open.
    let id = service
        .start_job("sh", &args(&["-c", "sleep 4 & echo hi"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.status(&id).await.unwrap(), JobStatus::Running);

    service.stop_job(&id).await.unwrap();

    let job = wait_for_terminal(&service, &id, Duration::from_secs(2)).await;
    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.stdout, "hi\n");
}

#[tokio::test]
async fn test_sigterm_ignoring_group_member_is_killed_after_grace() {
    let service = test_service();

    // The shell dies on SIGTERM, the subshell ignores it and holds the pipes.
    let id = service
        .start_job("sh", &args(&["-c", "(trap '' TERM; sleep 5) & sleep 30"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = tokio::time::Instant::now();
    service.stop_job(&id).await.unwrap();

    let job = wait_for_terminal(&service, &id, Duration::from_secs(2)).await;
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(
        started.elapsed() >= Duration::from_millis(400),
        "group members should get the grace period before SIGKILL"
    );
}

#[tokio::test]
async fn test_double_stop_is_idempotent() {
    let service = test_service();

    let id = service.start_job("sleep", &args(&["10"])).await.unwrap();
    service.stop_job(&id).await.unwrap();
    service.stop_job(&id).await.unwrap();

    let job = wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
    assert_eq!(job.status, JobStatus::Stopped);

    service.stop_job(&id).await.unwrap();
    assert_eq!(service.status(&id).await.unwrap(), JobStatus::Stopped);
}

#[tokio::test]
async fn test_stop_after_finish_keeps_terminal_status() {
    let service = test_service();

    let ok = service.start_job("true", &[]).await.unwrap();
    let failed = service.start_job("false", &[]).await.unwrap();

    let ok_job = wait_for_terminal(&service, &ok, FINISH_TIMEOUT).await;
    let failed_job = wait_for_terminal(&service, &failed, FINISH_TIMEOUT).await;
    assert_eq!(ok_job.status, JobStatus::Succeeded);
    assert_eq!(failed_job.status, JobStatus::Failed);
    assert_eq!(failed_job.exit_code, Some(1));

    service.stop_job(&ok).await.expect("late stop should succeed");
    service.stop_job(&failed).await.expect("late stop should succeed");

    // Give a (wrongly) reacting supervisor time to overwrite anything.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(service.job(&ok).await.unwrap(), ok_job);
    assert_eq!(service.job(&failed).await.unwrap(), failed_job);
}

#[tokio::test]
async fn test_start_returns_before_process_finishes() {
    let service = test_service();

    let started = tokio::time::Instant::now();
    let id = service.start_job("sleep", &args(&["5"])).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(service.status(&id).await.unwrap(), JobStatus::Running);

    service.stop_job(&id).await.unwrap();
    wait_for_terminal(&service, &id, FINISH_TIMEOUT).await;
}

#[tokio::test]
async fn test_sequential_ids_are_distinct_and_increasing() {
    let service = test_service();

    let first = service.start_job("echo", &args(&["job1"])).await.unwrap();
    let second = service.start_job("echo", &args(&["job2"])).await.unwrap();
    let third = service.start_job("echo", &args(&["job3"])).await.unwrap();

    let parse = |id: &str| id.parse::<u64>().expect("ids are decimal counters");
    assert!(parse(&first) < parse(&second));
    assert!(parse(&second) < parse(&third));

    for (id, expected) in [(&first, "job1\n"), (&second, "job2\n"), (&third, "job3\n")] {
        let job = wait_for_terminal(&service, id, FINISH_TIMEOUT).await;
        assert_eq!(job.stdout, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_get_unique_ids() {
    let service = test_service();

    let mut handles = Vec::new();
    for i in 0..32 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .start_job("echo", &[format!("job-{}", i)])
                .await
                .expect("echo should start")
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()), "duplicate job id issued");
    }
    assert_eq!(ids.len(), 32);
    assert_eq!(service.registry().len().await, 32);

    let service_ref = &service;
    assert_eventually(
        || async move { service_ref.registry().running_count().await == 0 },
        FINISH_TIMEOUT,
        "all echo jobs should finish",
    )
    .await;

    for id in &ids {
        assert_eq!(service.status(id).await.unwrap(), JobStatus::Succeeded);
    }
}

#[tokio::test]
async fn test_independent_services_do_not_share_jobs() {
    let a = test_service();
    let b = test_service();

    let id = a.start_job("true", &[]).await.unwrap();
    assert!(matches!(b.status(&id).await, Err(JobError::NotFound(_))));
}
