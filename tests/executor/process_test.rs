//! Tests for running batches against a scripted muninlite process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use muninlite_bridge::cache::CacheManager;
use muninlite_bridge::executor::{ExecutionError, ProcessExecutor, ProtocolExecutor};
use muninlite_bridge::service::MuninService;
use tokio_util::sync::CancellationToken;

use crate::common::{sh_executor, write_script, FAKE_MUNIN};

fn commands(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| (*c).to_string()).collect()
}

#[tokio::test]
async fn header_batch_is_split_per_command() {
    let dir = tempfile::tempdir().unwrap();
    let executor = sh_executor(&write_script(dir.path(), FAKE_MUNIN));

    let responses = executor
        .execute(&commands(&["nodes", "version", "list"]))
        .await
        .unwrap();

    assert_eq!(
        responses,
        vec![
            "testhost",
            "munins node on testhost version: 1.2.3",
            "disk cpu"
        ]
    );
}

#[tokio::test]
async fn multi_line_blocks_are_kept_whole() {
    let dir = tempfile::tempdir().unwrap();
    let executor = sh_executor(&write_script(dir.path(), FAKE_MUNIN));

    let responses = executor
        .execute(&commands(&["config disk", "config cpu", "fetch disk"]))
        .await
        .unwrap();

    assert_eq!(
        responses,
        vec![
            "graph_title Disk usage\ngraph_vlabel bytes",
            "graph_title CPU usage",
            "used.value 42"
        ]
    );
}

#[tokio::test]
async fn transcript_includes_banner() {
    let dir = tempfile::tempdir().unwrap();
    let executor = sh_executor(&write_script(dir.path(), FAKE_MUNIN));

    let transcript = executor.transcript(&commands(&["list"])).await.unwrap();

    assert_eq!(transcript, "# munin node at testhost\ndisk cpu\n");
}

#[tokio::test]
async fn short_output_pads_missing_responses() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo '# munin node at testhost'\nprintf 'testhost\\n.\\n'\n";
    let executor = sh_executor(&write_script(dir.path(), script));

    let responses = executor
        .execute(&commands(&["nodes", "version", "list"]))
        .await
        .unwrap();

    assert_eq!(responses, vec!["testhost", "", ""]);
}

#[tokio::test]
async fn service_round_trip_through_process() {
    let dir = tempfile::tempdir().unwrap();
    let executor = sh_executor(&write_script(dir.path(), FAKE_MUNIN));
    let service = MuninService::new(CacheManager::new(Arc::new(executor)));

    let responses = service.all_responses().await.unwrap();

    assert_eq!(responses.len(), 7);
    assert_eq!(responses["nodes"], "testhost\n.\n");
    assert_eq!(responses["list"], "disk cpu\n");
    assert_eq!(
        responses["config disk"],
        "graph_title Disk usage\ngraph_vlabel bytes\n.\n"
    );
    assert_eq!(responses["fetch cpu"], "user.value 7\n.\n");
}

#[tokio::test]
async fn non_zero_exit_carries_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo '# munin node at testhost'\necho 'plugin exploded' >&2\nexit 3\n";
    let executor = sh_executor(&write_script(dir.path(), script));

    let err = executor
        .execute(&commands(&["fetch disk"]))
        .await
        .unwrap_err();

    match &err {
        ExecutionError::NonZeroExit { status, output } => {
            assert_eq!(status.code(), Some(3));
            assert!(output.contains("# munin node at testhost"));
            assert!(output.contains("plugin exploded"));
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn stderr_is_framed_with_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo '# munin node at testhost'\necho 'plugin warning' >&2\necho '1.2.3'\n";
    let executor = sh_executor(&write_script(dir.path(), script));

    let batch = commands(&["version"]);
    let transcript = executor.transcript(&batch).await.unwrap();
    assert_eq!(transcript, "# munin node at testhost\nplugin warning\n1.2.3\n");

    let responses = executor.execute(&batch).await.unwrap();
    assert_eq!(responses, vec!["plugin warning"]);
}

#[tokio::test]
async fn missing_binary_is_resource_missing() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ProcessExecutor::new(dir.path().join("muninlite"));

    let err = executor.execute(&commands(&["list"])).await.unwrap_err();

    assert!(matches!(err, ExecutionError::ResourceMissing(_)));
}

#[tokio::test]
async fn hung_process_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let executor = sh_executor(&write_script(dir.path(), "exec sleep 10\n"))
        .timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = executor.execute(&commands(&["list"])).await.unwrap_err();

    assert!(matches!(err, ExecutionError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_stops_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let executor = sh_executor(&write_script(dir.path(), "exec sleep 10\n"))
        .cancel_token(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = executor.execute(&commands(&["list"])).await.unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(err, ExecutionError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn caller_timeout_kills_the_child() {
    use nix::errno::Errno;
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
    use nix::unistd::Pid;

    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("munin.pid");
    let script = format!("echo $$ > '{}'\nexec sleep 10\n", pidfile.display());
    let executor = sh_executor(&write_script(dir.path(), &script));

    let batch = commands(&["list"]);
    let result = tokio::time::timeout(Duration::from_millis(300), executor.execute(&batch)).await;
    assert!(result.is_err());

    let pid: i32 = std::fs::read_to_string(&pidfile)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let pid = Pid::from_raw(pid);

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Ok(WaitStatus::StillAlive) => panic!("munin process {pid} outlived the dropped run"),
            // ECHILD: tokio already reaped it.
            Ok(_) | Err(Errno::ECHILD) => break,
            Err(e) => panic!("waitpid failed: {e}"),
        }
    }
}
