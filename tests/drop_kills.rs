#![cfg(unix)]

use std::time::Duration;

use shellrunner::ShellRunner;
use shellrunner_test_utils::builders::ScriptFixture;
use shellrunner_test_utils::probes::wait_until_dead;
use shellrunner_test_utils::{init_tracing, with_timeout};

async fn first_pid(fixture: &ScriptFixture) -> u32 {
    with_timeout(async {
        loop {
            if let Some(pid) = fixture.stdout.lines().first().and_then(|l| l.parse().ok()) {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

#[tokio::test]
async fn dropping_a_running_runner_kills_its_process_tree() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let fixture = ScriptFixture::new("sleep 100 & echo $!; wait");
    let mut runner = ShellRunner::new(fixture.settings.clone());
    runner.start()?;
    let shell = runner.pid().ok_or("missing pid")?;

    let grandchild = first_pid(&fixture).await;

    drop(runner);

    assert!(wait_until_dead(shell, Duration::from_secs(5)).await);
    assert!(wait_until_dead(grandchild, Duration::from_secs(5)).await);
    Ok(())
}

#[tokio::test]
async fn dropping_after_the_shell_exited_kills_its_descendants() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let fixture = ScriptFixture::new("sleep 100 & echo $!");
    let mut runner = ShellRunner::new(fixture.settings.clone());
    runner.start()?;

    let grandchild = first_pid(&fixture).await;
    with_timeout(async {
        while runner.is_running() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    drop(runner);

    assert!(
        wait_until_dead(grandchild, Duration::from_secs(5)).await,
        "grandchild {grandchild} survived"
    );
    Ok(())
}
