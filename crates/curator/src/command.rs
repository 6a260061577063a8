use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use curator_core::job::{job_fn, JobFn};
use tokio::process::Command;

/// Build a job body that runs an external program.
///
/// `argv[0]` is the program; the rest are its arguments. Exit status and
/// duration are logged; a failing command is not retried.
pub fn command_job(name: &str, argv: Vec<String>) -> JobFn {
    let name: Arc<str> = Arc::from(name);
    let argv: Arc<[String]> = Arc::from(argv);

    job_fn(move || {
        let name = name.clone();
        let argv = argv.clone();
        async move {
            run_command(&name, &argv).await;
        }
    })
}

async fn run_command(name: &str, argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        tracing::error!(job = %name, "Job has no command");
        return;
    };

    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match output {
        Ok(output) if output.status.success() => {
            tracing::info!(job = %name, duration_ms, "Command succeeded");
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                job = %name,
                duration_ms,
                status = %output.status,
                stderr = %stderr.trim(),
                "Command failed"
            );
        }
        Err(e) => {
            tracing::error!(job = %name, program = %program, error = %e, "Failed to spawn command");
        }
    }
}
