// src/main.rs

use shellrunner::{RunnerError, cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("shellrunner error: {err:?}");
        let code = err
            .downcast_ref::<RunnerError>()
            .and_then(RunnerError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
