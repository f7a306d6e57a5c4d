use tracing_subscriber::EnvFilter;
use yadisk_mirror::config::MirrorConfig;
use yadisk_mirror::runtime::MirrorRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Once,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--once" => mode = CliMode::Once,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: yadisk-mirror [--once]");
        println!("  --once   Run a bootstrap and one incremental pass, then exit");
        println!();
        println!("Configuration comes from the environment or a .env file:");
        println!("  YADISK_SYNC_DIR, YADISK_REMOTE_ROOT, YADISK_TOKEN (required)");
        println!("  YADISK_SYNC_INTERVAL_SECS, YADISK_MAX_CONCURRENT_REQUESTS,");
        println!("  YADISK_DIRECTORY_WORKERS, YADISK_PERMANENT_DELETE, YADISK_API_URL");
        return Ok(());
    }

    init_tracing();
    let config = MirrorConfig::from_env()?;
    let runtime = MirrorRuntime::connect(config).await?;
    match mode {
        CliMode::Once => {
            runtime.run_once().await?;
            Ok(())
        }
        _ => runtime.run().await,
    }
}
