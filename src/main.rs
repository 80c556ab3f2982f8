use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ip_lease_queue::config::DEFAULT_CONFIG_PATH;
use ip_lease_queue::{AddressSource, AppConfig, MemoryQueue, QueueClient, SqsQueue, Workflow};

#[derive(Parser, Debug)]
#[command(name = "ip-lease-queue")]
#[command(about = "Lease IP addresses from a pool kept on a FIFO queue")]
#[command(version)]
struct Cli {
    /// Name of the queue (overrides QueueName from the config file)
    #[arg(short = 'q', long = "queue", env = "IPAM_QUEUE_NAME")]
    queue: Option<String>,

    /// Send the configured addresses to the queue on startup
    #[arg(short = 'i', long = "init")]
    init: bool,

    /// Config file; `.toml` files are read as TOML, anything else as JSON
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Send queue requests to this endpoint instead of the AWS default
    #[arg(long, env = "IPAM_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Use an in-process queue instead of SQS
    #[arg(long, conflicts_with = "endpoint_url")]
    memory: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("ip_lease_queue=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout belongs to the interactive session
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> AppConfig {
    match AppConfig::from_path(&cli.config) {
        Ok(cfg) => {
            println!("Loaded config from {}", cli.config.display());
            cfg
        }
        Err(e) => {
            warn!(error = %e, "continuing without config file");
            println!("{}", e);
            AppConfig::default()
        }
    }
}

async fn run<Q: QueueClient>(queue: Q, cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    let source = AddressSource::File {
        path: cli.config.clone(),
        fallback: config.seed_addresses.clone(),
    };
    let workflow = Workflow::connect(queue, config, source).await?;
    println!("Using queue {}", workflow.endpoint());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.init {
        workflow
            .seed(&workflow.config().seed_addresses, &mut out)
            .await?;
    }
    workflow.run(io::stdin().lock(), &mut out).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli).with_queue_name(cli.queue.clone());

    let result = if cli.memory {
        let queue = MemoryQueue::new();
        if !config.queue_name.trim().is_empty() {
            queue.create_queue(&config.queue_name).await;
        }
        info!("using in-process queue");
        run(queue, &cli, config).await
    } else {
        println!("Connecting to server...");
        let queue = SqsQueue::from_env(cli.endpoint_url.as_deref()).await;
        run(queue, &cli, config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            println!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
