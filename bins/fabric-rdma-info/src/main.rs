mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fabric_logging::{init_logging, LogConfig};
use fabric_rdma::{Md, SimDevice, Worker, RDMA_TL_COMPONENT};

use output::{pool_rows, OutputFormat, Printer};

/// Prefix of environment overrides, followed by the transport's own prefix
/// (e.g. `FABRIC_RDMA_MAX_BCOPY`).
const ENV_PREFIX: &str = "FABRIC_";

/// Open an RDMA interface on a device and report what it offers.
#[derive(Parser, Debug)]
#[command(name = "fabric-rdma-info", version, about)]
struct Cli {
    /// Interface configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device to open.
    #[arg(short, long, default_value = "sim0")]
    device: String,

    /// NIC address of the simulated device.
    #[arg(long, default_value_t = 1)]
    nic_addr: u32,

    /// Output format (table or json).
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Also write logs to files in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        log_dir: cli.log_dir.clone(),
        ..LogConfig::console(if cli.verbose { "debug" } else { "warn" })
    };
    let _log_guard = init_logging(&log_config).context("failed to initialize logging")?;

    let tl = &RDMA_TL_COMPONENT;
    let config = tl
        .read_config(cli.config.as_deref(), ENV_PREFIX, std::env::vars())
        .context("failed to read interface config")?;

    let md = Md::new(Arc::new(SimDevice::new(cli.device.as_str(), cli.nic_addr)));
    let worker = Worker::new();
    let mut printer = Printer::stdout(cli.format);

    let resources = (tl.query_resources)(&md);
    printer.print_resources(&resources)?;

    let iface = (tl.iface_open)(&md, &worker, &cli.device, 0, config)
        .with_context(|| format!("failed to open {} interface on {}", tl.name, cli.device))?;
    tracing::debug!(addr = %iface.get_address(), "interface open");

    printer.print_attr(&iface.query())?;
    if let Some(pools) = iface.pools() {
        printer.print_pools(&pool_rows(pools))?;
    }

    iface.destroy();
    Ok(())
}
