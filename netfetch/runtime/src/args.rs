use crate::{
    cluster::KubeCluster,
    core::{target, Dialect, Mode, ProtectionCache, Retention, ScanResult, Scanner},
    dashboard::{self, Dashboard},
    report, TerminalPrompt,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{stream, Stream, StreamExt};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

/// The conventional exit status for a process terminated by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Parser)]
#[clap(
    name = "netfetch",
    about = "Finds pods that no network policy protects",
    version
)]
pub struct Args {
    #[clap(
        long,
        default_value = "netfetch=info,warn",
        env = "NETFETCH_LOG",
        global = true
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", global = true)]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scans namespaces for pods that no policy protects.
    Scan(ScanArgs),

    /// Serves scan results as JSON. Never modifies the cluster except through
    /// explicit add-policy requests.
    Dash(DashArgs),
}

#[derive(Debug, clap::Args)]
struct ScanArgs {
    /// Limits the scan to a single namespace.
    namespace: Option<String>,

    /// Reports findings without offering to create policies.
    #[clap(long)]
    dry_run: bool,

    /// Scans Kubernetes network policies. This is the default.
    #[clap(long)]
    native: bool,

    /// Scans Cilium network policies.
    #[clap(long)]
    cilium: bool,

    /// Lists the pods targeted by the named policy instead of scanning.
    #[clap(long, value_name = "POLICY")]
    target: Option<String>,

    /// Writes the scan results to a JSON file.
    #[clap(long, short)]
    output: Option<PathBuf>,

    /// The number of namespaces fetched concurrently.
    #[clap(long, default_value = "4")]
    fetch_concurrency: usize,
}

#[derive(Debug, clap::Args)]
struct DashArgs {
    #[clap(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// How long a pod proven protected is trusted before it is re-evaluated.
    #[clap(long, default_value = "300")]
    cache_ttl_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            command,
        } = self;

        log_format.try_init(log_level)?;

        let client = client
            .try_client()
            .await
            .context("failed to build a Kubernetes client")?;
        let cluster = Arc::new(KubeCluster::new(client));

        match command {
            Command::Scan(args) => args.run(cluster).await,
            Command::Dash(args) => args.run(cluster).await,
        }
    }
}

// === impl ScanArgs ===

impl ScanArgs {
    async fn run(self, cluster: Arc<KubeCluster>) -> Result<()> {
        let Self {
            namespace,
            dry_run,
            native,
            cilium,
            target,
            output,
            fetch_concurrency,
        } = self;
        let dialects = dialects(native, cilium);

        if let Some(name) = target {
            for dialect in dialects {
                inspect_target(&cluster, dialect, &name).await?;
            }
            return Ok(());
        }

        let mode = if dry_run {
            Mode::DryRun
        } else {
            Mode::Interactive(Arc::new(TerminalPrompt))
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(interrupts(cancel_tx));

        // One cache for every pass in this session.
        let scanner = Scanner::new(cluster, ProtectionCache::new(Retention::Session))
            .with_mode(mode)
            .with_fetch_concurrency(fetch_concurrency)
            .with_cancel(cancel_rx);

        let mut results = Vec::<ScanResult>::with_capacity(dialects.len());
        for dialect in dialects {
            println!("Policy type: {}", report::dialect_name(dialect));
            let result = scanner
                .scan(dialect, namespace.as_deref())
                .instrument(info_span!("scan", %dialect))
                .await?;
            report::print(&result, &mut std::io::stdout().lock())?;
            let cancelled = result.cancelled;
            results.push(result);
            if cancelled {
                break;
            }
        }

        if let Some(path) = output {
            report::write_json(&path, &results)?;
            println!("Results written to {}", path.display());
        }
        Ok(())
    }
}

async fn inspect_target(cluster: &Arc<KubeCluster>, dialect: Dialect, name: &str) -> Result<()> {
    println!("Policy type: {}", report::dialect_name(dialect));
    println!(
        "Searching for {} network policy '{name}' across all non-system namespaces...",
        report::dialect_name(dialect)
    );

    let policy = match target::find_policy(cluster, dialect, name).await? {
        Some(policy) => policy,
        None => {
            println!("Policy '{name}' not found.");
            return Ok(());
        }
    };
    let pods = target::targeted_pods(cluster, &policy).await?;
    report::print_targets(&policy, &pods, &mut std::io::stdout().lock())?;
    Ok(())
}

/// Publishes cancellation on the first interrupt and exits the process on the
/// second.
async fn interrupts(cancel: watch::Sender<bool>) {
    let signals = stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
    });
    if second_interrupt(signals, &cancel).await {
        warn!("Interrupted again; exiting");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
}

/// Resolves to `true` when a second interrupt arrives after cancellation was
/// published.
async fn second_interrupt(
    signals: impl Stream<Item = ()>,
    cancel: &watch::Sender<bool>,
) -> bool {
    tokio::pin!(signals);
    if signals.next().await.is_none() {
        return false;
    }
    info!("Interrupted; finishing the current namespace. Interrupt again to exit");
    let _ = cancel.send(true);
    signals.next().await.is_some()
}

/// Kubernetes policies are scanned unless only Cilium was requested.
fn dialects(native: bool, cilium: bool) -> Vec<Dialect> {
    match (native, cilium) {
        (_, false) => vec![Dialect::Kubernetes],
        (false, true) => vec![Dialect::Cilium],
        (true, true) => vec![Dialect::Kubernetes, Dialect::Cilium],
    }
}

// === impl DashArgs ===

impl DashArgs {
    async fn run(self, cluster: Arc<KubeCluster>) -> Result<()> {
        let cache = ProtectionCache::new(Retention::Ttl(Duration::from_secs(self.cache_ttl_secs)));
        let dashboard = Dashboard::new(cluster, cache);
        dashboard::serve(self.addr, dashboard, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_selection() {
        assert_eq!(dialects(false, false), vec![Dialect::Kubernetes]);
        assert_eq!(dialects(true, false), vec![Dialect::Kubernetes]);
        assert_eq!(dialects(false, true), vec![Dialect::Cilium]);
        assert_eq!(
            dialects(true, true),
            vec![Dialect::Kubernetes, Dialect::Cilium]
        );
    }

    #[tokio::test]
    async fn second_interrupt_exits() {
        let (tx, rx) = watch::channel(false);
        assert!(second_interrupt(stream::iter([(), ()]), &tx).await);
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn single_interrupt_only_cancels() {
        let (tx, rx) = watch::channel(false);
        assert!(!second_interrupt(stream::iter([()]), &tx).await);
        assert!(*rx.borrow());

        let (tx, rx) = watch::channel(false);
        assert!(!second_interrupt(stream::empty(), &tx).await);
        assert!(!*rx.borrow());
    }

    #[test]
    fn parses_scan_args() {
        let args = Args::try_parse_from([
            "netfetch",
            "scan",
            "shop",
            "--cilium",
            "--dry-run",
            "--output",
            "out.json",
        ])
        .expect("args must parse");
        match args.command {
            Command::Scan(scan) => {
                assert_eq!(scan.namespace.as_deref(), Some("shop"));
                assert!(scan.cilium);
                assert!(!scan.native);
                assert!(scan.dry_run);
                assert_eq!(scan.output, Some(PathBuf::from("out.json")));
                assert_eq!(scan.fetch_concurrency, 4);
            }
            Command::Dash(_) => panic!("expected scan"),
        }
    }

    #[test]
    fn parses_dash_args() {
        let args = Args::try_parse_from(["netfetch", "dash", "--cache-ttl-secs", "60"])
            .expect("args must parse");
        match args.command {
            Command::Dash(dash) => {
                assert_eq!(dash.addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
                assert_eq!(dash.cache_ttl_secs, 60);
            }
            Command::Scan(_) => panic!("expected dash"),
        }
    }
}
