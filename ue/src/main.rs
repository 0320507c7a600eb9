//! Process entry point (§ "process wiring"). Grounded on `ue.cpp`'s
//! `main`/`ExecuteUeTasks`: parse options, load one reference config,
//! derive `count` per-UE configs from it, then run each UE on its own OS
//! thread with its own single-threaded runtime (§4.F: the task loop is
//! cooperative *within* a UE, not across UEs).

mod cli;
mod collaborators;
mod config;
mod error;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use collaborators::{LoggingDataPlane, NoopNas, PassthroughRrcCodec};
use error::UeProcessError;
use ue_core::config::UeConfig;
use ue_core::rls::Sockets;
use ue_core::UeTask;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = cli::parse_args();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build main runtime");

    if let Err(e) = runtime.block_on(run(options)) {
        log::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(options: cli::Options) -> Result<(), UeProcessError> {
    let mut reference_config = config::load_config(&options.config_file).await?;
    if let Some(imsi) = &options.imsi {
        reference_config.supi = Some(format!("imsi-{imsi}"));
    }
    reference_config.configure_routing = !options.no_routing_configs;
    reference_config.disable_cmd = options.disable_cmd;

    let search_space = resolve_search_space(&reference_config)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut handles = Vec::with_capacity(options.count as usize);
    for index in 0..options.count {
        let config = reference_config.derive_for_index(index)?;
        let search_space = search_space.clone();
        let shutdown_rx = shutdown_rx.clone();

        let node_name = config.node_name();
        handles.push(std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build per-UE runtime");
            if let Err(e) = runtime.block_on(run_ue(config, search_space, shutdown_rx)) {
                log::error!(target: &format!("ue::{node_name}"), "UE task terminated with an error: {e}");
            }
        }));
    }

    tokio::signal::ctrl_c().await.ok();
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}

fn resolve_search_space(config: &UeConfig) -> Result<Vec<SocketAddr>, UeProcessError> {
    config
        .gnb_search_list
        .iter()
        .map(|entry| {
            entry
                .parse()
                .map_err(|source| UeProcessError::InvalidSearchEntry { entry: entry.clone(), source })
        })
        .collect()
}

/// `getNodeName()`-derived seed for the STI (§3 glossary): deterministic
/// per node name rather than the original's PRNG, since the core only
/// needs STIs to be distinct and stable across a run, not unguessable.
fn derive_sti(node_name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    node_name.hash(&mut hasher);
    hasher.finish() | 1
}

async fn run_ue(
    config: UeConfig,
    search_space: Vec<SocketAddr>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), UeProcessError> {
    let node_name = config.node_name();
    let log_target = format!("ue::{node_name}");
    log::info!(
        target: &log_target,
        "starting UE task, home plmn mcc={} mnc={}",
        config.home_plmn.mcc,
        config.home_plmn.mnc
    );

    let sockets = Sockets::bind_ephemeral().await?;
    let sti = derive_sti(&node_name);

    // No TUN collaborator is wired up yet (§6 Non-goals), so the sender
    // half is simply never used; a real deployment would hand it to the
    // platform networking layer that reads the UE's TUN device.
    let (_uplink_tx, uplink_rx) = UeTask::<NoopNas, PassthroughRrcCodec, LoggingDataPlane>::uplink_channel();

    let task = UeTask::new(
        sti,
        search_space,
        Some(config.home_plmn),
        sockets,
        NoopNas,
        PassthroughRrcCodec,
        LoggingDataPlane,
        uplink_rx,
    );

    task.run(shutdown_rx).await?;
    log::info!(target: &log_target, "UE task stopped");
    Ok(())
}
