//! lanctl - LAN remote-control client
//!
//! Discovers a control service by UDP broadcast, connects to it, and issues
//! process-control commands against the live host/process catalog.

use clap::{Parser, Subcommand};
use colored::Colorize;
use lanctl_client::{
    subnet_broadcast, DiscoveryClient, DiscoveryConfig, ServiceSession, SessionConfig,
    SessionEvent,
};
use lanctl_protocol::{Catalog, Command};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lanctl")]
#[command(about = "Remote-control client for broadcast-discovered LAN services")]
#[command(version)]
struct Cli {
    /// Subnet prefix to broadcast on (three octets)
    #[arg(short, long, default_value = "255.255.255", global = true)]
    subnet: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover a capability service and list its capabilities
    Buttons,

    /// Invoke a capability by index
    Press {
        /// Capability index
        id: i32,
    },

    /// Print the process catalog once
    Ps {
        /// Service tag to look up
        tag: String,
    },

    /// Print the exec-target catalog once
    Targets {
        /// Service tag to look up
        tag: String,
    },

    /// Stream catalog updates until Ctrl+C
    Watch {
        /// Service tag to look up
        tag: String,
    },

    /// Kill a process by id
    Kill {
        /// Service tag to look up
        tag: String,

        /// Target process id
        pid: i32,
    },

    /// Execute a process on a host
    Exec {
        /// Service tag to look up
        tag: String,

        /// Host name from the catalog
        host: String,

        /// Process name to execute
        process: String,
    },
}

/// How long one-shot commands wait for the catalog or handshake reply.
const REPLY_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let broadcast = subnet_broadcast(&cli.subnet).map_err(|e| {
        eprintln!("{}: {}", "Bad subnet".red(), e);
        e
    })?;
    tracing::debug!("broadcast address {}", broadcast);

    // Bind failure here is fatal: without the reply socket no discovery
    // exchange can happen at all.
    let discovery = DiscoveryClient::bind(DiscoveryConfig::new())
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Could not open discovery socket".red(), e);
            e
        })?;

    match cli.command {
        Commands::Buttons => {
            let descriptor = discovery.discover(broadcast).await.map_err(|e| {
                eprintln!("{}: {}", "Discovery failed".red(), e);
                e
            })?;
            println!(
                "{} {} ({} capabilities)",
                "Service at".green(),
                descriptor.host,
                descriptor.capabilities.len()
            );
            for (i, name) in descriptor.capabilities.iter().enumerate() {
                println!("  [{}] {}", i, name.cyan());
            }
        }
        Commands::Press { id } => {
            discovery.press(broadcast, id).await.map_err(|e| {
                eprintln!("{}: {}", "Press failed".red(), e);
                e
            })?;
            println!("{} capability {}", "Pressed".green(), id);
        }
        Commands::Ps { tag } => {
            let session = connect(&discovery, &tag, broadcast).await?;
            let catalog = request_catalog(&session, Command::ProcessList).await?;
            print_catalog(&catalog);
            session.close().await;
        }
        Commands::Targets { tag } => {
            let session = connect(&discovery, &tag, broadcast).await?;
            let catalog = request_catalog(&session, Command::ExecTargetList).await?;
            print_catalog(&catalog);
            session.close().await;
        }
        Commands::Watch { tag } => {
            let session = connect(&discovery, &tag, broadcast).await?;
            let mut events = session.subscribe();
            spawn_read_loop(&session);

            session.dispatch(&Command::ProcessList).await?;
            eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

            loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(SessionEvent::Catalog(snapshot)) => print_catalog(&snapshot),
                            Ok(SessionEvent::Handshake { .. }) => {}
                            Ok(SessionEvent::Closed) => {
                                eprintln!("{}", "Connection closed".red());
                                break;
                            }
                            Ok(SessionEvent::Failed { reason }) => {
                                eprintln!("{}: {}", "Session failed".red(), reason);
                                break;
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                eprintln!("{}: lagged {} updates", "Warning".yellow(), n);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("\n{}", "Stopping...".dimmed());
                        break;
                    }
                }
            }
            session.close().await;
        }
        Commands::Kill { tag, pid } => {
            let session = connect(&discovery, &tag, broadcast).await?;
            spawn_read_loop(&session);
            session.dispatch(&Command::Kill { pid }).await?;
            println!("{} kill for process {}", "Sent".green(), pid);
            session.close().await;
        }
        Commands::Exec { tag, host, process } => {
            let session = connect(&discovery, &tag, broadcast).await?;
            let mut events = session.subscribe();
            spawn_read_loop(&session);

            session
                .dispatch_expecting_handshake(&Command::Exec {
                    host: host.clone(),
                    process: process.clone(),
                })
                .await?;

            // the handshake frame confirms the side effect ran
            match tokio::time::timeout(REPLY_WAIT, wait_for_handshake(&mut events)).await {
                Ok(true) => println!("{} {} on {}", "Started".green(), process.cyan(), host),
                Ok(false) => eprintln!("{}", "Session ended before the handshake".red()),
                Err(_) => eprintln!("{}", "No handshake within the wait window".yellow()),
            }
            session.close().await;
        }
    }

    Ok(())
}

async fn connect(
    discovery: &DiscoveryClient,
    tag: &str,
    broadcast: IpAddr,
) -> Result<Arc<ServiceSession>, Box<dyn std::error::Error>> {
    let descriptor = discovery.lookup(tag, broadcast).await.map_err(|e| {
        eprintln!("{}: {}", "Lookup failed".red(), e);
        e
    })?;
    // tagged replies always carry the port
    let addr = descriptor
        .socket_addr()
        .ok_or_else(|| std::io::Error::other("lookup reply carried no port"))?;

    let session = ServiceSession::connect(addr, SessionConfig::new())
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;
    Ok(Arc::new(session))
}

fn spawn_read_loop(session: &Arc<ServiceSession>) {
    let session = session.clone();
    tokio::spawn(async move {
        let _ = session.read_loop().await;
    });
}

/// Sends a listing command and waits for the next catalog snapshot.
async fn request_catalog(
    session: &Arc<ServiceSession>,
    command: Command,
) -> Result<Arc<Catalog>, Box<dyn std::error::Error>> {
    let mut events = session.subscribe();
    spawn_read_loop(session);
    session.dispatch(&command).await?;

    let deadline = tokio::time::timeout(REPLY_WAIT, async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Catalog(snapshot)) => return Some(snapshot),
                Ok(SessionEvent::Closed) | Ok(SessionEvent::Failed { .. }) => return None,
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await;

    match deadline {
        Ok(Some(snapshot)) => Ok(snapshot),
        Ok(None) => {
            eprintln!("{}", "Session ended before a catalog arrived".red());
            Err(std::io::Error::other("session ended").into())
        }
        Err(_) => {
            eprintln!("{}", "No catalog within the wait window".red());
            Err(std::io::Error::other("catalog timeout").into())
        }
    }
}

async fn wait_for_handshake(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> bool {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Handshake { .. }) => return true,
            Ok(SessionEvent::Closed) | Ok(SessionEvent::Failed { .. }) => return false,
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return false,
        }
    }
}

fn print_catalog(catalog: &Catalog) {
    if catalog.is_empty() {
        println!("{}", "(no hosts)".dimmed());
        return;
    }
    for host in catalog.hosts() {
        println!("{}", host.name.cyan().bold());
        for process in &host.processes {
            println!("  {}  {}", process.name, format!("#{}", process.id).dimmed());
        }
    }
}
