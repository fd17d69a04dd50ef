use clap::Parser;
use client::game::{ConnectionStatus, SharedStore};
use client::network::NetClient;
use log::{info, warn};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name to join with
    #[arg(short, long, default_value = "Rustacean")]
    name: String,
}

/// Headless diagnostic client: joins, wanders a circle at the report
/// throttle, and logs what the reconciliation store sees. Useful for
/// poking at a running server without a rendering front end.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let store = SharedStore::new();
    let mut net = NetClient::connect(&args.server, store.clone()).await?;
    net.join(&args.name).await;
    info!("Joining as {:?}", args.name);

    let mut frame = tokio::time::interval(Duration::from_millis(16));
    let mut announced: HashSet<String> = HashSet::new();
    let mut was_dead = false;
    let mut t: f32 = 0.0;

    loop {
        tokio::select! {
            _ = frame.tick() => {
                t += 0.016;
                let position = [t.cos() * 5.0, 1.0, t.sin() * 5.0];
                let rotation = [0.0, t, 0.0];
                net.report_movement(position, rotation).await;

                let (dead, lost) = {
                    let mut store = store.lock();
                    store.smooth_step();
                    for entry in store.feed.entries() {
                        if announced.insert(entry.id.clone()) {
                            info!("{} eliminated {}", entry.killer_name, entry.victim_name);
                        }
                    }
                    (
                        store.local_player().map(|p| p.is_dead).unwrap_or(false),
                        store.status() == ConnectionStatus::Disconnected,
                    )
                };

                if lost {
                    if let Some(notice) = store.lock().notice.clone() {
                        warn!("{}", notice);
                    }
                    break;
                }
                if dead && !was_dead {
                    info!("We died — requesting respawn");
                    net.request_respawn().await;
                }
                was_dead = dead;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Exiting");
                break;
            }
        }
    }

    Ok(())
}
