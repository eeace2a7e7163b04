pub mod app;
pub mod mqtt;
pub mod settings;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tracing::{info, warn};

use thermostat_common::{
    policy::transition_actions, ActuatorAction, PinObserver, PinStatus, RuntimeConfig,
    ThermostatController,
};

use crate::{app::AppState, settings::ConfigStore};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = ConfigStore::from_env();
    info!("loading config from {}", store.path().display());
    let mut runtime = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    settings::apply_env_overrides(&mut runtime, |key| std::env::var(key).ok());
    runtime.thermostat.sanitize();

    let controller = ThermostatController::init_global(runtime.thermostat.clone());

    spawn_relay_task(&controller, apply_actuator_actions);
    spawn_control_loop(controller.clone(), runtime.thermostat.control_interval_ms);

    if runtime.network.mqtt_enabled {
        let (mqtt, eventloop) = mqtt::connect(&runtime.network);
        mqtt::spawn_ingest_loop(controller.clone(), mqtt.clone(), eventloop);
        mqtt::spawn_state_publish_loop(
            controller.clone(),
            mqtt,
            runtime.network.state_publish_interval_ms,
        );
        info!(
            "mqtt ingestion via {}:{}",
            runtime.network.mqtt_host, runtime.network.mqtt_port
        );
    } else {
        info!("mqtt ingestion disabled; readings accepted over HTTP only");
    }

    let app = app::router(AppState { controller });

    let addr: SocketAddr = runtime
        .network
        .http_bind
        .parse()
        .with_context(|| format!("invalid http bind address {}", runtime.network.http_bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind thermostat daemon at {addr}"))?;

    info!("thermostat daemon listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Periodic re-evaluation so sensor dropout degrades the system even when
/// no new readings arrive.
fn spawn_control_loop(controller: Arc<ThermostatController>, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            interval.tick().await;
            controller.evaluate();
        }
    });
}

/// Forwards committed pin states from the controller to the relay task.
#[derive(Debug)]
struct RelayFeed(watch::Sender<PinStatus>);

impl PinObserver for RelayFeed {
    fn pins_committed(&self, pins: PinStatus) {
        self.0.send_replace(pins);
    }
}

/// Drives the relays toward the latest committed pin state. Intermediate
/// states may be skipped, but each step releases before it engages, so
/// heating and cooling are never energised together.
pub fn spawn_relay_task<F>(controller: &ThermostatController, drive: F) -> JoinHandle<()>
where
    F: Fn(&[ActuatorAction]) + Send + 'static,
{
    let (sender, mut receiver) = watch::channel(PinStatus::ALL_OFF);
    if !controller.set_pin_observer(Box::new(RelayFeed(sender))) {
        warn!("relay task started twice; the first one keeps control");
    }

    tokio::spawn(async move {
        let mut applied = PinStatus::ALL_OFF;
        loop {
            let next = *receiver.borrow_and_update();
            drive(&transition_actions(applied, next));
            applied = next;
            if receiver.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Relay integration point. Board builds drive the pins here; the host
/// build only records the commands.
fn apply_actuator_actions(actions: &[ActuatorAction]) {
    for action in actions {
        info!("relay command: {action:?}");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use thermostat_common::{ThermostatConfig, Timestamp};

    fn controller() -> Arc<ThermostatController> {
        Arc::new(ThermostatController::new(ThermostatConfig {
            deadband: 0.5,
            min_target: 5.0,
            max_target: 35.0,
            default_target: 20.0,
            ..ThermostatConfig::default()
        }))
    }

    async fn wait_for(applied: &Mutex<Vec<ActuatorAction>>, len: usize) {
        for _ in 0..100 {
            if applied.lock().unwrap().len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn relay_task_follows_committed_pins() {
        let controller = controller();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let sink = applied.clone();
        let handle = spawn_relay_task(&controller, move |actions| {
            sink.lock().unwrap().extend_from_slice(actions);
        });

        controller
            .report_reading_at("hall", 15.0, None, Timestamp::new(1_000, 0))
            .unwrap();
        wait_for(&applied, 1).await;
        controller
            .report_reading_at("hall", 25.0, None, Timestamp::new(2_000, 0))
            .unwrap();
        wait_for(&applied, 3).await;

        assert_eq!(
            *applied.lock().unwrap(),
            vec![
                ActuatorAction::HeatingOn,
                ActuatorAction::HeatingOff,
                ActuatorAction::CoolingOn,
            ]
        );
        handle.abort();
    }

    #[tokio::test]
    async fn relay_task_never_closes_both_relays() {
        let controller = controller();
        let relays = Arc::new(Mutex::new(PinStatus::ALL_OFF));
        let sink = relays.clone();
        let handle = spawn_relay_task(&controller, move |actions| {
            let mut relays = sink.lock().unwrap();
            for action in actions {
                match action {
                    ActuatorAction::HeatingOn => relays.heating = true,
                    ActuatorAction::HeatingOff => relays.heating = false,
                    ActuatorAction::CoolingOn => relays.cooling = true,
                    ActuatorAction::CoolingOff => relays.cooling = false,
                }
                assert!(!(relays.heating && relays.cooling));
            }
        });

        let writers: Vec<_> = (0..4_u64)
            .map(|writer| {
                let controller = controller.clone();
                std::thread::spawn(move || {
                    for step in 0..100_u64 {
                        let temp = if (step + writer) % 2 == 0 { 15.0 } else { 25.0 };
                        controller
                            .report_reading_at("hall", temp, None, Timestamp::new(step, 0))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let expected = controller.pin_status();
        for _ in 0..100 {
            if *relays.lock().unwrap() == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*relays.lock().unwrap(), expected);
        assert!(!handle.is_finished());
        handle.abort();
    }
}
