#[tokio::main]
async fn main() -> anyhow::Result<()> {
    thermostat_daemon::run().await
}
