mod device;
mod host;
mod registry;
mod scheduler;
mod transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
