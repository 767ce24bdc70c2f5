#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = scrolls_rust::run().await {
        eprintln!("scrolls-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
