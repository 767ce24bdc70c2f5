#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = scrolls_rust::run_worker().await {
        eprintln!("scrolls-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
