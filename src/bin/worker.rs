#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lingvo_rust::run_worker().await {
        eprintln!("lingvo-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
