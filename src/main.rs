#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lingvo_rust::run().await {
        eprintln!("lingvo-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
