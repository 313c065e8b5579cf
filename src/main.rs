#[tokio::main]
async fn main() {
    if let Err(e) = linguara::run().await {
        eprintln!("linguara: {e}");
        std::process::exit(1);
    }
}
