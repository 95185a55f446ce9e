#[tokio::main]
async fn main() {
    if let Err(e) = termcheck_lib::run().await {
        eprintln!("termcheck: {e}");
        std::process::exit(1);
    }
}
