#[tokio::main]
async fn main() {
    if let Err(err) = ulasan_lib::run().await {
        eprintln!("[ulasan] service failed: {err:?}");
        std::process::exit(1);
    }
}
