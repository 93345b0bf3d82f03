use petty_patrol_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("petty patrol error: {err}");
        std::process::exit(1);
    }
}
