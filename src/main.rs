#[tokio::main]
async fn main() {
    if let Err(e) = timesheet_lib::run().await {
        eprintln!("timesheet: {:#}", e);
        std::process::exit(1);
    }
}
