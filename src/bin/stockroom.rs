use std::process::ExitCode;

use stockroom::app::StockroomApp;

#[tokio::main]
async fn main() -> ExitCode {
    match StockroomApp::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("stockroom: {err}");
            ExitCode::FAILURE
        }
    }
}
