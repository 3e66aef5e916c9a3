use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    docsort::run().await
}
