use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match carehome_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("carehome: {e}");
            ExitCode::FAILURE
        }
    }
}
