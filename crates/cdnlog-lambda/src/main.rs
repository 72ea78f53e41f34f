// Serverless binary entry point
//
// The same `bootstrap` serves Lambda (via lambda_runtime) and SCF custom
// runtimes; `run` picks the loop from the detected platform.

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    cdnlog_lambda::run().await
}
