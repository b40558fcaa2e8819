// Binary entry point for authprobe
// This is a thin wrapper that delegates to the library implementation

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    authprobe::shell::run().await
}
