use std::path::Path;

use anyhow::Result;

pub fn run(root: &Path, port: Option<u16>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        tokio::select! {
            result = cockpit_server::serve(root, port) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
