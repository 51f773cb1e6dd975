use anyhow::Result;
use client::AppClient;

/// Print the public settings of a running server.
///
/// Usage: `client [BASE_URL]` (defaults to `http://localhost:3000`)
#[tokio::main]
async fn main() -> Result<()> {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    let client = AppClient::new(base_url)?;
    if !client.health_check().await? {
        anyhow::bail!("Server is not healthy");
    }

    let settings = client.get_public_settings().await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);

    Ok(())
}
