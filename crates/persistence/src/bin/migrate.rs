#![deny(warnings)]

use persistence::{default_sqlite_url, SaveStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    let store = SaveStore::open(&url).await?;
    let keys = store.keys().await?;
    println!("DB ready at {} | keys: {:?}", url, keys);
    Ok(())
}
