//! Writes the relay's OpenAPI document to disk.
//!
//! Usage: `openapi [OUTPUT_PATH]` (defaults to `openapi.json`).

use std::path::{Path, PathBuf};
use utoipa::OpenApi;
use voice_relay_api::router::ApiDoc;

fn write_document(api_doc: utoipa::openapi::OpenApi, path: &Path) -> anyhow::Result<()> {
    let json = api_doc.to_pretty_json()?;
    std::fs::write(path, json)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));
    write_document(ApiDoc::openapi(), &path)?;
    println!("Wrote OpenAPI document to {}", path.display());
    Ok(())
}
