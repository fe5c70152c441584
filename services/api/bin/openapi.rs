//! Writes the service's OpenAPI document, to `openapi.json` unless a path is given.

use utoipa::OpenApi;
use xylor_api::router::ApiDoc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    std::fs::write(&path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("Wrote OpenAPI document to {}", path);
    Ok(())
}
