// src/dtos/catalog.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateCatalogEntryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCatalogEntryRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogEntryResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<crate::models::catalog::CatalogEntry> for CatalogEntryResponse {
    fn from(entry: crate::models::catalog::CatalogEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}
