// src/dtos/location.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: String,
}

impl From<crate::models::location::Location> for LocationResponse {
    fn from(location: crate::models::location::Location) -> Self {
        Self {
            id: location.id,
            name: location.name,
            address: location.address,
            created_at: location.created_at.to_rfc3339(),
        }
    }
}
