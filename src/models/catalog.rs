use chrono::{DateTime, Utc};
use sqlx::FromRow;

// Categories and brands share one shape; each gets its own table.
#[derive(Debug, FromRow)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
