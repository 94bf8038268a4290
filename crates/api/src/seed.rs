//! Startup seeding of albums and customers from a JSON file.
//!
//! Catalog and customer management live outside this service, so a
//! standalone instance gets its reference data this way:
//!
//! ```json
//! {
//!   "albums": [
//!     { "id": "3f0c...", "title": "Kind of Blue", "price": 1999, "stock_quantity": 10 }
//!   ],
//!   "customers": [
//!     { "id": "9a1e...", "name": "Miles Davis", "email": "miles@example.com" }
//!   ]
//! }
//! ```
//!
//! Prices are in cents and may not be negative.

use std::path::Path;

use serde::Deserialize;
use store::{Album, Customer, InMemoryStore, PostgresStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid seed data: {0}")]
    Invalid(String),

    #[error("failed to store seed data: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: display.clone(),
            source,
        })?;
        let seed: Self = serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
            path: display,
            source,
        })?;
        seed.validate()?;
        Ok(seed)
    }

    /// Rejects albums with a negative price.
    pub fn validate(&self) -> Result<(), SeedError> {
        match self.albums.iter().find(|album| album.price.cents() < 0) {
            Some(album) => Err(SeedError::Invalid(format!(
                "album {} ({}) has negative price {}",
                album.id, album.title, album.price
            ))),
            None => Ok(()),
        }
    }

    pub async fn load_into_memory(self, store: &InMemoryStore) -> Result<(), SeedError> {
        self.validate()?;
        let (albums, customers) = (self.albums.len(), self.customers.len());
        for album in self.albums {
            store.insert_album(album).await;
        }
        for customer in self.customers {
            store.insert_customer(customer).await;
        }
        tracing::info!(albums, customers, "seeded in-memory store");
        Ok(())
    }

    /// Upserts every record, so reseeding an existing database resets stock.
    pub async fn load_into_postgres(self, store: &PostgresStore) -> Result<(), SeedError> {
        self.validate()?;
        for album in &self.albums {
            store.insert_album(album).await?;
        }
        for customer in &self.customers {
            store.insert_customer(customer).await?;
        }
        tracing::info!(
            albums = self.albums.len(),
            customers = self.customers.len(),
            "seeded database"
        );
        Ok(())
    }
}
