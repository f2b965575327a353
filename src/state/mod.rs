// state module: AppState, initialization, and re-exports of submodules.

use anyhow::Result;
use mongodb::{Client, Collection, Database};
use std::env;

use crate::cloudinary::CloudinaryConfig;
use crate::models::{Expense, Product, Sale, Session, User};

mod catalog;
mod events;
mod expenses;
mod ledger;
mod users;

pub use catalog::*;
pub use events::*;
pub use expenses::*;
pub use ledger::*;
pub use users::*;

pub const SESSION_TTL_SECONDS: u64 = 60 * 60 * 24; // 1 day
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub http: reqwest::Client,
    pub cloudinary: Option<CloudinaryConfig>,
    pub users: Collection<User>,
    pub sessions: Collection<Session>,
    pub products: Collection<Product>,
    pub incomes: Collection<Sale>,
    pub expenses: Collection<Expense>,
}

pub async fn init_state() -> Result<AppState> {
    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = env::var("MONGODB_DB").unwrap_or_else(|_| "lavka".to_string());

    let client = Client::with_uri_str(uri).await?;
    let db = client.database(&db_name);

    ensure_collections(&db).await?;

    Ok(AppState {
        client,
        http: reqwest::Client::new(),
        cloudinary: CloudinaryConfig::from_env(),
        users: db.collection::<User>("users"),
        sessions: db.collection::<Session>("sessions"),
        products: db.collection::<Product>("products"),
        incomes: db.collection::<Sale>("incomes"),
        expenses: db.collection::<Expense>("expenses"),
    })
}

// Transactions cannot create collections, so every collection the ledger
// touches must exist before the first commit.
async fn ensure_collections(db: &Database) -> Result<()> {
    let existing = db.list_collection_names().await?;
    for name in ["users", "sessions", "products", "incomes", "expenses"] {
        if !existing.iter().any(|n| n == name) {
            db.create_collection(name).await?;
        }
    }
    Ok(())
}
