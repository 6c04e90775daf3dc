use mongodb::{Client, Collection, Database};

use crate::utils::AppError;

pub const USERS_COLLECTION: &str = "users";
pub const PUBLIC_PROFILES_COLLECTION: &str = "public_profiles";

const DEFAULT_DATABASE: &str = "ian-database";

/// IndexOptionsConflict / IndexKeySpecsConflict: an index on the key exists
/// with other options
const INDEX_CONFLICT_CODES: [i32; 2] = [85, 86];

fn command_code(error: &mongodb::error::Error) -> Option<i32> {
    match error.kind.as_ref() {
        mongodb::error::ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

/// Log level for a failed index creation. Re-creating an identical index
/// succeeds, so every failure is worth surfacing.
fn index_failure_level(code: Option<i32>) -> log::Level {
    match code {
        Some(code) if INDEX_CONFLICT_CODES.contains(&code) => log::Level::Warn,
        _ => log::Level::Error,
    }
}

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, AppError> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));  // 5min idle

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        // Database name comes from the URI path
        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;
        log::info!("✅ MongoDB database selected: {}", db_name);

        let mongodb = Self { client, db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Unique indexes backing the duplicate-email and one-projection-per-user rules
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        log::info!("🔧 Creating database indexes...");

        let indexes = [
            (USERS_COLLECTION, "email"),
            (USERS_COLLECTION, "userId"),
            (PUBLIC_PROFILES_COLLECTION, "userId"),
        ];

        for (collection_name, key) in indexes {
            let collection = self.collection::<mongodb::bson::Document>(collection_name);
            let index = IndexModel::builder()
                .keys(doc! { key: 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();

            match collection.create_index(index).await {
                Ok(_) => log::info!("   ✅ Index created: {}({})", collection_name, key),
                Err(e) => match index_failure_level(command_code(&e)) {
                    log::Level::Warn => log::warn!(
                        "   ⚠️  Index {}({}) exists with different options, uniqueness may not be enforced: {}",
                        collection_name,
                        key,
                        e
                    ),
                    _ => log::error!(
                        "   ❌ Failed to create index {}({}), duplicates will not be rejected: {}",
                        collection_name,
                        key,
                        e
                    ),
                },
            }
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Check if the connection is healthy
    pub async fn ping(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;

        self.client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_failures_are_not_silenced() {
        assert_eq!(index_failure_level(Some(85)), log::Level::Warn);
        assert_eq!(index_failure_level(Some(86)), log::Level::Warn);
        // Duplicate key while building a unique index, auth failure, network
        assert_eq!(index_failure_level(Some(11000)), log::Level::Error);
        assert_eq!(index_failure_level(Some(13)), log::Level::Error);
        assert_eq!(index_failure_level(None), log::Level::Error);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection() {
        dotenv::dotenv().ok();

        let uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017/ian-test".to_string());
        let db = MongoDB::new(&uri).await.unwrap();

        assert!(db.ping().await.is_ok());
        assert_eq!(db.database().name(), "ian-test");
    }
}
