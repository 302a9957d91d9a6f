use std::{borrow::Cow, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

use customer_registry_core::{
    Customer, CustomerConstraint, CustomerId, CustomerStore, NewCustomer, StoreError,
};

const SQLITE_CONSTRAINT_CHECK: &str = "275";
const SQLITE_CONSTRAINT_NOTNULL: &str = "1299";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// The database file is created when missing. Every pooled connection runs
    /// in WAL mode with a 5 second busy timeout.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to the customers table.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
}

/// Repository responsible for the `customers` table.
#[derive(Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    async fn fetch_one_where(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let sql = format!("SELECT id, name, phone_number FROM customers WHERE {column} = ?");
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(CustomerRow::into_domain).transpose()
    }
}

#[async_trait]
impl CustomerStore for CustomerRepository {
    async fn find_by_phone_number(
        &self,
        phone_number: &str,
    ) -> Result<Option<Customer>, StoreError> {
        self.fetch_one_where("phone_number", phone_number).await
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StoreError> {
        self.fetch_one_where("id", &id.to_string()).await
    }

    async fn save(&self, customer: &NewCustomer) -> Result<Customer, StoreError> {
        let id = customer.id.unwrap_or_else(CustomerId::generate);
        let row = sqlx::query_as::<_, CustomerRow>(
            "INSERT INTO customers (id, name, phone_number, registered_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING id, name, phone_number",
        )
        .bind(id.to_string())
        .bind(customer.name.as_deref())
        .bind(customer.phone_number.as_deref())
        .bind(to_rfc3339(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(classify_write_error)?;

        row.into_domain()
    }
}

/// Raw `customers` row.
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    phone_number: String,
}

impl CustomerRow {
    fn into_domain(self) -> Result<Customer, StoreError> {
        let id = CustomerId::from_str(&self.id)
            .map_err(|err| StoreError::Corrupt(format!("invalid id {:?}: {err}", self.id)))?;
        Ok(Customer {
            id,
            name: self.name,
            phone_number: self.phone_number,
        })
    }
}

fn classify_write_error(err: sqlx::Error) -> StoreError {
    let db_err = match err {
        sqlx::Error::Database(db_err) => db_err,
        other => return backend(other),
    };

    let constraint = db_err
        .code()
        .and_then(|code| constraint_for(&code, db_err.message()));

    match constraint {
        Some(constraint) => StoreError::ConstraintViolation(constraint),
        None => backend(sqlx::Error::Database(db_err)),
    }
}

/// Maps an SQLite extended result code and message onto the table's constraints.
///
/// NOT NULL and UNIQUE messages name the column (`customers.phone_number`),
/// CHECK messages name the constraint (`customers_phone_number_not_blank`).
fn constraint_for(code: &Cow<'_, str>, message: &str) -> Option<CustomerConstraint> {
    let mentions_phone = message.contains("phone_number");
    match code.as_ref() {
        SQLITE_CONSTRAINT_NOTNULL | SQLITE_CONSTRAINT_CHECK => {
            if mentions_phone {
                Some(CustomerConstraint::PhoneNumberRequired)
            } else if message.contains("name") {
                Some(CustomerConstraint::NameRequired)
            } else {
                None
            }
        }
        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY => {
            if mentions_phone {
                Some(CustomerConstraint::PhoneNumberUnique)
            } else if message.contains("customers.id") {
                Some(CustomerConstraint::IdUnique)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
