use fullsync_config::shared::{IntoConnectOptions, PgConnectionConfig, TargetConfig, TlsConfig};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use tracing::{info, warn};
use uuid::Uuid;

/// Postgres database created for one test and dropped with it.
///
/// Dropping it needs a multi threaded runtime, tests using it run with
/// `#[tokio::test(flavor = "multi_thread")]`.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub client: Client,
}

impl PgDatabase {
    /// Target settings writing into this database.
    pub fn target_config(&self, max_batch_rows: usize) -> TargetConfig {
        TargetConfig {
            connection: self.config.clone(),
            max_batch_rows,
        }
    }

    /// Number of rows of `schema.table`.
    pub async fn row_count(&self, schema: &str, table: &str) -> i64 {
        let query = format!(
            "select count(*) from {}.{}",
            pg_escape::quote_identifier(schema),
            pg_escape::quote_identifier(table)
        );

        self.client
            .query_one(&query, &[])
            .await
            .expect("Failed to count rows")
            .get(0)
    }

    /// Names of the tables of `schema`, sorted.
    pub async fn table_names(&self, schema: &str) -> Vec<String> {
        self.client
            .query(
                "select tablename::text from pg_tables where schemaname = $1 order by tablename",
                &[&schema],
            )
            .await
            .expect("Failed to list tables")
            .iter()
            .map(|row| row.get(0))
            .collect()
    }

    /// `(name, type)` of every column of `schema.table`, in table order.
    pub async fn columns(&self, schema: &str, table: &str) -> Vec<(String, String)> {
        self.client
            .query(
                "select column_name::text, data_type::text from information_schema.columns \
                 where table_schema = $1 and table_name = $2 order by ordinal_position",
                &[&schema, &table],
            )
            .await
            .expect("Failed to list columns")
            .iter()
            .map(|row| (row.get(0), row.get(1)))
            .collect()
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        let config = self.config.clone();
        tokio::task::block_in_place(move || {
            Handle::current().block_on(async move { drop_pg_database(&config).await });
        });
    }
}

/// Connection settings of the test server with a fresh database name, or `None` when
/// `TESTS_DATABASE_HOST` is not set.
///
/// Read from `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and the
/// optional `TESTS_DATABASE_PASSWORD`.
fn local_pg_connection_config() -> Option<PgConnectionConfig> {
    let host = std::env::var("TESTS_DATABASE_HOST").ok()?;

    Some(PgConnectionConfig {
        host,
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
    })
}

/// Creates a uniquely named database on the test server.
///
/// Returns `None` when no test server is configured, so that the suite still passes on machines
/// without Postgres.
pub async fn spawn_target_database() -> Option<PgDatabase> {
    let Some(config) = local_pg_connection_config() else {
        warn!("TESTS_DATABASE_HOST is not set, skipping test that needs postgres");
        return None;
    };

    let server = connect_to(config.without_db(None)).await;
    server
        .execute(&format!(r#"create database "{}""#, config.name), &[])
        .await
        .expect("Failed to create database");

    let client = connect_to(config.with_db(None)).await;

    Some(PgDatabase { config, client })
}

async fn connect_to(config: tokio_postgres::Config) -> Client {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .expect("Failed to connect to Postgres");

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            info!("connection error: {err}");
        }
    });

    client
}

async fn drop_pg_database(config: &PgConnectionConfig) {
    let client = connect_to(config.without_db(None)).await;

    client
        .execute(
            "select pg_terminate_backend(pid) from pg_stat_activity \
             where datname = $1 and pid <> pg_backend_pid()",
            &[&config.name],
        )
        .await
        .expect("Failed to terminate database connections");

    client
        .execute(&format!(r#"drop database if exists "{}""#, config.name), &[])
        .await
        .expect("Failed to drop database");
}
