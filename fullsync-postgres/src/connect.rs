use fullsync::error::{ErrorKind, EtlResult};
use fullsync::etl_error;
use fullsync_config::shared::{DEFAULT_PG_CONNECTION_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use std::io::BufReader;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error};

use crate::error::{Side, connection_error};

/// Opens a client to the database of `config`, over TLS when it is enabled.
///
/// The connection itself is driven by a spawned task that ends when the client is dropped.
pub(crate) async fn connect(config: &PgConnectionConfig, side: Side) -> EtlResult<Client> {
    let connect_options: Config = config.with_db(Some(&DEFAULT_PG_CONNECTION_OPTIONS));

    if !config.tls.enabled {
        let (client, connection) = connect_options
            .connect(NoTls)
            .await
            .map_err(|err| connection_error(err, side))?;
        spawn_connection::<NoTls>(connection);

        debug!(host = %config.host, database = %config.name, "connected to postgres without tls");
        return Ok(client);
    }

    let tls_config = tls_client_config(&config.tls.trusted_root_certs)?;
    let (client, connection) = connect_options
        .connect(MakeRustlsConnect::new(tls_config))
        .await
        .map_err(|err| connection_error(err, side))?;
    spawn_connection::<MakeRustlsConnect>(connection);

    debug!(host = %config.host, database = %config.name, "connected to postgres with tls");
    Ok(client)
}

/// Builds a rustls client config trusting only the PEM certificates in `trusted_root_certs`.
fn tls_client_config(trusted_root_certs: &str) -> EtlResult<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();

    let mut reader = BufReader::new(trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|err| {
            etl_error!(
                ErrorKind::ConfigError,
                "Invalid trusted root certificates",
                source: err
            )
        })?;

        root_store.add(cert).map_err(|err| {
            etl_error!(
                ErrorKind::ConfigError,
                "Invalid trusted root certificate",
                err,
                source: err
            )
        })?;
    }

    if root_store.is_empty() {
        return Err(etl_error!(
            ErrorKind::ConfigError,
            "Invalid trusted root certificates",
            "No PEM certificate was found in the trusted root certificates"
        ));
    }

    Ok(ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

fn spawn_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let task = async move {
        if let Err(err) = connection.await {
            error!(error = %err, "postgres connection terminated with an error");
        }
    }
    .instrument(tracing::Span::current());

    // Dropping the client closes the connection, which ends the task.
    tokio::spawn(task);
}
