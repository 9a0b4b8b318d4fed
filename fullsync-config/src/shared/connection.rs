use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::SerializableSecretString;
use crate::shared::ValidationError;

const APP_NAME: &str = "fullsync";

/// Session settings applied to every source and target connection.
///
/// Forcing `UTC` and `ISO` keeps the text rendering of temporal values stable regardless of the
/// server defaults.
pub static DEFAULT_PG_CONNECTION_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: "ISO".to_string(),
        intervalstyle: "postgres".to_string(),
        extra_float_digits: 3,
        client_encoding: "UTF8".to_string(),
        timezone: "UTC".to_string(),
        statement_timeout: 0,
        application_name: APP_NAME.to_string(),
    });

#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub intervalstyle: String,
    pub extra_float_digits: i32,
    pub client_encoding: String,
    pub timezone: String,
    pub statement_timeout: u32,
    pub application_name: String,
}

impl PgConnectionOptions {
    pub fn to_options_string(&self) -> String {
        format!(
            "-c datestyle={} -c intervalstyle={} -c extra_float_digits={} -c client_encoding={} -c timezone={} -c statement_timeout={} -c application_name={}",
            self.datestyle,
            self.intervalstyle,
            self.extra_float_digits,
            self.client_encoding,
            self.timezone,
            self.statement_timeout,
            self.application_name
        )
    }
}

/// Connection settings for a Postgres-wire database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<SerializableSecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM encoded root certificates trusted when connecting.
    #[serde(default)]
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: "".to_string(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.trim().is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Conversion of a connection config into a driver specific connect options type.
pub trait IntoConnectOptions<Output> {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> Output;
    fn with_db(&self, options: Option<&PgConnectionOptions>) -> Output;
}

impl IntoConnectOptions<TokioPgConnectOptions> for PgConnectionConfig {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> TokioPgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            TokioPgSslMode::Require
        } else {
            TokioPgSslMode::Prefer
        };

        let mut config = TokioPgConnectOptions::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.username)
            .ssl_mode(ssl_mode);

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        if let Some(opts) = options {
            config.options(opts.to_options_string());
        }

        config
    }

    fn with_db(&self, options: Option<&PgConnectionOptions>) -> TokioPgConnectOptions {
        let mut config = self.without_db(options);
        config.dbname(&self.name);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(tls: TlsConfig) -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "dealership".to_string(),
            username: "postgres".to_string(),
            password: Some("secret".to_string().into()),
            tls,
        }
    }

    #[test]
    fn default_options_pin_session_settings() {
        assert_eq!(
            DEFAULT_PG_CONNECTION_OPTIONS.to_options_string(),
            "-c datestyle=ISO -c intervalstyle=postgres -c extra_float_digits=3 -c client_encoding=UTF8 -c timezone=UTC -c statement_timeout=0 -c application_name=fullsync"
        );
    }

    #[test]
    fn with_db_sets_database_name() {
        let config: TokioPgConnectOptions =
            connection(TlsConfig::disabled()).with_db(Some(&DEFAULT_PG_CONNECTION_OPTIONS));

        assert_eq!(config.get_dbname(), Some("dealership"));
        assert_eq!(config.get_user(), Some("postgres"));
        assert_eq!(config.get_ports(), &[5432]);
    }

    #[test]
    fn tls_without_certificates_is_rejected() {
        let config = connection(TlsConfig {
            trusted_root_certs: " ".to_string(),
            enabled: true,
        });

        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        );
    }
}
