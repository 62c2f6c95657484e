//! Connection type definitions.
//!
//! This module contains:
//! - `ConnectionInfo` - A saved connection profile
//! - `ConnectionOptions` - How to reach the deployment (URI, SSH, TLS, proxy)
//! - `ConnectionSecrets` - The sensitive subset of a profile
use bson::{DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Favorite metadata shown in the sidebar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionFavorite {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// SSH tunnel configuration for a connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SshTunnelOptions {
    /// SSH server hostname
    pub host: String,
    /// SSH server port (default: 22)
    pub port: u16,
    /// SSH username
    pub username: String,
    /// Password authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to private key (if using key auth)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_key_file: Option<String>,
    /// Passphrase protecting the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_key_passphrase: Option<String>,
}

impl SshTunnelOptions {
    /// Get the SSH URL (user@host)
    pub fn ssh_url(&self) -> String {
        if self.username.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.username, self.host)
        }
    }
}

/// TLS files used when connecting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key_file_password: Option<String>,
}

/// SOCKS5 proxy in front of the deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Everything needed to open a connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    /// MongoDB connection string, possibly carrying a password in its userinfo
    pub connection_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_tunnel: Option<SshTunnelOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyOptions>,
    #[serde(
        rename = "useSystemCA",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub use_system_ca: bool,
    /// Options this crate does not interpret, kept as read
    #[serde(flatten)]
    pub extra: Document,
}

/// A saved connection profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<ConnectionFavorite>,
    pub connection_options: ConnectionOptions,
    /// Profile fields this crate does not interpret, kept as read
    #[serde(flatten)]
    pub extra: Document,
}

impl ConnectionInfo {
    /// Create a new profile with a random id
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            last_used: None,
            favorite: None,
            connection_options: ConnectionOptions {
                connection_string: connection_string.into(),
                ..Default::default()
            },
            extra: Document::new(),
        }
    }

    /// Mark this profile as a favorite
    pub fn with_favorite(mut self, name: impl Into<String>) -> Self {
        self.favorite = Some(ConnectionFavorite {
            name: name.into(),
            color: None,
        });
        self
    }

    /// True when the profile has a non-empty favorite name
    pub fn is_favorite(&self) -> bool {
        self.favorite
            .as_ref()
            .is_some_and(|favorite| !favorite.name.is_empty())
    }

    /// Name shown to the user: favorite name or the connection string
    pub fn display_name(&self) -> &str {
        match &self.favorite {
            Some(favorite) if !favorite.name.is_empty() => &favorite.name,
            _ => &self.connection_options.connection_string,
        }
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used.map(|dt| dt.to_chrono())
    }
}

/// Sensitive fields split off a `ConnectionInfo`.
///
/// `password`, `tlsCertificateKeyFilePassword`, `proxyPassword` and
/// `awsSessionToken` come from the connection string; the rest from the
/// typed SSH, TLS and proxy sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_tunnel_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_tunnel_passphrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_certificate_key_file_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,
    /// `tls.certificateKeyFilePassword`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key_file_password: Option<String>,
    /// `proxy.password`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_options_password: Option<String>,
}

impl ConnectionSecrets {
    pub fn is_empty(&self) -> bool {
        self.values().next().is_none()
    }

    /// Iterate over every secret value that is set
    pub fn values(&self) -> impl Iterator<Item = &str> {
        [
            &self.password,
            &self.ssh_tunnel_password,
            &self.ssh_tunnel_passphrase,
            &self.tls_certificate_key_file_password,
            &self.proxy_password,
            &self.aws_session_token,
            &self.tls_key_file_password,
            &self.proxy_options_password,
        ]
        .into_iter()
        .filter_map(|value| value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favorite_requires_name() {
        let plain = ConnectionInfo::new("mongodb://localhost:27017");
        assert!(!plain.is_favorite());

        let named = plain.clone().with_favorite("Local");
        assert!(named.is_favorite());
        assert_eq!(named.display_name(), "Local");

        let unnamed = plain.with_favorite("");
        assert!(!unnamed.is_favorite());
        assert_eq!(unnamed.display_name(), "mongodb://localhost:27017");
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let mut info = ConnectionInfo::new("mongodb://localhost:27017");
        info.connection_options.ssh_tunnel = Some(SshTunnelOptions {
            host: "bastion".to_string(),
            port: 22,
            username: "ops".to_string(),
            identity_key_file: Some("/home/ops/.ssh/id_ed25519".to_string()),
            ..Default::default()
        });

        let json = serde_json::to_value(&info).unwrap();
        let options = &json["connectionOptions"];
        assert_eq!(options["connectionString"], "mongodb://localhost:27017");
        assert_eq!(
            options["sshTunnel"]["identityKeyFile"],
            "/home/ops/.ssh/id_ed25519"
        );
        assert!(options.get("sshTunnel").unwrap().get("password").is_none());
        assert!(options.get("useSystemCA").is_none());
        assert!(json.get("favorite").is_none());
    }

    #[test]
    fn test_secrets_values() {
        let secrets = ConnectionSecrets {
            password: Some("a".to_string()),
            proxy_options_password: Some("b".to_string()),
            ..Default::default()
        };
        assert!(!secrets.is_empty());
        assert_eq!(secrets.values().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(ConnectionSecrets::default().is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let document = bson::doc! {
            "id": "a",
            "savedConnectionType": "favorite",
            "connectionOptions": {
                "connectionString": "mongodb://h",
                "useSystemCA": true,
                "oidc": { "flows": ["auth-code"] },
                "fleOptions": { "storeCredentials": false },
            },
        };

        let info: ConnectionInfo = bson::from_document(document.clone()).unwrap();
        assert!(info.connection_options.use_system_ca);
        assert_eq!(info.extra.get_str("savedConnectionType").unwrap(), "favorite");
        assert!(info.connection_options.extra.contains_key("oidc"));
        assert!(info.connection_options.extra.contains_key("fleOptions"));

        assert_eq!(bson::to_document(&info).unwrap(), document);
    }

    #[test]
    fn test_ssh_url() {
        let tunnel = SshTunnelOptions {
            host: "bastion".to_string(),
            port: 22,
            username: "ops".to_string(),
            ..Default::default()
        };
        assert_eq!(tunnel.ssh_url(), "ops@bastion");
    }
}
