//! DynamoDB client configuration
//!
//! Both tools talk to an endpoint chosen on the command line, usually DynamoDB
//! Local, and read credentials from prefixed environment variables so source
//! and destination can use different accounts.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_types::sdk_config::{RetryConfig, TimeoutConfig};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Endpoint used when none is given
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Region used when none is given
pub const DEFAULT_REGION: &str = "us-west-2";

/// Access key and secret used when no credentials are configured
///
/// Local emulators accept any non-empty credentials.
pub const PLACEHOLDER_CREDENTIAL: &str = "dummy";

const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";

/// Static access key pair
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .finish()
    }
}

impl StaticCredentials {
    /// The `dummy`/`dummy` pair accepted by local emulators
    pub fn placeholder() -> Self {
        Self {
            access_key_id: PLACEHOLDER_CREDENTIAL.to_string(),
            secret_access_key: PLACEHOLDER_CREDENTIAL.to_string(),
        }
    }

    /// Read `{prefix}AWS_ACCESS_KEY_ID` and `{prefix}AWS_SECRET_ACCESS_KEY`
    /// through `lookup`
    ///
    /// Both variables must be set and non-empty.
    ///
    /// # Example
    ///
    /// ```
    /// use dynamo_transfer::client::StaticCredentials;
    ///
    /// let creds = StaticCredentials::from_lookup("SOURCE_", |name| match name {
    ///     "SOURCE_AWS_ACCESS_KEY_ID" => Some("AKIA".to_string()),
    ///     "SOURCE_AWS_SECRET_ACCESS_KEY" => Some("secret".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(creds.unwrap().access_key_id, "AKIA");
    /// ```
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(&format!("{prefix}{name}")).filter(|v| !v.is_empty());

        Some(Self {
            access_key_id: read(ACCESS_KEY_VAR)?,
            secret_access_key: read(SECRET_KEY_VAR)?,
        })
    }
}

/// Connection settings for one DynamoDB endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Custom endpoint, `None` for the regional AWS endpoint
    pub endpoint_url: Option<String>,
    /// Signing region
    pub region: String,
    /// Named profile from the shared config files
    pub profile: Option<String>,
    /// Explicit credentials, `None` to let the profile supply them
    pub credentials: Option<StaticCredentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: Some(DEFAULT_ENDPOINT.to_string()),
            region: DEFAULT_REGION.to_string(),
            profile: None,
            credentials: Some(StaticCredentials::placeholder()),
        }
    }
}

impl ClientConfig {
    /// Settings with credentials taken from `{prefix}AWS_*` variables
    ///
    /// Environment credentials win. Without them a named profile supplies
    /// credentials, and without a profile the placeholder pair is used.
    pub fn for_env(
        prefix: &str,
        endpoint_url: Option<String>,
        region: impl Into<String>,
        profile: Option<String>,
    ) -> Self {
        Self::with_lookup(prefix, endpoint_url, region, profile, |name| {
            std::env::var(name).ok()
        })
    }

    /// Like [`for_env`](Self::for_env) with a custom variable lookup
    pub fn with_lookup<F>(
        prefix: &str,
        endpoint_url: Option<String>,
        region: impl Into<String>,
        profile: Option<String>,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = match (StaticCredentials::from_lookup(prefix, lookup), &profile) {
            (Some(credentials), _) => Some(credentials),
            (None, Some(_)) => None,
            (None, None) => Some(StaticCredentials::placeholder()),
        };

        Self {
            endpoint_url,
            region: region.into(),
            profile,
            credentials,
        }
    }

    /// Load the SDK configuration
    ///
    /// Uses:
    /// - Adaptive retry mode with 3 max attempts
    /// - Exponential backoff starting at 1 second
    /// - Connect timeout: 3 seconds
    /// - Read timeout: 20 seconds
    /// - Operation timeout: 60 seconds
    pub async fn load(&self) -> SdkConfig {
        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(3))
            .read_timeout(Duration::from_secs(20))
            .operation_timeout(Duration::from_secs(60))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .retry_config(
                RetryConfig::adaptive()
                    .with_max_attempts(3)
                    .with_initial_backoff(Duration::from_secs(1)),
            )
            .timeout_config(timeout_config);

        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }

        if let Some(credentials) = &self.credentials {
            loader = loader.credentials_provider(Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None,
                None,
                "environment",
            ));
        }

        debug!(
            endpoint = self.endpoint_url.as_deref().unwrap_or("aws"),
            region = %self.region,
            profile = self.profile.as_deref().unwrap_or("-"),
            "Loading client configuration"
        );

        loader.load().await
    }

    /// Build a DynamoDB client
    pub async fn connect(&self) -> DynamoDbClient {
        DynamoDbClient::new(&self.load().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_prefixed_credentials() {
        let lookup = env(&[
            ("DEST_AWS_ACCESS_KEY_ID", "dest-key"),
            ("DEST_AWS_SECRET_ACCESS_KEY", "dest-secret"),
            ("AWS_ACCESS_KEY_ID", "plain-key"),
        ]);

        let creds = StaticCredentials::from_lookup("DEST_", &lookup).unwrap();
        assert_eq!(creds.access_key_id, "dest-key");
        assert_eq!(creds.secret_access_key, "dest-secret");

        // Secret missing for the unprefixed pair
        assert!(StaticCredentials::from_lookup("", &lookup).is_none());
    }

    #[test]
    fn test_empty_variable_counts_as_unset() {
        let lookup = env(&[("AWS_ACCESS_KEY_ID", ""), ("AWS_SECRET_ACCESS_KEY", "s")]);
        assert!(StaticCredentials::from_lookup("", lookup).is_none());
    }

    #[test]
    fn test_placeholder_without_profile() {
        let config = ClientConfig::with_lookup("SOURCE_", None, DEFAULT_REGION, None, env(&[]));
        assert_eq!(config.credentials, Some(StaticCredentials::placeholder()));
    }

    #[test]
    fn test_profile_supplies_missing_credentials() {
        let config = ClientConfig::with_lookup(
            "SOURCE_",
            None,
            "eu-west-1",
            Some("prod".into()),
            env(&[]),
        );
        assert!(config.credentials.is_none());
        assert_eq!(config.region, "eu-west-1");
    }

    #[test]
    fn test_environment_wins_over_profile() {
        let config = ClientConfig::with_lookup(
            "",
            Some(DEFAULT_ENDPOINT.into()),
            DEFAULT_REGION,
            Some("prod".into()),
            env(&[("AWS_ACCESS_KEY_ID", "k"), ("AWS_SECRET_ACCESS_KEY", "s")]),
        );
        assert_eq!(config.credentials.unwrap().access_key_id, "k");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", StaticCredentials::placeholder());
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("secret_access_key: \"dummy\""));
    }
}
