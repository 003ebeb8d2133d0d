//! Configuration types.
//!
//! Everything is read from the environment. `from_lookup` takes the variable
//! source as a closure so tests don't have to touch the process environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::relay::PlanTier;

/// Default cap on selected scenarios.
pub const DEFAULT_MAX_SCENARIOS: usize = 5;

/// Default client-side timeout applied to every relay call.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-side wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Maximum number of scenarios a user may select.
    pub max_scenarios: usize,
    /// Relay calls still pending after this long are failed.
    pub relay_timeout: Duration,
    /// Whether `complete()` requires an attached checkout session.
    pub require_payment: bool,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            max_scenarios: DEFAULT_MAX_SCENARIOS,
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
            require_payment: false,
        }
    }
}

impl WizardConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_scenarios = lookup("AGENT_HOST_MAX_SCENARIOS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_SCENARIOS);

        let relay_timeout = lookup("AGENT_HOST_RELAY_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RELAY_TIMEOUT);

        let require_payment = lookup("AGENT_HOST_REQUIRE_PAYMENT")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            max_scenarios,
            relay_timeout,
            require_payment,
        }
    }
}

/// Provider price identifiers for each plan tier.
#[derive(Debug, Clone)]
pub struct TierPrices {
    pub freemium: String,
    pub pro: String,
    pub luxury: String,
}

impl TierPrices {
    pub fn price_for(&self, tier: PlanTier) -> &str {
        match tier {
            PlanTier::Freemium => &self.freemium,
            PlanTier::Pro => &self.pro,
            PlanTier::Luxury => &self.luxury,
        }
    }
}

/// An outbound automation webhook and the shared secret sent with it.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: SecretString,
}

/// Backend proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    /// Fallback origin for checkout redirect URLs when the request has no
    /// `Origin` header.
    pub public_origin: String,
    pub stripe_secret_key: SecretString,
    pub stripe_api_base: String,
    pub tier_prices: TierPrices,
    /// `WEBHOOK_CHAT` + `CHAT_SECRET`. `None` makes `/api/chat` answer 500.
    pub chat_webhook: Option<WebhookConfig>,
    /// `WEBHOOK_VPS` + `VPS_SECRET`. `None` makes `/api/notify-vps` answer 500.
    pub vps_webhook: Option<WebhookConfig>,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // Report every missing required value at once.
        let required = [
            "STRIPE_SECRET_KEY",
            "STRIPE_PRICE_FREEMIUM",
            "STRIPE_PRICE_PRO",
            "STRIPE_PRICE_LUXURY",
        ];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVar(missing.join(", ")));
        }

        let port = match get("AGENT_HOST_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_HOST_PORT".into(),
                message: format!("'{raw}' is not a valid port"),
            })?,
            None => 3001,
        };

        Ok(Self {
            port,
            public_origin: get("AGENT_HOST_ORIGIN")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            stripe_secret_key: SecretString::from(get("STRIPE_SECRET_KEY").unwrap_or_default()),
            stripe_api_base: get("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            tier_prices: TierPrices {
                freemium: get("STRIPE_PRICE_FREEMIUM").unwrap_or_default(),
                pro: get("STRIPE_PRICE_PRO").unwrap_or_default(),
                luxury: get("STRIPE_PRICE_LUXURY").unwrap_or_default(),
            },
            chat_webhook: webhook_pair(&get, "WEBHOOK_CHAT", "CHAT_SECRET")?,
            vps_webhook: webhook_pair(&get, "WEBHOOK_VPS", "VPS_SECRET")?,
        })
    }
}

/// Both halves of a webhook pair must be present, or neither.
fn webhook_pair<F>(
    get: &F,
    url_key: &str,
    secret_key: &str,
) -> Result<Option<WebhookConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match (get(url_key), get(secret_key)) {
        (Some(url), Some(secret)) => Ok(Some(WebhookConfig {
            url,
            secret: SecretString::from(secret),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::MissingRequired {
            key: secret_key.to_string(),
            hint: format!("{url_key} is set, so {secret_key} must be set too."),
        }),
        (None, Some(_)) => Err(ConfigError::MissingRequired {
            key: url_key.to_string(),
            hint: format!("{secret_key} is set, so {url_key} must be set too."),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const STRIPE: &[(&str, &str)] = &[
        ("STRIPE_SECRET_KEY", "sk_test_123"),
        ("STRIPE_PRICE_FREEMIUM", "price_free"),
        ("STRIPE_PRICE_PRO", "price_pro"),
        ("STRIPE_PRICE_LUXURY", "price_lux"),
    ];

    #[test]
    fn proxy_config_reports_all_missing_values() {
        let err = ProxyConfig::from_lookup(env(&[("STRIPE_SECRET_KEY", "sk")])).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("STRIPE_PRICE_FREEMIUM"));
        assert!(text.contains("STRIPE_PRICE_PRO"));
        assert!(text.contains("STRIPE_PRICE_LUXURY"));
        assert!(!text.contains("STRIPE_SECRET_KEY,"));
    }

    #[test]
    fn proxy_config_defaults() {
        let config = ProxyConfig::from_lookup(env(STRIPE)).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.public_origin, "http://localhost:5173");
        assert_eq!(config.stripe_api_base, "https://api.stripe.com");
        assert_eq!(config.stripe_secret_key.expose_secret(), "sk_test_123");
        assert_eq!(config.tier_prices.pro, "price_pro");
        assert!(config.chat_webhook.is_none());
        assert!(config.vps_webhook.is_none());
    }

    #[test]
    fn proxy_config_reads_webhook_pairs() {
        let mut pairs = STRIPE.to_vec();
        pairs.push(("WEBHOOK_CHAT", "https://hooks.example/chat"));
        pairs.push(("CHAT_SECRET", "s3cret"));
        let config = ProxyConfig::from_lookup(env(&pairs)).unwrap();
        let chat = config.chat_webhook.unwrap();
        assert_eq!(chat.url, "https://hooks.example/chat");
        assert_eq!(chat.secret.expose_secret(), "s3cret");
    }

    #[test]
    fn half_configured_webhook_is_rejected() {
        let mut pairs = STRIPE.to_vec();
        pairs.push(("WEBHOOK_VPS", "https://hooks.example/vps"));
        let err = ProxyConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("VPS_SECRET"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut pairs = STRIPE.to_vec();
        pairs.push(("AGENT_HOST_PORT", "not-a-port"));
        assert!(matches!(
            ProxyConfig::from_lookup(env(&pairs)),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn wizard_config_overrides_and_defaults() {
        let config = WizardConfig::from_lookup(env(&[
            ("AGENT_HOST_MAX_SCENARIOS", "3"),
            ("AGENT_HOST_RELAY_TIMEOUT_SECS", "5"),
            ("AGENT_HOST_REQUIRE_PAYMENT", "true"),
        ]));
        assert_eq!(config.max_scenarios, 3);
        assert_eq!(config.relay_timeout, Duration::from_secs(5));
        assert!(config.require_payment);

        let defaults = WizardConfig::from_lookup(env(&[("AGENT_HOST_MAX_SCENARIOS", "0")]));
        assert_eq!(defaults.max_scenarios, DEFAULT_MAX_SCENARIOS);
        assert_eq!(defaults.relay_timeout, DEFAULT_RELAY_TIMEOUT);
        assert!(!defaults.require_payment);
    }
}
