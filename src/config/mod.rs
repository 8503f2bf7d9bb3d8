// Configuration module

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Absent means the in-process store (nothing survives a restart).
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Comma-separated CORS origins.
    pub frontend_url: String,
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub storage_bucket: String,
    pub upload_dir: String,
    pub public_base_url: String,
    pub admin_token: Option<String>,
    pub environment: Environment,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Supabase credentials, present only when both halves are configured.
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_role_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::default())
    }

    fn load(source: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("database_max_connections", 20)?
            .set_default("frontend_url", "http://localhost:3000")?
            .set_default("storage_bucket", "uploads")?
            .set_default("upload_dir", "./uploads")?
            .set_default("public_base_url", "http://localhost:8080")?
            .set_default("environment", "development")?
            .add_source(source.try_parsing(true))
            .build()?;

        let mut parsed: Config = config.try_deserialize()?;
        // An exported but empty variable counts as unset.
        for value in [
            &mut parsed.database_url,
            &mut parsed.supabase_url,
            &mut parsed.supabase_service_role_key,
            &mut parsed.admin_token,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        Ok(parsed)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn frontend_origins(&self) -> Vec<String> {
        self.frontend_url
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn supabase(&self) -> Option<SupabaseSettings> {
        match (&self.supabase_url, &self.supabase_service_role_key) {
            (Some(url), Some(key)) => Some(SupabaseSettings {
                url: url.trim_end_matches('/').to_string(),
                service_role_key: key.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(config::Environment::default().source(Some(map))).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[]);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.database_max_connections, 20);
        assert_eq!(config.storage_bucket, "uploads");
        assert_eq!(config.environment, Environment::Development);
        assert!(config.database_url.is_none());
        assert!(config.supabase().is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("SERVER_PORT", "9090"),
            ("ENVIRONMENT", "production"),
            ("FRONTEND_URL", "https://admin.example.org, http://localhost:3000"),
            ("SUPABASE_URL", "https://proj.supabase.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
            ("ADMIN_TOKEN", ""),
        ]);
        assert_eq!(config.server_port, 9090);
        assert!(config.is_production());
        assert_eq!(
            config.frontend_origins(),
            vec!["https://admin.example.org", "http://localhost:3000"]
        );
        assert_eq!(
            config.supabase(),
            Some(SupabaseSettings {
                url: "https://proj.supabase.co".into(),
                service_role_key: "service-key".into(),
            })
        );
        assert!(config.admin_token.is_none());
    }
}
