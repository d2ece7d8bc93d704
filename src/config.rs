use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub security: SmtpSecurity,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS, port 465).
    Tls,
    /// Plain connection upgraded with STARTTLS (submission, port 587).
    StartTls,
    None,
}

impl SmtpSecurity {
    pub fn for_port(port: u16) -> Self {
        if port == 465 {
            SmtpSecurity::Tls
        } else {
            SmtpSecurity::StartTls
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Some(SmtpSecurity::Tls),
            "starttls" => Some(SmtpSecurity::StartTls),
            "none" => Some(SmtpSecurity::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    /// `None` when any of the SMTP variables is missing; sends then fail and are logged.
    pub smtp: Option<SmtpConfig>,
    pub admin_email: String,
    pub frontend_url: String,
    pub public_dir: String,
    /// Overrides the `http://<Host>` base used for photo URLs and verification links.
    pub public_base_url: Option<String>,
    pub verification_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => database_url_from_parts()?,
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .or_else(|_| std::env::var("SECRET_JWT"))
                .context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recetario".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "recetario-web".into()),
            ttl_minutes: parse_var("JWT_TTL_MINUTES").unwrap_or(60 * 24),
        };

        Ok(Self {
            database_url,
            max_connections: parse_var("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            smtp: smtp_from_env(),
            admin_email: std::env::var("SMTP_TO_EMAIL").unwrap_or_else(|_| "admin@example.com".into()),
            frontend_url: std::env::var("RUTA_FRONTEND").unwrap_or_else(|_| "/".into()),
            public_dir: std::env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".into()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            verification_ttl_hours: parse_var("VERIFICATION_TTL_HOURS").unwrap_or(48),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

fn database_url_from_parts() -> anyhow::Result<String> {
    let user = std::env::var("DB_USER").context("neither DATABASE_URL nor DB_USER is set")?;
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let server = std::env::var("DB_SERVER").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".into());
    let name = std::env::var("DB_NAME").context("DB_NAME is not set")?;
    Ok(compose_database_url(&user, &password, &server, &port, &name))
}

fn compose_database_url(user: &str, password: &str, server: &str, port: &str, name: &str) -> String {
    if password.is_empty() {
        format!("postgres://{}@{}:{}/{}", user, server, port, name)
    } else {
        format!("postgres://{}:{}@{}:{}/{}", user, password, server, port, name)
    }
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let host = std::env::var("SMTP_HOST").ok().filter(|v| !v.is_empty())?;
    let port = parse_var::<u16>("SMTP_PORT")?;
    let user = std::env::var("SMTP_USER").ok().filter(|v| !v.is_empty())?;
    let password = std::env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty())?;
    let from_email = std::env::var("SMTP_FROM_EMAIL")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "noreply@example.com".into());
    // SMTP_SECURITY overrides the mode implied by the port
    let security = std::env::var("SMTP_SECURITY")
        .ok()
        .and_then(|v| SmtpSecurity::parse(&v))
        .unwrap_or_else(|| SmtpSecurity::for_port(port));
    Some(SmtpConfig {
        host,
        port,
        user,
        password,
        from_email,
        security,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_url_with_and_without_password() {
        assert_eq!(
            compose_database_url("chef", "s3cret", "db", "5432", "recetas"),
            "postgres://chef:s3cret@db:5432/recetas"
        );
        assert_eq!(
            compose_database_url("chef", "", "localhost", "5433", "recetas"),
            "postgres://chef@localhost:5433/recetas"
        );
    }

    #[test]
    fn smtp_security_follows_the_port() {
        assert_eq!(SmtpSecurity::for_port(465), SmtpSecurity::Tls);
        assert_eq!(SmtpSecurity::for_port(587), SmtpSecurity::StartTls);
        assert_eq!(SmtpSecurity::for_port(25), SmtpSecurity::StartTls);
    }

    #[test]
    fn smtp_security_override_is_case_insensitive() {
        assert_eq!(SmtpSecurity::parse("STARTTLS"), Some(SmtpSecurity::StartTls));
        assert_eq!(SmtpSecurity::parse(" ssl "), Some(SmtpSecurity::Tls));
        assert_eq!(SmtpSecurity::parse("none"), Some(SmtpSecurity::None));
        assert_eq!(SmtpSecurity::parse("maybe"), None);
    }
}
