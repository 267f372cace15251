use time::Duration;

/// Process configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,

    pub jwt_secret: String,
    pub session_token_expiry: Duration,
    pub reset_token_expiry: Duration,

    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|it| it.parse().ok())
            .unwrap_or(3000);

        let mongodb_uri = std::env::var("MONGODB_URI")
            .expect("Cannot retreive MONGODB_URI from environment variable.");
        let database_name =
            std::env::var("DATABASE_NAME").unwrap_or_else(|_| "accounts".to_string());

        let jwt_secret = std::env::var("JWT_SECRET")
            .expect("Cannot retreive JWT_SECRET from environment variable.");
        let session_token_expiry = std::env::var("JWT_EXPIRES_IN_DAYS")
            .ok()
            .and_then(|it| it.parse().ok())
            .map(Duration::days)
            .unwrap_or_else(|| Duration::days(1));
        let reset_token_expiry = std::env::var("RESET_TOKEN_EXPIRES_IN_MINUTES")
            .ok()
            .and_then(|it| it.parse().ok())
            .map(Duration::minutes)
            .unwrap_or_else(|| Duration::minutes(15));

        // mail is optional, without credentials dispatch is disabled
        let smtp = match (
            std::env::var("EMAIL_HOST"),
            std::env::var("EMAIL_USER"),
            std::env::var("EMAIL_PASS"),
        ) {
            (Ok(host), Ok(username), Ok(password)) => {
                let from = std::env::var("EMAIL_FROM").unwrap_or_else(|_| username.clone());
                Some(SmtpConfig {
                    host,
                    username,
                    password,
                    from,
                })
            }
            _ => None,
        };

        Self {
            port,
            mongodb_uri,
            database_name,
            jwt_secret,
            session_token_expiry,
            reset_token_expiry,
            smtp,
        }
    }
}
