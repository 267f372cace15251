use axum::extract::FromRef;

use crate::{
    api::v1::{auth::UserCollection, token::JwtState},
    config::Config,
    error::Error,
    mail::Mailer,
    migrate::MigrationCollection,
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub argon: argon2::Argon2<'static>,
    pub jwt_state: JwtState,
    pub mailer: Mailer,

    pub mongo_client: mongodb::Client,
    pub migrate_collection: MigrationCollection,
    pub user_collection: UserCollection,
}

impl AppState {
    pub async fn new(config: &Config, database_name: &str) -> Result<Self, Error> {
        let argon = argon2::Argon2::default();
        let jwt_state = JwtState::new(
            &config.jwt_secret,
            config.session_token_expiry,
            config.reset_token_expiry,
        );
        let mailer = Mailer::from_config(config.smtp.as_ref())?;

        let mongo_client_opt = mongodb::options::ClientOptions::parse(&config.mongodb_uri)
            .await
            .map_err(Error::Database)?;
        let mongo_client =
            mongodb::Client::with_options(mongo_client_opt).map_err(Error::Database)?;

        let db = mongo_client.database(database_name);
        Ok(Self {
            argon,
            jwt_state,
            mailer,

            mongo_client,
            migrate_collection: MigrationCollection(db.collection("migrations").into()),
            user_collection: UserCollection(db.collection("users").into()),
        })
    }

    pub async fn new_from_env() -> Result<Self, Error> {
        let config = Config::from_env();

        Self::new(&config, &config.database_name).await
    }
}
