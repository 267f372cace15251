use std::net::SocketAddr;

use account_api::{app::AppState, config::Config, error::Error};
use axum::{http::Uri, routing, Router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn fallback(uri: Uri) -> Error {
    Error::NotFound(uri)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "account_api=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let app_state = AppState::new(&config, &config.database_name).await.unwrap();
    app_state.run_migration().await.unwrap();

    let auth = Router::new().route("/login", routing::post(account_api::api::v1::auth::login));

    let user = Router::new()
        .route(
            "/register",
            routing::post(account_api::api::v1::auth::register),
        )
        .route(
            "/updateuser",
            routing::post(account_api::api::v1::user::update_user),
        )
        .route(
            "/getuserbyid",
            routing::get(account_api::api::v1::user::get_user_by_id),
        )
        .route(
            "/getusers",
            routing::get(account_api::api::v1::user::get_users),
        )
        .route(
            "/getuserspage",
            routing::get(account_api::api::v1::user::get_users_page),
        )
        .route(
            "/getusersbyquery",
            routing::get(account_api::api::v1::user::get_users_by_query),
        )
        .route(
            "/deleteuser",
            routing::post(account_api::api::v1::user::delete_user),
        )
        .route(
            "/sendemailactivationcode",
            routing::post(account_api::api::v1::activation::send_email_activation_code),
        )
        .route(
            "/emailactivation",
            routing::post(account_api::api::v1::activation::email_activation),
        )
        .route(
            "/requestpasswordreset",
            routing::post(account_api::api::v1::activation::request_password_reset),
        )
        .route(
            "/resetpassword",
            routing::post(account_api::api::v1::activation::reset_password),
        )
        .nest(
            "/admin",
            Router::new()
                .route(
                    "/getallusers",
                    routing::get(account_api::api::v1::user::admin_get_all_users),
                )
                .route(
                    "/deleteuser",
                    routing::post(account_api::api::v1::user::admin_delete_user),
                ),
        );

    let app = Router::new()
        .nest("/api", Router::new().nest("/auth", auth).nest("/user", user))
        .fallback(fallback)
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::debug!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
