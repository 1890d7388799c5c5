mod config;
mod domain;
mod infrastructure;
mod presentation;
mod usecase;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Settings,
    infrastructure::{argon2_password_hasher::Argon2PasswordHasher, hashing_pool::HashingPool},
    presentation::handlers::password_handler::{StatusPolicy, create_password_router},
    usecase::{
        hash_password_usecase::HashPasswordUsecase,
        verify_password_usecase::VerifyPasswordUsecase,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional, defaults cover everything
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let password_hasher = Argon2PasswordHasher::new(settings.cost, settings.verify_limit)?;
    let pool = HashingPool::new(
        settings.max_concurrent_hashes,
        settings.admission_timeout,
        settings.hash_timeout,
    );
    let hash_service = HashPasswordUsecase::new(
        password_hasher.clone(),
        pool.clone(),
        settings.max_password_bytes,
    );
    let verify_service = VerifyPasswordUsecase::new(
        password_hasher.clone(),
        pool.clone(),
        settings.max_password_bytes,
    );
    let status_policy = if settings.strict_status_codes {
        StatusPolicy::Strict
    } else {
        StatusPolicy::Compatible
    };

    let app = create_password_router(hash_service, verify_service, status_policy);

    info!(
        addr = %settings.addr,
        m_cost = password_hasher.params().m_cost(),
        t_cost = password_hasher.params().t_cost(),
        p_cost = password_hasher.params().p_cost(),
        max_concurrent = pool.max_concurrent(),
        worst_case_memory_mib = settings.worst_case_memory_kib() / 1024,
        ?status_policy,
        "Starting password hashing service"
    );

    let listener = TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use http_body_util::BodyExt;
    use rstest::*;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    use crate::{
        domain::{
            error::DomainError,
            models::credential::{HashedPassword, PlainPassword},
            services::password_service::PasswordHasher,
        },
        infrastructure::{argon2_password_hasher::Argon2PasswordHasher, hashing_pool::HashingPool},
        presentation::handlers::password_handler::{
            HashRequest, ResultEnvelope, StatusPolicy, VerifyRequest, create_password_router,
        },
        usecase::{
            hash_password_usecase::HashPasswordUsecase,
            verify_password_usecase::VerifyPasswordUsecase,
        },
    };

    const MAX_PASSWORD_BYTES: usize = 1024;

    // hasher whose primitive always fails
    #[derive(Clone)]
    struct FailingPasswordHasher;

    impl PasswordHasher for FailingPasswordHasher {
        fn hash(&self, _plain_password: &PlainPassword) -> Result<HashedPassword, DomainError> {
            Err(DomainError::HashFailed("memory allocation failed".to_string()))
        }

        fn verify(
            &self,
            _plain_password: &PlainPassword,
            _hashed_password: &HashedPassword,
        ) -> Result<bool, DomainError> {
            Err(DomainError::HashFailed("memory allocation failed".to_string()))
        }
    }

    fn build_app<P: PasswordHasher + Send + Sync + 'static>(
        password_hasher: P,
        status_policy: StatusPolicy,
    ) -> Router {
        let pool = HashingPool::new(4, Duration::from_secs(5), Duration::from_secs(10));
        build_app_with_pool(password_hasher, pool, status_policy)
    }

    fn build_app_with_pool<P: PasswordHasher + Send + Sync + 'static>(
        password_hasher: P,
        pool: HashingPool,
        status_policy: StatusPolicy,
    ) -> Router {
        let hash_service =
            HashPasswordUsecase::new(password_hasher.clone(), pool.clone(), MAX_PASSWORD_BYTES);
        let verify_service =
            VerifyPasswordUsecase::new(password_hasher, pool, MAX_PASSWORD_BYTES);

        // setup router: sync settings of main.app
        create_password_router(hash_service, verify_service, status_policy)
    }

    #[fixture]
    async fn test_app() -> Router {
        build_app(Argon2PasswordHasher::cheap(), StatusPolicy::Compatible)
    }

    #[fixture]
    async fn strict_app() -> Router {
        build_app(Argon2PasswordHasher::cheap(), StatusPolicy::Strict)
    }

    #[fixture]
    async fn failing_app() -> Router {
        build_app(FailingPasswordHasher, StatusPolicy::Compatible)
    }

    /// # Description
    ///
    /// Send a JSON POST to `uri` and return the raw response
    async fn post(app: Router, uri: &str, body: String) -> Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn envelope<T: DeserializeOwned>(response: Response) -> ResultEnvelope<T> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn hash_body(password: &str) -> String {
        serde_json::to_string(&HashRequest {
            password: password.to_string(),
        })
        .unwrap()
    }

    fn verify_body(password: &str, hash: &str) -> String {
        serde_json::to_string(&VerifyRequest {
            password: password.to_string(),
            hash: hash.to_string(),
        })
        .unwrap()
    }

    async fn hash_of(app: Router, password: &str) -> String {
        let response = post(app, "/hash", hash_body(password)).await;
        envelope::<String>(response).await.data.unwrap()
    }

    fn assert_validation_error<T>(envelope: &ResultEnvelope<T>) {
        assert!(envelope.error);
        assert_eq!(envelope.message, "validation error");
        assert!(envelope.data.is_none());
    }

    // Hash

    #[rstest]
    #[tokio::test]
    async fn test_hash_positive(#[future] test_app: Router) {
        let app = test_app.await;

        let response = post(app, "/hash", hash_body("correct horse battery staple")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = envelope::<String>(response).await;
        assert!(!body.error);
        assert_eq!(body.message, "Success");
        assert!(body.data.unwrap().starts_with("$argon2id$"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_hash_twice_differs_and_both_verify(#[future] test_app: Router) {
        let app = test_app.await;
        let password = "correct horse battery staple";

        let first = hash_of(app.clone(), password).await;
        let second = hash_of(app.clone(), password).await;
        assert_ne!(first, second);

        for hash in [first, second] {
            let response = post(app.clone(), "/verify", verify_body(password, &hash)).await;
            assert_eq!(envelope::<bool>(response).await.data, Some(true));
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_hash_empty_password_negative(#[future] test_app: Router) {
        let app = test_app.await;

        let response = post(app, "/hash", hash_body("")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_validation_error(&envelope::<String>(response).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_hash_oversized_password_negative(#[future] test_app: Router) {
        let app = test_app.await;

        let response = post(app, "/hash", hash_body(&"a".repeat(MAX_PASSWORD_BYTES + 1))).await;

        assert_validation_error(&envelope::<String>(response).await);
    }

    #[rstest]
    #[case("{}")]
    #[case("{\"password\": 42}")]
    #[case("{\"password\": null}")]
    #[case("not json")]
    #[tokio::test]
    async fn test_hash_malformed_body_negative(#[future] test_app: Router, #[case] body: &str) {
        let app = test_app.await;

        let response = post(app, "/hash", body.to_string()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_validation_error(&envelope::<String>(response).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_hash_missing_content_type_negative(#[future] test_app: Router) {
        let app = test_app.await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/hash")
                    .body(Body::from(hash_body("password")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_validation_error(&envelope::<String>(response).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_hash_internal_failure(#[future] failing_app: Router) {
        let app = failing_app.await;

        let response = post(app, "/hash", hash_body("password")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = envelope::<String>(response).await;
        assert!(body.error);
        assert_eq!(body.message, "Internal Server Error");
        assert!(body.data.is_none());
    }

    // Verify

    #[rstest]
    #[tokio::test]
    async fn test_verify_positive(#[future] test_app: Router) {
        let app = test_app.await;
        let password = "correct horse battery staple";
        let hash = hash_of(app.clone(), password).await;

        let response = post(app, "/verify", verify_body(password, &hash)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = envelope::<bool>(response).await;
        assert!(!body.error);
        assert_eq!(body.message, "Success");
        assert_eq!(body.data, Some(true));
    }

    #[rstest]
    #[tokio::test]
    async fn test_verify_wrong_password_negative(#[future] test_app: Router) {
        let app = test_app.await;
        let hash = hash_of(app.clone(), "a different password").await;

        let response = post(app, "/verify", verify_body("wrong", &hash)).await;

        let body = envelope::<bool>(response).await;
        assert!(!body.error);
        assert_eq!(body.data, Some(false));
    }

    #[rstest]
    #[case("invalid-hash")]
    #[case("$argon2id$v=19$m=8,t=1,p=1$c2FsdA$")]
    #[case("$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW")]
    #[tokio::test]
    async fn test_verify_malformed_hash_is_false(#[future] test_app: Router, #[case] hash: &str) {
        let app = test_app.await;

        let response = post(app, "/verify", verify_body("password", hash)).await;

        let body = envelope::<bool>(response).await;
        assert!(!body.error);
        assert_eq!(body.data, Some(false));
    }

    #[rstest]
    #[case("", "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHRzYWx0$aGFzaA")]
    #[case("password", "")]
    #[tokio::test]
    async fn test_verify_empty_fields_negative(
        #[future] test_app: Router,
        #[case] password: &str,
        #[case] hash: &str,
    ) {
        let app = test_app.await;

        let response = post(app, "/verify", verify_body(password, hash)).await;

        assert_validation_error(&envelope::<bool>(response).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_verify_missing_hash_negative(#[future] test_app: Router) {
        let app = test_app.await;

        let response = post(app, "/verify", "{\"password\":\"password\"}".to_string()).await;

        assert_validation_error(&envelope::<bool>(response).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_verify_internal_failure(#[future] failing_app: Router) {
        let app = failing_app.await;

        let response = post(app, "/verify", verify_body("password", "mock_hash")).await;

        let body = envelope::<bool>(response).await;
        assert!(body.error);
        assert_eq!(body.message, "Internal Server Error");
    }

    // Status policy

    #[rstest]
    #[tokio::test]
    async fn test_strict_policy_validation_status(#[future] strict_app: Router) {
        let app = strict_app.await;

        let response = post(app, "/hash", hash_body("")).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_validation_error(&envelope::<String>(response).await);
    }

    #[rstest]
    #[tokio::test]
    async fn test_strict_policy_success_status(#[future] strict_app: Router) {
        let app = strict_app.await;

        let response = post(app, "/hash", hash_body("password")).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[rstest]
    #[case(StatusPolicy::Compatible, StatusCode::OK)]
    #[case(StatusPolicy::Strict, StatusCode::UNPROCESSABLE_ENTITY)]
    #[tokio::test]
    async fn test_oversized_body_negative(
        #[case] status_policy: StatusPolicy,
        #[case] expected_status: StatusCode,
    ) {
        let app = build_app(Argon2PasswordHasher::cheap(), status_policy);

        // well past the 64 KiB body limit, rejected before the password check
        let response = post(app, "/hash", hash_body(&"a".repeat(70 * 1024))).await;

        assert_eq!(response.status(), expected_status);
        assert_validation_error(&envelope::<String>(response).await);
    }

    #[rstest]
    #[case(StatusPolicy::Compatible, StatusCode::OK)]
    #[case(StatusPolicy::Strict, StatusCode::SERVICE_UNAVAILABLE)]
    #[tokio::test]
    async fn test_saturated_pool_status(
        #[case] status_policy: StatusPolicy,
        #[case] expected_status: StatusCode,
    ) {
        let pool = HashingPool::new(1, Duration::from_millis(20), Duration::from_secs(5));
        let _held = pool.occupy().await;
        let app = build_app_with_pool(Argon2PasswordHasher::cheap(), pool, status_policy);

        let response = post(app, "/hash", hash_body("password")).await;

        assert_eq!(response.status(), expected_status);
        let body = envelope::<String>(response).await;
        assert!(body.error);
        assert_eq!(body.message, "Internal Server Error");
        assert!(body.data.is_none());
    }

    #[tokio::test]
    async fn test_strict_policy_internal_status() {
        let app = build_app(FailingPasswordHasher, StatusPolicy::Strict);

        let response = post(app, "/hash", hash_body("password")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = envelope::<String>(response).await;
        assert_eq!(body.message, "Internal Server Error");
    }
}
