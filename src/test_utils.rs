#[cfg(test)]
pub mod test_utils {
    use crate::config::{Settings, build_app_state};
    use crate::gate::SESSION_COOKIE;
    use crate::handlers::auth::LoginForm;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use axum::http::{HeaderValue, StatusCode};
    use axum_test::{TestResponse, TestServer};
    use chrono::{DateTime, Utc};
    use migration::{Migrator, MigratorTrait};
    use model::entities::{dataset, user};
    use registry::auth::hash_password;
    use registry::{AccountStore, DatasetStore, MediaStorage, NewAccount, NewDataset, Registry};
    use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::FmtSubscriber;

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        db.execute_unprepared("PRAGMA foreign_keys = ON;")
            .await
            .expect("Failed to enable foreign keys");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    pub async fn setup_test_registry() -> Registry {
        Registry::new(setup_test_db().await)
    }

    /// Settings for tests: any host, short-lived files under `media_root`.
    pub fn test_settings(media_root: &Path) -> Settings {
        Settings {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            debug: true,
            allowed_hosts: vec!["*".to_string()],
            media_root: media_root.to_path_buf(),
            session_timeout_secs: 3600,
        }
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state(media_root: &Path) -> AppState {
        build_app_state(setup_test_registry().await, test_settings(media_root))
    }

    /// Installs the global test subscriber once, writing through the test
    /// harness so output is only shown for failing tests.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    pub fn init_test_tracing() {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        // Another test may have installed it already
        let _ = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    }

    /// In-memory log sink shared with a capturing subscriber.
    #[derive(Clone, Default)]
    pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("Log buffer poisoned")).into_owned()
        }
    }

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("Log buffer poisoned").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Records everything down to TRACE, spans included, into `buffer` for as
    /// long as the returned guard lives on this thread.
    pub fn capture_logs(buffer: &LogBuffer) -> DefaultGuard {
        let buffer = buffer.clone();
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(move || buffer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing, returning the state so tests can seed it
    pub async fn setup_test_app(media_root: &Path) -> (Router, AppState) {
        init_test_tracing();

        let state = setup_test_app_state(media_root).await;
        let router = create_router(state.clone());
        (router, state)
    }

    pub async fn setup_test_server(media_root: &Path) -> (TestServer, AppState) {
        let (app, state) = setup_test_app(media_root).await;
        (TestServer::new(app).unwrap(), state)
    }

    async fn create_test_account(
        registry: &Registry,
        username: &str,
        password: &str,
        superuser: bool,
    ) -> user::Model {
        registry
            .create_account(NewAccount {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(password).expect("Failed to hash password"),
                is_active: true,
                is_staff: superuser,
                is_superuser: superuser,
            })
            .await
            .expect("Failed to create test account")
    }

    pub async fn create_test_superuser(
        registry: &Registry,
        username: &str,
        password: &str,
    ) -> user::Model {
        create_test_account(registry, username, password, true).await
    }

    pub async fn create_test_user(registry: &Registry, username: &str) -> user::Model {
        create_test_account(registry, username, "user-password", false).await
    }

    /// Writes `contents` under the media datasets directory and registers it.
    pub async fn create_test_dataset(
        state: &AppState,
        owner: &user::Model,
        name: &str,
        contents: &str,
        uploaded_at: DateTime<Utc>,
    ) -> dataset::Model {
        let dir = state.media.datasets_dir();
        std::fs::create_dir_all(&dir).expect("Failed to create datasets directory");
        std::fs::write(dir.join(name), contents).expect("Failed to write dataset file");

        state
            .registry
            .create_dataset(NewDataset {
                user_id: owner.id,
                name: name.to_string(),
                file: MediaStorage::dataset_path(name),
                file_size: contents.len() as i64,
                schema_signature: String::new(),
                uploaded_at,
            })
            .await
            .expect("Failed to create test dataset")
    }

    /// Posts the login form.
    pub async fn login(
        server: &TestServer,
        username: &str,
        password: &str,
    ) -> TestResponse {
        server
            .post("/admin-panel/login/")
            .form(&LoginForm {
                username: username.to_string(),
                password: password.to_string(),
                next: None,
            })
            .await
    }

    /// Creates the `admin` superuser and returns a server plus its session cookie.
    pub async fn setup_signed_in_server(
        media_root: &Path,
    ) -> (TestServer, AppState, user::Model, HeaderValue) {
        let (server, state) = setup_test_server(media_root).await;
        let admin = create_test_superuser(&state.registry, "admin", "admin-password").await;

        let response = login(&server, "admin", "admin-password").await;
        response.assert_status(StatusCode::SEE_OTHER);
        let cookie = response.cookie(SESSION_COOKIE);
        let header = HeaderValue::from_str(&format!("{}={}", cookie.name(), cookie.value()))
            .expect("Invalid session cookie");

        (server, state, admin, header)
    }
}
