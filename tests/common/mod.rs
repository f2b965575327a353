use std::{
    env,
    sync::{Mutex, MutexGuard, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use mongodb::{Client, bson::doc};

use lavka::models::User;
use lavka::state::{AppState, NewEmployee, init_state, sign_up};

/// Global lock so integration tests that mutate the DB run one-at-a-time.
static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestContext {
    pub state: AppState,
    pub db_name: String,
    _guard: MutexGuard<'static, ()>,
}

pub async fn setup_state() -> Option<TestContext> {
    let guard = TEST_DB_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("failed to lock test db mutex");

    let uri = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = format!(
        "lavkatest_{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis()
    );
    unsafe {
        env::set_var("MONGODB_DB", &db_name);
    }

    let client = match Client::with_uri_str(&uri).await {
        Ok(c) => c,
        Err(err) => {
            eprintln!("Skipping test; cannot connect to MongoDB: {err:?}");
            drop(guard);
            return None;
        }
    };
    if let Err(err) = client.database(&db_name).drop().await {
        eprintln!("Skipping test; cannot drop test DB: {err:?}");
        drop(guard);
        return None;
    }

    match init_state().await {
        Ok(state) => Some(TestContext {
            state,
            db_name,
            _guard: guard,
        }),
        Err(err) => {
            eprintln!("Skipping test; init_state failed: {err:?}");
            drop(guard);
            None
        }
    }
}

pub async fn teardown(ctx: Option<TestContext>) {
    if let Some(ctx) = ctx {
        if let Ok(client) = Client::with_uri_str(
            env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
        )
        .await
        {
            let _ = client.database(&ctx.db_name).drop().await;
        }
        drop(ctx);
    }
}

/// Multi-document transactions need a replica set; a plain standalone
/// `mongod` refuses to start one. Probe once so ledger tests can skip
/// instead of failing on such servers.
#[allow(dead_code)]
pub async fn transactions_supported(state: &AppState) -> bool {
    let mut session = match state.client.start_session().await {
        Ok(s) => s,
        Err(_) => return false,
    };
    if session.start_transaction().await.is_err() {
        return false;
    }
    let probe = state
        .users
        .find_one(doc! { "email": "txn-probe@example.com" })
        .session(&mut session)
        .await;
    let _ = session.abort_transaction().await;
    if probe.is_err() {
        eprintln!("Skipping test; MongoDB server does not support transactions");
        return false;
    }
    true
}

#[allow(dead_code)]
pub async fn create_test_employee(state: &AppState, email: &str) -> User {
    sign_up(
        state,
        NewEmployee {
            email: email.to_string(),
            password: "sup3rsecret".to_string(),
            first_name: "Test".to_string(),
            last_name: "Employee".to_string(),
            middle_name: String::new(),
            job_position: "manager".to_string(),
            gender: "other".to_string(),
        },
    )
    .await
    .expect("failed to create test employee")
}
