//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use query_assistant::config::{
    AssistantConfig, AssistantSettings, DatabaseSettings, GeminiSettings,
};
use query_assistant::services::providers::mock::{fenced_json, MockChatProvider};
use query_assistant::services::providers::ChatProvider;
use query_assistant::services::{AssistantDb, ExecutionMode};
use query_assistant::startup::{AppState, Application};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;

/// Employees in the seeded database, numbered 10001 through 310024.
pub const EMPLOYEE_COUNT: i64 = 300_024;

/// Single-connection in-memory database with `employees` and `departments`.
pub async fn seeded_db() -> AssistantDb {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    for statement in [
        "CREATE TABLE employees (emp_no INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT)",
        "CREATE TABLE departments (dept_no TEXT PRIMARY KEY, dept_name TEXT NOT NULL UNIQUE)",
        "INSERT INTO employees (emp_no) \
         WITH RECURSIVE seq(n) AS (SELECT 10001 UNION ALL SELECT n + 1 FROM seq WHERE n < 310024) \
         SELECT n FROM seq",
        "UPDATE employees SET first_name = 'Georgi', last_name = 'Facello' WHERE emp_no = 10001",
        "INSERT INTO departments VALUES ('d001', 'Marketing'), ('d002', 'Finance')",
    ] {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to seed database");
    }

    AssistantDb::new(pool)
}

pub fn test_config(mode: ExecutionMode) -> AssistantConfig {
    AssistantConfig {
        common: service_core::config::Config {
            port: 0,
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
        gemini: GeminiSettings {
            api_key: "test-api-key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_base: "http://localhost:0".to_string(),
            temperature: 1.0,
            top_p: 0.99,
            top_k: 0,
            max_output_tokens: 4096,
        },
        database: DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        assistant: AssistantSettings {
            execution_mode: mode,
            max_attempts: 4,
            history_window: 0,
        },
    }
}

/// Assistant state wired to the mock and a freshly seeded database.
pub async fn test_state(mock: Arc<MockChatProvider>, mode: ExecutionMode) -> AppState {
    let provider: Arc<dyn ChatProvider> = mock;
    AppState::new(test_config(mode), seeded_db().await, provider)
}

pub fn sql_reply(sql: &str) -> String {
    fenced_json(&json!({ "sqlQuery": sql, "description": "generated for the test" }))
}

pub fn summary_reply(message: &str) -> String {
    fenced_json(&json!({ "message": message }))
}

pub struct TestApp {
    pub address: String,
    pub state: AppState,
}

/// Serve the assistant on a random port.
pub async fn spawn_app(mock: Arc<MockChatProvider>, mode: ExecutionMode) -> TestApp {
    let provider: Arc<dyn ChatProvider> = mock;
    let app = Application::build_with(test_config(mode), seeded_db().await, provider)
        .await
        .expect("Failed to build application");

    let address = format!("http://127.0.0.1:{}", app.http_port());
    let state = app.state().clone();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    TestApp { address, state }
}
