//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run the reference load/refresh scenario against an in-memory store.
//! - Write core log lines under the system temp directory.
//! - Keep output deterministic for quick local sanity checks.

use lifeline_core::db::open_db_in_memory;
use lifeline_core::{
    default_log_level, init_logging, Child, EntityManager, LifecycleEvent, PostLoadCounter,
    SqliteEntityRepository, User,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("lifeline_core ping={}", lifeline_core::ping());
    println!("lifeline_core version={}", lifeline_core::core_version());

    match run_scenario() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("scenario failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_scenario() -> Result<(), Box<dyn Error>> {
    let log_dir = std::env::temp_dir().join("lifeline-cli-logs");
    init_logging(default_log_level(), &log_dir.to_string_lossy())?;
    println!("log_dir={}", log_dir.display());

    let conn = open_db_in_memory()?;
    let mut manager = EntityManager::new(SqliteEntityRepository::try_new(&conn)?);

    let mut user = User::new("Gblanco");
    user.add_child(Child::new());
    user.add_child(Child::new());
    manager.persist(user)?;
    manager.flush()?;
    manager.clear();

    let counter = Arc::new(PostLoadCounter::new());
    manager.add_event_listener(&[LifecycleEvent::PostLoad], counter.clone());

    let mut users = manager.find_all()?;
    let children = users.first().map_or(0, |user| user.children.len());
    println!("users={} children={children}", users.len());
    println!("child_loads_after_find={}", counter.child_calls());

    if let Some(user) = users.first_mut() {
        manager.refresh(user)?;
    }
    println!("child_loads_after_refresh={}", counter.child_calls());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::run_scenario;

    #[test]
    fn scenario_runs_with_logging_enabled() {
        run_scenario().unwrap();

        let (level, log_dir) = lifeline_core::logging_status().unwrap();
        assert_eq!(level, lifeline_core::default_log_level());
        assert!(log_dir.ends_with("lifeline-cli-logs"));
    }
}
