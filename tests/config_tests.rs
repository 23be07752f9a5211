use std::path::PathBuf;
use std::sync::Arc;

use atom_queue_core::config::ConfigManager;
use atom_queue_core::queue::InMemoryQueueService;
use atom_queue_core::services::QueueService;

fn repo_config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[test]
fn test_repository_config_loads_for_test_environment() {
    let manager =
        ConfigManager::load_from_directory_with_env(Some(repo_config_dir()), "test").unwrap();
    let config = manager.config();

    assert_eq!(manager.environment(), "test");
    assert_eq!(config.events.channel_capacity, 256);
    assert_eq!(config.monitor.temp_dir, PathBuf::from("/tmp/queue-engine-test"));
    // Base file values survive the overlay
    assert_eq!(config.queues.job_queue_name, "queue-engine.job-queue");
    assert_eq!(config.scanning.broker_uri, "tcp://localhost:61616");
}

#[test]
fn test_unknown_environment_uses_base_file() {
    let manager =
        ConfigManager::load_from_directory_with_env(Some(repo_config_dir()), "staging").unwrap();
    assert_eq!(manager.config().events.channel_capacity, 1024);
}

#[tokio::test]
async fn test_service_names_queues_from_config() {
    let manager =
        ConfigManager::load_from_directory_with_env(Some(repo_config_dir()), "test").unwrap();
    let service = InMemoryQueueService::new(Arc::new(manager.config().clone()));

    assert_eq!(service.job_queue_id(), "queue-engine.job-queue");
    let queue_id = service.register_new_active_queue().await.unwrap();
    assert_eq!(queue_id, "queue-engine.active-queue-1");
}
