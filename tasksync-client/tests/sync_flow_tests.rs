mod common;

use std::time::Duration;

use common::{reserve_addr, test_config, wait_for_drain, MockServer};
use tasksync_client::{ClientEvent, TaskClient, TaskDraft, TaskFilter, TaskPatch};
use tasksync_core::models::{is_temp_id, OperationKind};

#[tokio::test]
async fn mutations_complete_locally_while_offline() {
    let dir = tempfile::tempdir().unwrap();
    let addr = reserve_addr().await;
    let client = TaskClient::new(test_config(format!("http://{addr}"), dir.path()))
        .await
        .unwrap();

    let created = client.create_task(TaskDraft::new("Buy milk")).await.unwrap();
    assert!(is_temp_id(&created.id));

    let updated = client
        .update_task(
            &created.id,
            TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.completed);

    let second = client.create_task(TaskDraft::new("Walk dog")).await.unwrap();
    client.delete_task(&second.id).await.unwrap();

    // Everything is visible locally, tombstones excluded, with no server.
    let visible = client.list_tasks(&TaskFilter::default()).await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].text, "Buy milk");
    assert!(client.get_task(&second.id).await.is_none());

    let status = client.status().await;
    assert!(!status.online);
    assert_eq!(status.pending_count, 4);
}

#[tokio::test]
async fn reconnect_drains_queue_and_reconciles_ids() {
    let dir = tempfile::tempdir().unwrap();
    let addr = reserve_addr().await;
    let client = TaskClient::new(test_config(format!("http://{addr}"), dir.path()))
        .await
        .unwrap();

    let created = client.create_task(TaskDraft::new("Buy milk")).await.unwrap();
    let temp_id = created.id.clone();
    assert_eq!(client.status().await.pending_count, 1);

    // Connectivity comes back; the next probe should start a drain.
    let server = MockServer::spawn_at(addr).await;
    assert!(wait_for_drain(&client).await);

    assert!(client.get_task(&temp_id).await.is_none());
    let synced = client.get_task("perm-1").await.expect("reconciled task");
    assert_eq!(synced.text, "Buy milk");

    let batches = server.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].operations.len(), 1);
    assert_eq!(batches[0].operations[0].temp_id.as_deref(), Some(&*temp_id));

    let status = client.status().await;
    assert!(status.online);
    assert_eq!(status.pending_count, 0);
}

#[tokio::test]
async fn batches_preserve_enqueue_order() {
    let dir = tempfile::tempdir().unwrap();
    let addr = reserve_addr().await;
    let client = TaskClient::new(test_config(format!("http://{addr}"), dir.path()))
        .await
        .unwrap();

    let task = client.create_task(TaskDraft::new("draft")).await.unwrap();
    client
        .update_task(
            &task.id,
            TaskPatch {
                text: Some("first edit".into()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    client
        .update_task(
            &task.id,
            TaskPatch {
                text: Some("second edit".into()),
                completed: Some(true),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    let server = MockServer::spawn_at(addr).await;
    assert!(wait_for_drain(&client).await);

    // The create arrives before both updates, and the updates arrive in
    // enqueue order within the same batch.
    let ops: Vec<_> = server
        .batches()
        .into_iter()
        .flat_map(|b| b.operations)
        .collect();
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0].kind, OperationKind::Create);
    assert_eq!(ops[1].kind, OperationKind::Update);
    assert_eq!(ops[2].kind, OperationKind::Update);
    // Dependent updates were rewritten to the permanent id before dispatch
    // or carried in the same batch under the temporary id.
    let update_target = ops[1].id.as_deref().unwrap();
    assert!(update_target == "perm-1" || is_temp_id(update_target));

    // The server-visible record is the net effect of both edits.
    let remote = server.task("perm-1").expect("server record");
    assert_eq!(remote.text, "second edit");
    assert!(remote.completed);
}

#[tokio::test]
async fn pending_operations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let addr = reserve_addr().await;
    let config = test_config(format!("http://{addr}"), dir.path());

    {
        let client = TaskClient::new(config.clone()).await.unwrap();
        client.create_task(TaskDraft::new("persisted")).await.unwrap();
        assert_eq!(client.status().await.pending_count, 1);
    }

    // A new session over the same store starts with the recovered queue and
    // drains it now that the server is reachable.
    let server = MockServer::spawn_at(addr).await;
    let client = TaskClient::new(config).await.unwrap();
    assert!(wait_for_drain(&client).await);

    assert_eq!(server.task("perm-1").unwrap().text, "persisted");
    assert_eq!(client.get_task("perm-1").await.unwrap().text, "persisted");
}

#[tokio::test]
async fn event_stream_reports_the_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let addr = reserve_addr().await;
    let client = TaskClient::new(test_config(format!("http://{addr}"), dir.path()))
        .await
        .unwrap();
    let mut events = client.subscribe();

    let created = client.create_task(TaskDraft::new("Buy milk")).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        ClientEvent::TaskCreated {
            id: created.id.clone()
        }
    );

    let _server = MockServer::spawn_at(addr).await;
    assert!(wait_for_drain(&client).await);

    // The id rewrite is observable only after the store already holds the
    // permanent id.
    let mut saw_id_change = false;
    let mut saw_completion = false;
    let deadline = tokio::time::Instant::now() + common::WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline && !(saw_id_change && saw_completion) {
        match tokio::time::timeout(Duration::from_millis(250), events.recv()).await {
            Ok(Ok(ClientEvent::TaskIdChanged { old_id, new_id })) => {
                assert_eq!(old_id, created.id);
                assert_eq!(new_id, "perm-1");
                assert!(client.get_task("perm-1").await.is_some());
                saw_id_change = true;
            }
            Ok(Ok(ClientEvent::SyncCompleted { synced, remaining })) => {
                assert_eq!(synced, 1);
                assert_eq!(remaining, 0);
                saw_completion = true;
            }
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }
    assert!(saw_id_change);
    assert!(saw_completion);
}
