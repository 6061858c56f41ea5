//! End-to-end replication between real nodes over loopback UDP.

mod common;

use common::{drop_file, fast_settings, mesh, mesh_seeded, read, start, wait_until};
use std::time::Duration;
use tokio::sync::watch;

const PROPAGATION_LIMIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_create_modify_delete_propagate() {
    let mut nodes = mesh(2, fast_settings()).await;
    let stats_a = nodes[0].node.as_ref().unwrap().stats_handle();
    let stats_b = nodes[1].node.as_ref().unwrap().stats_handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle_a = start(&mut nodes[0], shutdown_rx.clone());
    let handle_b = start(&mut nodes[1], shutdown_rx);

    let dir_a = nodes[0].dir.path().to_path_buf();
    let dir_b = nodes[1].dir.path().to_path_buf();

    // Create on A
    drop_file(&dir_a, "notes.txt", b"hello");
    assert!(
        wait_until(|| read(&dir_b, "notes.txt").as_deref() == Some(&b"hello"[..]), PROPAGATION_LIMIT).await,
        "create did not reach node B"
    );

    // Modify on A
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop_file(&dir_a, "notes.txt", b"hello again");
    assert!(
        wait_until(|| read(&dir_b, "notes.txt").as_deref() == Some(&b"hello again"[..]), PROPAGATION_LIMIT).await,
        "modification did not reach node B"
    );

    // Delete on A
    std::fs::remove_file(dir_a.join("notes.txt")).unwrap();
    assert!(
        wait_until(|| !dir_b.join("notes.txt").exists(), PROPAGATION_LIMIT).await,
        "delete did not reach node B"
    );

    // Let a few more cycles run so any echo would have been sent
    tokio::time::sleep(Duration::from_millis(300)).await;

    {
        let a = stats_a.read();
        let b = stats_b.read();
        assert_eq!(a.events_detected, 3);
        assert_eq!(b.events_applied, 3);
        assert_eq!(b.events_detected, 0, "replicated changes were re-broadcast");
        assert_eq!(a.datagrams_received, 0);
    }

    shutdown_tx.send(true).unwrap();
    handle_a.await.unwrap().unwrap();
    handle_b.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_binary_content_survives_transfer() {
    let mut nodes = mesh(2, fast_settings()).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle_a = start(&mut nodes[0], shutdown_rx.clone());
    let handle_b = start(&mut nodes[1], shutdown_rx);

    let content: Vec<u8> = (0..=255u8).chain(b"|CREATE|x|".iter().copied()).collect();
    drop_file(nodes[1].dir.path(), "blob.bin", &content);

    let dir_a = nodes[0].dir.path().to_path_buf();
    assert!(wait_until(|| read(&dir_a, "blob.bin").as_deref() == Some(&content[..]), PROPAGATION_LIMIT).await);

    shutdown_tx.send(true).unwrap();
    handle_a.await.unwrap().unwrap();
    handle_b.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_three_node_fan_out() {
    let mut nodes = mesh(3, fast_settings()).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = nodes.iter_mut().map(|n| start(n, shutdown_rx.clone())).collect();

    drop_file(nodes[0].dir.path(), "report.csv", b"a,b,c\n1,2,3\n");

    let dir_b = nodes[1].dir.path().to_path_buf();
    let dir_c = nodes[2].dir.path().to_path_buf();
    assert!(wait_until(|| read(&dir_b, "report.csv").is_some(), PROPAGATION_LIMIT).await);
    assert!(wait_until(|| read(&dir_c, "report.csv").is_some(), PROPAGATION_LIMIT).await);

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_existing_files_are_not_announced() {
    let mut nodes = mesh_seeded(2, fast_settings(), |i, dir| {
        if i == 0 {
            std::fs::write(dir.join("already-here.txt"), "old").unwrap();
        }
    })
    .await;
    let stats_a = nodes[0].node.as_ref().unwrap().stats_handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle_a = start(&mut nodes[0], shutdown_rx.clone());
    let handle_b = start(&mut nodes[1], shutdown_rx);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stats_a.read().events_detected, 0);
    assert!(!nodes[1].dir.path().join("already-here.txt").exists());

    shutdown_tx.send(true).unwrap();
    handle_a.await.unwrap().unwrap();
    handle_b.await.unwrap().unwrap();
}
