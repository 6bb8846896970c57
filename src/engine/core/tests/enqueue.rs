use super::*;

#[test]
fn enqueue_reports_one_based_position() {
    let (_tx, mut core, _dir) = test_setup();

    assert_eq!(enqueue_one(&mut core, QueueClass::OrderNormal, "a", 1_000), 1);
    assert_eq!(enqueue_one(&mut core, QueueClass::OrderNormal, "b", 2_000), 2);
    assert_eq!(enqueue_one(&mut core, QueueClass::OrderNormal, "c", 3_000), 3);
}

#[test]
fn depths_are_tracked_per_queue() {
    let (_tx, mut core, _dir) = test_setup();

    enqueue_one(&mut core, QueueClass::OrderNormal, "a", 1_000);
    enqueue_one(&mut core, QueueClass::OtherRetry, "b", 1_000);
    enqueue_one(&mut core, QueueClass::OtherRetry, "c", 2_000);

    assert_eq!(core.depths[QueueClass::OrderNormal.idx()], 1);
    assert_eq!(core.depths[QueueClass::OtherRetry.idx()], 2);
    assert_eq!(core.depths[QueueClass::OrderRetry.idx()], 0);
    assert_eq!(core.depths[QueueClass::OtherNormal.idx()], 0);
}

#[test]
fn enqueue_persists_the_entry() {
    let (_tx, mut core, _dir) = test_setup();

    enqueue_one(&mut core, QueueClass::OtherNormal, "payload-1", 5_000);

    let listed = core
        .storage()
        .list_entries(QueueClass::OtherNormal, 10)
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].1.payload, "payload-1");
    assert_eq!(listed[0].1.score, 5_000);
}

#[test]
fn enqueue_command_replies_with_position() {
    let (_tx, mut core, _dir) = test_setup();

    let (reply, rx) = tokio::sync::oneshot::channel();
    core.handle_command(EngineCommand::Enqueue {
        queue: QueueClass::OrderRetry,
        payload: "retry-me".to_string(),
        score: 1_000,
        reply,
    });
    assert_eq!(rx.blocking_recv().unwrap().unwrap(), 1);
}

#[test]
fn depth_command_replies_with_current_depth() {
    let (_tx, mut core, _dir) = test_setup();
    fill_queue(&mut core, QueueClass::OtherNormal, 1_000, 4);

    let (reply, rx) = tokio::sync::oneshot::channel();
    core.handle_command(EngineCommand::Depth {
        queue: QueueClass::OtherNormal,
        reply,
    });
    assert_eq!(rx.blocking_recv().unwrap(), 4);
}

#[test]
fn shutdown_command_stops_the_loop() {
    let (_tx, mut core, _dir) = test_setup();
    assert!(core.running);
    core.handle_command(EngineCommand::Shutdown);
    assert!(!core.running);
}
