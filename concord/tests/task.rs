use concord::task::{self, TaskSet, TaskStatus};
use concord::time::sleep;
use concord::{Error, RuntimeBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[concord::test]
async fn test_cancel_wakes_a_sleeping_task() {
    let handle = task::spawn(async {
        task::sleep(Duration::from_secs(30)).await?;
        Ok("unreachable")
    });

    sleep(Duration::from_millis(20)).await;
    handle.cancel();

    assert!(handle.is_cancelled());
    assert!(matches!(handle.await, Err(Error::Cancelled)));
}

#[concord::test]
async fn test_cancelling_a_finished_task_has_no_effect() {
    let handle = task::spawn(async { Ok(7) });

    while handle.status() != TaskStatus::Completed {
        sleep(Duration::from_millis(5)).await;
    }

    handle.cancel();
    handle.cancel_handle().cancel();

    assert!(!handle.is_cancelled());
    assert_eq!(handle.status(), TaskStatus::Completed);
    assert_eq!(handle.await.unwrap(), 7);
}

#[concord::test]
async fn test_cancelled_before_checkpoint_still_reports_cancelled() {
    let reached = Arc::new(AtomicBool::new(false));
    let flag = reached.clone();

    let handle = task::spawn(async move {
        // Busy work without a checkpoint: the value it returns is discarded.
        sleep(Duration::from_millis(50)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(42)
    });

    sleep(Duration::from_millis(10)).await;
    handle.cancel();

    let status_probe = handle.cancel_handle();
    assert!(matches!(handle.await, Err(Error::Cancelled)));
    assert!(reached.load(Ordering::SeqCst));
    assert_eq!(status_probe.status(), TaskStatus::Cancelled);
}

#[test]
fn test_task_cancelled_before_first_poll_never_runs() {
    let rt = RuntimeBuilder::new().worker_threads(1).build().unwrap();
    let ran = Arc::new(AtomicBool::new(false));

    let outcome = rt.block_on({
        let ran = ran.clone();
        async move {
            let handle = task::spawn(async move {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            });

            // Single worker, busy with us: the child cannot have started.
            handle.cancel();
            handle.await
        }
    });

    assert!(matches!(outcome, Err(Error::Cancelled)));
    assert!(!ran.load(Ordering::SeqCst));
}

#[concord::test]
async fn test_check_cancellation_loop() {
    let iterations = Arc::new(AtomicUsize::new(0));
    let counter = iterations.clone();

    let handle = task::spawn(async move {
        while !task::is_cancelled() {
            counter.fetch_add(1, Ordering::SeqCst);
            concord::yield_now().await;
        }

        task::check_cancellation()
    });

    while iterations.load(Ordering::SeqCst) < 10 {
        concord::yield_now().await;
    }

    handle.cancel();
    assert!(handle.await.unwrap_err().is_cancelled());
}

#[concord::test]
async fn test_current_id_matches_handle() {
    let handle = task::spawn(async { Ok(task::current_id()) });
    let id = handle.id();

    assert_eq!(handle.await.unwrap(), Some(id));
    assert_eq!(id.to_string(), format!("task-{}", id.as_u64()));
}

#[concord::test]
async fn test_failed_task_status() {
    let handle = task::spawn(async { Err::<(), _>(Error::failed("disk full")) });
    let probe = handle.cancel_handle();

    assert!(matches!(handle.await, Err(Error::OperationFailed(_))));
    assert_eq!(probe.status(), TaskStatus::Failed);
    assert!(probe.is_finished());
}

#[concord::test]
async fn test_task_set_cancel_all() {
    let mut set = TaskSet::new();

    let slow: Vec<_> = (0..3)
        .map(|_| {
            set.spawn(async {
                task::sleep(Duration::from_secs(30)).await?;
                Ok(())
            })
        })
        .collect();

    assert_eq!(set.len(), 3);
    assert!(slow.iter().all(|handle| set.contains(handle.id())));

    set.cancel_all();
    assert!(set.is_empty());

    for handle in slow {
        assert!(matches!(handle.await, Err(Error::Cancelled)));
    }
}

#[concord::test]
async fn test_task_set_prune_and_remove() {
    let mut set = TaskSet::new();

    let quick = set.spawn(async { Ok(1) });
    let slow = set.spawn(async {
        task::sleep(Duration::from_secs(30)).await?;
        Ok(2)
    });

    let quick_id = quick.id();
    quick.await.unwrap();

    set.prune();
    assert!(!set.contains(quick_id));
    assert!(set.contains(slow.id()));

    let removed = set.remove(slow.id()).expect("slow task is tracked");
    assert!(set.is_empty());

    removed.cancel();
    assert!(slow.await.unwrap_err().is_cancelled());
}

#[concord::test]
async fn test_dropping_task_set_cancels_members() {
    let handle = {
        let mut set = TaskSet::new();
        set.spawn(async {
            task::sleep(Duration::from_secs(30)).await?;
            Ok(())
        })
    };

    assert!(handle.await.unwrap_err().is_cancelled());
}

#[concord::test]
async fn test_dropping_handle_does_not_cancel() {
    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();

    drop(task::spawn(async move {
        sleep(Duration::from_millis(10)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    }));

    sleep(Duration::from_millis(100)).await;
    assert!(done.load(Ordering::SeqCst));
}
