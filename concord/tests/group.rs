use concord::task;
use concord::time::sleep;
use concord::{Error, FailureMode, RuntimeBuilder, TaskGroup, group_stream, run_group, run_group_indexed};
use futures_util::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Sleeps a little longer for later items, fails on item 3.
async fn process(item: u64) -> concord::Result<u64> {
    sleep(Duration::from_millis(25 * item)).await;

    if item == 3 {
        return Err(Error::failed(format!("item {item} is corrupt")));
    }

    Ok(item * 10)
}

#[concord::test]
async fn test_throwing_group_returns_the_single_failure() {
    let outcome = run_group(1..=5, process, FailureMode::Throwing).await;

    match outcome {
        Err(Error::OperationFailed(error)) => assert_eq!(error.to_string(), "item 3 is corrupt"),
        other => panic!("expected the item 3 failure, got {other:?}"),
    }
}

#[concord::test]
async fn test_throwing_group_cancels_the_siblings() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = finished.clone();

    let outcome = run_group(
        0..4u64,
        move |item| {
            let counter = counter.clone();
            async move {
                if item == 0 {
                    return Err(Error::failed("first child fails fast"));
                }

                task::sleep(Duration::from_secs(30)).await?;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(item)
            }
        },
        FailureMode::Throwing,
    )
    .await;

    assert!(matches!(outcome, Err(Error::OperationFailed(_))));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[concord::test]
async fn test_tolerant_group_skips_failures() {
    let values = run_group(1..=5, process, FailureMode::Tolerant).await.unwrap();

    assert_eq!(values.len(), 4);

    // Completion order follows the per-item delay here.
    assert_eq!(values, vec![10, 20, 40, 50]);
}

#[concord::test]
async fn test_indexed_group_keeps_item_positions() {
    let values = run_group_indexed([5u64, 1, 3, 2], process, FailureMode::Tolerant)
        .await
        .unwrap();

    assert_eq!(values, vec![Some(50), Some(10), None, Some(20)]);
}

#[concord::test]
async fn test_empty_group() {
    let values = run_group(Vec::<u64>::new(), process, FailureMode::Throwing).await.unwrap();
    assert!(values.is_empty());

    let mut group = TaskGroup::<()>::new();
    assert!(group.is_empty());
    assert!(group.next().await.is_none());
}

#[concord::test]
async fn test_task_group_yields_in_completion_order() {
    let mut group = TaskGroup::with_capacity(3);

    for delay in [60u64, 10, 30] {
        group.spawn(async move {
            sleep(Duration::from_millis(delay)).await;
            Ok(delay)
        });
    }

    assert_eq!(group.len(), 3);

    let mut order = Vec::new();
    while let Some(outcome) = group.next().await {
        order.push(outcome.unwrap());
    }

    assert_eq!(order, vec![10, 30, 60]);
}

#[concord::test]
async fn test_cancel_all_keeps_draining() {
    let mut group = TaskGroup::new();

    for _ in 0..3 {
        group.spawn(async {
            task::sleep(Duration::from_secs(30)).await?;
            Ok(())
        });
    }

    group.cancel_all();

    let mut cancelled = 0;
    while let Some(outcome) = group.next().await {
        assert!(outcome.unwrap_err().is_cancelled());
        cancelled += 1;
    }

    assert_eq!(cancelled, 3);
}

#[test]
fn test_cancelling_the_owner_cancels_the_children() {
    let rt = RuntimeBuilder::new().build().unwrap();
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let (started_in, finished_in) = (started.clone(), finished.clone());

    let owner = rt.spawn(async move {
        run_group(
            0..4,
            move |_| {
                let started = started_in.clone();
                let finished = finished_in.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    task::sleep(Duration::from_secs(30)).await?;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            FailureMode::Tolerant,
        )
        .await
    });

    rt.block_on(async move {
        while started.load(Ordering::SeqCst) < 4 {
            sleep(Duration::from_millis(5)).await;
        }

        owner.cancel();
        assert!(matches!(owner.await, Err(Error::Cancelled)));
    });

    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[concord::test]
async fn test_group_stream_yields_results_as_they_arrive() {
    let results: Vec<_> = group_stream([2u64, 3, 1], process).collect().await;

    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Ok(10)));
    assert!(matches!(results[1], Ok(20)));
    assert!(results[2].is_err());
}

#[concord::test]
async fn test_dropping_group_stream_cancels_children() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = finished.clone();

    let mut stream = group_stream(0..3u64, move |item| {
        let counter = counter.clone();
        async move {
            task::sleep(Duration::from_millis(5 + item * 200)).await?;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(item)
        }
    });

    assert_eq!(stream.next().await.unwrap().unwrap(), 0);
    assert_eq!(stream.remaining(), 2);
    drop(stream);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[concord::test]
async fn test_nested_group_still_runs() {
    let values = run_group(
        0..2u64,
        |item| async move { run_group(0..2u64, |x| async move { Ok(x + item) }, FailureMode::Throwing).await },
        FailureMode::Throwing,
    )
    .await
    .unwrap();

    let mut sums: Vec<u64> = values.into_iter().flatten().collect();
    sums.sort();
    assert_eq!(sums, vec![0, 1, 1, 2]);
}
