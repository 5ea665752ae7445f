use concord::task;
use concord::time::sleep;
use concord::{ContractViolation, Error, IsolatedState, Published, RuntimeBuilder};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_concurrent_mutations_are_serialized() {
    let rt = RuntimeBuilder::new().worker_threads(8).build().unwrap();
    let counter = Arc::new(IsolatedState::new(0u64));
    let shared = counter.clone();

    rt.block_on(async move {
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let counter = shared.clone();
                task::spawn(async move {
                    for _ in 0..100 {
                        // Read-modify-write split across the closure would lose
                        // updates without exclusion.
                        counter
                            .mutate(|n| {
                                let seen = *n;
                                std::hint::spin_loop();
                                *n = seen + 1;
                            })
                            .await;
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    });

    let counter = Arc::try_unwrap(counter).expect("every task finished");
    assert_eq!(counter.into_inner(), 6_400);
}

#[concord::test]
async fn test_waiters_resume_after_a_slow_holder() {
    let state = Arc::new(IsolatedState::new(Vec::new()));

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let state = state.clone();
            task::spawn(async move {
                state.mutate(|log| log.push(i)).await;
                Ok(())
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }

    let mut log = state.read(|log| log.clone()).await;
    log.sort();
    assert_eq!(log, vec![0, 1, 2, 3]);
}

#[concord::test]
async fn test_closure_errors_propagate_after_release() {
    let state = IsolatedState::new(10i32);

    let outcome: Result<(), Error> = state
        .mutate(|n| {
            *n -= 20;
            if *n < 0 {
                return Err(Error::failed("balance below zero"));
            }
            Ok(())
        })
        .await;

    assert!(outcome.is_err());
    assert_eq!(state.try_read(|n| *n), Some(-10));
}

#[concord::test]
async fn test_nonisolated_constant() {
    let account = IsolatedState::with_constant(0u32, String::from("acct-42"));

    let label = account.mutate(|_| account.nonisolated().clone()).await;

    assert_eq!(label, "acct-42");
    assert_eq!(account.nonisolated(), "acct-42");
}

#[concord::test]
async fn test_reentrant_access_fails_the_task() {
    let state = Arc::new(IsolatedState::new(1));
    let inner = state.clone();

    let handle = task::spawn(async move {
        let nested = inner.mutate(|_| inner.try_read(|n| *n)).await;
        Ok(nested)
    });

    let error = handle.await.unwrap_err();
    assert!(matches!(error, Error::ContractViolation(ContractViolation::ReentrantAccess)));

    // The panic did not leave the state locked.
    assert_eq!(state.read(|n| *n).await, 1);
}

#[concord::test]
async fn test_published_broadcasts_mutations() {
    let temperature = Arc::new(Published::new(20));
    let mut updates = temperature.subscribe().await;

    let writer = temperature.clone();
    let handle = task::spawn(async move {
        for delta in [1, 2] {
            sleep(Duration::from_millis(5)).await;
            writer.mutate(|t| *t += delta).await;
        }
        Ok(())
    });

    let mut seen = Vec::new();
    while seen.len() < 3 {
        seen.push(updates.next().await.unwrap().unwrap());
    }

    handle.await.unwrap();
    assert_eq!(seen, vec![20, 21, 23]);
    assert_eq!(temperature.get().await, 23);
}

#[concord::test]
async fn test_published_forgets_dropped_subscribers() {
    let value = Published::new(String::from("a"));

    let kept = value.subscribe().await;
    drop(value.subscribe().await);
    assert_eq!(value.subscriber_count().await, 2);

    value.mutate(|v| v.push('b')).await;
    assert_eq!(value.subscriber_count().await, 1);

    let received: Vec<_> = kept.take(2).map(Result::unwrap).collect().await;
    assert_eq!(received, vec!["a".to_string(), "ab".to_string()]);
}
