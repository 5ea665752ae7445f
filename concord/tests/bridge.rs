use concord::bridge::{self, BufferPolicy, Resume, Termination, YieldResult};
use concord::task;
use concord::time::{sleep, timeout};
use concord::{ContractViolation, Error};
use futures_util::StreamExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// A callback API of the kind the bridges adapt.
fn fetch_later(value: u32, delay: Duration, callback: impl FnOnce(Result<u32, String>) + Send + 'static) {
    thread::spawn(move || {
        thread::sleep(delay);
        if value == 0 {
            callback(Err("empty response".to_string()));
        } else {
            callback(Ok(value));
        }
    });
}

#[concord::test]
async fn test_continuation_resumed_from_a_foreign_thread() {
    let value = bridge::continuation(|resume| {
        fetch_later(9, Duration::from_millis(10), move |reply| resume.resume_with(reply));
    })
    .await;

    assert_eq!(value.unwrap(), 9);
}

#[concord::test]
async fn test_continuation_carries_collaborator_errors() {
    let value = bridge::continuation(|resume: Resume<u32>| {
        fetch_later(0, Duration::from_millis(5), move |reply| resume.resume_with(reply));
    })
    .await;

    match value {
        Err(Error::OperationFailed(error)) => assert_eq!(error.to_string(), "empty response"),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[concord::test]
async fn test_double_resume_is_caught() {
    let (tx, rx) = std::sync::mpsc::channel();

    let value = bridge::continuation(|resume: Resume<&'static str>| {
        thread::spawn(move || {
            resume.resume_returning("first");
            let second = panic::catch_unwind(AssertUnwindSafe(|| resume.resume_returning("second")));
            let violation = second
                .err()
                .and_then(|payload| payload.downcast_ref::<ContractViolation>().copied());
            tx.send(violation).unwrap();
        });
    })
    .await;

    assert_eq!(value.unwrap(), "first");
    assert_eq!(rx.recv().unwrap(), Some(ContractViolation::DoubleResume));
}

#[concord::test]
async fn test_missing_resume_leaves_the_caller_suspended() {
    let waiting = bridge::continuation(|resume: Resume<()>| drop(resume));

    let outcome = timeout(Duration::from_millis(50), waiting).await;

    assert!(outcome.is_err(), "a continuation nobody resumes must never complete");
}

#[concord::test]
async fn test_cancelled_awaiter_discards_late_resume() {
    let parked = Arc::new(Mutex::new(None));
    let slot = parked.clone();

    let handle = task::spawn(async move {
        bridge::continuation(|resume: Resume<u8>| *slot.lock().unwrap() = Some(resume)).await
    });

    sleep(Duration::from_millis(10)).await;
    handle.cancel();
    assert!(matches!(handle.await, Err(Error::Cancelled)));

    let resume = parked.lock().unwrap().take().expect("operation ran");
    resume.resume_returning(1);
}

#[concord::test]
async fn test_stream_delivers_in_order_then_ends() {
    let stream = bridge::stream(|yielder| {
        thread::spawn(move || {
            for value in [1, 2, 3] {
                yielder.yield_value(value);
                thread::sleep(Duration::from_millis(2));
            }
            yielder.finish();
        });
    });

    let values: Vec<_> = stream.map(Result::unwrap).collect().await;

    assert_eq!(values, vec![1, 2, 3]);
}

#[concord::test]
async fn test_stream_error_after_values() {
    let mut stream = bridge::stream(|yielder| {
        thread::spawn(move || {
            yielder.yield_with(Ok::<_, String>(1));
            yielder.yield_with(Ok::<_, String>(2));
            yielder.yield_with(Err::<i32, _>("link dropped".to_string()));
        });
    });

    assert_eq!(stream.next().await.unwrap().unwrap(), 1);
    assert_eq!(stream.next().await.unwrap().unwrap(), 2);
    assert!(matches!(stream.next().await, Some(Err(Error::OperationFailed(_)))));
    assert!(stream.next().await.is_none());
}

#[concord::test]
async fn test_consumer_drop_does_not_stop_the_producer() {
    let produced = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let (counter, stop_flag) = (produced.clone(), stop.clone());

    let mut stream = bridge::stream(|yielder| {
        thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                yielder.yield_value(counter.fetch_add(1, Ordering::SeqCst));
                thread::sleep(Duration::from_millis(1));
            }
        });
    });

    assert!(stream.next().await.is_some());
    drop(stream);

    let before = produced.load(Ordering::SeqCst);
    sleep(Duration::from_millis(30)).await;
    assert!(produced.load(Ordering::SeqCst) > before, "producer keeps running");

    stop.store(true, Ordering::SeqCst);
}

#[concord::test]
async fn test_wired_teardown_runs_on_consumer_cancellation() {
    let reason = Arc::new(Mutex::new(None));
    let producer = Arc::new(Mutex::new(None));
    let (seen, parked) = (reason.clone(), producer.clone());

    let handle = task::spawn(async move {
        let mut stream = bridge::stream(|yielder: bridge::Yielder<u8>| {
            yielder.on_termination(move |why| *seen.lock().unwrap() = Some(why));
            // Parked producer: it never yields.
            *parked.lock().unwrap() = Some(yielder);
        });

        stream.next().await.transpose()
    });

    sleep(Duration::from_millis(10)).await;
    handle.cancel();

    assert!(matches!(handle.await, Err(Error::Cancelled)));
    assert_eq!(*reason.lock().unwrap(), Some(Termination::Cancelled));

    let yielder = producer.lock().unwrap().take().unwrap();
    assert_eq!(yielder.yield_value(1), YieldResult::Terminated);
}

#[concord::test]
async fn test_bounded_stream_policy() {
    let stream = bridge::stream_with_policy(BufferPolicy::Newest(2), |yielder| {
        for value in 0..5 {
            if let YieldResult::Dropped(evicted) = yielder.yield_value(value) {
                assert!(evicted < value);
            }
        }
    });

    let values: Vec<_> = stream.map(Result::unwrap).collect().await;
    assert_eq!(values, vec![3, 4]);
}
