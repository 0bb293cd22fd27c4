use chrono::{Duration, TimeZone, Utc};
use futures::future::join_all;
use tiles_average::{AverageError, AverageHandle, TimeData, DEFAULT_PERIOD, MAX_PERIOD};
use tracing_subscriber::{prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    // Several tests race to install the subscriber, only the first one wins.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn sample(seconds: i64, value: f64) -> TimeData {
    TimeData::with_timestamp(value, Utc.timestamp_opt(1_500_000_000 + seconds, 0).unwrap())
}

#[tokio::test]
async fn empty_actor() {
    init_tracing();
    let (average, handle) = AverageHandle::spawn(DEFAULT_PERIOD).await.unwrap();

    assert_eq!(average.average().await.unwrap(), 0.0);
    assert_eq!(average.first_entry().await.unwrap(), None);
    assert_eq!(average.last_entry().await.unwrap(), None);
    assert_eq!(average.time_span().await.unwrap(), None);
    assert!(average.is_filling().await.unwrap());

    average.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn evicts_oldest() {
    init_tracing();
    let (average, handle) = AverageHandle::spawn(3).await.unwrap();

    for (i, value) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        average.add_data(sample(i as i64, value)).unwrap();
    }

    let window: Vec<f64> = average
        .window()
        .await
        .unwrap()
        .iter()
        .map(TimeData::value)
        .collect();
    assert_eq!(window, vec![2.0, 3.0, 4.0]);
    assert_eq!(average.average().await.unwrap(), 3.0);
    assert_eq!(average.time_span().await.unwrap(), Some(Duration::seconds(2)));
    assert!(!average.is_filling().await.unwrap());

    average.stop();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_keep_sum_consistent() {
    init_tracing();
    let (average, handle) = AverageHandle::spawn(100).await.unwrap();

    let producers = (0..8).map(|producer| {
        let average = average.clone();
        tokio::spawn(async move {
            for _ in 0..250 {
                average.add_value(producer as f64).unwrap();
                tokio::task::yield_now().await;
            }
        })
    });
    for result in join_all(producers).await {
        result.unwrap();
    }

    let window = average.window().await.unwrap();
    assert_eq!(window.len(), 100);
    let mean = window.iter().map(TimeData::value).sum::<f64>() / window.len() as f64;
    assert!((average.average().await.unwrap() - mean).abs() < 1e-9);

    average.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn set_period_and_reset() {
    init_tracing();
    let (average, handle) = AverageHandle::spawn(5).await.unwrap();

    average
        .add_list_of_data((0..5).map(|i| sample(i, i as f64)))
        .unwrap();
    assert_eq!(average.len().await.unwrap(), 5);

    average.set_period(MAX_PERIOD + 10).unwrap();
    assert_eq!(average.period().await.unwrap(), MAX_PERIOD);
    assert_eq!(average.len().await.unwrap(), 0);

    average.add_value(7.0).unwrap();
    average.reset().unwrap();
    average.reset().unwrap();
    assert_eq!(average.len().await.unwrap(), 0);
    assert_eq!(average.average().await.unwrap(), 0.0);

    average.add_value(2.0).unwrap();
    assert_eq!(average.average().await.unwrap(), 2.0);

    average.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn time_based_average_uses_call_time() {
    init_tracing();
    let (average, handle) = AverageHandle::spawn(10).await.unwrap();

    let now = Utc::now();
    for seconds in (0..5).rev() {
        average
            .add_data(TimeData::with_timestamp(
                seconds as f64,
                now - Duration::seconds(seconds) - Duration::milliseconds(500),
            ))
            .unwrap();
    }

    // Samples were stamped 4.5s, 3.5s, 2.5s, 1.5s and 0.5s before now.
    let recent = average
        .time_based_average_of(Duration::seconds(2))
        .await
        .unwrap();
    assert_eq!(recent, 0.5);
    assert_eq!(
        average
            .time_based_average_of(Duration::minutes(1))
            .await
            .unwrap(),
        2.0
    );

    average.stop();
    handle.await.unwrap();
}

#[tokio::test]
#[should_panic(expected = "Time period must be positive")]
async fn negative_duration_panics_in_caller() {
    let (average, _handle) = AverageHandle::spawn(10).await.unwrap();
    let _ = average.time_based_average_of(Duration::seconds(-5)).await;
}

#[tokio::test]
async fn stopped_actor_reports_error() {
    init_tracing();
    let (average, handle) = AverageHandle::spawn(10).await.unwrap();
    average.stop();
    handle.await.unwrap();

    assert!(matches!(
        average.average().await,
        Err(AverageError::Messaging(_)) | Err(AverageError::NoReply)
    ));
}
