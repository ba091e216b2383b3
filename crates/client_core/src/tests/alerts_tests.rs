use super::*;
use tokio::sync::mpsc::error::TryRecvError;

async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn alert_expires_exactly_at_timeout() {
    let (mut timers, mut expired) = AlertTimers::new(ALERT_DURATION);
    timers.schedule(AlertId(1));
    assert_eq!(timers.pending(), 1);

    tokio::time::sleep(Duration::from_millis(1499)).await;
    settle().await;
    assert_eq!(expired.try_recv(), Err(TryRecvError::Empty));

    tokio::time::sleep(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(expired.try_recv(), Ok(AlertId(1)));
    assert!(timers.complete(AlertId(1)));
    assert_eq!(timers.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_alerts_expire_independently() {
    let (mut timers, mut expired) = AlertTimers::new(ALERT_DURATION);
    timers.schedule(AlertId(1));
    tokio::time::sleep(Duration::from_millis(500)).await;
    timers.schedule(AlertId(2));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle().await;
    assert_eq!(expired.try_recv(), Ok(AlertId(1)));
    assert_eq!(expired.try_recv(), Err(TryRecvError::Empty));

    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(expired.try_recv(), Ok(AlertId(2)));
}

#[tokio::test(start_paused = true)]
async fn cancelled_timers_never_fire() {
    let (mut timers, mut expired) = AlertTimers::new(ALERT_DURATION);
    timers.schedule(AlertId(1));
    timers.schedule(AlertId(2));
    timers.schedule(AlertId(3));

    assert_eq!(timers.cancel_all(), 3);
    assert_eq!(timers.cancel_all(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(expired.try_recv(), Err(TryRecvError::Empty));
}
