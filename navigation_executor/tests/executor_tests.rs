use automation_lib::{Direction, GoalErrorKind, GoalState, Pose};
use navigation_executor::{
    channel_backend, BackendLink, BackendRequest, BackendStatus, DriveCommand, ExecutorConfig,
    GoalToken, NavigationError, NavigationExecutor, Twist,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn stack(config: ExecutorConfig) -> (NavigationExecutor, BackendLink) {
    let (backend, link) = channel_backend();
    let executor = NavigationExecutor::spawn(Arc::new(backend), config);
    (executor, link)
}

async fn expect_goal(link: &mut BackendLink) -> (GoalToken, Pose) {
    match link.recv().await {
        Some(BackendRequest::Goal { token, pose }) => (token, pose),
        other => panic!("expected a goal request, got {:?}", other),
    }
}

fn kitchen() -> Pose {
    Pose::new(3.0, 2.0, 0.0)
}

#[tokio::test(start_paused = true)]
async fn single_pose_goal_succeeds() {
    let (executor, mut link) = stack(ExecutorConfig::default());

    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    assert_eq!(handle.state(), GoalState::Running);
    assert!(executor.is_active());

    let (token, pose) = expect_goal(&mut link).await;
    assert_eq!(pose, kitchen());

    link.report(token, BackendStatus::Running, 0.4);
    link.report(token, BackendStatus::Running, 0.3);
    link.report(token, BackendStatus::Succeeded, 1.0);

    let status = handle.wait_terminal().await;
    assert_eq!(status.state, GoalState::Succeeded);
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.completed_legs, 1);
    assert!(!executor.is_active());
    assert_eq!(executor.current_handle().map(|h| h.id()), Some(handle.id()));
}

#[tokio::test(start_paused = true)]
async fn progress_never_decreases() {
    let (executor, mut link) = stack(ExecutorConfig::default());
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    let (token, _) = expect_goal(&mut link).await;
    let mut status = handle.subscribe();

    link.report(token, BackendStatus::Running, 0.6);
    status.wait_for(|s| s.progress >= 0.6).await.unwrap();

    link.report(token, BackendStatus::Running, 0.2);
    link.report(token, BackendStatus::Running, 0.7);
    status.wait_for(|s| s.progress >= 0.7).await.unwrap();
    assert!((handle.progress() - 0.7).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn new_goal_cancels_previous_one() {
    let (executor, mut link) = stack(ExecutorConfig::default());
    let mut outcomes = executor.subscribe_outcomes();

    let first = executor.navigate_to_pose(kitchen()).await.unwrap();
    let (first_token, _) = expect_goal(&mut link).await;

    let submitter = executor.clone();
    let second = tokio::spawn(async move {
        submitter
            .navigate_to_pose(Pose::new(1.0, 1.0, 1.57))
            .await
            .unwrap()
    });

    match link.recv().await {
        Some(BackendRequest::Cancel { token, ack }) => {
            assert_eq!(token, first_token);
            // The old goal must not be cancelled before the backend says so
            assert_eq!(first.state(), GoalState::Running);
            ack.send(()).unwrap();
        }
        other => panic!("expected cancel, got {:?}", other),
    }

    let second = second.await.unwrap();
    assert_eq!(first.state(), GoalState::Cancelled);
    assert_eq!(second.state(), GoalState::Running);
    assert_ne!(first.id(), second.id());

    let (_, pose) = expect_goal(&mut link).await;
    assert_eq!(pose, Pose::new(1.0, 1.0, 1.57));

    let outcome = outcomes.recv().await.unwrap();
    assert_eq!(outcome.id, first.id());
    assert_eq!(outcome.state, GoalState::Cancelled);

    // Late news about the old token changes nothing
    link.report(first_token, BackendStatus::Succeeded, 1.0);
    tokio::task::yield_now().await;
    assert_eq!(first.state(), GoalState::Cancelled);
    assert_eq!(second.state(), GoalState::Running);
    assert_eq!(executor.current_handle().map(|h| h.id()), Some(second.id()));
}

#[tokio::test(start_paused = true)]
async fn waypoints_run_leg_by_leg() {
    let (executor, mut link) = stack(ExecutorConfig::default());
    let legs = vec![Pose::new(1.0, 0.0, 0.0), Pose::new(2.0, 0.0, 0.0), Pose::new(2.0, 1.0, 0.0)];
    let handle = executor.follow_waypoints(legs.clone()).await.unwrap();

    for (i, leg) in legs.iter().enumerate() {
        let (token, pose) = expect_goal(&mut link).await;
        assert_eq!(pose, *leg);
        link.report(token, BackendStatus::Succeeded, 1.0);
        if i + 1 < legs.len() {
            let mut status = handle.subscribe();
            status.wait_for(|s| s.completed_legs == i + 1).await.unwrap();
            assert_eq!(handle.state(), GoalState::Running);
        }
    }

    let status = handle.wait_terminal().await;
    assert_eq!(status.state, GoalState::Succeeded);
    assert_eq!(status.completed_legs, 3);
}

#[tokio::test(start_paused = true)]
async fn unrecoverable_leg_failure_fails_whole_sequence() {
    let (executor, mut link) = stack(ExecutorConfig::default());
    let legs = vec![Pose::new(1.0, 0.0, 0.0), Pose::new(50.0, 0.0, 0.0), Pose::new(2.0, 1.0, 0.0)];
    let handle = executor.follow_waypoints(legs).await.unwrap();

    let (token, _) = expect_goal(&mut link).await;
    link.report(token, BackendStatus::Succeeded, 1.0);

    let (token, _) = expect_goal(&mut link).await;
    link.report(token, BackendStatus::Failed(GoalErrorKind::Unreachable), 0.0);

    let status = handle.wait_terminal().await;
    assert_eq!(status.state, GoalState::Failed(GoalErrorKind::Unreachable));
    assert_eq!(status.completed_legs, 1);
    assert_eq!(status.retries_remaining, 2);

    // The third leg is never issued
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(link.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn recoverable_failure_is_retried_with_same_handle() {
    let config = ExecutorConfig::default();
    let backoff = config.retry_backoff;
    let (executor, mut link) = stack(config);
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();

    let (token, _) = expect_goal(&mut link).await;
    let failed_at = Instant::now();
    link.report(token, BackendStatus::Failed(GoalErrorKind::PlannerBusy), 0.0);

    let (retry_token, pose) = expect_goal(&mut link).await;
    assert!(Instant::now() - failed_at >= backoff);
    assert_ne!(retry_token, token);
    assert_eq!(pose, kitchen());
    assert_eq!(handle.status().retries_remaining, 1);
    assert_eq!(handle.state(), GoalState::Running);

    link.report(retry_token, BackendStatus::Succeeded, 1.0);
    assert_eq!(handle.wait_terminal().await.state, GoalState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let (executor, mut link) = stack(ExecutorConfig::default());
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();

    // One attempt plus two retries
    for _ in 0..3 {
        let (token, _) = expect_goal(&mut link).await;
        link.report(token, BackendStatus::Failed(GoalErrorKind::SensorDropout), 0.0);
    }

    let status = handle.wait_terminal().await;
    assert_eq!(status.state, GoalState::Failed(GoalErrorKind::SensorDropout));
    assert_eq!(status.retries_remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn leg_times_out_no_earlier_than_goal_timeout() {
    let config = ExecutorConfig {
        goal_timeout: Duration::from_secs(5),
        ..ExecutorConfig::default()
    };
    let (executor, mut link) = stack(config);
    let started = Instant::now();
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    let (token, _) = expect_goal(&mut link).await;

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert_eq!(handle.state(), GoalState::Running);

    match link.recv().await {
        Some(BackendRequest::Cancel { token: cancelled, ack }) => {
            assert_eq!(cancelled, token);
            assert!(Instant::now() - started >= Duration::from_secs(5));
            ack.send(()).unwrap();
        }
        other => panic!("expected cancel, got {:?}", other),
    }

    assert_eq!(handle.wait_terminal().await.state, GoalState::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_cancel_is_forced_after_timeout() {
    let config = ExecutorConfig::default();
    let cancel_timeout = config.cancel_timeout;
    let (executor, mut link) = stack(config);
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    let _ = expect_goal(&mut link).await;

    let canceller = executor.clone();
    let started = Instant::now();
    let cancel = tokio::spawn(async move { canceller.cancel_active().await });

    // Hold on to the ack without answering
    let pending_ack = match link.recv().await {
        Some(BackendRequest::Cancel { ack, .. }) => ack,
        other => panic!("expected cancel, got {:?}", other),
    };

    cancel.await.unwrap().unwrap();
    assert!(Instant::now() - started >= cancel_timeout);
    assert_eq!(handle.state(), GoalState::Cancelled);
    drop(pending_ack);
}

#[tokio::test(start_paused = true)]
async fn backend_cancel_ends_goal_cancelled() {
    let (executor, mut link) = stack(ExecutorConfig::default());
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    let (token, _) = expect_goal(&mut link).await;

    link.report(token, BackendStatus::Cancelled, 0.0);
    assert_eq!(handle.wait_terminal().await.state, GoalState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_preempts_retry_backoff() {
    let config = ExecutorConfig {
        retry_backoff: Duration::from_secs(10),
        ..ExecutorConfig::default()
    };
    let (executor, mut link) = stack(config);
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    let (token, _) = expect_goal(&mut link).await;

    link.report(token, BackendStatus::Failed(GoalErrorKind::PlannerBusy), 0.0);
    let mut status = handle.subscribe();
    status.wait_for(|s| s.retries_remaining == 1).await.unwrap();

    let stopped_at = Instant::now();
    executor.emergency_stop().await;
    assert_eq!(handle.wait_terminal().await.state, GoalState::Cancelled);
    assert!(Instant::now() - stopped_at < Duration::from_secs(10));

    assert!(matches!(link.recv().await, Some(BackendRequest::Halt)));

    // The pending retry never fires
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(link.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn empty_waypoints_are_rejected_synchronously() {
    let (executor, mut link) = stack(ExecutorConfig::default());

    let result = executor.follow_waypoints(Vec::new()).await;
    assert!(matches!(result, Err(NavigationError::InvalidGoal(_))));
    assert!(executor.current_handle().is_none());
    assert!(!executor.is_active());
    assert!(link.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn timed_drive_stops_after_duration() {
    let config = ExecutorConfig::default();
    let speed = config.drive_speed;
    let (executor, mut link) = stack(config);

    let started = Instant::now();
    executor
        .drive(DriveCommand {
            direction: Direction::Forward,
            duration: Some(Duration::from_secs(3)),
        })
        .await
        .unwrap();

    match link.recv().await {
        Some(BackendRequest::Velocity(twist)) => assert_eq!(twist, Twist::new(speed, 0.0)),
        other => panic!("expected velocity, got {:?}", other),
    }
    match link.recv().await {
        Some(BackendRequest::Velocity(twist)) => {
            assert!(twist.is_zero());
            assert!(Instant::now() - started >= Duration::from_secs(3));
        }
        other => panic!("expected stop, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn later_legs_get_a_fresh_deadline() {
    let timeout = Duration::from_secs(5);
    let config = ExecutorConfig {
        goal_timeout: timeout,
        ..ExecutorConfig::default()
    };
    let (executor, mut link) = stack(config);
    let legs = vec![Pose::new(1.0, 0.0, 0.0), Pose::new(2.0, 0.0, 0.0), Pose::new(2.0, 1.0, 0.0)];
    let handle = executor.follow_waypoints(legs).await.unwrap();

    // First leg lands just inside its deadline
    let (first, _) = expect_goal(&mut link).await;
    tokio::time::sleep(Duration::from_millis(4900)).await;
    link.report(first, BackendStatus::Succeeded, 1.0);

    let (second, pose) = expect_goal(&mut link).await;
    assert_eq!(pose, Pose::new(2.0, 0.0, 0.0));
    let second_issued = Instant::now();

    // Past the first leg's deadline but inside the second's
    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert_eq!(handle.state(), GoalState::Running);
    assert_eq!(handle.status().completed_legs, 1);

    match link.recv().await {
        Some(BackendRequest::Cancel { token, ack }) => {
            assert_eq!(token, second);
            assert!(Instant::now() - second_issued >= timeout);
            ack.send(()).unwrap();
        }
        other => panic!("expected cancel, got {:?}", other),
    }

    let status = handle.wait_terminal().await;
    assert_eq!(status.state, GoalState::TimedOut);
    assert_eq!(status.completed_legs, 1);

    // The third leg is never issued
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(link.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn oversized_drive_is_clamped() {
    let config = ExecutorConfig::default();
    let max_move = config.max_move;
    let (executor, mut link) = stack(config);

    let started = Instant::now();
    executor
        .drive(DriveCommand {
            direction: Direction::Forward,
            duration: Some(Duration::MAX),
        })
        .await
        .unwrap();

    assert!(matches!(link.recv().await, Some(BackendRequest::Velocity(_))));
    match link.recv().await {
        Some(BackendRequest::Velocity(twist)) => {
            assert!(twist.is_zero());
            let elapsed = Instant::now() - started;
            assert!(elapsed >= max_move);
            assert!(elapsed < max_move + Duration::from_secs(1));
        }
        other => panic!("expected stop, got {:?}", other),
    }

    // Still serving goals afterwards
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    let (token, _) = expect_goal(&mut link).await;
    link.report(token, BackendStatus::Succeeded, 1.0);
    assert_eq!(handle.wait_terminal().await.state, GoalState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn unbounded_durations_do_not_stop_the_executor() {
    let config = ExecutorConfig {
        goal_timeout: Duration::MAX,
        max_move: Duration::MAX,
        ..ExecutorConfig::default()
    };
    let (executor, mut link) = stack(config);

    executor
        .drive(DriveCommand {
            direction: Direction::Left,
            duration: Some(Duration::MAX),
        })
        .await
        .unwrap();
    assert!(matches!(link.recv().await, Some(BackendRequest::Velocity(_))));

    // A new goal ends the drive and runs under a saturated deadline
    let handle = executor.navigate_to_pose(kitchen()).await.unwrap();
    match link.recv().await {
        Some(BackendRequest::Velocity(twist)) => assert!(twist.is_zero()),
        other => panic!("expected stop, got {:?}", other),
    }
    let (token, _) = expect_goal(&mut link).await;
    link.report(token, BackendStatus::Succeeded, 1.0);
    assert_eq!(handle.wait_terminal().await.state, GoalState::Succeeded);
}
