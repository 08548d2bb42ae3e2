use automation_lib::{
    AutomationConfig, BoundingBox, Detection, Direction, GoalState, Intent, Pose,
    SpeechTranscription, TtsCommand, TtsPriority, VoiceConfig,
};
use health_monitor::{FixedBattery, FixedResources, HealthMonitor};
use navigation_executor::{
    channel_backend, BackendLink, BackendRequest, BackendStatus, ExecutorConfig, GoalToken,
    NavigationExecutor,
};
use std::sync::Arc;
use task_orchestrator::modules::{DETECTION, HEALTH, NAVIGATION};
use task_orchestrator::runtime::{self, RuntimeEvent};
use task_orchestrator::{
    ChannelSpeaker, DetectionModule, DispatchError, Dispatched, HealthModule, ModuleDescriptor,
    ModuleLifecycle, ModuleStatus, NavigationModule, Orchestrator, Perception, ScriptedSpeechInput,
    Services, StaticPerception, UnavailablePerception, VoiceModule,
};
use task_orchestrator::Module;
use tokio::sync::{mpsc, watch};

struct Rig {
    orchestrator: Orchestrator,
    executor: NavigationExecutor,
    link: BackendLink,
    spoken: mpsc::UnboundedReceiver<TtsCommand>,
}

async fn rig(battery: f32, perception: Arc<dyn Perception>) -> Rig {
    let config = AutomationConfig::default();
    let (backend, mut link) = channel_backend();
    let executor =
        NavigationExecutor::spawn(Arc::new(backend), ExecutorConfig::from(&config.navigation));
    let monitor = HealthMonitor::new(
        config.maintenance.clone(),
        Box::new(FixedBattery::percent(battery)),
        Box::new(FixedResources::default()),
    );
    let health = monitor.handle();
    let (speaker, spoken) = ChannelSpeaker::new();

    let descriptors = vec![
        ModuleDescriptor::new(HEALTH, HealthModule::new(monitor)).critical(),
        ModuleDescriptor::new(NAVIGATION, NavigationModule::new(executor.clone()))
            .depends_on(HEALTH)
            .critical(),
        ModuleDescriptor::new(DETECTION, DetectionModule::new(perception.clone()))
            .depends_on(HEALTH),
    ];
    let lifecycle = ModuleLifecycle::initialize(descriptors).await.unwrap();
    let services = Services {
        health,
        navigation: executor.clone(),
        perception,
        speaker: Arc::new(speaker),
    };
    let mut orchestrator = Orchestrator::new(config, lifecycle, services);
    orchestrator.start().await.unwrap();

    // The navigation module halts the base during init
    assert!(matches!(link.recv().await, Some(BackendRequest::Halt)));

    Rig {
        orchestrator,
        executor,
        link,
        spoken,
    }
}

fn no_detections() -> Arc<dyn Perception> {
    Arc::new(StaticPerception::default())
}

async fn expect_goal(link: &mut BackendLink) -> (GoalToken, Pose) {
    match link.recv().await {
        Some(BackendRequest::Goal { token, pose }) => (token, pose),
        other => panic!("expected a goal request, got {:?}", other),
    }
}

fn navigate(location: &str) -> Intent {
    Intent::NavigateTo {
        location: location.to_string(),
    }
}

#[tokio::test]
async fn low_battery_blocks_motion_but_not_stops() {
    let mut rig = rig(10.0, no_detections()).await;

    let blocked = rig.orchestrator.handle_intent(navigate("kitchen")).await;
    assert_eq!(blocked.unwrap_err(), DispatchError::Blocked("battery".into()));
    assert!(rig.link.try_recv().is_none());
    assert!(rig.executor.current_handle().is_none());
    assert_eq!(rig.spoken.try_recv().unwrap().priority, TtsPriority::High);

    let stopped = rig.orchestrator.handle_intent(Intent::EmergencyStop).await;
    assert!(matches!(stopped, Ok(Dispatched::EmergencyStopped)));
    assert!(matches!(rig.link.recv().await, Some(BackendRequest::Halt)));
    let ack = rig.spoken.try_recv().unwrap();
    assert_eq!(ack.priority, TtsPriority::Emergency);
    assert_eq!(ack.text, "Emergency stop activated");

    let stopped = rig.orchestrator.dispatch(Intent::Stop).await;
    assert!(matches!(stopped, Ok(Dispatched::Stopped)));
    assert!(matches!(rig.link.recv().await, Some(BackendRequest::Halt)));
}

#[tokio::test]
async fn unknown_location_leaves_executor_untouched() {
    let mut rig = rig(85.0, no_detections()).await;

    let result = rig.orchestrator.dispatch(navigate("garage")).await;
    assert_eq!(result.unwrap_err(), DispatchError::UnknownLocation("garage".into()));
    assert!(rig.executor.current_handle().is_none());
    assert!(rig.link.try_recv().is_none());
}

#[tokio::test]
async fn spoken_navigation_reaches_the_kitchen() {
    let mut rig = rig(85.0, no_detections()).await;
    let (feedback_speaker, mut feedback) = ChannelSpeaker::new();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let _feedback = runtime::spawn_outcome_feedback(
        rig.orchestrator.subscribe_outcomes(),
        Arc::new(feedback_speaker),
        stop_rx,
    );

    let handle = match rig.orchestrator.handle_utterance("Please go to the kitchen").await {
        Some(Ok(Dispatched::Navigating { location, handle })) => {
            assert_eq!(location, "kitchen");
            handle
        }
        other => panic!("expected navigation, got {:?}", other),
    };
    assert_eq!(rig.spoken.try_recv().unwrap().text, "Navigating to kitchen");

    let (token, pose) = expect_goal(&mut rig.link).await;
    assert_eq!(pose, Pose::new(3.0, 2.0, 0.0));

    rig.link.report(token, BackendStatus::Running, 0.5);
    rig.link.report(token, BackendStatus::Succeeded, 1.0);

    let status = handle.wait_terminal().await;
    assert_eq!(status.state, GoalState::Succeeded);
    assert_eq!(feedback.recv().await.unwrap().text, "I have arrived");
}

#[tokio::test]
async fn explore_patrols_locations_in_name_order() {
    let mut rig = rig(85.0, no_detections()).await;

    let (handle, stops) = match rig.orchestrator.dispatch(Intent::Explore).await {
        Ok(Dispatched::Exploring { handle, stops }) => (handle, stops),
        other => panic!("expected exploration, got {:?}", other),
    };
    assert_eq!(stops, rig.orchestrator.locations().len());
    assert!(handle.goal().is_waypoint_sequence());

    let expected: Vec<Pose> = rig
        .orchestrator
        .locations()
        .iter()
        .map(|(_, pose)| *pose)
        .collect();
    assert_eq!(handle.goal().legs(), expected.as_slice());

    // "bedroom" sorts first
    let (token, pose) = expect_goal(&mut rig.link).await;
    assert_eq!(pose, Pose::new(2.0, 3.0, -1.57));
    rig.link.report(token, BackendStatus::Succeeded, 1.0);

    let (_, pose) = expect_goal(&mut rig.link).await;
    assert_eq!(pose, expected[1]);
}

#[tokio::test]
async fn explore_without_locations_is_invalid() {
    let mut rig = rig(85.0, no_detections()).await;
    let names: Vec<String> = rig
        .orchestrator
        .locations()
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    for name in names {
        rig.orchestrator.remove_location(&name);
    }

    let result = rig.orchestrator.dispatch(Intent::Explore).await;
    assert!(matches!(result, Err(DispatchError::InvalidGoal(_))));
    assert!(rig.executor.current_handle().is_none());
}

#[tokio::test]
async fn added_location_is_navigable() {
    let mut rig = rig(85.0, no_detections()).await;
    rig.orchestrator
        .add_location("Charging Dock", Pose::new(-1.0, 0.5, 3.0));

    let result = rig.orchestrator.dispatch(navigate("charging dock")).await;
    assert!(matches!(result, Ok(Dispatched::Navigating { .. })));
    let (_, pose) = expect_goal(&mut rig.link).await;
    assert_eq!(pose, Pose::new(-1.0, 0.5, 3.0));
}

#[tokio::test]
async fn query_objects_counts_confident_detections() {
    let bbox = BoundingBox::new(0.1, 0.1, 0.4, 0.9);
    let perception = Arc::new(StaticPerception(vec![
        Detection::new(bbox, 0.9, "person"),
        Detection::new(bbox, 0.8, "person"),
        Detection::new(bbox, 0.3, "chair"),
    ]));
    let mut rig = rig(85.0, perception).await;

    let result = rig.orchestrator.handle_intent(Intent::QueryObjects).await;
    match result {
        Ok(Dispatched::Objects(counts)) => {
            assert_eq!(counts.len(), 1);
            assert_eq!(counts.get("person"), Some(&2));
        }
        other => panic!("expected object counts, got {:?}", other),
    }
    assert_eq!(rig.spoken.try_recv().unwrap().text, "I see 2 persons");
}

#[tokio::test]
async fn degraded_detection_is_unavailable_for_dispatch() {
    let mut rig = rig(85.0, Arc::new(UnavailablePerception)).await;

    assert!(matches!(
        rig.orchestrator.lifecycle().status(DETECTION),
        Some(ModuleStatus::Degraded(_))
    ));
    assert_eq!(
        rig.orchestrator.dispatch(Intent::QueryObjects).await.unwrap_err(),
        DispatchError::ModuleUnavailable(DETECTION.into())
    );
    assert_eq!(
        rig.orchestrator.dispatch(Intent::FollowPerson).await.unwrap_err(),
        DispatchError::ModuleUnavailable(DETECTION.into())
    );

    // Navigation does not depend on detection
    let result = rig
        .orchestrator
        .dispatch(Intent::Move {
            direction: Direction::Forward,
            duration: Some(1.5),
        })
        .await;
    assert!(matches!(result, Ok(Dispatched::Moving { .. })));
}

#[tokio::test]
async fn unrecognized_utterance_gets_spoken_feedback() {
    let mut rig = rig(85.0, no_detections()).await;

    assert!(rig.orchestrator.handle_utterance("sing me a song").await.is_none());
    assert_eq!(
        rig.spoken.try_recv().unwrap().text,
        "I didn't understand that command"
    );
    assert!(rig.executor.current_handle().is_none());
}

#[tokio::test]
async fn modes_and_following_are_recorded() {
    let mut rig = rig(85.0, no_detections()).await;

    let toggled = rig
        .orchestrator
        .dispatch(Intent::ModeToggle {
            name: "patrol".into(),
            on: true,
        })
        .await;
    assert!(matches!(toggled, Ok(Dispatched::ModeChanged { on: true, .. })));
    assert_eq!(rig.orchestrator.mode("patrol"), Some(true));
    assert_eq!(rig.orchestrator.mode("quiet"), None);

    rig.orchestrator.dispatch(Intent::FollowPerson).await.unwrap();
    assert!(rig.orchestrator.is_following());
    rig.orchestrator.dispatch(Intent::StopFollowing).await.unwrap();
    assert!(!rig.orchestrator.is_following());
}

#[tokio::test]
async fn emergency_stop_bypasses_the_event_queue() {
    let mut rig = rig(85.0, no_detections()).await;
    let (intake, mut events) = runtime::channel(rig.executor.clone(), VoiceConfig::default());

    let handle = rig
        .executor
        .navigate_to_pose(Pose::new(3.0, 2.0, 0.0))
        .await
        .unwrap();
    expect_goal(&mut rig.link).await;

    // Nobody is draining `events`, yet the base halts
    assert!(
        intake
            .submit_utterance(SpeechTranscription::new("Turtlebot, emergency stop!", 0.9))
            .await
    );
    assert!(matches!(rig.link.recv().await, Some(BackendRequest::Halt)));
    assert_eq!(handle.wait_terminal().await.state, GoalState::Cancelled);
    assert_eq!(
        events.try_recv().unwrap(),
        RuntimeEvent::Intent(Intent::EmergencyStop)
    );
}

#[tokio::test]
async fn commands_queued_before_emergency_stop_are_dropped() {
    let mut rig = rig(85.0, no_detections()).await;
    let (intake, events) = runtime::channel(rig.executor.clone(), VoiceConfig::default());

    for text in [
        "go to the kitchen",
        "move forward for 3 seconds",
        "explore",
        "turtlebot emergency stop",
        "go to the bedroom",
    ] {
        assert!(intake.submit_utterance(SpeechTranscription::new(text, 0.9)).await);
    }
    intake.end_of_input().await;

    let (_stop_tx, stop_rx) = watch::channel(false);
    runtime::run(&mut rig.orchestrator, events, stop_rx).await;

    // Intake halt, then the dispatched emergency stop
    assert!(matches!(rig.link.try_recv(), Some(BackendRequest::Halt)));
    assert!(matches!(rig.link.try_recv(), Some(BackendRequest::Halt)));

    // Only the command given after the stop moves the base
    let (_, pose) = expect_goal(&mut rig.link).await;
    assert_eq!(pose, Pose::new(2.0, 3.0, -1.57));
    assert!(rig.link.try_recv().is_none());

    assert_eq!(
        rig.spoken.try_recv().unwrap().text,
        "Emergency stop activated"
    );
    assert_eq!(rig.spoken.try_recv().unwrap().text, "Navigating to bedroom");
}

#[tokio::test]
async fn huge_move_duration_is_clamped() {
    let mut rig = rig(85.0, no_detections()).await;
    let max_move = AutomationConfig::default().navigation.max_move();

    match rig
        .orchestrator
        .handle_utterance("move forward for 10000000000000000000 seconds")
        .await
    {
        Some(Ok(Dispatched::Moving { duration, .. })) => assert_eq!(duration, max_move),
        other => panic!("expected a move, got {:?}", other),
    }
    assert!(matches!(rig.link.recv().await, Some(BackendRequest::Velocity(_))));

    // The executor is still alive and takes new goals
    let result = rig.orchestrator.dispatch(navigate("kitchen")).await;
    assert!(matches!(result, Ok(Dispatched::Navigating { .. })));
    assert!(matches!(rig.link.recv().await, Some(BackendRequest::Velocity(_))));
    let (_, pose) = expect_goal(&mut rig.link).await;
    assert_eq!(pose, Pose::new(3.0, 2.0, 0.0));
}

#[tokio::test]
async fn low_confidence_speech_is_ignored() {
    let rig = rig(85.0, no_detections()).await;
    let (intake, mut events) = runtime::channel(rig.executor.clone(), VoiceConfig::default());

    assert!(
        intake
            .submit_utterance(SpeechTranscription::new("go to the kitchen", 0.2))
            .await
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn wake_word_can_be_required() {
    let rig = rig(85.0, no_detections()).await;
    let voice = VoiceConfig {
        require_wake_word: true,
        ..VoiceConfig::default()
    };
    let (intake, mut events) = runtime::channel(rig.executor.clone(), voice);

    intake
        .submit_utterance(SpeechTranscription::new("go to the kitchen", 1.0))
        .await;
    assert!(events.try_recv().is_err());

    intake
        .submit_utterance(SpeechTranscription::new("turtlebot go to the kitchen", 1.0))
        .await;
    assert_eq!(events.try_recv().unwrap(), RuntimeEvent::Intent(navigate("kitchen")));
}

#[tokio::test]
async fn voice_module_drives_the_event_loop() {
    let mut rig = rig(85.0, no_detections()).await;
    let (intake, events) = runtime::channel(rig.executor.clone(), VoiceConfig::default());
    let mut voice = VoiceModule::new(
        Box::new(ScriptedSpeechInput::new(["go to the kitchen", "dance wildly"])),
        intake,
    );
    voice.init().await.unwrap();
    voice.start().await.unwrap();

    // Runs until the scripted input is exhausted
    let (_stop_tx, stop_rx) = watch::channel(false);
    runtime::run(&mut rig.orchestrator, events, stop_rx).await;

    assert_eq!(rig.spoken.try_recv().unwrap().text, "Navigating to kitchen");
    assert_eq!(
        rig.spoken.try_recv().unwrap().text,
        "I didn't understand that command"
    );
    assert!(rig.executor.is_active());
    voice.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_cancels_navigation_and_stops_modules() {
    let mut rig = rig(85.0, no_detections()).await;
    let handle = match rig.orchestrator.dispatch(navigate("kitchen")).await {
        Ok(Dispatched::Navigating { handle, .. }) => handle,
        other => panic!("expected navigation, got {:?}", other),
    };
    let (token, _) = expect_goal(&mut rig.link).await;

    let link = &mut rig.link;
    let backend = async {
        match link.recv().await {
            Some(BackendRequest::Cancel { token: cancelled, ack }) => {
                assert_eq!(cancelled, token);
                let _ = ack.send(());
            }
            other => panic!("expected a cancel request, got {:?}", other),
        }
    };
    tokio::join!(rig.orchestrator.shutdown(), backend);
    assert!(matches!(rig.link.recv().await, Some(BackendRequest::Halt)));

    assert_eq!(handle.state(), GoalState::Cancelled);
    for module in [HEALTH, NAVIGATION, DETECTION] {
        assert_eq!(
            rig.orchestrator.lifecycle().status(module),
            Some(&ModuleStatus::Stopped)
        );
    }

    // A second shutdown touches nothing
    rig.orchestrator.shutdown().await;
    assert!(rig.link.try_recv().is_none());
}
