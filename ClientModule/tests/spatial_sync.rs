//! Shared object reconciliation between client views and a live authority.

use std::time::Duration;
use tokio::sync::mpsc;
use xrs_client::{run_until, AuthorityLink, SpatialClient, SpatialEvent};
use xrs_server::{AuthorityServer, PrefabCatalog, PrefabEntry};
use xrs_shared::{
    DeviceKind, DockState, ObjectTypeId, OwnershipPolicy, PeerInfo, PlayerId, Pose, Quat,
    ReplicatedChange, ServerMessage, SharedObjectRecord, SyncConfig, SyncError, Vector3,
};

const TICK: Duration = Duration::from_millis(16);
const POSITION_EPS: f32 = 1e-4;
const ANGLE_EPS: f32 = 1e-3;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn panel() -> ObjectTypeId {
    ObjectTypeId::from("SolarPanel")
}

fn dock_offset() -> Pose {
    Pose::from_position(Vector3::new(0.0, 0.2, 0.0))
}

fn config(policy: OwnershipPolicy) -> SyncConfig {
    SyncConfig {
        ownership_policy: policy,
        ..SyncConfig::default()
    }
}

fn server(policy: OwnershipPolicy) -> AuthorityServer {
    init_logger();
    let catalog = PrefabCatalog::new()
        .with("SolarPanel", PrefabEntry::new("Solar panel").with_grabbable(dock_offset()))
        .with("Inverter", PrefabEntry::new("Inverter"));
    AuthorityServer::new(PlayerId::from("host"), catalog, config(policy))
}

fn client(server: &mut AuthorityServer, id: &str, device: DeviceKind) -> SpatialClient {
    let player_id = PlayerId::from(id);
    let inbox = server.connect(PeerInfo {
        player_id: player_id.clone(),
        device,
    });
    let link = AuthorityLink::new(player_id, server.request_sender(), inbox);
    SpatialClient::new(link, device, server.config().clone())
}

/// Let requests reach the authority and the resulting broadcasts come back
fn step(server: &mut AuthorityServer, clients: &mut [&mut SpatialClient]) {
    for _ in 0..3 {
        for client in clients.iter_mut() {
            client.tick(TICK);
        }
        server.pump();
    }
    for client in clients.iter_mut() {
        client.tick(TICK);
    }
}

fn authority_pose(server: &AuthorityServer) -> Pose {
    *server.registry().get(&panel()).unwrap().shared_pose.get()
}

fn authority_dock(server: &AuthorityServer) -> DockState {
    server.registry().get(&panel()).unwrap().dock_state().unwrap().clone()
}

fn undock_transitions(events: &[SpatialEvent]) -> usize {
    let mut docked = true;
    let mut transitions = 0;
    for event in events {
        if let SpatialEvent::DockChanged { state, .. } = event {
            if docked && !state.is_docked {
                transitions += 1;
            }
            docked = state.is_docked;
        }
    }
    transitions
}

fn turned(position: Vector3, degrees: f32) -> Pose {
    Pose::new(position, Quat::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), degrees.to_radians()))
}

#[test]
fn shared_pose_round_trips_through_the_wire() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut vr = client(&mut server, "vr", DeviceKind::Vr);
    let mut other = client(&mut server, "other", DeviceKind::Simulator);
    let placed = turned(Vector3::new(1.25, 0.0, -3.5), 37.0);

    vr.report_local_detection(&panel(), placed, 1.0).unwrap();
    step(&mut server, &mut [&mut vr, &mut other]);

    for view in [vr.view(&panel()).unwrap(), other.view(&panel()).unwrap()] {
        assert!(view.shared_pose().approx_eq(&placed, POSITION_EPS, ANGLE_EPS));
    }

    let message = ServerMessage::Replicated(ReplicatedChange::SharedPose {
        type_id: panel(),
        pose: placed,
    });
    let decoded = ServerMessage::from_json(&message.to_json().unwrap()).unwrap();
    match decoded {
        ServerMessage::Replicated(ReplicatedChange::SharedPose { pose, .. }) => {
            assert!(pose.approx_eq(&placed, POSITION_EPS, ANGLE_EPS))
        }
        other => panic!("unexpected message {:?}", other),
    }
}

#[test]
fn ar_detection_stays_local_vr_placement_is_shared() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut ar = client(&mut server, "ar", DeviceKind::Ar);
    let mut vr = client(&mut server, "vr", DeviceKind::Vr);

    let marker = turned(Vector3::new(-2.0, 0.9, 1.0), 90.0);
    ar.report_local_detection(&panel(), marker, 0.6).unwrap();
    step(&mut server, &mut [&mut ar, &mut vr]);

    // Spawned at the staging pose; the marker never reached the authority
    assert_eq!(authority_pose(&server), Pose::identity());
    assert_eq!(*vr.view(&panel()).unwrap().shared_pose(), Pose::identity());
    assert_eq!(ar.world_pose(&panel()), Some(marker));
    assert!(vr
        .drain_events()
        .iter()
        .all(|e| !matches!(e, SpatialEvent::SharedPoseChanged { .. })));

    let placed = turned(Vector3::new(4.0, 0.0, 4.0), -30.0);
    vr.report_local_detection(&panel(), placed, 1.0).unwrap();
    step(&mut server, &mut [&mut ar, &mut vr]);

    assert!(authority_pose(&server).approx_eq(&placed, POSITION_EPS, ANGLE_EPS));
    assert!(vr.world_pose(&panel()).unwrap().approx_eq(&placed, POSITION_EPS, ANGLE_EPS));
    assert_eq!(ar.world_pose(&panel()), Some(marker));
    assert!(ar
        .drain_events()
        .iter()
        .any(|e| matches!(e, SpatialEvent::SharedPoseChanged { .. })));
}

#[test]
fn objects_stay_hidden_until_detected() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut placer = client(&mut server, "placer", DeviceKind::Vr);
    let mut viewer = client(&mut server, "viewer", DeviceKind::Ar);

    placer.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    step(&mut server, &mut [&mut placer, &mut viewer]);

    let view = viewer.view(&panel()).unwrap();
    assert!(view.is_resolved());
    assert!(!view.visibility().is_visible());
    assert!(matches!(viewer.begin_grab(&panel()), Err(SyncError::InvalidArgument(_))));
    assert_eq!(viewer.world_pose(&panel()), None);

    viewer.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    assert!(viewer.view(&panel()).unwrap().visibility().is_visible());
    assert!(viewer.drain_events().contains(&SpatialEvent::Detected(panel())));
    assert!(viewer.begin_grab(&panel()).is_ok());
}

#[test]
fn held_object_undocks_once_and_stays_undocked() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut vr = client(&mut server, "vr", DeviceKind::Vr);
    let me = PlayerId::from("vr");

    vr.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    step(&mut server, &mut [&mut vr]);
    vr.drain_events();

    vr.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut vr]);
    assert_eq!(authority_dock(&server).current_owner, Some(me.clone()));

    // Inside the dock radius (anchor scale 1.0 x multiplier 0.5)
    vr.update_held_pose(&panel(), Pose::from_position(Vector3::new(0.0, 0.3, 0.0))).unwrap();
    step(&mut server, &mut [&mut vr]);
    assert!(authority_dock(&server).is_docked);

    // Out, wobble across the threshold, then back in
    for x in [0.8, 0.45, 0.9, 0.3, 1.2, 0.1] {
        vr.update_held_pose(&panel(), Pose::from_position(Vector3::new(x, 0.0, 0.0))).unwrap();
        step(&mut server, &mut [&mut vr]);
        assert!(!authority_dock(&server).is_docked);
    }
    let dock = authority_dock(&server);
    assert!((dock.relative_position.x - 0.1).abs() < POSITION_EPS);

    vr.end_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut vr]);
    let dock = authority_dock(&server);
    assert!(!dock.is_docked);
    assert_eq!(dock.current_owner, Some(PlayerId::from("host")));
    assert_eq!(undock_transitions(&vr.drain_events()), 1);

    vr.redock(&panel()).unwrap();
    step(&mut server, &mut [&mut vr]);
    let dock = authority_dock(&server);
    assert!(dock.is_docked);
    assert!(dock.relative_pose().approx_eq(&dock_offset(), POSITION_EPS, ANGLE_EPS));

    let grab = vr.view(&panel()).unwrap().grab().unwrap();
    assert!(grab.is_docked());
    assert!(!grab.is_held());
}

#[test]
fn losing_grabber_never_pushes() {
    let mut server = server(OwnershipPolicy::FirstRequestWins);
    let mut a = client(&mut server, "a", DeviceKind::Vr);
    let mut b = client(&mut server, "b", DeviceKind::Vr);

    a.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    b.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);

    a.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);
    b.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);
    assert!(b
        .drain_events()
        .iter()
        .any(|e| matches!(e, SpatialEvent::OwnershipDenied { type_id, .. } if *type_id == panel())));

    a.update_held_pose(&panel(), Pose::from_position(Vector3::new(0.9, 0.0, 0.0))).unwrap();
    b.update_held_pose(&panel(), Pose::from_position(Vector3::new(5.0, 5.0, 5.0))).unwrap();
    for _ in 0..3 {
        step(&mut server, &mut [&mut a, &mut b]);
    }

    let dock = authority_dock(&server);
    assert_eq!(dock.current_owner, Some(PlayerId::from("a")));
    assert!((dock.relative_position.x - 0.9).abs() < POSITION_EPS);

    // b shows the replicated pose, not its own hand
    let shown = b.grab_world_pose(&panel()).unwrap();
    assert!((shown.position.x - 0.9).abs() < POSITION_EPS);
    assert!(b
        .drain_events()
        .iter()
        .all(|e| !matches!(e, SpatialEvent::RequestRejected { .. })));
}

#[test]
fn last_requester_takes_over_and_previous_owner_stops_pushing() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut a = client(&mut server, "a", DeviceKind::Vr);
    let mut b = client(&mut server, "b", DeviceKind::Simulator);

    a.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    b.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);

    a.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);
    a.update_held_pose(&panel(), Pose::from_position(Vector3::new(0.8, 0.0, 0.0))).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);
    assert!(!authority_dock(&server).is_docked);

    b.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);
    assert_eq!(authority_dock(&server).current_owner, Some(PlayerId::from("b")));
    a.drain_events();

    a.update_held_pose(&panel(), Pose::from_position(Vector3::new(3.0, 0.0, 0.0))).unwrap();
    b.update_held_pose(&panel(), Pose::from_position(Vector3::new(0.6, 0.4, 0.0))).unwrap();
    step(&mut server, &mut [&mut a, &mut b]);

    let dock = authority_dock(&server);
    assert!((dock.relative_position.x - 0.6).abs() < POSITION_EPS);
    assert!((dock.relative_position.y - 0.4).abs() < POSITION_EPS);
    assert!(a
        .drain_events()
        .iter()
        .all(|e| !matches!(e, SpatialEvent::RequestRejected { .. })));
}

#[test]
fn disconnect_returns_ownership_to_the_host() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut a = client(&mut server, "a", DeviceKind::Vr);
    let mut watcher = client(&mut server, "watcher", DeviceKind::Vr);

    a.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    step(&mut server, &mut [&mut a, &mut watcher]);
    a.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut a, &mut watcher]);
    assert_eq!(authority_dock(&server).current_owner, Some(PlayerId::from("a")));

    assert!(server.disconnect(&PlayerId::from("a")));
    step(&mut server, &mut [&mut watcher]);
    let owner = watcher.view(&panel()).unwrap().grab().unwrap().owner().cloned();
    assert_eq!(owner, Some(PlayerId::from("host")));
}

#[test]
fn late_joiner_receives_current_state() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut a = client(&mut server, "a", DeviceKind::Vr);
    let placed = turned(Vector3::new(2.0, 0.0, 1.0), 15.0);
    a.report_local_detection(&panel(), placed, 1.0).unwrap();
    step(&mut server, &mut [&mut a]);
    a.begin_grab(&panel()).unwrap();
    step(&mut server, &mut [&mut a]);

    let mut late = client(&mut server, "late", DeviceKind::Vr);
    late.tick(TICK);
    let view = late.view(&panel()).unwrap();
    assert!(view.is_resolved());
    assert!(view.shared_pose().approx_eq(&placed, POSITION_EPS, ANGLE_EPS));
    assert_eq!(view.grab().unwrap().owner(), Some(&PlayerId::from("a")));
}

#[test]
fn updates_before_the_record_fill_an_unresolved_view() {
    init_logger();
    let (requests, _authority_inbox) = mpsc::unbounded_channel();
    let (outbox, inbox) = mpsc::unbounded_channel();
    let link = AuthorityLink::new(PlayerId::from("vr"), requests, inbox);
    let mut vr = SpatialClient::new(link, DeviceKind::Vr, SyncConfig::default());

    let streamed = turned(Vector3::new(0.5, 0.0, 0.5), 10.0);
    outbox
        .send(ServerMessage::Replicated(ReplicatedChange::SharedPose {
            type_id: panel(),
            pose: streamed,
        }))
        .unwrap();
    outbox
        .send(ServerMessage::Replicated(ReplicatedChange::Dock {
            type_id: panel(),
            state: DockState::docked(dock_offset(), Some(PlayerId::from("host"))),
        }))
        .unwrap();
    vr.tick(TICK);

    let view = vr.view(&panel()).unwrap();
    assert!(!view.is_resolved());
    assert_eq!(*view.shared_pose(), streamed);
    assert!(view.grab().is_some());

    outbox
        .send(ServerMessage::Replicated(ReplicatedChange::Spawned(SharedObjectRecord {
            type_id: panel(),
            instance_id: 1000,
            shared_world_pose: Pose::identity(),
            anchor_local_offset: Pose::identity(),
            grabbable: true,
            detected_locally: false,
        })))
        .unwrap();
    vr.tick(TICK);

    let view = vr.view(&panel()).unwrap();
    assert!(view.is_resolved());
    assert_eq!(*view.shared_pose(), streamed);
    assert!(vr.drain_events().contains(&SpatialEvent::Spawned(panel())));
}

#[test]
fn unknown_types_are_rejected_back_to_the_caller() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut vr = client(&mut server, "vr", DeviceKind::Vr);
    let ghost = ObjectTypeId::from("Ghost");

    vr.request_spawn(&ghost).unwrap();
    step(&mut server, &mut [&mut vr]);

    assert!(vr.drain_events().iter().any(|e| matches!(
        e,
        SpatialEvent::RequestRejected { error: SyncError::UnknownTypeId(id), .. } if id == "Ghost"
    )));
    assert_eq!(server.registry().live_count(), 0);
}

#[test]
fn release_removes_the_view() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut vr = client(&mut server, "vr", DeviceKind::Vr);
    vr.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    step(&mut server, &mut [&mut vr]);

    assert!(server.release(&panel()));
    vr.tick(TICK);
    assert!(vr.view(&panel()).is_none());
    assert!(vr.drain_events().contains(&SpatialEvent::Released(panel())));
}

#[tokio::test]
async fn tick_loop_drives_the_client() {
    let mut server = server(OwnershipPolicy::LastRequesterWins);
    let mut vr = client(&mut server, "vr", DeviceKind::Vr);

    vr.report_local_detection(&panel(), Pose::identity(), 1.0).unwrap();
    server.pump();

    let resolved = run_until(&mut vr, Duration::from_millis(1), 20, |client| {
        client.view(&panel()).map_or(false, |view| view.is_resolved())
    })
    .await;
    assert!(resolved);
}
