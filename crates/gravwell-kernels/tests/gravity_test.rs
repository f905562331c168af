//! Gravity module tests on the reference host device.

use gravwell_core::{Error, ErrorCode, EventKind, Float4, HostVec, Owner};
use gravwell_kernels::gravity::DEFAULT_POINTER;
use gravwell_kernels::{Gravity, GravityParams, GravityPayload, Particle, TransferPolicy};
use gravwell_runtime::{Backend, Command, Executor, GraphicsContext, HostDevice};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn cross() -> Vec<Float4> {
    vec![
        Float4::point(0.5, 0.0, 0.0),
        Float4::point(-0.5, 0.0, 0.0),
        Float4::point(0.0, 0.5, 0.0),
        Float4::point(0.0, -0.5, 0.0),
    ]
}

fn cross_payload(gfx: &GraphicsContext) -> GravityPayload {
    let colors = vec![Float4::new(0.0, 0.5, 0.5, 1.0); 4];
    GravityPayload::new(gfx, &cross(), HostVec::zeroed(4), &colors).expect("payload")
}

fn close(a: Float4, b: Float4) -> bool {
    (a - b).length() < 1e-6
}

#[test]
fn test_four_particles_move_toward_pointer() {
    init_tracing();
    let (gfx, _host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    payload.pointer = Float4::point(0.0, 0.0, 0.0);

    executor.load(&mut payload).expect("load");
    executor.exec(&mut payload).expect("exec");

    let positions = payload.positions().read().expect("positions");
    let colors = payload.colors().read().expect("colors");
    // Every particle sits at distance 0.5: l = 0.25
    let pull = 0.000918 * (1.0 - 0.25 * 0.25);
    for (before, after) in cross().into_iter().zip(&positions) {
        // Unit direction away from the origin
        let outward = Float4::new(before.x, before.y, before.z, 0.0) * 2.0;
        assert!(close(*after, before - outward * pull));
    }
    for color in colors {
        assert_eq!(color, Float4::new(1.0, 0.5, 0.5, 1.0));
    }
}

#[test]
fn test_frames_match_host_step() {
    let (gfx, _host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    executor.load(&mut payload).expect("load");

    let mut particles: Vec<Particle> = cross()
        .into_iter()
        .map(|position| Particle {
            position,
            velocity: Float4::ZERO,
            color: Float4::new(0.0, 0.5, 0.5, 1.0),
        })
        .collect();

    for pointer in [DEFAULT_POINTER, Float4::point(0.3, -0.2, 0.0), DEFAULT_POINTER] {
        payload.pointer = pointer;
        executor.exec(&mut payload).expect("exec");
        for p in &mut particles {
            *p = GravityParams::DEFAULT.step(*p, pointer);
        }
    }

    let positions = payload.positions().read().expect("positions");
    for (p, actual) in particles.iter().zip(positions) {
        assert!(close(p.position, actual));
    }
}

#[test]
fn test_frame_protocol_order() {
    let (gfx, host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    executor.load(&mut payload).expect("load");
    executor.exec(&mut payload).expect("exec");
    executor.exec(&mut payload).expect("exec");

    let timeline = host.timeline();
    let kinds: Vec<EventKind> = timeline.iter().map(|e| e.event.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Acquire,
            EventKind::Exec,
            EventKind::Release,
            EventKind::Acquire,
            EventKind::Exec,
            EventKind::Release,
        ]
    );

    for frame in timeline.chunks(3) {
        let (acquire, exec, release) = (&frame[0], &frame[1], &frame[2]);
        match (&acquire.command, &release.command) {
            (Command::Acquire { mems: a }, Command::Release { mems: r }) => {
                assert_eq!(a, r);
                assert_eq!(a.len(), 2);
            }
            other => panic!("unexpected commands {other:?}"),
        }
        assert!(matches!(exec.command, Command::Dispatch { global: 4, .. }));
        assert_eq!(exec.wait_list, vec![acquire.event]);
        assert_eq!(release.wait_list, vec![exec.event]);
        assert!(frame.iter().all(|e| e.failure.is_none()));
    }

    assert_eq!(host.pending(), 0);
    assert_eq!(host.owner(payload.positions().handle()), Some(Owner::Graphics));
    assert_eq!(host.owner(payload.colors().handle()), Some(Owner::Graphics));
}

#[test]
fn test_zero_copy_aliases_velocities() {
    let (gfx, host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let velocities = HostVec::zeroed(4);
    let colors = vec![Float4::ZERO; 4];
    let mut payload =
        GravityPayload::new(&gfx, &cross(), velocities.clone(), &colors).expect("payload");
    payload.pointer = Float4::point(0.0, 0.0, 0.0);

    executor.load(&mut payload).expect("load");
    executor.exec(&mut payload).expect("exec");

    assert!(payload.events().transfer.is_none());
    assert!(!host.timeline().iter().any(|e| matches!(e.command, Command::Write { .. })));
    // The caller's handle observes the device writes.
    assert!(velocities.read()[0].x < 0.0);
    assert!(velocities.ptr_eq(payload.velocities()));
}

#[test]
fn test_upload_transfers_once_before_first_dispatch() {
    let (gfx, host) = GraphicsContext::host();
    let module = Gravity::with_transfer(TransferPolicy::Upload);
    let mut executor = Executor::new(&gfx.share(), module).expect("executor");
    let velocities = HostVec::new(vec![Float4::new(0.01, 0.0, 0.0, 0.0); 4]);
    let colors = vec![Float4::ZERO; 4];
    let mut payload =
        GravityPayload::new(&gfx, &cross(), velocities.clone(), &colors).expect("payload");

    executor.load(&mut payload).expect("load");
    let transfer = payload.events().transfer.expect("transfer event");
    assert_eq!(transfer.kind(), EventKind::Transfer);

    executor.exec(&mut payload).expect("exec");
    executor.exec(&mut payload).expect("exec");

    let timeline = host.timeline();
    let writes: Vec<_> = timeline
        .iter()
        .filter(|e| matches!(e.command, Command::Write { .. }))
        .collect();
    assert_eq!(writes.len(), 1);
    assert!(matches!(writes[0].command, Command::Write { len: 64, .. }));
    assert_eq!(timeline[0].event, transfer);

    for dispatch in timeline.iter().filter(|e| e.event.kind() == EventKind::Exec) {
        assert!(dispatch.wait_list.contains(&transfer));
    }
    // Device-side velocities are not mirrored back.
    assert_eq!(velocities.read()[0], Float4::new(0.01, 0.0, 0.0, 0.0));
}

#[test]
fn test_failed_dispatch_returns_buffers() {
    init_tracing();
    let host = Arc::new(HostDevice::new().with_max_work_items(2));
    let gfx = GraphicsContext::new(Arc::clone(&host) as Arc<dyn Backend>);
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    executor.load(&mut payload).expect("load");

    let err = executor.exec(&mut payload).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidWorkSize));

    assert_eq!(host.owner(payload.positions().handle()), Some(Owner::Graphics));
    assert_eq!(host.owner(payload.colors().handle()), Some(Owner::Graphics));
    assert_eq!(payload.positions().read().expect("readable"), cross());
    assert_eq!(host.pending(), 0);
}

#[test]
fn test_exec_before_load() {
    let (gfx, host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    assert!(!payload.is_loaded());

    let err = executor.exec(&mut payload).unwrap_err();
    assert!(matches!(err, Error::NotLoaded("gravity")));
    assert!(host.timeline().is_empty());
}

#[test]
fn test_mismatched_lengths_rejected() {
    let (gfx, _host) = GraphicsContext::host();
    let err = GravityPayload::new(&gfx, &cross(), HostVec::zeroed(3), &[Float4::ZERO; 4])
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidBufferSize));
}

#[test]
fn test_reload_resets_state() {
    let (gfx, host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);

    executor.load(&mut payload).expect("load");
    executor.exec(&mut payload).expect("exec");
    executor.load(&mut payload).expect("reload");
    assert!(payload.events().acquire.is_none());
    executor.exec(&mut payload).expect("exec");

    // One set of views survives the reload.
    assert_eq!(host.live_mems(), 3);
    drop(payload);
    assert_eq!(host.live_mems(), 0);
    assert_eq!(host.live_graphics_buffers(), 0);
}

#[test]
fn test_long_run_keeps_event_state_bounded() {
    let host = Arc::new(HostDevice::new().with_history(64));
    let gfx = GraphicsContext::new(Arc::clone(&host) as Arc<dyn Backend>);
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    executor.load(&mut payload).expect("load");

    for _ in 0..3000 {
        executor.exec(&mut payload).expect("exec");
    }
    assert_eq!(host.tracked_events(), 0);
    assert_eq!(host.timeline().len(), 64);
    assert_eq!(host.pending(), 0);
}

#[pollster::test]
#[ignore] // Requires GPU
async fn test_gravity_on_gpu() {
    init_tracing();
    let gfx = GraphicsContext::wgpu().await.expect("wgpu device");
    let mut executor = Executor::new(&gfx.share(), Gravity::default()).expect("executor");
    let mut payload = cross_payload(&gfx);
    payload.pointer = Float4::point(0.0, 0.0, 0.0);

    executor.load(&mut payload).expect("load");
    executor.exec(&mut payload).expect("exec");

    let positions = payload.positions().read().expect("positions");
    let pull = 0.000918 * (1.0 - 0.25 * 0.25);
    assert!((positions[0].x - (0.5 - pull)).abs() < 1e-5);
    assert_eq!(positions[0].w, 1.0);
}
