//! Parameter visibility and shared buffer ownership, checked with the echo module.

use gravwell_core::{ErrorCode, Float4, MemAccess, Owner};
use gravwell_kernels::{Echo, EchoPayload};
use gravwell_runtime::{Executor, GraphicsContext};

#[test]
fn test_each_frame_sees_its_parameter() {
    let (gfx, _host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Echo).expect("executor");
    let mut payload = EchoPayload::new(&gfx, 8).expect("payload");
    executor.load(&mut payload).expect("load");

    for frame in 0..3 {
        let f = frame as f32;
        payload.param = Float4::new(f, f + 1.0, f + 2.0, 0.0);
        executor.exec(&mut payload).expect("exec");

        let values = payload.values().read().expect("values");
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, Float4::new(f, f + 1.0, f + 2.0, i as f32), "frame {frame}");
        }
    }
}

#[test]
fn test_graphics_read_fails_while_acquired() {
    let (gfx, host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Echo).expect("executor");
    let mut payload = EchoPayload::new(&gfx, 4).expect("payload");
    executor.load(&mut payload).expect("load");

    let bundle = executor.bundle();
    let view = bundle
        .create_from_graphics(payload.values(), MemAccess::ReadOnly)
        .expect("view");
    let queue = bundle.queue();
    let acquired = queue.acquire(&[view.id()], &[]).expect("acquire");
    queue.wait(&[acquired.event()]).expect("wait");

    assert_eq!(host.owner(payload.values().handle()), Some(Owner::Compute));
    let err = payload.values().read().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidGraphicsObject));

    let release = acquired.release(&[]).expect("release");
    queue.flush().expect("flush");
    queue.wait(&[release]).expect("wait");
    assert_eq!(payload.values().read().expect("values").len(), 4);
}

#[test]
fn test_failed_exec_leaves_other_window_open() {
    let (gfx, host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Echo).expect("executor");
    let mut payload = EchoPayload::new(&gfx, 4).expect("payload");
    executor.load(&mut payload).expect("load");

    let view = executor
        .bundle()
        .create_from_graphics(payload.values(), MemAccess::ReadOnly)
        .expect("view");
    let queue = executor.bundle().queue().clone();
    let held = queue.acquire(&[view.id()], &[]).expect("acquire");
    queue.wait(&[held.event()]).expect("wait");

    let err = executor.exec(&mut payload).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidGraphicsObject));

    // The failed frame never owned the buffer, so it must not release it
    assert_eq!(host.owner(payload.values().handle()), Some(Owner::Compute));
    let err = payload.values().read().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidGraphicsObject));

    let release = held.release(&[]).expect("release");
    queue.wait(&[release]).expect("wait");
    assert_eq!(host.owner(payload.values().handle()), Some(Owner::Graphics));
    executor.exec(&mut payload).expect("exec after release");
}

#[test]
fn test_frame_events_recorded() {
    let (gfx, _host) = GraphicsContext::host();
    let mut executor = Executor::new(&gfx.share(), Echo).expect("executor");
    let mut payload = EchoPayload::new(&gfx, 2).expect("payload");
    executor.load(&mut payload).expect("load");
    executor.exec(&mut payload).expect("exec");

    let events = payload.events();
    let (acquire, exec, release) = (
        events.acquire.expect("acquire"),
        events.exec.expect("exec"),
        events.release.expect("release"),
    );
    assert!(events.transfer.is_none());
    assert!(acquire.id() < exec.id() && exec.id() < release.id());
}

#[pollster::test]
#[ignore] // Requires GPU
async fn test_echo_on_gpu() {
    let gfx = GraphicsContext::wgpu().await.expect("wgpu device");
    let mut executor = Executor::new(&gfx.share(), Echo).expect("executor");
    let mut payload = EchoPayload::new(&gfx, 130).expect("payload");
    executor.load(&mut payload).expect("load");

    payload.param = Float4::new(1.0, 2.0, 3.0, 0.0);
    executor.exec(&mut payload).expect("exec");
    payload.param = Float4::new(4.0, 5.0, 6.0, 0.0);
    executor.exec(&mut payload).expect("exec");

    let values = payload.values().read().expect("values");
    assert_eq!(values.len(), 130);
    assert_eq!(values[129], Float4::new(4.0, 5.0, 6.0, 129.0));
}
