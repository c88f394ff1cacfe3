//! Process-wide platform context lifecycle

use adaptive_codec_core::platform::{self, PlatformContext, PlatformError, ThreadAttachment};
use serial_test::serial;
use std::sync::{Arc, Barrier};
use std::thread;

fn reset() {
    let _ = platform::uninitialize();
}

#[test]
#[serial]
fn test_initialize_and_read_back() {
    reset();
    assert!(!platform::is_initialized());
    assert_eq!(platform::context(), None);

    let context = PlatformContext {
        application_name: "loopback".to_string(),
    };
    platform::initialize(context.clone()).unwrap();
    assert_eq!(platform::context(), Some(context.clone()));
    assert_eq!(platform::ensure_initialized(), context);

    platform::uninitialize().unwrap();
    assert!(!platform::is_initialized());
}

#[test]
#[serial]
fn test_ensure_initialized_is_idempotent() {
    reset();
    let first = platform::ensure_initialized();
    let second = platform::ensure_initialized();
    assert_eq!(first, second);
    assert_eq!(first, PlatformContext::default());
    assert_eq!(
        platform::initialize(PlatformContext::default()),
        Err(PlatformError::AlreadyInitialized)
    );
    platform::uninitialize().unwrap();
}

#[test]
#[serial]
fn test_threads_counted_and_block_teardown() {
    reset();
    platform::ensure_initialized();

    let attached = Arc::new(Barrier::new(4));
    let release = Arc::new(Barrier::new(4));
    let workers: Vec<_> = (0..3)
        .map(|_| {
            let attached = Arc::clone(&attached);
            let release = Arc::clone(&release);
            thread::spawn(move || {
                let _guard = ThreadAttachment::attach().unwrap();
                let _nested = ThreadAttachment::attach().unwrap();
                attached.wait();
                release.wait();
            })
        })
        .collect();

    attached.wait();
    assert_eq!(platform::attached_threads(), 3);
    assert_eq!(
        platform::uninitialize(),
        Err(PlatformError::ThreadsAttached(3))
    );
    release.wait();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(platform::attached_threads(), 0);
    platform::uninitialize().unwrap();
}
