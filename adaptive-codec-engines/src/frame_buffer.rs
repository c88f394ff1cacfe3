//! Decode output buffers and the two-function buffer protocol
//!
//! A video decode engine does not allocate its output itself when a
//! [`FrameBufferProvider`] is installed. It asks the provider for a buffer of
//! at least the size it needs, decodes into it, and hands the buffer back
//! once it no longer references it. Buffers are shared as `Arc<FrameBuffer>`,
//! so whoever receives a decoded frame keeps the buffer alive simply by
//! holding on to it.

use crate::Result;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::sync::Arc;

/// A growable byte buffer shared by reference count.
///
/// The bytes sit behind the buffer's own lock so that the holder of a
/// reference can read and write them without involving whoever handed the
/// buffer out.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    data: Mutex<Vec<u8>>,
}

impl FrameBuffer {
    /// Create a zero-filled buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; size]),
        }
    }

    /// Current size in bytes.
    pub fn size(&self) -> usize {
        self.data.lock().len()
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.lock().capacity()
    }

    /// Resize to exactly `size` bytes. Newly exposed bytes are zeroed.
    pub fn set_size(&self, size: usize) {
        self.data.lock().resize(size, 0);
    }

    /// Lock the payload for reading or writing.
    pub fn bytes(&self) -> MappedMutexGuard<'_, [u8]> {
        MutexGuard::map(self.data.lock(), |v| v.as_mut_slice())
    }

    /// Copy the payload out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

/// Buffer-request / buffer-release protocol served to a decode engine.
pub trait FrameBufferProvider: Send + Sync {
    /// Hand out a buffer of at least `min_size` bytes.
    fn get_frame_buffer(&self, min_size: usize) -> Result<Arc<FrameBuffer>>;

    /// Called by the engine once it stops referencing `buffer`.
    fn release_frame_buffer(&self, buffer: Arc<FrameBuffer>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_zeroed() {
        let buffer = FrameBuffer::new(16);
        assert_eq!(buffer.size(), 16);
        assert!(buffer.to_vec().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_set_size_grows_and_shrinks() {
        let buffer = FrameBuffer::new(4);
        buffer.bytes().copy_from_slice(&[1, 2, 3, 4]);

        buffer.set_size(8);
        assert_eq!(buffer.to_vec(), vec![1, 2, 3, 4, 0, 0, 0, 0]);
        assert!(buffer.capacity() >= 8);

        buffer.set_size(2);
        assert_eq!(buffer.to_vec(), vec![1, 2]);
        assert!(buffer.capacity() >= 8);
    }

    #[test]
    fn test_writes_visible_through_shared_reference() {
        let buffer = Arc::new(FrameBuffer::new(3));
        let other = Arc::clone(&buffer);
        buffer.bytes()[1] = 42;
        assert_eq!(other.to_vec(), vec![0, 42, 0]);
    }
}
