//! Device-resident buffers.
//!
//! The native kernels run on the host, so a `DeviceArray` owns its own copy
//! of the uploaded data. Uploading copies, downloading copies back; kernels
//! only ever see the device copy.

use bytemuck::Pod;
use log::debug;

#[derive(Debug, Clone)]
pub struct DeviceArray<T: Pod> {
    data: Vec<T>,
}

impl<T: Pod> DeviceArray<T> {
    /// Copies `host` into a freshly allocated device buffer.
    pub fn upload(host: &[T]) -> Self {
        debug!(
            "Uploading {} elements ({} bytes) to device",
            host.len(),
            std::mem::size_of_val(host)
        );
        Self {
            data: host.to_vec(),
        }
    }

    /// Allocates a zero-filled device buffer.
    pub fn zeroed(len: usize) -> Self {
        Self {
            data: vec![bytemuck::Zeroable::zeroed(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Copies the device contents back to a host vector.
    pub fn download(&self) -> Vec<T> {
        self.data.clone()
    }
}
