use std::{error::Error, marker::PhantomData};

use gpu_allocator::{vulkan::*, MemoryLocation};

use crate::*;

/// A Vulkan buffer object, allocated using gpu_allocator.
pub struct Buffer<T> {
    buffer_handle: ash::vk::Buffer,
    allocation: Allocation,
    len: usize,
    marker: PhantomData<T>,
}

impl<T: Copy> Buffer<T> {
    /// Create a new buffer of the given size, with the given usage flags and memory location.
    /// The allocated memory will be bound, and mapped if the location is host-visible.
    ///
    /// # Errors
    ///
    /// This function can error if `ash` fails to create the buffer, bind the buffer memory, or if
    /// `gpu_allocator` fails to allocate the requested memory.
    pub fn new(
        device: &Device,
        size: u64,
        usage: ash::vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self, Box<dyn Error>> {
        let buffer_info = ash::vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(ash::vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let memory_requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation_info = AllocationCreateDesc {
            name: "Buffer",
            requirements: memory_requirements,
            location,
            linear: true,
        };

        let allocation = device
            .memory_allocator()
            .lock()
            .unwrap()
            .allocate(&allocation_info)?;

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?
        };

        Ok(Self {
            buffer_handle: buffer,
            allocation,
            len: 0,
            marker: PhantomData,
        })
    }

    /// See [`Buffer::new`]. The buffer size will be that needed to store the given data. The data
    /// will be stored in a GPU-side buffer via a staging buffer.
    ///
    /// # Errors
    ///
    /// This function can error if either the staging or gpu-side buffers fail to be created, or if
    /// copying the data from the staging buffer to the gpu-side buffer fails.
    pub fn new_with_data(
        device: &Device,
        usage: ash::vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Self, Box<dyn Error>> {
        let data_size = (data.len() * std::mem::size_of::<T>()) as u64;

        let mut staging_buffer: Buffer<T> = Buffer::new(
            device,
            data_size,
            ash::vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;

        unsafe {
            // No need to map first or unmap after, as gpu_allocator maps the memory when allocating.
            let memory_pointer = staging_buffer
                .allocation
                .mapped_ptr()
                .ok_or("Staging buffer memory is not host-visible.")?
                .as_ptr() as *mut T;
            memory_pointer.copy_from_nonoverlapping(data.as_ptr(), data.len());
        }

        let mut destination_buffer = Buffer::new(
            device,
            data_size,
            usage | ash::vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
        )?;

        device.perform_immediate_submission(|command_buffer| {
            let buffer_region = ash::vk::BufferCopy::builder().size(data_size).build();

            unsafe {
                device.handle().cmd_copy_buffer(
                    command_buffer,
                    *staging_buffer.handle(),
                    *destination_buffer.handle(),
                    &[buffer_region],
                );
            }

            Ok(())
        })?;

        destination_buffer.len = data.len();

        staging_buffer.destroy(device);

        Ok(destination_buffer)
    }

    /// Create a host-visible buffer sized for a single `T`, for per-frame data
    /// such as uniforms.
    ///
    /// # Errors
    ///
    /// See [`Buffer::new`].
    pub fn new_per_frame(
        device: &Device,
        usage: ash::vk::BufferUsageFlags,
    ) -> Result<Self, Box<dyn Error>> {
        let mut buffer = Buffer::new(
            device,
            std::mem::size_of::<T>() as u64,
            usage,
            MemoryLocation::CpuToGpu,
        )?;
        buffer.len = 1;

        Ok(buffer)
    }

    /// Write a value into a host-visible buffer created with [`Buffer::new_per_frame`].
    ///
    /// # Errors
    ///
    /// This function errors if the buffer's memory is not mapped.
    pub fn write(&mut self, value: &T) -> Result<(), Box<dyn Error>> {
        unsafe {
            let memory_pointer = self
                .allocation
                .mapped_ptr()
                .ok_or("Buffer memory is not host-visible.")?
                .as_ptr() as *mut T;
            memory_pointer.copy_from_nonoverlapping(value, 1);
        }

        Ok(())
    }

    pub fn handle(&self) -> &ash::vk::Buffer {
        &self.buffer_handle
    }

    /// The number of elements of `T` stored in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Destroy for Buffer<T> {
    fn destroy(&mut self, device: &Device) {
        unsafe {
            device
                .memory_allocator()
                .lock()
                .unwrap()
                .free(std::mem::take(&mut self.allocation))
                .unwrap_or_else(|error| {
                    log::error!("Failed to free buffer memory: {}", error);
                });

            device.handle().destroy_buffer(self.buffer_handle, None);
        }
    }
}
