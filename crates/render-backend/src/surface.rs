use std::error::Error;

use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use crate::Instance;

/// A presentation surface, backed by a window.
pub struct Surface {
    surface_loader: ash::extensions::khr::Surface,
    surface_handle: ash::vk::SurfaceKHR,
}

impl Surface {
    /// Create a presentation surface for a given window.
    ///
    /// # Errors
    ///
    /// This function can error if `ash_window` fails to create the surface.
    pub fn new<W>(window: &W, instance: &Instance) -> Result<Self, Box<dyn Error>>
    where
        W: HasRawWindowHandle + HasRawDisplayHandle,
    {
        let surface_loader = ash::extensions::khr::Surface::new(instance.entry(), instance);

        let surface = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )?
        };

        Ok(Self {
            surface_loader,
            surface_handle: surface,
        })
    }

    pub fn handle(&self) -> &ash::vk::SurfaceKHR {
        &self.surface_handle
    }

    pub fn loader(&self) -> &ash::extensions::khr::Surface {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader
                .destroy_surface(self.surface_handle, None);
        }
    }
}
