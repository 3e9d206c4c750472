use crate::*;

/// Destroy the underlying Vulkan objects associated with this object.
/// The object must not be used after `destroy` is called.
pub trait Destroy {
    fn destroy(&mut self, device: &Device);
}
