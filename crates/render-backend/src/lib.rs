mod buffer;
pub use buffer::*;

mod destroy;
pub use destroy::*;

mod device;
pub use device::*;

mod frame_resources;
pub use frame_resources::*;

mod image;
pub use image::*;

mod instance;
pub use instance::*;

mod pipeline;
pub use pipeline::*;

mod shader;
pub use shader::*;

mod surface;
pub use surface::*;

mod swapchain;
pub use swapchain::*;
