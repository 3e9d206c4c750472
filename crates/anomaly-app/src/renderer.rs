use std::{error::Error, path::Path, time::Instant};

use winit::{
    event::{DeviceEvent, Event, MouseScrollDelta, VirtualKeyCode, WindowEvent},
    window::Window,
};

use nalgebra_glm as glm;

use crate::camera::*;
use crate::input::InputState;
use crate::mesh::{self, PushConstants, Scene, SceneUniforms, Vertex};

use render_backend::*;

const MAX_FRAMES_IN_FLIGHT: usize = 2;

const CLEAR_COLOUR: [f32; 4] = [0.8, 0.4, 0.6, 1.0];

const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;

pub struct Renderer {
    camera: Camera,
    input: InputState,
    last_frame_time: Instant,

    window_resize_flag: bool,
    should_render_flag: bool,

    frame_index: usize,

    scene: Scene,
    vertex_buffer: Buffer<Vertex>,

    descriptor_pool: ash::vk::DescriptorPool,
    uniform_buffers: Vec<Buffer<SceneUniforms>>,
    descriptor_sets: Vec<ash::vk::DescriptorSet>,

    scene_pipeline: Pipeline,
    lamp_pipeline: Pipeline,
    depth_image: Image,
    frames_in_flight: Vec<FrameResources>,
    swapchain: Swapchain,
    device: Device,
    surface: Surface,
    instance: Instance,
}

impl Renderer {
    pub fn new(window: &Window) -> Result<Self, Box<dyn Error>> {
        let instance = Instance::builder()
            .application_name("Anomaly")
            .application_version(0, 1, 0)
            .window_handle(window)
            .enable_validation_layers(cfg!(debug_assertions))
            .build()?;

        let surface = Surface::new(window, &instance)?;

        let device = Device::new(&instance, Some(&surface))?;

        let swapchain = Swapchain::new(
            (window.inner_size().width, window.inner_size().height),
            &instance,
            &surface,
            &device,
            ash::vk::PresentModeKHR::FIFO,
            None,
        )?;

        let mut frames_in_flight: Vec<FrameResources> = vec![];
        for _i in 0..MAX_FRAMES_IN_FLIGHT {
            frames_in_flight.push(FrameResources::new(&device)?);
        }

        let depth_image = Image::new(
            &device,
            ash::vk::Extent3D::builder()
                .width(swapchain.extent().width)
                .height(swapchain.extent().height)
                .depth(1)
                .build(),
            ash::vk::Format::D32_SFLOAT,
            ash::vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ash::vk::ImageAspectFlags::DEPTH,
            1,
        )?;

        let mut scene_vert_shader =
            Shader::new(Path::new("./data/shaders/compiled/scene.vert.spv"), &device)?;

        let mut scene_frag_shader =
            Shader::new(Path::new("./data/shaders/compiled/scene.frag.spv"), &device)?;

        let scene_pipeline = Pipeline::builder()
            .shaders(&[&scene_vert_shader, &scene_frag_shader])
            .colour_formats(&[swapchain.surface_format().format])
            .depth_format(depth_image.format())
            .build(&device)?;

        scene_vert_shader.destroy(&device);
        scene_frag_shader.destroy(&device);

        let mut lamp_vert_shader =
            Shader::new(Path::new("./data/shaders/compiled/lamp.vert.spv"), &device)?;

        let mut lamp_frag_shader =
            Shader::new(Path::new("./data/shaders/compiled/lamp.frag.spv"), &device)?;

        // The lamp's vertex shader only reads positions, so reflection under-reports the
        // stride of the shared interleaved vertex buffer.
        let lamp_pipeline = Pipeline::builder()
            .shaders(&[&lamp_vert_shader, &lamp_frag_shader])
            .colour_formats(&[swapchain.surface_format().format])
            .depth_format(depth_image.format())
            .vertex_stride(std::mem::size_of::<Vertex>() as u32)
            .build(&device)?;

        lamp_vert_shader.destroy(&device);
        lamp_frag_shader.destroy(&device);

        let scene = mesh::build_scene();

        let vertex_buffer = Buffer::new_with_data(
            &device,
            ash::vk::BufferUsageFlags::VERTEX_BUFFER,
            &scene.vertices,
        )?;

        let descriptor_pool_sizes = [ash::vk::DescriptorPoolSize::builder()
            .ty(ash::vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(MAX_FRAMES_IN_FLIGHT as u32)
            .build()];

        let descriptor_pool_info = ash::vk::DescriptorPoolCreateInfo::builder()
            .max_sets(MAX_FRAMES_IN_FLIGHT as u32)
            .pool_sizes(&descriptor_pool_sizes);

        let descriptor_pool = unsafe {
            device
                .handle()
                .create_descriptor_pool(&descriptor_pool_info, None)?
        };

        // One uniform buffer and descriptor set per frame-in-flight, so a frame's
        // uniforms can be rewritten without trampling the previous frame's.
        let set_layouts =
            vec![scene_pipeline.descriptor_set_layouts()[0]; MAX_FRAMES_IN_FLIGHT];

        let set_allocate_info = ash::vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(descriptor_pool)
            .set_layouts(&set_layouts);

        let descriptor_sets = unsafe {
            device
                .handle()
                .allocate_descriptor_sets(&set_allocate_info)?
        };

        let mut uniform_buffers: Vec<Buffer<SceneUniforms>> = vec![];
        for &descriptor_set in descriptor_sets.iter() {
            let uniform_buffer =
                Buffer::new_per_frame(&device, ash::vk::BufferUsageFlags::UNIFORM_BUFFER)?;

            let buffer_infos = [ash::vk::DescriptorBufferInfo::builder()
                .buffer(*uniform_buffer.handle())
                .offset(0)
                .range(std::mem::size_of::<SceneUniforms>() as u64)
                .build()];

            let descriptor_write = ash::vk::WriteDescriptorSet::builder()
                .dst_binding(0)
                .descriptor_type(ash::vk::DescriptorType::UNIFORM_BUFFER)
                .dst_set(descriptor_set)
                .dst_array_element(0)
                .buffer_info(&buffer_infos)
                .build();

            unsafe {
                device
                    .handle()
                    .update_descriptor_sets(&[descriptor_write], &[]);
            }

            uniform_buffers.push(uniform_buffer);
        }

        let camera = Camera::new(glm::vec3(0.0, 0.0, 3.0));

        Ok(Renderer {
            camera,
            input: InputState::new(),
            last_frame_time: Instant::now(),
            should_render_flag: true,
            window_resize_flag: false,
            frame_index: 0,
            scene,
            vertex_buffer,
            descriptor_pool,
            uniform_buffers,
            descriptor_sets,
            scene_pipeline,
            lamp_pipeline,
            depth_image,
            frames_in_flight,
            swapchain,
            device,
            surface,
            instance,
        })
    }

    pub fn handle_event(
        &mut self,
        event: &Event<()>,
        window: &Window,
    ) -> Result<(), Box<dyn Error>> {
        match event {
            Event::MainEventsCleared => {
                let now = Instant::now();
                let delta_time = now.duration_since(self.last_frame_time).as_secs_f32();
                self.last_frame_time = now;

                self.apply_held_movement(delta_time);

                if self.should_render_flag {
                    self.draw_frame(window)?
                }
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    self.should_render_flag = false;
                }
                WindowEvent::Resized(size) => {
                    if size.width == 0 || size.height == 0 {
                        self.should_render_flag = false;
                    } else {
                        self.should_render_flag = true;
                        self.window_resize_flag = true;
                    }
                }
                WindowEvent::KeyboardInput { input, .. } => {
                    self.input.handle_keyboard(input);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let y_offset = match delta {
                        MouseScrollDelta::LineDelta(_, y) => *y,
                        MouseScrollDelta::PixelDelta(position) => position.y as f32,
                    };

                    self.camera.process_scroll(y_offset);
                }
                _ => (),
            },
            Event::DeviceEvent { event, .. } => match event {
                DeviceEvent::MouseMotion { delta, .. } => {
                    // Winit's y-delta grows downwards, while pitch grows upwards.
                    self.camera
                        .process_mouse(delta.0 as f32, -delta.1 as f32);
                }
                _ => (),
            },
            _ => (),
        }

        Ok(())
    }

    /// Translate the camera for every movement key currently held. WASD and the
    /// arrow keys are interchangeable.
    fn apply_held_movement(&mut self, delta_time: f32) {
        let bindings = [
            (VirtualKeyCode::W, CameraMovement::Forward),
            (VirtualKeyCode::Up, CameraMovement::Forward),
            (VirtualKeyCode::S, CameraMovement::Backward),
            (VirtualKeyCode::Down, CameraMovement::Backward),
            (VirtualKeyCode::A, CameraMovement::Left),
            (VirtualKeyCode::Left, CameraMovement::Left),
            (VirtualKeyCode::D, CameraMovement::Right),
            (VirtualKeyCode::Right, CameraMovement::Right),
        ];

        for (keycode, direction) in bindings {
            if self.input.is_pressed(keycode) {
                self.camera.process_keyboard(direction, delta_time);
            }
        }
    }

    fn current_uniforms(&self) -> SceneUniforms {
        let view = self.camera.view_matrix();

        let aspect = self.swapchain.extent().width as f32 / self.swapchain.extent().height as f32;

        let projection = glm::perspective_zo(
            aspect,
            self.camera.zoom().to_radians(),
            NEAR_PLANE,
            FAR_PLANE,
        );

        // Holding C bathes the scene in yellow light.
        let light_colour = if self.input.is_pressed(VirtualKeyCode::C) {
            glm::vec4(1.0, 1.0, 0.0, 1.0)
        } else {
            glm::vec4(1.0, 1.0, 1.0, 1.0)
        };

        let light_position = self.scene.light_position;
        let view_position = self.camera.position();

        SceneUniforms {
            view,
            projection,
            light_position: glm::vec4(light_position.x, light_position.y, light_position.z, 1.0),
            light_colour,
            view_position: glm::vec4(view_position.x, view_position.y, view_position.z, 1.0),
        }
    }

    fn draw_frame(&mut self, window: &Window) -> Result<(), Box<dyn Error>> {
        let frame_index = self.frame_index % MAX_FRAMES_IN_FLIGHT;

        let uniforms = self.current_uniforms();

        let frame = &mut self.frames_in_flight[frame_index];

        frame.await_render_finished_fence(&self.device)?;
        frame.reset_render_finished_fence(&self.device)?;

        // Destroy any objects that had their deletion deferred in the previous use of this frame.
        frame.process_deferred_deletion_queue(&self.device);

        frame.reset_command_buffer(&self.device)?;

        // The frame's fence has been waited on, so its uniform buffer is no longer being read.
        self.uniform_buffers[frame_index].write(&uniforms)?;

        let image_index = match self
            .swapchain
            .acquire_next_image(frame.image_acquired_semaphore())
        {
            Ok((image_index, _suboptimal)) => image_index,
            Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain(window)?;
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        frame.begin_command_buffer(
            &self.device,
            ash::vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        )?;

        let colour_subresource_range = ash::vk::ImageSubresourceRange::builder()
            .aspect_mask(ash::vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
            .build();

        let image_memory_barriers = [
            ash::vk::ImageMemoryBarrier2::builder()
                .src_stage_mask(ash::vk::PipelineStageFlags2::TOP_OF_PIPE)
                .src_access_mask(ash::vk::AccessFlags2::empty())
                .dst_stage_mask(ash::vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .dst_access_mask(
                    ash::vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                        | ash::vk::AccessFlags2::COLOR_ATTACHMENT_READ,
                )
                .old_layout(ash::vk::ImageLayout::UNDEFINED)
                .new_layout(ash::vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .src_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
                .image(self.swapchain.images()[image_index as usize])
                .subresource_range(colour_subresource_range)
                .build(),
            ash::vk::ImageMemoryBarrier2::builder()
                .src_stage_mask(ash::vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(ash::vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .dst_stage_mask(ash::vk::PipelineStageFlags2::BOTTOM_OF_PIPE)
                .dst_access_mask(ash::vk::AccessFlags2::empty())
                .old_layout(ash::vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .new_layout(ash::vk::ImageLayout::PRESENT_SRC_KHR)
                .src_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
                .image(self.swapchain.images()[image_index as usize])
                .subresource_range(colour_subresource_range)
                .build(),
            ash::vk::ImageMemoryBarrier2::builder()
                .src_stage_mask(
                    ash::vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                        | ash::vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                )
                .src_access_mask(ash::vk::AccessFlags2::empty())
                .dst_stage_mask(
                    ash::vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                        | ash::vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                )
                .dst_access_mask(ash::vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE)
                .old_layout(ash::vk::ImageLayout::UNDEFINED)
                .new_layout(ash::vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .src_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(ash::vk::QUEUE_FAMILY_IGNORED)
                .image(*self.depth_image.handle())
                .subresource_range(*self.depth_image.subresource_range())
                .build(),
        ];

        let dependency_info = ash::vk::DependencyInfo::builder()
            .dependency_flags(ash::vk::DependencyFlags::empty())
            .image_memory_barriers(&image_memory_barriers);

        unsafe {
            self.device
                .handle()
                .cmd_pipeline_barrier2(*frame.command_buffer(), &dependency_info);
        }

        let colour_attachments = [ash::vk::RenderingAttachmentInfoKHR::builder()
            .image_view(self.swapchain.image_views()[image_index as usize])
            .image_layout(ash::vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .resolve_mode(ash::vk::ResolveModeFlags::NONE)
            .load_op(ash::vk::AttachmentLoadOp::CLEAR)
            .store_op(ash::vk::AttachmentStoreOp::STORE)
            .clear_value(ash::vk::ClearValue {
                color: ash::vk::ClearColorValue {
                    float32: CLEAR_COLOUR,
                },
            })
            .build()];

        let depth_attachment_rendering_info = ash::vk::RenderingAttachmentInfoKHR::builder()
            .image_view(*self.depth_image.view())
            .image_layout(ash::vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .resolve_mode(ash::vk::ResolveModeFlags::NONE)
            .load_op(ash::vk::AttachmentLoadOp::CLEAR)
            .store_op(ash::vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(ash::vk::ClearValue {
                depth_stencil: ash::vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            })
            .build();

        let render_area = ash::vk::Rect2D::builder()
            .extent(self.swapchain.extent())
            .offset(*ash::vk::Offset2D::builder().x(0).y(0))
            .build();

        let rendering_info = ash::vk::RenderingInfoKHR::builder()
            .flags(ash::vk::RenderingFlagsKHR::empty())
            .render_area(render_area)
            .layer_count(1)
            .view_mask(0)
            .color_attachments(&colour_attachments)
            .depth_attachment(&depth_attachment_rendering_info);

        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(*frame.command_buffer(), &rendering_info);

            // Use a flipped (negative height) viewport.
            let viewport = ash::vk::Viewport::builder()
                .x(0.0)
                .y(self.swapchain.extent().height as f32)
                .width(self.swapchain.extent().width as f32)
                .height(-(self.swapchain.extent().height as f32))
                .min_depth(0.0)
                .max_depth(1.0)
                .build();

            self.device
                .handle()
                .cmd_set_viewport(*frame.command_buffer(), 0, &[viewport]);

            let scissor = ash::vk::Rect2D::builder()
                .offset(ash::vk::Offset2D { x: 0, y: 0 })
                .extent(self.swapchain.extent())
                .build();

            self.device
                .handle()
                .cmd_set_scissor(*frame.command_buffer(), 0, &[scissor]);

            self.device.handle().cmd_bind_vertex_buffers(
                *frame.command_buffer(),
                0,
                &[*self.vertex_buffer.handle()],
                &[0],
            );

            // Both pipelines share the same (merged vertex|fragment) set layout, so the
            // set stays bound across the pipeline switch below.
            self.device.handle().cmd_bind_descriptor_sets(
                *frame.command_buffer(),
                ash::vk::PipelineBindPoint::GRAPHICS,
                *self.scene_pipeline.layout(),
                0,
                &[self.descriptor_sets[frame_index]],
                &[],
            );

            self.device.handle().cmd_bind_pipeline(
                *frame.command_buffer(),
                ash::vk::PipelineBindPoint::GRAPHICS,
                *self.scene_pipeline.handle(),
            );

            for prop in self.scene.props.iter() {
                let push_constants = PushConstants {
                    model: prop.model,
                    object_colour: prop.colour,
                };

                self.device.handle().cmd_push_constants(
                    *frame.command_buffer(),
                    *self.scene_pipeline.layout(),
                    ash::vk::ShaderStageFlags::VERTEX,
                    0,
                    push_constants_bytes(&push_constants),
                );

                self.device.handle().cmd_draw(
                    *frame.command_buffer(),
                    prop.range.count,
                    1,
                    prop.range.first,
                    0,
                );
            }

            self.device.handle().cmd_bind_pipeline(
                *frame.command_buffer(),
                ash::vk::PipelineBindPoint::GRAPHICS,
                *self.lamp_pipeline.handle(),
            );

            let lamp_push_constants = PushConstants {
                model: self.scene.lamp.model,
                object_colour: uniforms.light_colour,
            };

            self.device.handle().cmd_push_constants(
                *frame.command_buffer(),
                *self.lamp_pipeline.layout(),
                ash::vk::ShaderStageFlags::VERTEX,
                0,
                push_constants_bytes(&lamp_push_constants),
            );

            self.device.handle().cmd_draw(
                *frame.command_buffer(),
                self.scene.lamp.range.count,
                1,
                self.scene.lamp.range.first,
                0,
            );

            self.device
                .handle()
                .cmd_end_rendering(*frame.command_buffer());
        }

        frame.end_command_buffer(&self.device)?;

        let wait_semaphores = [*frame.image_acquired_semaphore()];
        let wait_stages = [ash::vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [*frame.command_buffer()];
        let signal_semaphores = [*frame.render_finished_semaphore()];

        let submit_info = ash::vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let presentation_queue = self.device.graphics_queue();
        unsafe {
            self.device.handle().queue_submit(
                *presentation_queue,
                &[submit_info],
                *frame.render_finished_fence(),
            )?;
        }

        let swapchains = [*self.swapchain.handle()];
        let image_indices = [image_index];

        let present_info = ash::vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices)
            .build();

        let presentation_result = self
            .swapchain
            .queue_present(self.device.graphics_queue(), &present_info);

        // Recreate the swapchain if presentation returns ERROR_OUT_OF_DATE_KHR or if the swapchain is suboptimal.
        let should_recreate_swapchain = match presentation_result {
            Ok(suboptimal) => suboptimal,
            Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(error) => return Err(error.into()),
        };

        if should_recreate_swapchain || self.window_resize_flag {
            self.window_resize_flag = false;
            self.recreate_swapchain(window)?;
        }

        self.frame_index += 1;

        Ok(())
    }

    fn recreate_swapchain(&mut self, window: &Window) -> Result<(), Box<dyn Error>> {
        let new_swapchain = Swapchain::new(
            (window.inner_size().width, window.inner_size().height),
            &self.instance,
            &self.surface,
            &self.device,
            self.swapchain.present_mode(),
            Some(&self.swapchain),
        )?;

        let old_swapchain = std::mem::replace(&mut self.swapchain, new_swapchain);

        // The depth attachment must match the new swapchain extent.
        let new_depth_image = Image::new(
            &self.device,
            ash::vk::Extent3D::builder()
                .width(self.swapchain.extent().width)
                .height(self.swapchain.extent().height)
                .depth(1)
                .build(),
            ash::vk::Format::D32_SFLOAT,
            ash::vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ash::vk::ImageAspectFlags::DEPTH,
            1,
        )?;

        let old_depth_image = std::mem::replace(&mut self.depth_image, new_depth_image);

        // Push the old swapchain and depth image to this frame's deferred deletion queue,
        // to be destroyed once we're sure they're no longer in use.
        let frame = &mut self.frames_in_flight[self.frame_index % MAX_FRAMES_IN_FLIGHT];
        frame.defer_object_deletion(old_swapchain);
        frame.defer_object_deletion(old_depth_image);

        Ok(())
    }
}

fn push_constants_bytes(push_constants: &PushConstants) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            push_constants as *const PushConstants as *const u8,
            std::mem::size_of::<PushConstants>(),
        )
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().device_wait_idle().unwrap();
        }

        // Destroy any objects that need manual destruction.
        // The rest of the renderer objects are destroyed in drop() after this.

        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }

        for uniform_buffer in self.uniform_buffers.iter_mut() {
            uniform_buffer.destroy(&self.device);
        }

        self.vertex_buffer.destroy(&self.device);

        self.scene_pipeline.destroy(&self.device);
        self.lamp_pipeline.destroy(&self.device);

        self.depth_image.destroy(&self.device);

        for frame in self.frames_in_flight.iter_mut() {
            frame.destroy(&self.device);
        }

        self.swapchain.destroy(&self.device);
    }
}
