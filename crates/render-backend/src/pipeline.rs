use std::{collections::BTreeMap, error::Error};

use crate::*;

/// An object for building graphics pipelines.
pub struct PipelineBuilder<'a> {
    shaders: &'a [&'a Shader],
    topology: ash::vk::PrimitiveTopology,
    depth_clamp_enable: bool,
    polygon_mode: ash::vk::PolygonMode,
    line_width: f32,
    cull_mode: ash::vk::CullModeFlags,
    front_face: ash::vk::FrontFace,
    colour_formats: &'a [ash::vk::Format],
    depth_format: ash::vk::Format,
    stencil_format: ash::vk::Format,
    vertex_stride_override: Option<u32>,
}

impl<'a> PipelineBuilder<'a> {
    /// Build the graphics pipeline. This does not consume the builder, to allow for reuse.
    ///
    /// See [`Pipeline::new`] for details.
    pub fn build(&self, device: &Device) -> Result<Pipeline, Box<dyn Error>> {
        Pipeline::new(self, device)
    }

    /// Set the shaders to be used by the pipeline (defaults to empty).
    pub fn shaders(mut self, shaders: &'a [&'a Shader]) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the PrimitiveTopology (defaults to TRIANGLE_LIST).
    pub fn topology(mut self, topology: ash::vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set whether to clamp fragments between the min and max depth (defaults to false).
    pub fn depth_clamp_enable(mut self, enable: bool) -> Self {
        self.depth_clamp_enable = enable;
        self
    }

    /// Set the PolygonMode (defaults to FILL).
    pub fn polygon_mode(mut self, polygon_mode: ash::vk::PolygonMode) -> Self {
        self.polygon_mode = polygon_mode;
        self
    }

    /// Set the line width (defaults to 1.0).
    pub fn line_width(mut self, line_width: f32) -> Self {
        self.line_width = line_width;
        self
    }

    /// Set the CullModeFlags (defaults to NONE).
    pub fn cull_mode(mut self, cull_mode: ash::vk::CullModeFlags) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Set the FrontFace (defaults to CLOCKWISE).
    pub fn front_face(mut self, front_face: ash::vk::FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    /// Set the colour format(s) (defaults to empty).
    pub fn colour_formats(mut self, formats: &'a [ash::vk::Format]) -> Self {
        self.colour_formats = formats;
        self
    }

    /// Set the depth format (defaults to UNDEFINED).
    pub fn depth_format(mut self, format: ash::vk::Format) -> Self {
        self.depth_format = format;
        self
    }

    /// Set the stencil format (defaults to UNDEFINED).
    pub fn stencil_format(mut self, format: ash::vk::Format) -> Self {
        self.stencil_format = format;
        self
    }

    /// Override the vertex binding stride reflected from the vertex shader. Needed when
    /// a pipeline consumes only a prefix of the attributes in an interleaved vertex buffer,
    /// as reflection can only see the attributes the shader declares.
    pub fn vertex_stride(mut self, stride: u32) -> Self {
        self.vertex_stride_override = Some(stride);
        self
    }
}

impl<'a> Default for PipelineBuilder<'a> {
    fn default() -> Self {
        Self {
            shaders: &[],
            topology: ash::vk::PrimitiveTopology::TRIANGLE_LIST,
            depth_clamp_enable: false,
            polygon_mode: ash::vk::PolygonMode::FILL,
            line_width: 1.0,
            cull_mode: ash::vk::CullModeFlags::NONE,
            front_face: ash::vk::FrontFace::CLOCKWISE,
            colour_formats: &[],
            depth_format: ash::vk::Format::default(),
            stencil_format: ash::vk::Format::default(),
            vertex_stride_override: None,
        }
    }
}

/// A graphics pipeline, storing the `ash` pipeline, pipeline layout, and the descriptor
/// set layouts derived from shader reflection.
pub struct Pipeline {
    pipeline_handle: ash::vk::Pipeline,
    pipeline_layout: ash::vk::PipelineLayout,
    descriptor_set_layouts: Vec<ash::vk::DescriptorSetLayout>,
}

impl Pipeline {
    /// Create a [`PipelineBuilder`] to build a graphics pipeline.
    pub fn builder() -> PipelineBuilder<'static> {
        PipelineBuilder::default()
    }

    /// Create a new graphics pipeline from the given builder's parameters. The pipeline
    /// layout is derived from the shaders: descriptor bindings are merged across stages
    /// per set, and push constant ranges with matching offset/size are merged.
    ///
    /// # Errors
    ///
    /// This function can error if `ash` fails to create the pipeline, pipeline layout, or
    /// descriptor set layouts.
    pub fn new(builder: &PipelineBuilder, device: &Device) -> Result<Self, Box<dyn Error>> {
        let mut shader_stage_infos = vec![];
        let mut vertex_binding_descriptions: Vec<ash::vk::VertexInputBindingDescription> = vec![];
        let mut vertex_attribute_descriptions: Vec<ash::vk::VertexInputAttributeDescription> =
            vec![];
        let mut push_constant_ranges: Vec<ash::vk::PushConstantRange> = vec![];
        let mut merged_bindings: BTreeMap<u32, BTreeMap<u32, DescriptorBinding>> = BTreeMap::new();

        for shader in builder.shaders.iter() {
            shader_stage_infos.push(*shader.stage_info());
            vertex_binding_descriptions.extend_from_slice(shader.binding_descriptions());
            vertex_attribute_descriptions.extend_from_slice(shader.attribute_descriptions());

            for &range in shader.push_constant_ranges() {
                // The same block declared in multiple stages becomes one range covering both.
                if let Some(existing) = push_constant_ranges
                    .iter_mut()
                    .find(|existing| existing.offset == range.offset && existing.size == range.size)
                {
                    existing.stage_flags |= range.stage_flags;
                } else {
                    push_constant_ranges.push(range);
                }
            }

            for &binding in shader.descriptor_bindings() {
                merged_bindings
                    .entry(binding.set)
                    .or_default()
                    .insert(binding.binding, binding);
            }
        }

        if let Some(stride) = builder.vertex_stride_override {
            for binding_description in vertex_binding_descriptions.iter_mut() {
                binding_description.stride = stride;
            }
        }

        // Fix descriptor stages to vertex|fragment, so a set allocated against one
        // pipeline's layout stays compatible with every other pipeline's.
        let mut descriptor_set_layouts: Vec<ash::vk::DescriptorSetLayout> = vec![];
        for set_bindings in merged_bindings.values() {
            let layout_bindings = set_bindings
                .values()
                .map(|binding| {
                    ash::vk::DescriptorSetLayoutBinding::builder()
                        .binding(binding.binding)
                        .descriptor_type(binding.descriptor_type)
                        .descriptor_count(binding.count)
                        .stage_flags(
                            ash::vk::ShaderStageFlags::VERTEX
                                | ash::vk::ShaderStageFlags::FRAGMENT,
                        )
                        .build()
                })
                .collect::<Vec<_>>();

            let set_layout_info =
                ash::vk::DescriptorSetLayoutCreateInfo::builder().bindings(&layout_bindings);

            let set_layout = unsafe {
                device
                    .handle()
                    .create_descriptor_set_layout(&set_layout_info, None)?
            };

            descriptor_set_layouts.push(set_layout);
        }

        let input_state_info = ash::vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&vertex_binding_descriptions)
            .vertex_attribute_descriptions(&vertex_attribute_descriptions);

        let input_assembly_state_info = ash::vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(builder.topology)
            .primitive_restart_enable(false);

        let viewport_state_info = ash::vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [
            ash::vk::DynamicState::VIEWPORT,
            ash::vk::DynamicState::SCISSOR,
        ];

        let dynamic_state_info =
            ash::vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterisation_state_info = ash::vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(builder.depth_clamp_enable)
            .rasterizer_discard_enable(false)
            .polygon_mode(builder.polygon_mode)
            .line_width(builder.line_width)
            .cull_mode(builder.cull_mode)
            .front_face(builder.front_face)
            .depth_bias_enable(false);

        let multisample_state_info = ash::vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(ash::vk::SampleCountFlags::TYPE_1);

        let attachment_states = [ash::vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(
                ash::vk::ColorComponentFlags::R
                    | ash::vk::ColorComponentFlags::G
                    | ash::vk::ColorComponentFlags::B
                    | ash::vk::ColorComponentFlags::A,
            )
            .blend_enable(true)
            .alpha_blend_op(ash::vk::BlendOp::ADD)
            .src_alpha_blend_factor(ash::vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(ash::vk::BlendFactor::ZERO)
            .color_blend_op(ash::vk::BlendOp::ADD)
            .src_color_blend_factor(ash::vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(ash::vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .build()];

        let colour_blend_state_info = ash::vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&attachment_states);

        let pipeline_layout_info = ash::vk::PipelineLayoutCreateInfo::builder()
            .push_constant_ranges(&push_constant_ranges)
            .set_layouts(&descriptor_set_layouts);

        let pipeline_layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&pipeline_layout_info, None)?
        };

        let depth_stencil_state_info = ash::vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(ash::vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let mut pipeline_rendering_info = ash::vk::PipelineRenderingCreateInfoKHR::builder()
            .color_attachment_formats(builder.colour_formats)
            .depth_attachment_format(builder.depth_format)
            .stencil_attachment_format(builder.stencil_format);

        let pipeline_info = ash::vk::GraphicsPipelineCreateInfo::builder()
            .push_next(&mut pipeline_rendering_info)
            .stages(&shader_stage_infos)
            .vertex_input_state(&input_state_info)
            .input_assembly_state(&input_assembly_state_info)
            .viewport_state(&viewport_state_info)
            .rasterization_state(&rasterisation_state_info)
            .multisample_state(&multisample_state_info)
            .color_blend_state(&colour_blend_state_info)
            .layout(pipeline_layout)
            .dynamic_state(&dynamic_state_info)
            .depth_stencil_state(&depth_stencil_state_info)
            .build();

        let pipeline_results = unsafe {
            device.handle().create_graphics_pipelines(
                ash::vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };

        let pipeline = match pipeline_results {
            Ok(pipelines) => pipelines[0],
            Err((_, result)) => {
                return Err(format!("The pipeline could not be created: {}.", result).into())
            }
        };

        Ok(Self {
            pipeline_handle: pipeline,
            pipeline_layout,
            descriptor_set_layouts,
        })
    }

    pub fn handle(&self) -> &ash::vk::Pipeline {
        &self.pipeline_handle
    }

    pub fn layout(&self) -> &ash::vk::PipelineLayout {
        &self.pipeline_layout
    }

    pub fn descriptor_set_layouts(&self) -> &[ash::vk::DescriptorSetLayout] {
        &self.descriptor_set_layouts
    }
}

impl Destroy for Pipeline {
    fn destroy(&mut self, device: &Device) {
        unsafe {
            for &set_layout in self.descriptor_set_layouts.iter() {
                device
                    .handle()
                    .destroy_descriptor_set_layout(set_layout, None);
            }

            device
                .handle()
                .destroy_pipeline_layout(self.pipeline_layout, None);
            device.handle().destroy_pipeline(self.pipeline_handle, None);
        }
    }
}
