use std::ffi::CStr;
use std::{error::Error, fs::File, path::Path};

use crate::*;

use ash::vk::Format as AshFormat;
use ash::vk::ShaderStageFlags as AshShaderStageFlags;
use spirv_reflect::types::*;

/// A descriptor binding discovered through shader reflection. The pipeline merges
/// these across stages when building its descriptor set layouts.
#[derive(Copy, Clone, Debug)]
pub struct DescriptorBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: ash::vk::DescriptorType,
    pub count: u32,
}

/// A wrapper for a shader, storing information generated from shader reflection.
pub struct Shader {
    module: ash::vk::ShaderModule,
    shader_stage_info: ash::vk::PipelineShaderStageCreateInfo,
    binding_descriptions: Vec<ash::vk::VertexInputBindingDescription>,
    attribute_descriptions: Vec<ash::vk::VertexInputAttributeDescription>,
    push_constant_ranges: Vec<ash::vk::PushConstantRange>,
    descriptor_bindings: Vec<DescriptorBinding>,
}

impl Shader {
    /// Load a SPIR-V shader from a file, and use reflection to determine the vertex input
    /// layout, push constant ranges, and descriptor bindings.
    ///
    /// # Errors
    ///
    /// This function can error if opening the file fails, if `ash` fails to parse the SPIR-V
    /// or create the shader module, or if `spirv_reflect` fails to create a reflection module.
    pub fn new(path: &Path, device: &Device) -> Result<Self, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let bytecode = ash::util::read_spv(&mut file)?;

        let module_info = ash::vk::ShaderModuleCreateInfo::builder().code(&bytecode);

        let module = unsafe { device.handle().create_shader_module(&module_info, None)? };

        let reflection_module = spirv_reflect::ShaderModule::load_u32_data(&bytecode)?;

        let stage_flags = convert_shader_stage_flags(reflection_module.get_shader_stage());

        let mut binding_descriptions: Vec<ash::vk::VertexInputBindingDescription> = Vec::new();
        let mut attribute_descriptions: Vec<ash::vk::VertexInputAttributeDescription> = Vec::new();

        if stage_flags.contains(ash::vk::ShaderStageFlags::VERTEX) {
            let mut binding_description = ash::vk::VertexInputBindingDescription::builder()
                .binding(0)
                .stride(0)
                .input_rate(ash::vk::VertexInputRate::VERTEX)
                .build();

            for input in reflection_module.enumerate_input_variables(None)? {
                // Built-in inputs such as gl_VertexIndex are reported at this location; skip them.
                if input.location == std::u32::MAX {
                    continue;
                }

                let (format, format_size) = convert_format(input.format);
                attribute_descriptions.push(
                    ash::vk::VertexInputAttributeDescription::builder()
                        .binding(0)
                        .location(input.location)
                        .format(format)
                        // Store the size of the format for the final offset calculation later.
                        .offset(format_size)
                        .build(),
                );
            }

            // If there's no attribute descriptions, then there's no need for the binding description.
            if !attribute_descriptions.is_empty() {
                // Sort by location, and calculate the correct offsets.
                attribute_descriptions.sort_by_key(|attribute| attribute.location);

                for attribute_description in attribute_descriptions.iter_mut() {
                    let format_size = attribute_description.offset;
                    attribute_description.offset = binding_description.stride;
                    binding_description.stride += format_size;
                }

                binding_descriptions.push(binding_description);
            }
        }

        let push_constant_ranges = reflection_module
            .enumerate_push_constant_blocks(None)?
            .iter()
            .map(|range| {
                ash::vk::PushConstantRange::builder()
                    .offset(range.offset)
                    .size(range.size)
                    .stage_flags(stage_flags)
                    .build()
            })
            .collect::<Vec<_>>();

        let mut descriptor_bindings: Vec<DescriptorBinding> = vec![];

        for descriptor_set in reflection_module.enumerate_descriptor_sets(None)? {
            for set_binding in descriptor_set.bindings {
                descriptor_bindings.push(DescriptorBinding {
                    set: descriptor_set.set,
                    binding: set_binding.binding,
                    descriptor_type: convert_descriptor_type(set_binding.descriptor_type),
                    count: set_binding.count.max(1),
                });
            }
        }

        let shader_stage_info = ash::vk::PipelineShaderStageCreateInfo::builder()
            .module(module)
            .stage(stage_flags)
            // The string needs to be static to avoid going out of scope.
            .name(CStr::from_bytes_with_nul(b"main\0")?)
            .build();

        Ok(Self {
            module,
            shader_stage_info,
            binding_descriptions,
            attribute_descriptions,
            push_constant_ranges,
            descriptor_bindings,
        })
    }

    pub fn stage_info(&self) -> &ash::vk::PipelineShaderStageCreateInfo {
        &self.shader_stage_info
    }

    pub fn binding_descriptions(&self) -> &[ash::vk::VertexInputBindingDescription] {
        &self.binding_descriptions
    }

    pub fn attribute_descriptions(&self) -> &[ash::vk::VertexInputAttributeDescription] {
        &self.attribute_descriptions
    }

    pub fn push_constant_ranges(&self) -> &[ash::vk::PushConstantRange] {
        &self.push_constant_ranges
    }

    pub fn descriptor_bindings(&self) -> &[DescriptorBinding] {
        &self.descriptor_bindings
    }
}

impl Destroy for Shader {
    fn destroy(&mut self, device: &Device) {
        unsafe {
            device.handle().destroy_shader_module(self.module, None);
        }
    }
}

/// Convert spirv-reflect's stage flags to those used by Ash. Only the stages this
/// backend builds pipelines from are converted.
fn convert_shader_stage_flags(reflect_stage: ReflectShaderStageFlags) -> AshShaderStageFlags {
    let mut shader_stage_flags = AshShaderStageFlags::empty();

    if reflect_stage.contains(ReflectShaderStageFlags::VERTEX) {
        shader_stage_flags |= AshShaderStageFlags::VERTEX;
    }
    if reflect_stage.contains(ReflectShaderStageFlags::FRAGMENT) {
        shader_stage_flags |= AshShaderStageFlags::FRAGMENT;
    }
    if reflect_stage.contains(ReflectShaderStageFlags::COMPUTE) {
        shader_stage_flags |= AshShaderStageFlags::COMPUTE;
    }

    shader_stage_flags
}

/// Convert spirv-reflect's format flags to those used by Ash, along with the format's
/// size in bytes.
fn convert_format(reflect_format: ReflectFormat) -> (ash::vk::Format, u32) {
    match reflect_format {
        ReflectFormat::R32G32B32A32_SFLOAT => (AshFormat::R32G32B32A32_SFLOAT, 16),
        ReflectFormat::R32G32B32A32_SINT => (AshFormat::R32G32B32A32_SINT, 16),
        ReflectFormat::R32G32B32A32_UINT => (AshFormat::R32G32B32A32_UINT, 16),
        ReflectFormat::R32G32B32_SFLOAT => (AshFormat::R32G32B32_SFLOAT, 12),
        ReflectFormat::R32G32B32_SINT => (AshFormat::R32G32B32_SINT, 12),
        ReflectFormat::R32G32B32_UINT => (AshFormat::R32G32B32_UINT, 12),
        ReflectFormat::R32G32_SFLOAT => (AshFormat::R32G32_SFLOAT, 8),
        ReflectFormat::R32G32_SINT => (AshFormat::R32G32_SINT, 8),
        ReflectFormat::R32G32_UINT => (AshFormat::R32G32_UINT, 8),
        ReflectFormat::R32_SFLOAT => (AshFormat::R32_SFLOAT, 4),
        ReflectFormat::R32_SINT => (AshFormat::R32_SINT, 4),
        ReflectFormat::R32_UINT => (AshFormat::R32_UINT, 4),
        ReflectFormat::Undefined => (AshFormat::UNDEFINED, 0),
    }
}

/// Convert spirv-reflect's descriptor type flags to those used by Ash.
fn convert_descriptor_type(
    reflect_descriptor_type: ReflectDescriptorType,
) -> ash::vk::DescriptorType {
    use ash::vk::DescriptorType as AshDescriptorType;

    match reflect_descriptor_type {
        ReflectDescriptorType::AccelerationStructureNV => {
            AshDescriptorType::ACCELERATION_STRUCTURE_NV
        }
        ReflectDescriptorType::CombinedImageSampler => AshDescriptorType::COMBINED_IMAGE_SAMPLER,
        ReflectDescriptorType::InputAttachment => AshDescriptorType::INPUT_ATTACHMENT,
        ReflectDescriptorType::SampledImage => AshDescriptorType::SAMPLED_IMAGE,
        ReflectDescriptorType::Sampler => AshDescriptorType::SAMPLER,
        ReflectDescriptorType::StorageBuffer => AshDescriptorType::STORAGE_BUFFER,
        ReflectDescriptorType::StorageBufferDynamic => AshDescriptorType::STORAGE_BUFFER_DYNAMIC,
        ReflectDescriptorType::StorageImage => AshDescriptorType::STORAGE_IMAGE,
        ReflectDescriptorType::StorageTexelBuffer => AshDescriptorType::STORAGE_TEXEL_BUFFER,
        ReflectDescriptorType::Undefined => AshDescriptorType::default(),
        ReflectDescriptorType::UniformBuffer => AshDescriptorType::UNIFORM_BUFFER,
        ReflectDescriptorType::UniformBufferDynamic => AshDescriptorType::UNIFORM_BUFFER_DYNAMIC,
        ReflectDescriptorType::UniformTexelBuffer => AshDescriptorType::UNIFORM_TEXEL_BUFFER,
    }
}
