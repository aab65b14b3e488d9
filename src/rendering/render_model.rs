use std::mem::offset_of;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use id_arena::Id;
use wgpu::util::DeviceExt;

use crate::{
    model::{Instance, Material, Model, ModelPrimitive, Vertex},
    rendering::{render_common::RenderCommon, texture::Texture},
};

pub type RenderModelId = Id<RenderModel>;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct MaterialUniform {
    base_color: Vec4,
    // x = metallic, y = roughness
    metallic_roughness: Vec4,
}

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    material_bind_group: wgpu::BindGroup,
    _material_buffer: wgpu::Buffer,
    _base_color: Option<Texture>,
}

impl RenderPrimitive {
    fn from_primitive(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        common: &RenderCommon,
        model: &Model,
        primitive: &ModelPrimitive,
    ) -> Self {
        let vertex_buffer_name = format!(
            "Vertex buffer ({}, primitive {})",
            model.name, primitive.index
        );
        let index_buffer_name = format!(
            "Index buffer ({}, primitive {})",
            model.name, primitive.index
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&vertex_buffer_name),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&index_buffer_name),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let (material_bind_group, material_buffer, base_color) =
            create_material_bind_group(device, queue, common, &primitive.material);

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
            material_bind_group,
            _material_buffer: material_buffer,
            _base_color: base_color,
        }
    }
}

fn create_material_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    common: &RenderCommon,
    material: &Material,
) -> (wgpu::BindGroup, wgpu::Buffer, Option<Texture>) {
    let uniform = MaterialUniform {
        base_color: material.base_color_factor,
        metallic_roughness: Vec4::new(material.metallic, material.roughness, 0.0, 0.0),
    };

    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("Material buffer ({})", material.name)),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let base_color = material.base_color_texture.as_ref().map(|image| {
        Texture::from_image(
            device,
            queue,
            image,
            &format!("Base color ({})", material.name),
        )
    });
    let texture = base_color.as_ref().unwrap_or(&common.white_texture);

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("Material bind group ({})", material.name)),
        layout: &common.material_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            },
        ],
    });

    (bind_group, buffer, base_color)
}

pub struct RenderModel {
    pub primitives: Vec<RenderPrimitive>,
    instance_buffer: InstanceBuffer,
    instance_count: u32,
}

impl RenderModel {
    pub fn from_model(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        common: &RenderCommon,
        model: &Model,
    ) -> Self {
        let primitives = model
            .primitives
            .iter()
            .map(|primitive| RenderPrimitive::from_primitive(device, queue, common, model, primitive))
            .collect();

        RenderModel {
            primitives,
            instance_buffer: InstanceBuffer::new(device, &model.name, 1),
            instance_count: 0,
        }
    }

    pub fn write_instances(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, instances: &[Instance]) {
        self.instance_buffer.ensure_capacity(device, instances.len());
        queue.write_buffer(
            self.instance_buffer.buffer(),
            0,
            bytemuck::cast_slice(instances),
        );
        self.instance_count = instances.len() as u32;
    }

    pub fn should_render(&self) -> bool {
        self.instance_count > 0
    }
}

pub fn render_model_instances(render_pass: &mut wgpu::RenderPass, render_model: &RenderModel) {
    render_model.instance_buffer.bind(render_pass);

    for primitive in &render_model.primitives {
        render_pass.set_bind_group(1, &primitive.material_bind_group, &[]);
        render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
        render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..primitive.num_indices, 0, 0..render_model.instance_count);
    }
}

struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
    label: String,
}

impl InstanceBuffer {
    fn new(device: &wgpu::Device, name: &str, capacity: usize) -> Self {
        let label = format!("Instance buffer ({})", name);
        let buffer = Self::create(device, &label, capacity);

        Self {
            buffer,
            capacity,
            label,
        }
    }

    fn create(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (size_of::<Instance>() * capacity.max(1)) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn ensure_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required <= self.capacity {
            return;
        }
        self.capacity = required.next_power_of_two();
        self.buffer = Self::create(device, &self.label, self.capacity);
    }

    fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};
