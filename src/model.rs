use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Context};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use gltf::buffer;
use itertools::izip;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color_factor: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub base_color_texture: Option<Arc<ImageData>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Default material".to_string(),
            base_color_factor: Vec4::ONE,
            metallic: 1.0,
            roughness: 1.0,
            base_color_texture: None,
        }
    }
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Arc<Material>,
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
}

pub type Buffers<'a> = &'a [buffer::Data];

/// Converts glTF materials and their images once per document, so primitives
/// that share a material also share the decoded pixels.
pub struct MaterialCache<'a> {
    images: &'a [gltf::image::Data],
    converted_images: HashMap<usize, Arc<ImageData>>,
    materials: HashMap<Option<usize>, Arc<Material>>,
}

impl<'a> MaterialCache<'a> {
    pub fn new(images: &'a [gltf::image::Data]) -> Self {
        Self {
            images,
            converted_images: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    pub fn get(&mut self, material: gltf::Material) -> anyhow::Result<Arc<Material>> {
        if let Some(cached) = self.materials.get(&material.index()) {
            return Ok(cached.clone());
        }

        let pbr = material.pbr_metallic_roughness();

        let base_color_texture = match pbr.base_color_texture() {
            Some(info) => Some(self.image(info.texture().source().index())?),
            None => None,
        };

        let converted = Arc::new(Material {
            name: material.name().unwrap_or("Unnamed material").to_string(),
            base_color_factor: Vec4::from(pbr.base_color_factor()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            base_color_texture,
        });

        self.materials.insert(material.index(), converted.clone());
        Ok(converted)
    }

    fn image(&mut self, index: usize) -> anyhow::Result<Arc<ImageData>> {
        if let Some(cached) = self.converted_images.get(&index) {
            return Ok(cached.clone());
        }

        let data = self
            .images
            .get(index)
            .with_context(|| format!("glTF image index {index} out of bounds"))?;
        let image = Arc::new(convert_image_data_to_rgba(data)?);
        self.converted_images.insert(index, image.clone());
        Ok(image)
    }
}

impl Model {
    /// Converts the triangle primitives of a mesh. Points and lines are
    /// skipped, so the result may have no primitives at all.
    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
        materials: &mut MaterialCache,
    ) -> anyhow::Result<Model> {
        let mut model = Model {
            name: name.into(),
            primitives: Vec::new(),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping {:?} primitive {} in {}",
                    primitive.mode(),
                    primitive.index(),
                    model.name
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .with_context(|| format!("Primitive without positions in {}", model.name))?
                .map(Vec3::from)
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(normals) => normals.map(Vec3::from).collect(),
                None => compute_vertex_normals(&positions, &indices),
            };

            let tex_coords: Vec<Vec2> = match reader.read_tex_coords(0) {
                Some(tex_coords) => tex_coords.into_f32().map(Vec2::from).collect(),
                None => vec![Vec2::ZERO; positions.len()],
            };

            let vertices = izip!(positions, normals, tex_coords)
                .map(|(position, normal, tex_coords)| Vertex {
                    position,
                    normal,
                    tex_coords,
                })
                .collect::<Vec<Vertex>>();

            model.primitives.push(ModelPrimitive {
                index: primitive.index(),
                vertices,
                indices,
                material: materials.get(primitive.material())?,
            });
        }

        Ok(model)
    }
}

/// Area-weighted smooth normals for meshes exported without them.
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals
        .into_iter()
        .map(|normal| normal.normalize_or(Vec3::Y))
        .collect()
}

fn convert_image_data_to_rgba(data: &gltf::image::Data) -> anyhow::Result<ImageData> {
    use gltf::image::Format;
    use image::{DynamicImage, ImageBuffer};

    let (width, height) = (data.width, data.height);
    let pixels = data.pixels.clone();

    let wide = |pixels: &[u8]| -> Vec<u16> {
        pixels
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    };

    let image = match data.format {
        Format::R8G8B8A8 => {
            return Ok(ImageData {
                width,
                height,
                pixels,
            })
        }
        Format::R8G8B8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        Format::R8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        Format::R8G8 => {
            ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
        }
        Format::R16G16B16 => {
            ImageBuffer::from_raw(width, height, wide(&pixels)).map(DynamicImage::ImageRgb16)
        }
        Format::R16G16B16A16 => {
            ImageBuffer::from_raw(width, height, wide(&pixels)).map(DynamicImage::ImageRgba16)
        }
        other => bail!("Unsupported image format: {:?}", other),
    }
    .with_context(|| format!("Image data does not match its {width}x{height} size"))?;

    Ok(ImageData {
        width,
        height,
        pixels: image.to_rgba8().into_raw(),
    })
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Instance {
    pub model: Mat4,
    pub normal: Mat4,
}

impl Instance {
    pub fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4,
            9 => Float32x4,
            10 => Float32x4,
            11 => Float32x4,
            12 => Float32x4,
        ];

        wgpu::VertexBufferLayout {
            array_stride: size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_normals_face_out_of_ccw_triangles() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2]);
        for normal in normals {
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-6));
        }
    }

    #[test]
    fn unreferenced_vertices_get_fallback_normal() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2]);
        assert_eq!(normals[3], Vec3::Y);
    }

    #[test]
    fn rgb_images_gain_opaque_alpha() {
        let data = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let converted = convert_image_data_to_rgba(&data).unwrap();
        assert_eq!(converted.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn line_primitives_are_skipped() {
        let (document, buffers, images) = gltf::import_slice(MIXED_MODES_GLTF.as_bytes()).unwrap();
        let mesh = document.meshes().next().unwrap();
        let mut materials = MaterialCache::new(&images);

        let model = Model::from_gltf("Laces", mesh, &buffers, &mut materials).unwrap();

        assert_eq!(model.primitives.len(), 1);
        assert_eq!(model.primitives[0].index, 1);
        assert_eq!(model.primitives[0].indices, vec![0, 1, 2]);
    }

    const MIXED_MODES_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "meshes": [{
            "primitives": [
                { "attributes": { "POSITION": 0 }, "mode": 1 },
                { "attributes": { "POSITION": 0 } }
            ]
        }],
        "buffers": [{
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }]
    }"#;

    #[test]
    fn truncated_images_are_rejected() {
        let data = gltf::image::Data {
            pixels: vec![0; 5],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        assert!(convert_image_data_to_rgba(&data).is_err());
    }
}
