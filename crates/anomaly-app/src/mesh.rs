use nalgebra_glm as glm;

/// The interleaved vertex layout shared by every mesh in the scene.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Vertex {
    pub position: glm::Vec3,
    pub normal: glm::Vec3,
}

/// Per-draw data, pushed to the vertex stage. Must stay within the 128 byte
/// push constant budget every Vulkan implementation guarantees.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PushConstants {
    pub model: glm::Mat4,
    pub object_colour: glm::Vec4,
}

/// Per-frame data, written into a host-visible uniform buffer. Matches the
/// std140 layout of the shader's scene uniform block.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct SceneUniforms {
    pub view: glm::Mat4,
    pub projection: glm::Mat4,
    pub light_position: glm::Vec4,
    pub light_colour: glm::Vec4,
    pub view_position: glm::Vec4,
}

/// A contiguous run of vertices within the shared vertex buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexRange {
    pub first: u32,
    pub count: u32,
}

/// One of the hardcoded shapes, with its colour and model transform.
pub struct Prop {
    pub name: &'static str,
    pub colour: glm::Vec4,
    pub model: glm::Mat4,
    pub range: VertexRange,
}

/// The full hardcoded scene: one vertex slab, the lit props that index into it,
/// and the lamp cube marking the light position.
pub struct Scene {
    pub vertices: Vec<Vertex>,
    pub props: Vec<Prop>,
    pub lamp: Prop,
    pub light_position: glm::Vec3,
}

pub const LIGHT_POSITION: [f32; 3] = [-2.0, 2.0, 3.0];

// A unit cube centred on the origin, one normal per face.
#[rustfmt::skip]
const CUBE: [[f32; 6]; 36] = [
    // back
    [-0.5, -0.5, -0.5,  0.0,  0.0, -1.0],
    [ 0.5, -0.5, -0.5,  0.0,  0.0, -1.0],
    [ 0.5,  0.5, -0.5,  0.0,  0.0, -1.0],
    [ 0.5,  0.5, -0.5,  0.0,  0.0, -1.0],
    [-0.5,  0.5, -0.5,  0.0,  0.0, -1.0],
    [-0.5, -0.5, -0.5,  0.0,  0.0, -1.0],
    // front
    [-0.5, -0.5,  0.5,  0.0,  0.0,  1.0],
    [ 0.5, -0.5,  0.5,  0.0,  0.0,  1.0],
    [ 0.5,  0.5,  0.5,  0.0,  0.0,  1.0],
    [ 0.5,  0.5,  0.5,  0.0,  0.0,  1.0],
    [-0.5,  0.5,  0.5,  0.0,  0.0,  1.0],
    [-0.5, -0.5,  0.5,  0.0,  0.0,  1.0],
    // left
    [-0.5,  0.5,  0.5, -1.0,  0.0,  0.0],
    [-0.5,  0.5, -0.5, -1.0,  0.0,  0.0],
    [-0.5, -0.5, -0.5, -1.0,  0.0,  0.0],
    [-0.5, -0.5, -0.5, -1.0,  0.0,  0.0],
    [-0.5, -0.5,  0.5, -1.0,  0.0,  0.0],
    [-0.5,  0.5,  0.5, -1.0,  0.0,  0.0],
    // right
    [ 0.5,  0.5,  0.5,  1.0,  0.0,  0.0],
    [ 0.5,  0.5, -0.5,  1.0,  0.0,  0.0],
    [ 0.5, -0.5, -0.5,  1.0,  0.0,  0.0],
    [ 0.5, -0.5, -0.5,  1.0,  0.0,  0.0],
    [ 0.5, -0.5,  0.5,  1.0,  0.0,  0.0],
    [ 0.5,  0.5,  0.5,  1.0,  0.0,  0.0],
    // bottom
    [-0.5, -0.5, -0.5,  0.0, -1.0,  0.0],
    [ 0.5, -0.5, -0.5,  0.0, -1.0,  0.0],
    [ 0.5, -0.5,  0.5,  0.0, -1.0,  0.0],
    [ 0.5, -0.5,  0.5,  0.0, -1.0,  0.0],
    [-0.5, -0.5,  0.5,  0.0, -1.0,  0.0],
    [-0.5, -0.5, -0.5,  0.0, -1.0,  0.0],
    // top
    [-0.5,  0.5, -0.5,  0.0,  1.0,  0.0],
    [ 0.5,  0.5, -0.5,  0.0,  1.0,  0.0],
    [ 0.5,  0.5,  0.5,  0.0,  1.0,  0.0],
    [ 0.5,  0.5,  0.5,  0.0,  1.0,  0.0],
    [-0.5,  0.5,  0.5,  0.0,  1.0,  0.0],
    [-0.5,  0.5, -0.5,  0.0,  1.0,  0.0],
];

// An octahedron to the left of the cube. The normals are rough approximations,
// kept as-authored.
#[rustfmt::skip]
const OCTAHEDRON: [[f32; 6]; 24] = [
    // top front
    [-1.5,  0.5,  0.5,  0.0,  0.5,  0.5],
    [-2.5,  0.5,  0.5,  0.0,  0.5,  0.5],
    [-2.0,  1.0,  0.0,  0.0,  0.5,  0.5],
    // top back
    [-2.0,  1.0,  0.0, -0.5,  0.5, -0.5],
    [-2.5,  0.5, -0.5, -0.5,  0.5, -0.5],
    [-1.5,  0.5, -0.5, -0.5,  0.5, -0.5],
    // top left
    [-2.0,  1.0,  0.0, -0.5, -0.5,  0.0],
    [-2.5,  0.5,  0.5, -0.5, -0.5,  0.0],
    [-2.5,  0.5, -0.5, -0.5, -0.5,  0.0],
    // top right
    [-2.0,  1.0,  0.0,  0.5,  0.5,  0.0],
    [-1.5,  0.5,  0.5,  0.5,  0.5,  0.0],
    [-1.5,  0.5, -0.5,  0.5,  0.5,  0.0],
    // bottom front
    [-1.5,  0.5,  0.5,  0.0,  0.5,  1.0],
    [-2.5,  0.5,  0.5,  0.0,  0.5,  1.0],
    [-2.0, -0.5,  0.0,  0.0,  0.5,  1.0],
    // bottom back
    [-2.0, -0.5,  0.0,  0.0,  0.5, -1.0],
    [-2.5,  0.5, -0.5,  0.0,  0.5, -1.0],
    [-1.5,  0.5, -0.5,  0.0,  0.5, -1.0],
    // bottom left
    [-2.0, -0.5,  0.0, -1.0,  0.5,  0.0],
    [-2.5,  0.5,  0.5, -1.0,  0.5,  0.0],
    [-2.5,  0.5, -0.5, -1.0,  0.5,  0.0],
    // bottom right
    [-2.0, -0.5,  0.0,  1.0, -0.5,  0.0],
    [-1.5,  0.5,  0.5,  1.0, -0.5,  0.0],
    [-1.5,  0.5, -0.5,  1.0, -0.5,  0.0],
];

// Two interlocking tetrahedra further to the left.
#[rustfmt::skip]
const DOUBLE_TETRAHEDRON: [[f32; 6]; 24] = [
    // base
    [-3.5,  0.0,  0.5,   0.0,  0.0,  0.0],
    [-4.0,  0.0, -0.5,   0.0,  0.0,  0.0],
    [-4.5,  0.0,  0.5,   0.0,  0.0,  0.0],
    // front face
    [-3.5,  0.0,  0.5,   0.0, -0.5,  1.0],
    [-4.0,  1.0,  0.0,   0.0, -0.5,  1.0],
    [-4.5,  0.0,  0.5,   0.0, -0.5,  1.0],
    // right face
    [-3.5,  0.0,  0.5,   0.25, 0.25, 0.0],
    [-4.0,  0.0, -0.5,   0.25, 0.25, 0.0],
    [-4.0,  1.0,  0.0,   0.25, 0.25, 0.0],
    // left face
    [-4.5,  0.0,  0.5,  -1.0,  0.25, -0.5],
    [-4.0,  0.0, -0.5,  -1.0,  0.25, -0.5],
    [-4.0,  1.0,  0.0,  -1.0,  0.25, -0.5],
    // second tetrahedron: base
    [-4.0,  0.5,  0.75,  0.0,  1.0,  0.0],
    [-3.5,  0.5, -0.25,  0.0,  1.0,  0.0],
    [-4.5,  0.5, -0.25,  0.0,  1.0,  0.0],
    // right
    [-4.0,  0.5,  0.75,  1.0, -0.25, 0.5],
    [-3.5,  0.5, -0.25,  1.0, -0.25, 0.5],
    [-4.0, -0.5,  0.25,  1.0, -0.25, 0.5],
    // left
    [-4.5,  0.5, -0.25, -1.0,  0.0,  0.0],
    [-4.0,  0.5,  0.75, -1.0,  0.0,  0.0],
    [-4.0, -0.5,  0.25, -1.0,  0.0,  0.0],
    // back
    [-4.0, -0.5,  0.25,  0.0, -0.5, -1.0],
    [-3.5,  0.5, -0.25,  0.0, -0.5, -1.0],
    [-4.5,  0.5, -0.25,  0.0, -0.5, -1.0],
];

// A flat floor plane below everything, facing up.
#[rustfmt::skip]
const FLOOR: [[f32; 6]; 6] = [
    [-10.0, -2.0, -5.0,  0.0,  1.0,  0.0],
    [-10.0, -2.0,  5.0,  0.0,  1.0,  0.0],
    [  5.0, -2.0,  5.0,  0.0,  1.0,  0.0],
    [  5.0, -2.0, -5.0,  0.0,  1.0,  0.0],
    [  5.0, -2.0,  5.0,  0.0,  1.0,  0.0],
    [-10.0, -2.0, -5.0,  0.0,  1.0,  0.0],
];

fn append_vertices(vertices: &mut Vec<Vertex>, data: &[[f32; 6]]) -> VertexRange {
    let first = vertices.len() as u32;

    vertices.extend(data.iter().map(|row| Vertex {
        position: glm::vec3(row[0], row[1], row[2]),
        normal: glm::vec3(row[3], row[4], row[5]),
    }));

    VertexRange {
        first,
        count: data.len() as u32,
    }
}

/// Build the hardcoded scene. The geometry is baked in world space, so every lit
/// prop uses an identity model matrix; the lamp reuses the cube's vertices with
/// a translate-and-shrink transform to the light position.
pub fn build_scene() -> Scene {
    let mut vertices = Vec::with_capacity(CUBE.len() + OCTAHEDRON.len() + DOUBLE_TETRAHEDRON.len() + FLOOR.len());

    let cube_range = append_vertices(&mut vertices, &CUBE);
    let octahedron_range = append_vertices(&mut vertices, &OCTAHEDRON);
    let tetrahedron_range = append_vertices(&mut vertices, &DOUBLE_TETRAHEDRON);
    let floor_range = append_vertices(&mut vertices, &FLOOR);

    let light_position = glm::make_vec3(&LIGHT_POSITION);

    let props = vec![
        Prop {
            name: "cube",
            colour: glm::vec4(0.8, 0.91, 0.11, 1.0),
            model: glm::Mat4::identity(),
            range: cube_range,
        },
        Prop {
            name: "octahedron",
            colour: glm::vec4(0.8, 0.1, 0.31, 1.0),
            model: glm::Mat4::identity(),
            range: octahedron_range,
        },
        Prop {
            name: "double tetrahedron",
            colour: glm::vec4(0.3, 0.8, 0.7, 1.0),
            model: glm::Mat4::identity(),
            range: tetrahedron_range,
        },
        Prop {
            name: "floor",
            colour: glm::vec4(0.2, 0.8, 0.4, 1.0),
            model: glm::Mat4::identity(),
            range: floor_range,
        },
    ];

    let lamp_model = glm::scale(
        &glm::translate(&glm::Mat4::identity(), &light_position),
        &glm::vec3(0.2, 0.2, 0.2),
    );

    let lamp = Prop {
        name: "lamp",
        colour: glm::vec4(1.0, 1.0, 1.0, 1.0),
        model: lamp_model,
        range: cube_range,
    };

    Scene {
        vertices,
        props,
        lamp,
        light_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn scene_vertex_counts() {
        let scene = build_scene();

        assert_eq!(scene.vertices.len(), 90);

        let counts: Vec<u32> = scene.props.iter().map(|prop| prop.range.count).collect();
        assert_eq!(counts, vec![36, 24, 24, 6]);
    }

    #[test]
    fn prop_ranges_are_disjoint_and_in_bounds() {
        let scene = build_scene();

        let mut next_first = 0;
        for prop in &scene.props {
            assert_eq!(prop.range.first, next_first, "{} overlaps", prop.name);
            next_first += prop.range.count;
        }

        assert_eq!(next_first as usize, scene.vertices.len());
    }

    #[test]
    fn lamp_reuses_the_cube_vertices() {
        let scene = build_scene();

        assert_eq!(scene.lamp.range, scene.props[0].range);
    }

    #[test]
    fn lamp_sits_at_the_light_position() {
        let scene = build_scene();

        let centre = scene.lamp.model * glm::vec4(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(
            centre,
            glm::vec4(-2.0, 2.0, 3.0, 1.0),
            epsilon = 1e-5
        );

        // A cube corner should end up 0.1 from the centre on each axis.
        let corner = scene.lamp.model * glm::vec4(0.5, 0.5, 0.5, 1.0);
        assert_relative_eq!(
            corner,
            glm::vec4(-1.9, 2.1, 3.1, 1.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn floor_is_flat_and_faces_up() {
        let scene = build_scene();
        let range = scene.props[3].range;

        for vertex in &scene.vertices[range.first as usize..(range.first + range.count) as usize] {
            assert_relative_eq!(vertex.position.y, -2.0);
            assert_relative_eq!(vertex.normal, glm::vec3(0.0, 1.0, 0.0));
        }
    }

    #[test]
    fn cube_stays_within_its_half_extents() {
        let scene = build_scene();
        let range = scene.props[0].range;

        for vertex in &scene.vertices[range.first as usize..(range.first + range.count) as usize] {
            for component in [vertex.position.x, vertex.position.y, vertex.position.z] {
                assert!(component.abs() <= 0.5 + f32::EPSILON);
            }

            // Cube normals are unit length and axis-aligned.
            assert_relative_eq!(glm::length(&vertex.normal), 1.0, epsilon = 1e-6);
            let nonzero = [vertex.normal.x, vertex.normal.y, vertex.normal.z]
                .iter()
                .filter(|component| component.abs() > 0.0)
                .count();
            assert_eq!(nonzero, 1);
        }
    }

    #[test]
    fn no_mesh_has_a_denormalised_position() {
        let scene = build_scene();

        for vertex in &scene.vertices {
            assert!(vertex.position.iter().all(|component| component.is_finite()));
            assert!(vertex.normal.iter().all(|component| component.is_finite()));
        }
    }

    #[test]
    fn gpu_layouts_match_the_shaders() {
        // Interleaved position + normal.
        assert_eq!(std::mem::size_of::<Vertex>(), 24);

        // Must fit the 128 byte guaranteed push constant budget.
        assert_eq!(std::mem::size_of::<PushConstants>(), 80);
        assert!(std::mem::size_of::<PushConstants>() <= 128);

        // Two mat4s and three vec4s, as declared in the scene uniform block.
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 176);
    }
}
