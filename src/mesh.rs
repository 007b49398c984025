//! Geometry provider reading Wavefront OBJ data into a [`Primitive`].
//!
//! OBJ faces index positions, texture coordinates and normals separately, which maps
//! directly onto attribute buffers with their own index arrays. Polygons are fanned into
//! triangles around their first corner.

use std::io::BufRead;

use nalgebra as na;
use na::{vector, Vector2, Vector3};
use obj::raw::object::Polygon;
use obj::raw::{parse_obj, RawObj};
use thiserror::Error;

use crate::primitive::{AttributeBuffer, CullMode, Primitive};
use crate::shader::{InputMapping, ShaderInputType};

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to parse obj data: {0}")]
    Parse(#[from] obj::ObjError),
    #[error("obj data has no faces")]
    Empty,
    #[error("face {face} has {corners} corner(s), at least 3 are needed")]
    DegenerateFace { face: usize, corners: usize },
    #[error("face {face} does not provide the same per-corner data as face 0")]
    MixedLayout { face: usize },
    #[error("face {face} references {kind} {index}, but only {available} exist")]
    IndexOutOfRange {
        face: usize,
        kind: &'static str,
        index: usize,
        available: usize,
    },
}

/// Primitive built from OBJ data, along with the slots its attributes landed in.
pub struct ObjMesh {
    pub primitive: Primitive,
    pub input_mapping: InputMapping,
}

/// One polygon corner: position index plus optional uv and normal indices.
type Corner = (usize, Option<usize>, Option<usize>);

fn corners(polygon: &Polygon) -> Vec<Corner> {
    return match polygon {
        Polygon::P(corners) => corners.iter().map(|&p| (p, None, None)).collect(),
        Polygon::PT(corners) => corners.iter().map(|&(p, t)| (p, Some(t), None)).collect(),
        Polygon::PN(corners) => corners.iter().map(|&(p, n)| (p, None, Some(n))).collect(),
        Polygon::PTN(corners) => corners.iter().map(|&(p, t, n)| (p, Some(t), Some(n))).collect(),
    };
}

fn check_index(face: usize, kind: &'static str, index: usize, available: usize) -> Result<u32, MeshError> {
    if index >= available {
        return Err(MeshError::IndexOutOfRange {
            face,
            kind,
            index,
            available,
        });
    }
    return Ok(index as u32);
}

/// Parses OBJ text and builds a primitive from it.
pub fn load_obj<R: BufRead>(input: R, cull_mode: CullMode) -> Result<ObjMesh, MeshError> {
    let raw = parse_obj(input)?;
    return primitive_from_obj(&raw, cull_mode);
}

/// Builds a primitive from already parsed OBJ data.
/// UVs land in the first attribute slot when present, normals in the next one.
pub fn primitive_from_obj(raw: &RawObj, cull_mode: CullMode) -> Result<ObjMesh, MeshError> {
    if raw.polygons.is_empty() {
        return Err(MeshError::Empty);
    }

    let mut position_index = Vec::new();
    let mut uv_index = Vec::new();
    let mut normal_index = Vec::new();
    let mut layout: Option<(bool, bool)> = None;

    for (face, polygon) in raw.polygons.iter().enumerate() {
        let corners = corners(polygon);
        if corners.len() < 3 {
            return Err(MeshError::DegenerateFace {
                face,
                corners: corners.len(),
            });
        }
        let face_layout = (corners[0].1.is_some(), corners[0].2.is_some());
        match layout {
            None => layout = Some(face_layout),
            Some(expected) if expected != face_layout => return Err(MeshError::MixedLayout { face }),
            Some(_) => (),
        }

        for i in 1..corners.len() - 1 {
            for &(p, t, n) in [&corners[0], &corners[i], &corners[i + 1]] {
                position_index.push(check_index(face, "position", p, raw.positions.len())?);
                if let Some(t) = t {
                    uv_index.push(check_index(face, "texture coordinate", t, raw.tex_coords.len())?);
                }
                if let Some(n) = n {
                    normal_index.push(check_index(face, "normal", n, raw.normals.len())?);
                }
            }
        }
    }

    let mut primitive = Primitive::new(cull_mode);
    primitive.set_vertex_buffer(
        raw.positions
            .iter()
            .map(|&(x, y, z, _)| vector![x, y, z])
            .collect::<Vec<Vector3<f32>>>(),
    );
    let mut input_mapping = InputMapping::new();
    if !uv_index.is_empty() {
        let uvs: Vec<Vector2<f32>> = raw.tex_coords.iter().map(|&(u, v, _)| vector![u, v]).collect();
        let slot = primitive.append_attribute_buffer(AttributeBuffer::new(uvs, uv_index));
        input_mapping.bind(ShaderInputType::Uv2, slot);
    }
    if !normal_index.is_empty() {
        let normals: Vec<Vector3<f32>> = raw.normals.iter().map(|&(x, y, z)| vector![x, y, z]).collect();
        let slot = primitive.append_attribute_buffer(AttributeBuffer::new(normals, normal_index));
        input_mapping.bind(ShaderInputType::VertexNormal3, slot);
    }
    primitive.set_index_buffer(position_index);

    log::info!(
        "obj mesh: {} position(s), {} triangle(s), uv: {}, normals: {}",
        primitive.vertices().len(),
        primitive.triangle_count(),
        input_mapping.get(ShaderInputType::Uv2).is_some(),
        input_mapping.get(ShaderInputType::VertexNormal3).is_some()
    );
    return Ok(ObjMesh {
        primitive,
        input_mapping,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vt 0.5 0.5
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
f 1/5/1 3/5/1 4/5/1
";

    #[test]
    fn quad_is_fanned_with_disjoint_topology() {
        let mesh = load_obj(QUAD.as_bytes(), CullMode::Disabled).unwrap();
        let primitive = &mesh.primitive;
        assert_eq!(primitive.indices(), &[0, 1, 2, 0, 2, 3, 0, 2, 3]);
        assert_eq!(primitive.triangle_count(), 3);

        let uv_slot = mesh.input_mapping.get(ShaderInputType::Uv2).unwrap();
        let normal_slot = mesh.input_mapping.get(ShaderInputType::VertexNormal3).unwrap();
        assert_eq!((uv_slot, normal_slot), (0, 1));
        // Same position, different uv across the two faces.
        let uvs = &primitive.attributes()[uv_slot];
        assert_eq!(uvs.value(0).xy(), vector![0.0, 0.0]);
        assert_eq!(uvs.value(6).xy(), vector![0.5, 0.5]);
        assert_eq!(primitive.attributes()[normal_slot].index_len(), 9);
    }

    #[test]
    fn positions_only_mesh_binds_nothing() {
        let mesh = load_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".as_bytes(), CullMode::CullBack).unwrap();
        assert!(mesh.primitive.attributes().is_empty());
        assert_eq!(mesh.input_mapping.slot_count(), 0);
        assert_eq!(mesh.primitive.cull_mode(), CullMode::CullBack);
    }

    #[test]
    fn mixed_face_layouts_are_rejected() {
        let input = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 3/1\nf 1 2 3\n";
        assert!(matches!(
            load_obj(input.as_bytes(), CullMode::Disabled),
            Err(MeshError::MixedLayout { face: 1 })
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(load_obj("v 0 0 0\n".as_bytes(), CullMode::Disabled), Err(MeshError::Empty)));
    }
}
