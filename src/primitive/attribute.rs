use nalgebra as na;
use na::{SVector, Vector2, Vector3, Vector4};

/// Per-vertex vector data with its own topology.
///
/// `data` is compact, `index` runs parallel to the primitive index buffer, so the
/// attribute of triangle-local slot `i` is `data[index[i]]`. This lets UVs or normals
/// split along seams while positions stay shared.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBuffer<const N: usize> {
    data: Vec<SVector<f32, N>>,
    index: Vec<u32>,
}

impl<const N: usize> AttributeBuffer<N> {
    pub fn new(data: Vec<SVector<f32, N>>, index: Vec<u32>) -> Self {
        return Self { data, index };
    }

    /// Attribute which follows exactly the same topology as the positions.
    pub fn with_shared_index(data: Vec<SVector<f32, N>>, geometry_index: &[u32]) -> Self {
        return Self {
            data,
            index: geometry_index.to_vec(),
        };
    }

    /// Value for triangle-local vertex slot `i`.
    /// Panics if `i` is outside the index array or the index points past the data.
    pub fn get(&self, i: usize) -> SVector<f32, N> {
        assert!(
            i < self.index.len(),
            "attribute slot {} requested, but index array holds only {} entries",
            i,
            self.index.len()
        );
        let data_index = self.index[i] as usize;
        assert!(
            data_index < self.data.len(),
            "attribute index {} points past {} stored values",
            data_index,
            self.data.len()
        );
        return self.data[data_index];
    }

    pub fn len(&self) -> usize {
        return self.data.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.data.is_empty();
    }

    pub fn index_len(&self) -> usize {
        return self.index.len();
    }

    pub fn data(&self) -> &[SVector<f32, N>] {
        return &self.data;
    }

    pub fn index(&self) -> &[u32] {
        return &self.index;
    }
}

/// Attribute buffer of any supported width, as stored in a primitive slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Vec2(AttributeBuffer<2>),
    Vec3(AttributeBuffer<3>),
    Vec4(AttributeBuffer<4>),
}

impl Attribute {
    /// Number of components of a single value.
    pub fn components(&self) -> usize {
        return match self {
            Attribute::Vec2(_) => 2,
            Attribute::Vec3(_) => 3,
            Attribute::Vec4(_) => 4,
        };
    }

    pub fn index_len(&self) -> usize {
        return match self {
            Attribute::Vec2(buffer) => buffer.index_len(),
            Attribute::Vec3(buffer) => buffer.index_len(),
            Attribute::Vec4(buffer) => buffer.index_len(),
        };
    }

    /// Value for triangle-local vertex slot `i`, see [`AttributeBuffer::get`].
    pub fn value(&self, i: usize) -> AttributeValue {
        return match self {
            Attribute::Vec2(buffer) => AttributeValue::Vec2(buffer.get(i)),
            Attribute::Vec3(buffer) => AttributeValue::Vec3(buffer.get(i)),
            Attribute::Vec4(buffer) => AttributeValue::Vec4(buffer.get(i)),
        };
    }
}

impl From<AttributeBuffer<2>> for Attribute {
    fn from(buffer: AttributeBuffer<2>) -> Self {
        return Attribute::Vec2(buffer);
    }
}

impl From<AttributeBuffer<3>> for Attribute {
    fn from(buffer: AttributeBuffer<3>) -> Self {
        return Attribute::Vec3(buffer);
    }
}

impl From<AttributeBuffer<4>> for Attribute {
    fn from(buffer: AttributeBuffer<4>) -> Self {
        return Attribute::Vec4(buffer);
    }
}

/// A single attribute value flowing into or out of a shader stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    Vec2(Vector2<f32>),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
}

impl AttributeValue {
    /// Value zero-padded to four components.
    pub fn to_vec4(self) -> Vector4<f32> {
        return match self {
            AttributeValue::Vec2(v) => Vector4::new(v.x, v.y, 0.0, 0.0),
            AttributeValue::Vec3(v) => Vector4::new(v.x, v.y, v.z, 0.0),
            AttributeValue::Vec4(v) => v,
        };
    }

    /// First two components.
    pub fn xy(self) -> Vector2<f32> {
        let v = self.to_vec4();
        return Vector2::new(v.x, v.y);
    }

    /// First three components, zero-padded.
    pub fn xyz(self) -> Vector3<f32> {
        let v = self.to_vec4();
        return Vector3::new(v.x, v.y, v.z);
    }

    /// Weighted sum of three values of the same width.
    /// Mixing widths means the vertex shader broke its own output order, which is a bug.
    pub fn blend(values: [&AttributeValue; 3], weights: Vector3<f32>) -> AttributeValue {
        return match (values[0], values[1], values[2]) {
            (AttributeValue::Vec2(a), AttributeValue::Vec2(b), AttributeValue::Vec2(c)) => {
                AttributeValue::Vec2(a * weights.x + b * weights.y + c * weights.z)
            }
            (AttributeValue::Vec3(a), AttributeValue::Vec3(b), AttributeValue::Vec3(c)) => {
                AttributeValue::Vec3(a * weights.x + b * weights.y + c * weights.z)
            }
            (AttributeValue::Vec4(a), AttributeValue::Vec4(b), AttributeValue::Vec4(c)) => {
                AttributeValue::Vec4(a * weights.x + b * weights.y + c * weights.z)
            }
            _ => panic!("vertex shader emitted outputs of different widths for the same slot"),
        };
    }
}
