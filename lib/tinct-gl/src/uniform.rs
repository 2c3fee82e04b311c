use std::rc::Rc;

use duplicate::duplicate_item;

/// Texture image unit a sampler uniform reads from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TextureUnit(pub u32);

/// A CPU-side value ready to be uploaded to a uniform slot.
///
/// Matrices are stored column-major (`[column][row]`), which is what OpenGL expects when
/// uploading with `transpose = false`.
#[derive(Debug, Clone, PartialEq)]
pub enum Uniform {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Ivec2([i32; 2]),
    UIvec2([u32; 2]),
    Vec2([f32; 2]),
    Ivec3([i32; 3]),
    UIvec3([u32; 3]),
    Vec3([f32; 3]),
    Ivec4([i32; 4]),
    UIvec4([u32; 4]),
    Vec4([f32; 4]),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
    Mat23([[f32; 3]; 2]),
    Mat24([[f32; 4]; 2]),
    Mat32([[f32; 2]; 3]),
    Mat34([[f32; 4]; 3]),
    Mat42([[f32; 2]; 4]),
    Mat43([[f32; 3]; 4]),
    Sampler(TextureUnit),
    SliceInt(Rc<[i32]>),
    SliceUint(Rc<[u32]>),
    SliceFloat(Rc<[f32]>),
    SliceVec2(Rc<[[f32; 2]]>),
    SliceVec3(Rc<[[f32; 3]]>),
    SliceVec4(Rc<[[f32; 4]]>),
    SliceMat4(Rc<[[[f32; 4]; 4]]>),
}

impl Uniform {
    /// GLSL spelling of the element type this value uploads to.
    pub fn glsl_type(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::SliceInt(_) => "int",
            Self::Uint(_) | Self::SliceUint(_) => "uint",
            Self::Float(_) | Self::SliceFloat(_) => "float",
            Self::Ivec2(_) => "ivec2",
            Self::UIvec2(_) => "uvec2",
            Self::Vec2(_) | Self::SliceVec2(_) => "vec2",
            Self::Ivec3(_) => "ivec3",
            Self::UIvec3(_) => "uvec3",
            Self::Vec3(_) | Self::SliceVec3(_) => "vec3",
            Self::Ivec4(_) => "ivec4",
            Self::UIvec4(_) => "uvec4",
            Self::Vec4(_) | Self::SliceVec4(_) => "vec4",
            Self::Mat2(_) => "mat2",
            Self::Mat3(_) => "mat3",
            Self::Mat4(_) | Self::SliceMat4(_) => "mat4",
            Self::Mat23(_) => "mat2x3",
            Self::Mat24(_) => "mat2x4",
            Self::Mat32(_) => "mat3x2",
            Self::Mat34(_) => "mat3x4",
            Self::Mat42(_) => "mat4x2",
            Self::Mat43(_) => "mat4x3",
            Self::Sampler(_) => "sampler",
        }
    }

    /// Number of array elements written by this value.
    pub fn count(&self) -> usize {
        match self {
            Self::SliceInt(v) => v.len(),
            Self::SliceUint(v) => v.len(),
            Self::SliceFloat(v) => v.len(),
            Self::SliceVec2(v) => v.len(),
            Self::SliceVec3(v) => v.len(),
            Self::SliceVec4(v) => v.len(),
            Self::SliceMat4(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_matrix(&self) -> bool {
        self.glsl_type().starts_with("mat")
    }
}

#[duplicate_item(
ty              uniform_ty;
[bool]          [Bool];
[i32]           [Int];
[u32]           [Uint];
[f32]           [Float];
[[i32; 2]]      [Ivec2];
[[u32; 2]]      [UIvec2];
[[f32; 2]]      [Vec2];
[[i32; 3]]      [Ivec3];
[[u32; 3]]      [UIvec3];
[[f32; 3]]      [Vec3];
[[i32; 4]]      [Ivec4];
[[u32; 4]]      [UIvec4];
[[f32; 4]]      [Vec4];
[[[f32; 2]; 2]] [Mat2];
[[[f32; 3]; 3]] [Mat3];
[[[f32; 4]; 4]] [Mat4];
[TextureUnit]   [Sampler];
)]
impl From<ty> for Uniform {
    fn from(value: ty) -> Self {
        Uniform::uniform_ty(value)
    }
}

#[duplicate_item(
ty              uniform_ty;
[i32]           [SliceInt];
[u32]           [SliceUint];
[f32]           [SliceFloat];
[[f32; 2]]      [SliceVec2];
[[f32; 3]]      [SliceVec3];
[[f32; 4]]      [SliceVec4];
[[[f32; 4]; 4]] [SliceMat4];
)]
impl From<&[ty]> for Uniform {
    fn from(value: &[ty]) -> Self {
        Uniform::uniform_ty(Rc::from(value))
    }
}

#[cfg(feature = "uniforms-glam")]
mod glam_impls {
    use std::rc::Rc;

    use duplicate::duplicate_item;

    use super::Uniform;

    #[duplicate_item(
    ty              uniform_ty;
    [glam::Vec2]    [Vec2];
    [glam::IVec2]   [Ivec2];
    [glam::UVec2]   [UIvec2];
    [glam::Vec3]    [Vec3];
    [glam::IVec3]   [Ivec3];
    [glam::UVec3]   [UIvec3];
    [glam::Vec4]    [Vec4];
    [glam::IVec4]   [Ivec4];
    [glam::UVec4]   [UIvec4];
    )]
    impl From<ty> for Uniform {
        fn from(value: ty) -> Self {
            Uniform::uniform_ty(value.to_array())
        }
    }

    #[duplicate_item(
    ty              uniform_ty;
    [glam::Mat2]    [Mat2];
    [glam::Mat3]    [Mat3];
    [glam::Mat4]    [Mat4];
    )]
    impl From<ty> for Uniform {
        fn from(value: ty) -> Self {
            Uniform::uniform_ty(value.to_cols_array_2d())
        }
    }

    #[duplicate_item(
    ty              uniform_ty      convert;
    [glam::Vec2]    [SliceVec2]     [to_array];
    [glam::Vec3]    [SliceVec3]     [to_array];
    [glam::Vec4]    [SliceVec4]     [to_array];
    [glam::Mat4]    [SliceMat4]     [to_cols_array_2d];
    )]
    impl From<&[ty]> for Uniform {
        fn from(value: &[ty]) -> Self {
            Uniform::uniform_ty(value.iter().map(|v| v.convert()).collect::<Rc<[_]>>())
        }
    }
}
