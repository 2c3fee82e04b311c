use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{backend::Backend, shader::ShaderStage, texture::PixelFormat};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error codes reported by `glGetError`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
pub enum GlErrorKind {
    #[error("GL_INVALID_ENUM: an enum argument is out of range")]
    InvalidEnum,
    #[error("GL_INVALID_VALUE: a numeric argument is out of range")]
    InvalidValue,
    #[error("GL_INVALID_OPERATION: not allowed in the current state")]
    InvalidOperation,
    #[error("GL_INVALID_FRAMEBUFFER_OPERATION: the framebuffer is incomplete")]
    InvalidFramebufferOperation,
    #[error("GL_OUT_OF_MEMORY: the driver ran out of memory")]
    OutOfMemory,
    #[error("GL_STACK_OVERFLOW: a stack push hit the depth limit")]
    StackOverflow,
    #[error("GL_STACK_UNDERFLOW: a stack pop found it empty")]
    StackUnderflow,
    #[error("unrecognized driver error code {0:#06x}")]
    Unrecognized(u32),
    #[error("the driver returned no object name and reported no error")]
    NoObject,
}

impl GlErrorKind {
    /// Decodes a `glGetError` value, `None` for `GL_NO_ERROR`.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            gl::NO_ERROR => return None,
            gl::INVALID_ENUM => Self::InvalidEnum,
            gl::INVALID_VALUE => Self::InvalidValue,
            gl::INVALID_OPERATION => Self::InvalidOperation,
            gl::INVALID_FRAMEBUFFER_OPERATION => Self::InvalidFramebufferOperation,
            gl::OUT_OF_MEMORY => Self::OutOfMemory,
            gl::STACK_OVERFLOW => Self::StackOverflow,
            gl::STACK_UNDERFLOW => Self::StackUnderflow,
            other => Self::Unrecognized(other),
        })
    }

    /// Drains the driver error queue, returning the oldest error recorded.
    pub fn current_error(backend: &impl Backend) -> Option<Self> {
        let first = Self::from_code(backend.get_error())?;
        while Self::from_code(backend.get_error()).is_some() {}
        Some(first)
    }

    pub fn guard(backend: &impl Backend) -> Result<(), Self> {
        match Self::current_error(backend) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot compile {stage} shader:\n{info_log}")]
    Compile {
        stage: ShaderStage,
        info_log: String,
    },
    #[error("Cannot link program:\n{info_log}")]
    Link { info_log: String },
    #[error("Uniform {0:?} is not active in this program")]
    UnknownUniform(String),
    #[error("Attribute {0:?} is not active in this program")]
    UnknownAttribute(String),
    #[error("Program {0} is not the active program")]
    InactiveProgram(u32),
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),
    #[error("{0} shader source is empty")]
    EmptySource(ShaderStage),
    #[error("Cannot link a program without shaders")]
    NoShaders,
    #[error("Cannot tell the shader stage of {}", .0.display())]
    UnknownStage(PathBuf),
    #[error("Pixel data holds {actual} bytes, a {width}x{height} {format:?} image needs {expected}")]
    PixelDataSize {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
    #[error("OpenGL error: {0}")]
    Gl(#[from] GlErrorKind),
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[cfg(feature = "img")]
    #[error("Cannot decode image: {0}")]
    Image(#[from] image::ImageError),
}
