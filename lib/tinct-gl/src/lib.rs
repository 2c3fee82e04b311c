//! Owned wrappers around OpenGL shaders, programs and textures.
//!
//! Every wrapper holds a clone of the [`Context`] it was created from and releases its driver
//! object when dropped. The context is generic over a [`Backend`]: [`GlBackend`] talks to a real
//! driver, [`Headless`] emulates one in-process.

pub mod backend;
pub mod bitmap;
pub mod context;
pub mod debug;
pub mod error;
pub mod headless;
pub mod native;
pub mod program;
pub mod shader;
pub mod texture;
pub mod uniform;

pub use backend::Backend;
pub use bitmap::Bitmap;
pub use context::{Context, ResourceCounts};
pub use error::{Error, GlErrorKind, Result};
pub use headless::Headless;
pub use native::GlBackend;
pub use program::{AttribLocation, InUse, Program, UniformLocation};
pub use shader::{Shader, ShaderStage};
pub use texture::{AsPixelFormat, Filter, PixelFormat, Texture, TextureOptions, Wrap};
pub use uniform::{TextureUnit, Uniform};
