use std::{
    fmt,
    fmt::Formatter,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
};

use num_derive::FromPrimitive;

use crate::{
    backend::Backend,
    context::{Context, ResourceKind},
    error::{Error, Result},
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum ShaderStage {
    Vertex = gl::VERTEX_SHADER,
    Fragment = gl::FRAGMENT_SHADER,
    Geometry = gl::GEOMETRY_SHADER,
}

impl ShaderStage {
    /// Guesses the stage from a file extension such as `vert`, `fs` or `geom`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "vert" | "vs" | "vsh" => Some(Self::Vertex),
            "frag" | "fs" | "fsh" => Some(Self::Fragment),
            "geom" | "gs" | "gsh" => Some(Self::Geometry),
            _ => None,
        }
    }

    /// Looks at the last extension first, then the one before, so `mesh.vert.glsl` works too.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext).or_else(|| Self::from_path(&path.with_extension("")))
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
        })
    }
}

struct ShaderObject<B: Backend> {
    ctx: Context<B>,
    id: NonZeroU32,
    stage: ShaderStage,
}

impl<B: Backend> Drop for ShaderObject<B> {
    fn drop(&mut self) {
        self.ctx.backend().delete_shader(self.id.get());
        self.ctx.released(ResourceKind::Shader);
        tracing::debug!(shader = self.id.get(), stage = %self.stage, "Deleted shader");
    }
}

/// A compiled shader stage.
///
/// Clones share the same driver object, which is deleted once the last clone goes away. Linking
/// only borrows shaders, so one compiled stage can feed any number of programs.
pub struct Shader<B: Backend> {
    inner: Arc<ShaderObject<B>>,
}

impl<B: Backend> Clone for Shader<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for Shader<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shader")
            .field(&self.inner.stage)
            .field(&self.inner.id.get())
            .finish()
    }
}

impl<B: Backend> Shader<B> {
    /// Compiles `source` as a `stage` shader. On failure the compiler's log is returned as-is.
    #[tracing::instrument(skip(ctx, source), fields(len = source.len()))]
    pub fn compile(ctx: &Context<B>, stage: ShaderStage, source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(Error::EmptySource(stage));
        }
        let backend = ctx.backend();
        let id = ctx.object_name(backend.create_shader(stage as u32))?;
        ctx.created(ResourceKind::Shader);
        // Owned from here on: an early return releases the driver object.
        let object = ShaderObject {
            ctx: ctx.clone(),
            id,
            stage,
        };

        backend.shader_source(id.get(), source);
        backend.compile_shader(id.get());
        if !backend.compile_status(id.get()) {
            let info_log = backend.shader_info_log(id.get());
            tracing::debug!(shader = id.get(), "Compilation failed");
            return Err(Error::Compile { stage, info_log });
        }
        ctx.guard()?;
        tracing::debug!(shader = id.get(), "Compiled shader");
        Ok(Self {
            inner: Arc::new(object),
        })
    }

    /// Reads and compiles a shader file, deriving the stage from its extension.
    pub fn from_file(ctx: &Context<B>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stage =
            ShaderStage::from_path(path).ok_or_else(|| Error::UnknownStage(path.to_path_buf()))?;
        Self::from_file_with_stage(ctx, path, stage)
    }

    pub fn from_file_with_stage(
        ctx: &Context<B>,
        path: impl AsRef<Path>,
        stage: ShaderStage,
    ) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Self::compile(ctx, stage, &source)
    }

    pub fn stage(&self) -> ShaderStage {
        self.inner.stage
    }

    pub fn id(&self) -> NonZeroU32 {
        self.inner.id
    }
}
