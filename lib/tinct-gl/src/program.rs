use std::{
    ffi::CString,
    fmt,
    fmt::Formatter,
    num::NonZeroU32,
    path::Path,
};

use dashmap::DashMap;

use crate::{
    backend::Backend,
    context::{Context, ResourceKind},
    error::{Error, Result},
    shader::{Shader, ShaderStage},
    uniform::Uniform,
};

/// Location of an active uniform in a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(i32);

impl UniformLocation {
    pub fn raw(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttribLocation(u32);

impl AttribLocation {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A linked shader program.
///
/// Programs do not keep their shaders: stages are attached for the duration of [`Program::link`]
/// and detached right after. Uniform setters require the program to be the one in use on its
/// context, see [`Program::use_program`].
pub struct Program<B: Backend> {
    ctx: Context<B>,
    id: NonZeroU32,
    uniforms: DashMap<String, UniformLocation>,
}

impl<B: Backend> fmt::Debug for Program<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Program").field(&self.id.get()).finish()
    }
}

impl<B: Backend> Drop for Program<B> {
    fn drop(&mut self) {
        if self.is_in_use() {
            self.ctx.set_active_program(None);
        }
        self.ctx.backend().delete_program(self.id.get());
        self.ctx.released(ResourceKind::Program);
        tracing::debug!(program = self.id.get(), "Deleted program");
    }
}

impl<B: Backend> Program<B> {
    /// Links `shaders` into a new program.
    ///
    /// Every shader is detached again once linking finishes, whatever the outcome, so the same
    /// shaders can be linked into other programs afterwards.
    #[tracing::instrument(skip_all)]
    pub fn link<'s>(
        ctx: &Context<B>,
        shaders: impl IntoIterator<Item = &'s Shader<B>>,
    ) -> Result<Self>
    where
        B: 's,
    {
        let shaders = shaders.into_iter().collect::<Vec<_>>();
        if shaders.is_empty() {
            return Err(Error::NoShaders);
        }
        let backend = ctx.backend();
        let id = ctx.object_name(backend.create_program())?;
        ctx.created(ResourceKind::Program);
        let program = Self {
            ctx: ctx.clone(),
            id,
            uniforms: DashMap::new(),
        };

        for shader in &shaders {
            backend.attach_shader(id.get(), shader.id().get());
        }
        backend.link_program(id.get());
        for shader in &shaders {
            backend.detach_shader(id.get(), shader.id().get());
        }

        if !backend.link_status(id.get()) {
            let info_log = backend.program_info_log(id.get());
            tracing::debug!(program = id.get(), "Linking failed");
            return Err(Error::Link { info_log });
        }
        ctx.guard()?;
        tracing::debug!(program = id.get(), stages = shaders.len(), "Linked program");
        Ok(program)
    }

    /// Compiles and links a vertex and fragment shader pair, with an optional geometry stage.
    pub fn from_sources(
        ctx: &Context<B>,
        vertex: &str,
        fragment: &str,
        geometry: Option<&str>,
    ) -> Result<Self> {
        let mut shaders = vec![
            Shader::compile(ctx, ShaderStage::Vertex, vertex)?,
            Shader::compile(ctx, ShaderStage::Fragment, fragment)?,
        ];
        if let Some(source) = geometry {
            shaders.push(Shader::compile(ctx, ShaderStage::Geometry, source)?);
        }
        Self::link(ctx, &shaders)
    }

    /// Compiles every file with the stage its extension names, then links them.
    pub fn from_files<P: AsRef<Path>>(
        ctx: &Context<B>,
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self> {
        let shaders = paths
            .into_iter()
            .map(|path| Shader::from_file(ctx, path))
            .collect::<Result<Vec<_>>>()?;
        Self::link(ctx, &shaders)
    }

    pub fn id(&self) -> NonZeroU32 {
        self.id
    }

    /// Makes this the program in use, replacing whichever program was active before.
    pub fn use_program(&self) {
        if let Some(previous) = self.ctx.active_program().filter(|p| *p != self.id) {
            tracing::trace!(
                program = self.id.get(),
                previous = previous.get(),
                "Replacing active program"
            );
        }
        self.ctx.set_active_program(Some(self.id));
    }

    /// Leaves the context with no program in use.
    pub fn stop_using(&self) -> Result<()> {
        self.ensure_in_use()?;
        self.ctx.set_active_program(None);
        Ok(())
    }

    pub fn is_in_use(&self) -> bool {
        self.ctx.active_program() == Some(self.id)
    }

    /// Uses the program until the returned guard is dropped.
    pub fn bound(&self) -> InUse<'_, B> {
        self.use_program();
        InUse { program: self }
    }

    /// Looks up a uniform by name. Array elements can be addressed as `name[index]`.
    ///
    /// Names the linker dropped because they were never used are reported as unknown, just like
    /// names that were never declared.
    pub fn uniform_location(&self, name: &str) -> Result<UniformLocation> {
        if let Some(location) = self.uniforms.get(name) {
            return Ok(*location);
        }
        let c_name = CString::new(name).map_err(|_| Error::UnknownUniform(name.to_string()))?;
        let raw = self.ctx.backend().uniform_location(self.id.get(), &c_name);
        if raw < 0 {
            return Err(Error::UnknownUniform(name.to_string()));
        }
        let location = UniformLocation(raw);
        self.uniforms.insert(name.to_string(), location);
        Ok(location)
    }

    pub fn attrib_location(&self, name: &str) -> Result<AttribLocation> {
        let unknown = || Error::UnknownAttribute(name.to_string());
        let c_name = CString::new(name).map_err(|_| unknown())?;
        let raw = self.ctx.backend().attrib_location(self.id.get(), &c_name);
        u32::try_from(raw).map(AttribLocation).map_err(|_| unknown())
    }

    pub fn set_uniform(&self, name: &str, value: impl Into<Uniform>) -> Result<()> {
        self.set_uniform_transposed(name, value, false)
    }

    /// Sets a uniform by name. `transpose` tells whether matrix data is laid out row-major; it
    /// is ignored for every other kind of value.
    pub fn set_uniform_transposed(
        &self,
        name: &str,
        value: impl Into<Uniform>,
        transpose: bool,
    ) -> Result<()> {
        self.ensure_in_use()?;
        let location = self.uniform_location(name)?;
        self.upload(location, value.into(), transpose)
    }

    pub fn set_uniform_at(
        &self,
        location: UniformLocation,
        value: impl Into<Uniform>,
        transpose: bool,
    ) -> Result<()> {
        self.ensure_in_use()?;
        self.upload(location, value.into(), transpose)
    }

    fn upload(&self, location: UniformLocation, value: Uniform, transpose: bool) -> Result<()> {
        if let Uniform::Sampler(unit) = value {
            if self.ctx.bound_texture(unit.0).is_none() {
                tracing::warn!(
                    program = self.id.get(),
                    unit = unit.0,
                    "Sampler points at a texture unit with nothing bound"
                );
            }
        }
        tracing::trace!(program = self.id.get(), location = location.0, ?value, "Set uniform");
        self.ctx.backend().uniform(location.0, &value, transpose);
        self.ctx.guard()
    }

    fn ensure_in_use(&self) -> Result<()> {
        if self.is_in_use() {
            Ok(())
        } else {
            Err(Error::InactiveProgram(self.id.get()))
        }
    }
}

/// Keeps a program in use while alive. See [`Program::bound`].
#[derive(Debug)]
pub struct InUse<'a, B: Backend> {
    program: &'a Program<B>,
}

impl<'a, B: Backend> std::ops::Deref for InUse<'a, B> {
    type Target = Program<B>;

    fn deref(&self) -> &Self::Target {
        self.program
    }
}

impl<'a, B: Backend> Drop for InUse<'a, B> {
    fn drop(&mut self) {
        // Someone else may have taken over the slot in the meantime
        if self.program.is_in_use() {
            self.program.ctx.set_active_program(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{headless::Headless, Context, Error, TextureUnit, Uniform};

    use super::*;

    const VERTEX: &str = r#"
#version 330 core
layout(location = 0) in vec3 position;
uniform mat4 transform;

void main() {
    gl_Position = transform * vec4(position, 1.0);
}"#;

    const FRAGMENT: &str = r#"
#version 330 core
uniform vec4 color;
uniform float unused_fade;
out vec4 frag_color;

void main() {
    frag_color = color;
}"#;

    fn program(ctx: &Context<Headless>) -> Program<Headless> {
        Program::from_sources(ctx, VERTEX, FRAGMENT, None).unwrap()
    }

    #[test]
    fn shaders_are_detached_after_linking() {
        let ctx = Context::new(Headless::new());
        let vertex = Shader::compile(&ctx, ShaderStage::Vertex, VERTEX).unwrap();
        let fragment = Shader::compile(&ctx, ShaderStage::Fragment, FRAGMENT).unwrap();
        let first = Program::link(&ctx, [&vertex, &fragment]).unwrap();
        let second = Program::link(&ctx, [&vertex, &fragment]).unwrap();
        assert_ne!(first.id(), second.id());
        assert!(ctx.backend().attached_shaders(first.id().get()).is_empty());
        assert!(ctx.backend().attached_shaders(second.id().get()).is_empty());
    }

    #[test]
    fn linking_nothing_is_refused() {
        let ctx = Context::new(Headless::new());
        let err = Program::link(&ctx, Vec::<&Shader<Headless>>::new()).unwrap_err();
        assert!(matches!(err, Error::NoShaders));
        assert_eq!(ctx.backend().live_objects().programs, 0);
    }

    #[test]
    fn failed_links_release_the_program() {
        let ctx = Context::new(Headless::new());
        let vertex = Shader::compile(&ctx, ShaderStage::Vertex, VERTEX).unwrap();
        let err = Program::link(&ctx, [&vertex]).unwrap_err();
        let info_log = match err {
            Error::Link { info_log } => info_log,
            other => panic!("expected a link error, got {other:?}"),
        };
        assert!(!info_log.is_empty());
        assert_eq!(ctx.live_resources().programs, 0);
        assert_eq!(ctx.backend().live_objects().programs, 0);
    }

    #[test]
    fn unused_uniforms_are_unknown() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        assert!(program.uniform_location("color").is_ok());
        assert!(program.uniform_location("transform").is_ok());
        assert!(matches!(
            program.uniform_location("unused_fade"),
            Err(Error::UnknownUniform(name)) if name == "unused_fade"
        ));
        assert!(matches!(
            program.uniform_location("nope\0"),
            Err(Error::UnknownUniform(_))
        ));
    }

    #[test]
    fn locations_are_cached() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        let first = program.uniform_location("color").unwrap();
        let lookups = ctx.backend().uniform_lookups();
        assert_eq!(program.uniform_location("color").unwrap(), first);
        assert_eq!(ctx.backend().uniform_lookups(), lookups);
    }

    #[test]
    fn attributes_resolve_to_their_layout_location() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        assert_eq!(program.attrib_location("position").unwrap().raw(), 0);
        assert!(matches!(
            program.attrib_location("normal"),
            Err(Error::UnknownAttribute(_))
        ));
    }

    #[test]
    fn setters_require_the_program_in_use() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        let err = program.set_uniform("color", [1f32, 0., 0., 1.]).unwrap_err();
        assert!(matches!(err, Error::InactiveProgram(id) if id == program.id().get()));

        program.use_program();
        program.set_uniform("color", [1f32, 0., 0., 1.]).unwrap();
        assert_eq!(
            ctx.backend().uniform_value(program.id().get(), "color"),
            Some(Uniform::Vec4([1f32, 0., 0., 1.]))
        );
        program.stop_using().unwrap();
        assert_eq!(ctx.active_program(), None);
        assert!(matches!(
            program.set_uniform("color", [0f32, 1., 0., 1.]),
            Err(Error::InactiveProgram(_))
        ));
        assert!(matches!(program.stop_using(), Err(Error::InactiveProgram(_))));
    }

    #[test]
    fn activating_replaces_the_previous_program() {
        let ctx = Context::new(Headless::new());
        let first = program(&ctx);
        let second = program(&ctx);
        first.use_program();
        second.use_program();
        assert!(!first.is_in_use());
        assert!(second.is_in_use());
        assert_eq!(ctx.backend().current_program(), second.id().get());
        assert!(matches!(first.stop_using(), Err(Error::InactiveProgram(_))));
    }

    #[test]
    fn dropping_the_active_program_clears_the_slot() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        program.use_program();
        drop(program);
        assert_eq!(ctx.active_program(), None);
        assert_eq!(ctx.backend().current_program(), 0);
        assert_eq!(ctx.backend().live_objects().programs, 0);
    }

    #[test]
    fn bound_guard_stops_using_on_drop() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        {
            let bound = program.bound();
            bound.set_uniform("color", [0.5f32; 4]).unwrap();
            assert!(program.is_in_use());
        }
        assert!(!program.is_in_use());
    }

    #[test]
    fn mismatched_types_surface_driver_errors() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        let _bound = program.bound();
        let err = program.set_uniform("color", 1.0f32).unwrap_err();
        assert!(matches!(err, Error::Gl(crate::GlErrorKind::InvalidOperation)));
    }

    #[test]
    fn transposed_matrices_land_column_major() {
        let ctx = Context::new(Headless::new());
        let program = program(&ctx);
        let _bound = program.bound();
        let row_major: [[f32; 4]; 4] = [
            [1., 2., 3., 4.],
            [5., 6., 7., 8.],
            [9., 10., 11., 12.],
            [13., 14., 15., 16.],
        ];
        program
            .set_uniform_transposed("transform", row_major, true)
            .unwrap();
        let Some(Uniform::Mat4(stored)) = ctx.backend().uniform_value(program.id().get(), "transform") else {
            panic!("transform was not uploaded");
        };
        assert_eq!(stored[0], [1., 5., 9., 13.]);
        assert_eq!(stored[3], [4., 8., 12., 16.]);
    }

    #[test]
    fn samplers_upload_without_a_bound_texture() {
        let ctx = Context::new(Headless::new());
        let program = Program::from_sources(
            &ctx,
            VERTEX,
            r#"
#version 330 core
uniform sampler2D albedo;
out vec4 frag_color;

void main() {
    frag_color = texture(albedo, vec2(0.5));
}"#,
            None,
        )
        .unwrap();
        let _bound = program.bound();
        program.set_uniform("albedo", TextureUnit(3)).unwrap();
        assert_eq!(
            ctx.backend().uniform_value(program.id().get(), "albedo"),
            Some(Uniform::Sampler(TextureUnit(3)))
        );
    }

    const PASS_COLOR: &str = r#"
#version 330 core
in vec3 position;
out vec3 v_color;

void main() {
    v_color = position;
    gl_Position = vec4(position, 1.0);
}"#;

    const EXPAND: &str = r#"
#version 330 core
layout(triangles) in;
layout(triangle_strip, max_vertices = 3) out;
in vec3 v_color[];
out vec3 g_color;

void main() {
    for (int i = 0; i < 3; i++) {
        g_color = v_color[i];
        gl_Position = gl_in[i].gl_Position;
        EmitVertex();
    }
    EndPrimitive();
}"#;

    const SHADE: &str = r#"
#version 330 core
in vec3 g_color;
out vec4 frag_color;

void main() {
    frag_color = vec4(g_color, 1.0);
}"#;

    const LIGHTS: &str = r#"
#version 330 core
uniform vec3 lights[3];
out vec4 frag_color;

void main() {
    frag_color = vec4(lights[0] + lights[1] + lights[2], 1.0);
}"#;

    #[test]
    fn geometry_stages_link_between_vertex_and_fragment() {
        let ctx = Context::new(Headless::new());
        let program = Program::from_sources(&ctx, PASS_COLOR, SHADE, Some(EXPAND)).unwrap();
        assert!(ctx.backend().attached_shaders(program.id().get()).is_empty());
        assert_eq!(ctx.live_resources().shaders, 0);
        assert_eq!(ctx.live_resources().programs, 1);

        let unfed = EXPAND.replace("v_color", "v_normal");
        let err = Program::from_sources(&ctx, PASS_COLOR, SHADE, Some(&unfed)).unwrap_err();
        let info_log = match err {
            Error::Link { info_log } => info_log,
            other => panic!("expected a link error, got {other:?}"),
        };
        insta::assert_snapshot!(info_log.trim_end(), @"error: geometry shader input `v_normal' has no matching output in the previous stage");
        assert_eq!(ctx.backend().live_objects().programs, 1);
    }

    #[test]
    fn array_uniforms_are_set_whole_or_per_element() {
        let ctx = Context::new(Headless::new());
        let program = Program::from_sources(&ctx, VERTEX, LIGHTS, None).unwrap();
        let _bound = program.bound();
        let id = program.id().get();

        let lights: &[[f32; 3]] = &[[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]];
        program.set_uniform("lights", lights).unwrap();
        assert_eq!(
            ctx.backend().uniform_value(id, "lights[2]"),
            Some(Uniform::Vec3([0., 0., 1.]))
        );

        program.set_uniform("lights[1]", [0.5f32; 3]).unwrap();
        assert_eq!(
            ctx.backend().uniform_value(id, "lights[1]"),
            Some(Uniform::Vec3([0.5; 3]))
        );
        assert_eq!(
            ctx.backend().uniform_value(id, "lights[0]"),
            Some(Uniform::Vec3([1., 0., 0.]))
        );
        assert_eq!(
            program.uniform_location("lights[2]").unwrap().raw(),
            program.uniform_location("lights").unwrap().raw() + 2
        );
        assert!(matches!(
            program.uniform_location("lights[3]"),
            Err(Error::UnknownUniform(_))
        ));
    }

    #[test]
    fn files_are_linked_by_extension() {
        let ctx = Context::new(Headless::new());
        let dir = std::env::temp_dir().join("tinct-gl-program-files");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("flat.vert"), VERTEX).unwrap();
        std::fs::write(dir.join("flat.frag.glsl"), FRAGMENT).unwrap();

        let program =
            Program::from_files(&ctx, [dir.join("flat.vert"), dir.join("flat.frag.glsl")])
                .unwrap();
        assert!(program.uniform_location("color").is_ok());

        let missing = Program::from_files(&ctx, [dir.join("flat.vert"), dir.join("gone.frag")]);
        assert!(matches!(missing, Err(Error::Io { .. })));
        let unknown = Program::from_files(&ctx, [dir.join("flat.vert"), dir.join("notes.txt")]);
        assert!(matches!(unknown, Err(Error::UnknownStage(_))));
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(ctx.live_resources().programs, 1);
        assert_eq!(ctx.live_resources().shaders, 0);
        assert_eq!(ctx.backend().live_objects().shaders, 0);
    }
}
