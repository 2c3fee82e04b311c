use std::{
    ffi::{c_char, c_void, CStr},
    fmt,
};

use bytemuck::cast_slice;

use crate::{backend::Backend, context::Context, uniform::Uniform};

/// OpenGL 3.3 core through function pointers loaded at runtime.
pub struct GlBackend {
    gl: gl::Gl,
}

impl fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlBackend").finish_non_exhaustive()
    }
}

impl GlBackend {
    /// Loads every entry point through `loader`.
    ///
    /// # Safety
    ///
    /// An OpenGL 3.3+ context must be current on the calling thread, and `loader` must return
    /// pointers valid for that context.
    pub unsafe fn load_with(loader: impl FnMut(&'static str) -> *const c_void) -> Self {
        Self {
            gl: gl::Gl::load_with(loader),
        }
    }

    /// The raw bindings, for calls the wrappers do not cover.
    pub fn raw(&self) -> &gl::Gl {
        &self.gl
    }
}

impl Context<GlBackend> {
    /// Creates a context for the OpenGL context current on this thread.
    ///
    /// # Safety
    ///
    /// See [`GlBackend::load_with`].
    pub unsafe fn load_with(loader: impl FnMut(&'static str) -> *const c_void) -> Self {
        let ctx = Self::new(GlBackend::load_with(loader));
        let version = ctx.backend().gl.GetString(gl::VERSION);
        if !version.is_null() {
            let version = CStr::from_ptr(version.cast()).to_string_lossy();
            tracing::info!(%version, "Loaded OpenGL");
        }
        ctx
    }
}

/// Queries the log length, then fills a buffer of that size through `read`.
fn read_info_log(len: i32, read: impl FnOnce(i32, *mut i32, *mut c_char)) -> String {
    let mut buf = vec![0u8; len.max(1) as usize];
    let mut written = 0;
    read(buf.len() as _, &mut written, buf.as_mut_ptr().cast());
    buf.truncate(written.clamp(0, buf.len() as i32) as usize);
    let log = String::from_utf8_lossy(&buf);
    log.trim_end_matches('\0').to_string()
}

impl Backend for GlBackend {
    fn get_error(&self) -> u32 {
        unsafe { self.gl.GetError() }
    }

    fn create_shader(&self, stage: u32) -> u32 {
        unsafe { self.gl.CreateShader(stage) }
    }

    fn shader_source(&self, shader: u32, source: &str) {
        let ptr = source.as_ptr().cast::<c_char>();
        let len = source.len() as gl::types::GLint;
        unsafe { self.gl.ShaderSource(shader, 1, &ptr, &len) }
    }

    fn compile_shader(&self, shader: u32) {
        unsafe { self.gl.CompileShader(shader) }
    }

    fn compile_status(&self, shader: u32) -> bool {
        let mut status = 0;
        unsafe { self.gl.GetShaderiv(shader, gl::COMPILE_STATUS, &mut status) };
        status as gl::types::GLboolean == gl::TRUE
    }

    fn shader_info_log(&self, shader: u32) -> String {
        unsafe {
            let mut len = 0;
            self.gl.GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
            read_info_log(len, |capacity, written, buf| {
                self.gl.GetShaderInfoLog(shader, capacity, written, buf)
            })
        }
    }

    fn delete_shader(&self, shader: u32) {
        unsafe { self.gl.DeleteShader(shader) }
    }

    fn create_program(&self) -> u32 {
        unsafe { self.gl.CreateProgram() }
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        unsafe { self.gl.AttachShader(program, shader) }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        unsafe { self.gl.DetachShader(program, shader) }
    }

    fn link_program(&self, program: u32) {
        unsafe { self.gl.LinkProgram(program) }
    }

    fn link_status(&self, program: u32) -> bool {
        let mut status = 0;
        unsafe { self.gl.GetProgramiv(program, gl::LINK_STATUS, &mut status) };
        status as gl::types::GLboolean == gl::TRUE
    }

    fn program_info_log(&self, program: u32) -> String {
        unsafe {
            let mut len = 0;
            self.gl.GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
            read_info_log(len, |capacity, written, buf| {
                self.gl.GetProgramInfoLog(program, capacity, written, buf)
            })
        }
    }

    fn delete_program(&self, program: u32) {
        unsafe { self.gl.DeleteProgram(program) }
    }

    fn use_program(&self, program: u32) {
        unsafe { self.gl.UseProgram(program) }
    }

    fn uniform_location(&self, program: u32, name: &CStr) -> i32 {
        unsafe { self.gl.GetUniformLocation(program, name.as_ptr()) }
    }

    fn attrib_location(&self, program: u32, name: &CStr) -> i32 {
        unsafe { self.gl.GetAttribLocation(program, name.as_ptr()) }
    }

    fn uniform(&self, location: i32, value: &Uniform, transpose: bool) {
        let transpose = if transpose { gl::TRUE } else { gl::FALSE };
        unsafe {
            match value {
                Uniform::Bool(b) => self.gl.Uniform1i(location, *b as _),
                Uniform::Int(i) => self.gl.Uniform1i(location, *i),
                Uniform::Uint(i) => self.gl.Uniform1ui(location, *i),
                Uniform::Float(f) => self.gl.Uniform1f(location, *f),
                Uniform::Ivec2(v) => self.gl.Uniform2iv(location, 1, v.as_ptr()),
                Uniform::UIvec2(v) => self.gl.Uniform2uiv(location, 1, v.as_ptr()),
                Uniform::Vec2(v) => self.gl.Uniform2fv(location, 1, v.as_ptr()),
                Uniform::Ivec3(v) => self.gl.Uniform3iv(location, 1, v.as_ptr()),
                Uniform::UIvec3(v) => self.gl.Uniform3uiv(location, 1, v.as_ptr()),
                Uniform::Vec3(v) => self.gl.Uniform3fv(location, 1, v.as_ptr()),
                Uniform::Ivec4(v) => self.gl.Uniform4iv(location, 1, v.as_ptr()),
                Uniform::UIvec4(v) => self.gl.Uniform4uiv(location, 1, v.as_ptr()),
                Uniform::Vec4(v) => self.gl.Uniform4fv(location, 1, v.as_ptr()),
                Uniform::Mat2(m) => {
                    self.gl
                        .UniformMatrix2fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat3(m) => {
                    self.gl
                        .UniformMatrix3fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat4(m) => {
                    self.gl
                        .UniformMatrix4fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat23(m) => {
                    self.gl
                        .UniformMatrix2x3fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat24(m) => {
                    self.gl
                        .UniformMatrix2x4fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat32(m) => {
                    self.gl
                        .UniformMatrix3x2fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat34(m) => {
                    self.gl
                        .UniformMatrix3x4fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat42(m) => {
                    self.gl
                        .UniformMatrix4x2fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Mat43(m) => {
                    self.gl
                        .UniformMatrix4x3fv(location, 1, transpose, m.as_ptr().cast())
                }
                Uniform::Sampler(unit) => self.gl.Uniform1i(location, unit.0 as _),
                Uniform::SliceInt(v) => self.gl.Uniform1iv(location, v.len() as _, v.as_ptr()),
                Uniform::SliceUint(v) => self.gl.Uniform1uiv(location, v.len() as _, v.as_ptr()),
                Uniform::SliceFloat(v) => self.gl.Uniform1fv(location, v.len() as _, v.as_ptr()),
                Uniform::SliceVec2(v) => {
                    let data: &[f32] = cast_slice(&v[..]);
                    self.gl.Uniform2fv(location, v.len() as _, data.as_ptr())
                }
                Uniform::SliceVec3(v) => {
                    let data: &[f32] = cast_slice(&v[..]);
                    self.gl.Uniform3fv(location, v.len() as _, data.as_ptr())
                }
                Uniform::SliceVec4(v) => {
                    let data: &[f32] = cast_slice(&v[..]);
                    self.gl.Uniform4fv(location, v.len() as _, data.as_ptr())
                }
                Uniform::SliceMat4(v) => {
                    let data: &[f32] = cast_slice(&v[..]);
                    self.gl
                        .UniformMatrix4fv(location, v.len() as _, transpose, data.as_ptr())
                }
            }
        }
    }

    fn gen_texture(&self) -> u32 {
        let mut texture = 0;
        unsafe { self.gl.GenTextures(1, &mut texture) };
        texture
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.ActiveTexture(gl::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: u32, texture: u32) {
        unsafe { self.gl.BindTexture(target, texture) }
    }

    fn tex_parameter(&self, target: u32, pname: u32, param: i32) {
        unsafe { self.gl.TexParameteri(target, pname, param) }
    }

    fn pixel_store(&self, pname: u32, param: i32) {
        unsafe { self.gl.PixelStorei(pname, param) }
    }

    fn tex_image_2d(
        &self,
        target: u32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) {
        unsafe {
            self.gl.TexImage2D(
                target,
                0,
                internal_format,
                width,
                height,
                0,
                format,
                ty,
                pixels.as_ptr().cast(),
            )
        }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe { self.gl.GenerateMipmap(target) }
    }

    fn delete_texture(&self, texture: u32) {
        unsafe { self.gl.DeleteTextures(1, &texture) }
    }
}
