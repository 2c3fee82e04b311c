use std::ffi::CStr;

use crate::uniform::Uniform;

/// The OpenGL entry points the resource wrappers are built on.
///
/// Names are raw GL object names (0 meaning "none" or "failed"), enums are raw GL enum values
/// and locations follow GL conventions (-1 for "not found"). Implementations must behave like
/// the driver: record failures in the error queue read by [`Backend::get_error`] instead of
/// panicking.
pub trait Backend {
    fn get_error(&self) -> u32;

    fn create_shader(&self, stage: u32) -> u32;
    fn shader_source(&self, shader: u32, source: &str);
    fn compile_shader(&self, shader: u32);
    fn compile_status(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn delete_shader(&self, shader: u32);

    fn create_program(&self) -> u32;
    fn attach_shader(&self, program: u32, shader: u32);
    fn detach_shader(&self, program: u32, shader: u32);
    fn link_program(&self, program: u32);
    fn link_status(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn delete_program(&self, program: u32);
    fn use_program(&self, program: u32);
    fn uniform_location(&self, program: u32, name: &CStr) -> i32;
    fn attrib_location(&self, program: u32, name: &CStr) -> i32;
    /// Writes `value` into `location` of the program in use. `transpose` only matters for
    /// matrix values.
    fn uniform(&self, location: i32, value: &Uniform, transpose: bool);

    fn gen_texture(&self) -> u32;
    /// Selects texture image unit `unit` (0-based, not offset by `GL_TEXTURE0`).
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: u32);
    fn tex_parameter(&self, target: u32, pname: u32, param: i32);
    fn pixel_store(&self, pname: u32, param: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    );
    fn generate_mipmap(&self, target: u32);
    fn delete_texture(&self, texture: u32);
}
