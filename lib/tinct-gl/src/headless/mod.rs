//! In-process stand-in for an OpenGL 3.3 core context.
//!
//! [`Headless`] implements [`Backend`] by bookkeeping alone: object names are tracked in tables,
//! shaders are checked by a small GLSL scanner and uniform uploads are type-checked and stored so
//! tests can read them back. Misuse is reported through the error queue with the codes a real
//! driver would raise.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    ffi::CStr,
};

use num_traits::FromPrimitive;

use crate::{
    backend::Backend,
    context::{Context, ResourceCounts},
    shader::ShaderStage,
    texture::{Filter, Wrap},
    uniform::Uniform,
};

mod glsl;

use glsl::{LinkedInterface, ShaderInterface};

/// Texture image units available to the fragment stage.
const MAX_TEXTURE_UNITS: u32 = 48;

/// Snapshot of a texture object's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: i32,
    pub height: i32,
    pub internal_format: i32,
    pub format: u32,
    pub min_filter: i32,
    pub mag_filter: i32,
    pub wrap_s: i32,
    pub wrap_t: i32,
    pub swizzle: [i32; 4],
    pub has_mipmaps: bool,
    /// Uploaded pixels with any row padding removed.
    pub data: Vec<u8>,
    /// `GL_UNPACK_ALIGNMENT` in effect during the last upload.
    pub unpack_alignment: i32,
}

impl Default for TextureInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            internal_format: 0,
            format: 0,
            min_filter: gl::NEAREST_MIPMAP_LINEAR as _,
            mag_filter: gl::LINEAR as _,
            wrap_s: gl::REPEAT as _,
            wrap_t: gl::REPEAT as _,
            swizzle: [gl::RED, gl::GREEN, gl::BLUE, gl::ALPHA].map(|c| c as i32),
            has_mipmaps: false,
            data: Vec::new(),
            unpack_alignment: 4,
        }
    }
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    interface: Option<ShaderInterface>,
    info_log: String,
    delete_pending: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<u32>,
    linked: Option<LinkedInterface>,
    info_log: String,
    values: HashMap<i32, Uniform>,
    delete_pending: bool,
}

#[derive(Debug)]
struct State {
    errors: VecDeque<u32>,
    next_name: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    textures: HashMap<u32, TextureInfo>,
    current_program: u32,
    active_unit: u32,
    units: HashMap<u32, u32>,
    unpack_alignment: i32,
    last_info_log: String,
    stray_deletes: usize,
    uniform_lookups: usize,
}

impl State {
    fn new() -> Self {
        Self {
            errors: VecDeque::new(),
            next_name: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            current_program: 0,
            active_unit: 0,
            units: HashMap::new(),
            unpack_alignment: 4,
            last_info_log: String::new(),
            stray_deletes: 0,
            uniform_lookups: 0,
        }
    }

    fn record(&mut self, code: u32) {
        tracing::trace!(code, "Recorded GL error");
        self.errors.push_back(code);
    }

    /// Names are never reused, so stale handles cannot alias newer objects.
    fn gen_name(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn shader(&mut self, shader: u32) -> Result<&mut ShaderObject, u32> {
        self.shaders.get_mut(&shader).ok_or(gl::INVALID_VALUE)
    }

    fn program(&mut self, program: u32) -> Result<&mut ProgramObject, u32> {
        self.programs.get_mut(&program).ok_or(gl::INVALID_VALUE)
    }

    fn linked_program(&mut self, program: u32) -> Result<&mut ProgramObject, u32> {
        let object = self.program(program)?;
        match object.linked {
            Some(_) => Ok(object),
            None => Err(gl::INVALID_OPERATION),
        }
    }

    fn bound_texture(&mut self, target: u32) -> Result<&mut TextureInfo, u32> {
        if target != gl::TEXTURE_2D {
            return Err(gl::INVALID_ENUM);
        }
        let texture = self
            .units
            .get(&self.active_unit)
            .copied()
            .ok_or(gl::INVALID_OPERATION)?;
        self.textures.get_mut(&texture).ok_or(gl::INVALID_OPERATION)
    }

    fn is_attached(&self, shader: u32) -> bool {
        self.programs
            .values()
            .any(|program| program.attached.contains(&shader))
    }

    fn release_pending_shader(&mut self, shader: u32) {
        let pending = self.shaders.get(&shader).map_or(false, |s| s.delete_pending);
        if pending && !self.is_attached(shader) {
            self.shaders.remove(&shader);
        }
    }

    fn link(&mut self, program: u32) -> Result<(), u32> {
        let object = self.programs.get(&program).ok_or(gl::INVALID_VALUE)?;
        let mut stages = Vec::new();
        let mut uncompiled = false;
        for shader in object.attached.iter().filter_map(|id| self.shaders.get(id)) {
            match &shader.interface {
                Some(interface) => stages.push((shader.stage, interface)),
                None => uncompiled = true,
            }
        }
        let result = if uncompiled {
            Err("error: linking with uncompiled/unspecialized shader\n".to_string())
        } else {
            glsl::link(&stages)
        };

        let object = self.program(program)?;
        object.values.clear();
        match result {
            Ok(linked) => {
                object.linked = Some(linked);
                object.info_log.clear();
            }
            Err(log) => {
                object.linked = None;
                object.info_log = log.clone();
                self.last_info_log = log;
            }
        }
        Ok(())
    }

    fn write_uniform(&mut self, location: i32, value: &Uniform, transpose: bool) -> Result<(), u32> {
        if location == -1 {
            return Ok(());
        }
        let current = self.current_program;
        let program = self.programs.get_mut(&current).ok_or(gl::INVALID_OPERATION)?;
        let linked = program.linked.as_ref().ok_or(gl::INVALID_OPERATION)?;
        let (uniform, index) = linked.uniform_at(location).ok_or(gl::INVALID_OPERATION)?;
        if !uniform.accepts(value) {
            return Err(gl::INVALID_OPERATION);
        }
        let room = uniform.array_len.unwrap_or(1) - index;

        let value = if transpose {
            from_row_major(value.clone())
        } else {
            value.clone()
        };
        for (offset, element) in elements(value).into_iter().take(room).enumerate() {
            program.values.insert(location + offset as i32, element);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn upload_texture(
        &mut self,
        target: u32,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> Result<(), u32> {
        let channels = match format {
            gl::RED => 1,
            gl::RG => 2,
            gl::RGB => 3,
            gl::RGBA => 4,
            _ => return Err(gl::INVALID_ENUM),
        };
        if ty != gl::UNSIGNED_BYTE {
            return Err(gl::INVALID_ENUM);
        }
        if width < 0 || height < 0 {
            return Err(gl::INVALID_VALUE);
        }
        let alignment = self.unpack_alignment;
        let row = width as usize * channels;
        let stride = (row + alignment as usize - 1) / alignment as usize * alignment as usize;
        let needed = match height as usize {
            0 => 0,
            rows => stride * (rows - 1) + row,
        };
        if pixels.len() < needed {
            return Err(gl::INVALID_OPERATION);
        }
        let data = if row == 0 {
            Vec::new()
        } else {
            pixels
                .chunks(stride)
                .take(height as usize)
                .flat_map(|line| &line[..row])
                .copied()
                .collect()
        };

        let texture = self.bound_texture(target)?;
        texture.width = width;
        texture.height = height;
        texture.internal_format = internal_format;
        texture.format = format;
        texture.data = data;
        texture.has_mipmaps = false;
        texture.unpack_alignment = alignment;
        Ok(())
    }
}

/// Turns a matrix given row by row into the column-major layout it is stored in.
fn transpose<const C: usize, const R: usize>(rows: [[f32; R]; C]) -> [[f32; R]; C] {
    let flat = rows.iter().flatten().copied().collect::<Vec<_>>();
    let mut columns = [[0.0; R]; C];
    for (c, column) in columns.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = flat[r * C + c];
        }
    }
    columns
}

fn from_row_major(value: Uniform) -> Uniform {
    match value {
        Uniform::Mat2(m) => Uniform::Mat2(transpose(m)),
        Uniform::Mat3(m) => Uniform::Mat3(transpose(m)),
        Uniform::Mat4(m) => Uniform::Mat4(transpose(m)),
        Uniform::Mat23(m) => Uniform::Mat23(transpose(m)),
        Uniform::Mat24(m) => Uniform::Mat24(transpose(m)),
        Uniform::Mat32(m) => Uniform::Mat32(transpose(m)),
        Uniform::Mat34(m) => Uniform::Mat34(transpose(m)),
        Uniform::Mat42(m) => Uniform::Mat42(transpose(m)),
        Uniform::Mat43(m) => Uniform::Mat43(transpose(m)),
        Uniform::SliceMat4(ms) => Uniform::SliceMat4(ms.iter().copied().map(transpose).collect()),
        other => other,
    }
}

/// Splits array uploads into the values of consecutive locations.
fn elements(value: Uniform) -> Vec<Uniform> {
    match value {
        Uniform::SliceInt(v) => v.iter().copied().map(Uniform::Int).collect(),
        Uniform::SliceUint(v) => v.iter().copied().map(Uniform::Uint).collect(),
        Uniform::SliceFloat(v) => v.iter().copied().map(Uniform::Float).collect(),
        Uniform::SliceVec2(v) => v.iter().copied().map(Uniform::Vec2).collect(),
        Uniform::SliceVec3(v) => v.iter().copied().map(Uniform::Vec3).collect(),
        Uniform::SliceVec4(v) => v.iter().copied().map(Uniform::Vec4).collect(),
        Uniform::SliceMat4(v) => v.iter().copied().map(Uniform::Mat4).collect(),
        other => vec![other],
    }
}

/// An emulated OpenGL context, see the [module docs](self).
#[derive(Debug)]
pub struct Headless {
    state: RefCell<State>,
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

impl Headless {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::new()),
        }
    }

    fn with_state<T>(&self, fallback: T, f: impl FnOnce(&mut State) -> Result<T, u32>) -> T {
        let mut state = self.state.borrow_mut();
        match f(&mut state) {
            Ok(value) => value,
            Err(code) => {
                state.record(code);
                fallback
            }
        }
    }

    /// Driver objects currently alive, including ones flagged for deletion but still in use.
    pub fn live_objects(&self) -> ResourceCounts {
        let state = self.state.borrow();
        ResourceCounts {
            shaders: state.shaders.len(),
            programs: state.programs.len(),
            textures: state.textures.len(),
        }
    }

    pub fn current_program(&self) -> u32 {
        self.state.borrow().current_program
    }

    /// Value last written to the uniform `name` of `program`.
    pub fn uniform_value(&self, program: u32, name: &str) -> Option<Uniform> {
        let state = self.state.borrow();
        let program = state.programs.get(&program)?;
        let location = program.linked.as_ref()?.uniform_location(name)?;
        program.values.get(&location).cloned()
    }

    pub fn texture_info(&self, texture: u32) -> Option<TextureInfo> {
        self.state.borrow().textures.get(&texture).cloned()
    }

    /// Texture bound to the 2D target of `unit`, 0 when none.
    pub fn bound_texture(&self, unit: u32) -> u32 {
        self.state.borrow().units.get(&unit).copied().unwrap_or(0)
    }

    pub fn attached_shaders(&self, program: u32) -> Vec<u32> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|program| program.attached.clone())
            .unwrap_or_default()
    }

    /// Source last given to `shader`.
    pub fn source_of(&self, shader: u32) -> Option<String> {
        let state = self.state.borrow();
        state.shaders.get(&shader).map(|shader| shader.source.clone())
    }

    /// Deletions of names that were not alive, which would be double frees on a real driver.
    pub fn stray_deletes(&self) -> usize {
        self.state.borrow().stray_deletes
    }

    /// Number of `glGetUniformLocation` calls served so far.
    pub fn uniform_lookups(&self) -> usize {
        self.state.borrow().uniform_lookups
    }

    /// Info log of the most recent failed compile or link.
    pub fn last_info_log(&self) -> String {
        self.state.borrow().last_info_log.clone()
    }

    pub fn unpack_alignment(&self) -> i32 {
        self.state.borrow().unpack_alignment
    }
}

impl Backend for Headless {
    fn get_error(&self) -> u32 {
        self.state
            .borrow_mut()
            .errors
            .pop_front()
            .unwrap_or(gl::NO_ERROR)
    }

    fn create_shader(&self, stage: u32) -> u32 {
        self.with_state(0, |state| {
            let stage = ShaderStage::from_u32(stage).ok_or(gl::INVALID_ENUM)?;
            let name = state.gen_name();
            state.shaders.insert(
                name,
                ShaderObject {
                    stage,
                    source: String::new(),
                    interface: None,
                    info_log: String::new(),
                    delete_pending: false,
                },
            );
            Ok(name)
        })
    }

    fn shader_source(&self, shader: u32, source: &str) {
        self.with_state((), |state| {
            state.shader(shader)?.source = source.to_string();
            Ok(())
        })
    }

    fn compile_shader(&self, shader: u32) {
        self.with_state((), |state| {
            let object = state.shader(shader)?;
            match glsl::compile(object.stage, &object.source) {
                Ok(interface) => {
                    object.interface = Some(interface);
                    object.info_log.clear();
                }
                Err(log) => {
                    object.interface = None;
                    object.info_log = log.clone();
                    state.last_info_log = log;
                }
            }
            Ok(())
        })
    }

    fn compile_status(&self, shader: u32) -> bool {
        self.with_state(false, |state| Ok(state.shader(shader)?.interface.is_some()))
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.with_state(String::new(), |state| {
            Ok(state.shader(shader)?.info_log.clone())
        })
    }

    fn delete_shader(&self, shader: u32) {
        self.with_state((), |state| {
            if shader == 0 {
                return Ok(());
            }
            let attached = state.is_attached(shader);
            let Some(object) = state.shaders.get_mut(&shader) else {
                state.stray_deletes += 1;
                return Err(gl::INVALID_VALUE);
            };
            if object.delete_pending {
                state.stray_deletes += 1;
            } else if attached {
                object.delete_pending = true;
            } else {
                state.shaders.remove(&shader);
            }
            Ok(())
        })
    }

    fn create_program(&self) -> u32 {
        self.with_state(0, |state| {
            let name = state.gen_name();
            state.programs.insert(name, ProgramObject::default());
            Ok(name)
        })
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        self.with_state((), |state| {
            state.shader(shader)?;
            let object = state.program(program)?;
            if object.attached.contains(&shader) {
                return Err(gl::INVALID_OPERATION);
            }
            object.attached.push(shader);
            Ok(())
        })
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        self.with_state((), |state| {
            state.shader(shader)?;
            let object = state.program(program)?;
            let index = object
                .attached
                .iter()
                .position(|s| *s == shader)
                .ok_or(gl::INVALID_OPERATION)?;
            object.attached.remove(index);
            state.release_pending_shader(shader);
            Ok(())
        })
    }

    fn link_program(&self, program: u32) {
        self.with_state((), |state| state.link(program))
    }

    fn link_status(&self, program: u32) -> bool {
        self.with_state(false, |state| Ok(state.program(program)?.linked.is_some()))
    }

    fn program_info_log(&self, program: u32) -> String {
        self.with_state(String::new(), |state| {
            Ok(state.program(program)?.info_log.clone())
        })
    }

    fn delete_program(&self, program: u32) {
        self.with_state((), |state| {
            if program == 0 {
                return Ok(());
            }
            let current = state.current_program == program;
            let Some(object) = state.programs.get_mut(&program) else {
                state.stray_deletes += 1;
                return Err(gl::INVALID_VALUE);
            };
            if object.delete_pending {
                state.stray_deletes += 1;
                return Ok(());
            }
            if current {
                object.delete_pending = true;
                return Ok(());
            }
            if let Some(object) = state.programs.remove(&program) {
                for shader in object.attached {
                    state.release_pending_shader(shader);
                }
            }
            Ok(())
        })
    }

    fn use_program(&self, program: u32) {
        self.with_state((), |state| {
            if program != 0 {
                state.linked_program(program)?;
            }
            let previous = std::mem::replace(&mut state.current_program, program);
            let pending = state
                .programs
                .get(&previous)
                .map_or(false, |p| p.delete_pending);
            if previous != program && pending {
                state.programs.remove(&previous);
            }
            Ok(())
        })
    }

    fn uniform_location(&self, program: u32, name: &CStr) -> i32 {
        self.with_state(-1, |state| {
            state.uniform_lookups += 1;
            let object = state.linked_program(program)?;
            let location = name
                .to_str()
                .ok()
                .and_then(|name| object.linked.as_ref()?.uniform_location(name));
            Ok(location.unwrap_or(-1))
        })
    }

    fn attrib_location(&self, program: u32, name: &CStr) -> i32 {
        self.with_state(-1, |state| {
            let object = state.linked_program(program)?;
            let location = name.to_str().ok().and_then(|name| {
                object.linked.as_ref()?.attributes.get(name).copied()
            });
            Ok(location.map_or(-1, |location| location as i32))
        })
    }

    fn uniform(&self, location: i32, value: &Uniform, transpose: bool) {
        self.with_state((), |state| state.write_uniform(location, value, transpose))
    }

    fn gen_texture(&self) -> u32 {
        self.with_state(0, |state| {
            let name = state.gen_name();
            state.textures.insert(name, TextureInfo::default());
            Ok(name)
        })
    }

    fn active_texture(&self, unit: u32) {
        self.with_state((), |state| {
            if unit >= MAX_TEXTURE_UNITS {
                return Err(gl::INVALID_ENUM);
            }
            state.active_unit = unit;
            Ok(())
        })
    }

    fn bind_texture(&self, target: u32, texture: u32) {
        self.with_state((), |state| {
            if target != gl::TEXTURE_2D {
                return Err(gl::INVALID_ENUM);
            }
            if texture == 0 {
                state.units.remove(&state.active_unit);
            } else if state.textures.contains_key(&texture) {
                state.units.insert(state.active_unit, texture);
            } else {
                return Err(gl::INVALID_OPERATION);
            }
            Ok(())
        })
    }

    fn tex_parameter(&self, target: u32, pname: u32, param: i32) {
        self.with_state((), |state| {
            let texture = state.bound_texture(target)?;
            let slot = match pname {
                gl::TEXTURE_MIN_FILTER if Filter::from_i32(param).is_some() => {
                    &mut texture.min_filter
                }
                gl::TEXTURE_MAG_FILTER
                    if matches!(Filter::from_i32(param), Some(Filter::Nearest | Filter::Linear)) =>
                {
                    &mut texture.mag_filter
                }
                gl::TEXTURE_WRAP_S if Wrap::from_i32(param).is_some() => &mut texture.wrap_s,
                gl::TEXTURE_WRAP_T if Wrap::from_i32(param).is_some() => &mut texture.wrap_t,
                gl::TEXTURE_SWIZZLE_R
                | gl::TEXTURE_SWIZZLE_G
                | gl::TEXTURE_SWIZZLE_B
                | gl::TEXTURE_SWIZZLE_A
                    if matches!(
                        param as u32,
                        gl::RED | gl::GREEN | gl::BLUE | gl::ALPHA | gl::ZERO | gl::ONE
                    ) =>
                {
                    &mut texture.swizzle[(pname - gl::TEXTURE_SWIZZLE_R) as usize]
                }
                _ => return Err(gl::INVALID_ENUM),
            };
            *slot = param;
            Ok(())
        })
    }

    fn pixel_store(&self, pname: u32, param: i32) {
        self.with_state((), |state| {
            if pname != gl::UNPACK_ALIGNMENT {
                return Err(gl::INVALID_ENUM);
            }
            if !matches!(param, 1 | 2 | 4 | 8) {
                return Err(gl::INVALID_VALUE);
            }
            state.unpack_alignment = param;
            Ok(())
        })
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
        self.with_state((), |state| {
            state.upload_texture(target, internal_format, width, height, format, ty, pixels)
        })
    }

    fn generate_mipmap(&self, target: u32) {
        self.with_state((), |state| {
            let texture = state.bound_texture(target)?;
            if texture.width == 0 || texture.height == 0 {
                return Err(gl::INVALID_OPERATION);
            }
            texture.has_mipmaps = true;
            Ok(())
        })
    }

    fn delete_texture(&self, texture: u32) {
        self.with_state((), |state| {
            if texture == 0 {
                return Ok(());
            }
            // Unknown names are silently ignored by glDeleteTextures
            if state.textures.remove(&texture).is_none() {
                state.stray_deletes += 1;
                return Ok(());
            }
            state.units.retain(|_, bound| *bound != texture);
            Ok(())
        })
    }
}

impl Context<Headless> {
    /// A context backed by a fresh [`Headless`] emulation.
    pub fn headless() -> Self {
        Self::new(Headless::new())
    }
}
