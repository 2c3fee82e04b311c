//! Just enough GLSL understanding to emulate the driver's compile and link diagnostics.
//!
//! Sources are not really parsed: comments are stripped, brackets checked for balance and
//! top-level `uniform`/`in`/`out` declarations picked out with regexes. A declaration counts as
//! used when its name shows up anywhere else in the source. Logs follow Mesa's layout.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use lazy_regex::{lazy_regex, regex_captures, regex_is_match, Lazy, Regex};

use crate::{shader::ShaderStage, uniform::Uniform};

static DECLARATION_RE: Lazy<Regex> = lazy_regex!(
    r"(?m)^[ \t]*(?:layout\s*\(([^)]*)\)\s*)?(?:(?:flat|smooth|noperspective|centroid|invariant)\s+)*(uniform|in|out|attribute|varying)\s+(?:(?:highp|mediump|lowp)\s+)?([A-Za-z_]\w*)\s+([A-Za-z_]\w*)\s*(?:\[\s*(\d*)\s*\])?\s*;"
);
static STRUCT_RE: Lazy<Regex> = lazy_regex!(r"\bstruct\s+([A-Za-z_]\w*)");
static VERSION_RE: Lazy<Regex> = lazy_regex!(r"(?m)^[ \t]*#[ \t]*version[ \t]+(\d+)(?:[ \t]+(\w+))?");

const DESKTOP_VERSIONS: &[u32] = &[110, 120, 130, 140, 150, 330, 400, 410, 420, 430, 440, 450, 460];
const ES_VERSIONS: &[u32] = &[100, 300, 310, 320];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum Storage {
    Uniform,
    In,
    Out,
}

#[derive(Debug, Clone)]
pub(super) struct Declaration {
    pub storage: Storage,
    pub ty: String,
    pub name: String,
    pub array_len: Option<usize>,
    pub location: Option<u32>,
    pub user_struct: bool,
    pub used: bool,
}

/// What the linker needs to know about a compiled shader.
#[derive(Debug, Clone, Default)]
pub(super) struct ShaderInterface {
    pub declarations: Vec<Declaration>,
    pub has_main: bool,
}

impl ShaderInterface {
    fn declared(&self, storage: Storage) -> impl Iterator<Item = &Declaration> {
        self.declarations
            .iter()
            .filter(move |decl| decl.storage == storage)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct ActiveUniform {
    pub name: String,
    pub ty: String,
    pub array_len: Option<usize>,
    pub location: i32,
}

impl ActiveUniform {
    /// Locations taken, `None` when the array is too long to address.
    fn slots(&self) -> Option<i32> {
        i32::try_from(self.array_len.unwrap_or(1)).ok()
    }

    /// Element index of `location` within this uniform, if it falls inside it.
    pub fn element_at(&self, location: i32) -> Option<usize> {
        let index = location.checked_sub(self.location)?;
        (0..self.slots()?).contains(&index).then_some(index as usize)
    }

    /// Whether the `glUniform*` call used to upload `value` is legal for this uniform.
    pub fn accepts(&self, value: &Uniform) -> bool {
        if value.count() > 1 && self.array_len.is_none() {
            return false;
        }
        let ty = normalize_type(&self.ty);
        if ty.starts_with("sampler") || ty.starts_with("isampler") || ty.starts_with("usampler") {
            return matches!(
                value,
                Uniform::Sampler(_) | Uniform::Int(_) | Uniform::SliceInt(_)
            );
        }
        match ty {
            "bool" => matches!(
                value,
                Uniform::Bool(_) | Uniform::Int(_) | Uniform::Uint(_) | Uniform::Float(_)
            ),
            "int" => matches!(
                value,
                Uniform::Int(_) | Uniform::SliceInt(_) | Uniform::Bool(_) | Uniform::Sampler(_)
            ),
            bvec if bvec.starts_with("bvec") => {
                let n = &bvec[4..];
                let value_ty = value.glsl_type();
                value_ty.ends_with(n)
                    && ["ivec", "uvec", "vec"].contains(&&value_ty[..value_ty.len() - 1])
            }
            ty => ty == value.glsl_type(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct LinkedInterface {
    pub uniforms: Vec<ActiveUniform>,
    pub attributes: HashMap<String, u32>,
}

impl LinkedInterface {
    /// Resolves `name` or `name[index]` the way `glGetUniformLocation` does.
    pub fn uniform_location(&self, name: &str) -> Option<i32> {
        let (base, index) = match regex_captures!(r"^([A-Za-z_]\w*)\[(\d+)\]$", name) {
            Some((_, base, index)) => (base, Some(index.parse::<usize>().ok()?)),
            None => (name, None),
        };
        let uniform = self.uniforms.iter().find(|u| u.name == base)?;
        match (uniform.array_len, index) {
            (_, None) => Some(uniform.location),
            (Some(len), Some(index)) if index < len => {
                uniform.location.checked_add(i32::try_from(index).ok()?)
            }
            _ => None,
        }
    }

    pub fn uniform_at(&self, location: i32) -> Option<(&ActiveUniform, usize)> {
        self.uniforms
            .iter()
            .find_map(|uniform| Some((uniform, uniform.element_at(location)?)))
    }
}

fn normalize_type(ty: &str) -> &str {
    match ty {
        "mat2x2" => "mat2",
        "mat3x3" => "mat3",
        "mat4x4" => "mat4",
        ty => ty,
    }
}

fn is_builtin_type(ty: &str) -> bool {
    regex_is_match!(
        r"^(?:bool|int|uint|float|double|[biud]?vec[234]|d?mat[234](?:x[234])?|[iu]?sampler\w+)$",
        ty
    )
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat(' ').take(c.len_utf8()));
    }
}

/// Replaces comments with whitespace, keeping every byte offset and line number intact.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                out.push(' ');
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    blank(&mut out, c);
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                out.push_str("  ");
                let mut previous = '\0';
                for c in chars.by_ref() {
                    blank(&mut out, c);
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
            }
            (c, _) => out.push(c),
        }
    }
    out
}

fn error_at(source: &str, offset: usize, message: impl fmt::Display) -> String {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = offset - before.rfind('\n').map_or(0, |i| i + 1) + 1;
    format!("0:{line}({column}): error: {message}\n")
}

fn check_version(source: &str, log: &mut Vec<String>) {
    for caps in VERSION_RE.captures_iter(source) {
        let Some(number) = caps.get(1) else { continue };
        let es = caps.get(2).map_or(false, |profile| profile.as_str() == "es");
        let supported = if es { ES_VERSIONS } else { DESKTOP_VERSIONS };
        let version = number.as_str().parse::<u32>().unwrap_or(0);
        if !supported.contains(&version) {
            let listed = supported
                .iter()
                .map(|v| format!("{}.{:02}", v / 100, v % 100))
                .collect::<Vec<_>>()
                .join(", ");
            log.push(error_at(
                source,
                number.start(),
                format_args!(
                    "GLSL {}.{:02}{} is not supported. Supported versions are: {listed}",
                    version / 100,
                    version % 100,
                    if es { " ES" } else { "" },
                ),
            ));
        }
    }
}

/// Reports the first unbalanced bracket. Returns whether the source is balanced.
fn check_balance(source: &str, log: &mut Vec<String>) -> bool {
    let mut open = Vec::new();
    for (offset, c) in source.char_indices() {
        let expected = match c {
            '{' | '(' | '[' => {
                open.push(c);
                continue;
            }
            '}' => '{',
            ')' => '(',
            ']' => '[',
            _ => continue,
        };
        if open.pop() != Some(expected) {
            log.push(error_at(
                source,
                offset,
                format_args!("syntax error, unexpected '{c}'"),
            ));
            return false;
        }
    }
    if !open.is_empty() {
        log.push(error_at(
            source,
            source.len(),
            "syntax error, unexpected end of file",
        ));
        return false;
    }
    true
}

fn scope_depth(source: &str, offset: usize) -> usize {
    let before = &source[..offset];
    before
        .matches('{')
        .count()
        .saturating_sub(before.matches('}').count())
}

fn declarations(stage: ShaderStage, source: &str, log: &mut Vec<String>) -> Vec<Declaration> {
    let structs = STRUCT_RE
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .collect::<HashSet<_>>();
    let mut mentions = HashMap::<&str, usize>::new();
    for word in source.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
        if !word.is_empty() {
            *mentions.entry(word).or_default() += 1;
        }
    }

    let mut seen = HashSet::new();
    let mut declarations = Vec::new();
    for caps in DECLARATION_RE.captures_iter(source) {
        let (Some(qualifier), Some(ty), Some(name)) = (caps.get(2), caps.get(3), caps.get(4)) else {
            continue;
        };
        if scope_depth(source, qualifier.start()) > 0 {
            continue;
        }
        let storage = match (qualifier.as_str(), stage) {
            ("uniform", _) => Storage::Uniform,
            ("in" | "attribute", _) => Storage::In,
            ("varying", ShaderStage::Vertex) => Storage::Out,
            ("varying", _) => Storage::In,
            _ => Storage::Out,
        };
        let user_struct = structs.contains(ty.as_str());
        if !user_struct && !is_builtin_type(ty.as_str()) {
            log.push(error_at(
                source,
                ty.start(),
                format_args!("unknown type `{}'", ty.as_str()),
            ));
            continue;
        }
        if !seen.insert(name.as_str()) {
            log.push(error_at(
                source,
                name.start(),
                format_args!("`{}' redeclared", name.as_str()),
            ));
            continue;
        }
        let location = caps
            .get(1)
            .and_then(|layout| regex_captures!(r"location\s*=\s*(\d+)", layout.as_str()))
            .and_then(|(_, location)| location.parse().ok());
        declarations.push(Declaration {
            storage,
            ty: ty.as_str().to_string(),
            name: name.as_str().to_string(),
            array_len: caps.get(5).and_then(|len| len.as_str().parse().ok()),
            location,
            user_struct,
            used: mentions.get(name.as_str()).copied().unwrap_or(0) > 1,
        });
    }
    declarations
}

/// Compiles a shader, returning its interface or the info log.
pub(super) fn compile(stage: ShaderStage, source: &str) -> Result<ShaderInterface, String> {
    let source = strip_comments(source);
    let mut log = Vec::new();
    check_version(&source, &mut log);
    if !check_balance(&source, &mut log) {
        return Err(log.concat());
    }
    let declarations = declarations(stage, &source, &mut log);
    if !log.is_empty() {
        return Err(log.concat());
    }
    Ok(ShaderInterface {
        declarations,
        has_main: regex_is_match!(r"\bvoid\s+main\s*\(\s*(?:void\s*)?\)", &source),
    })
}

fn stage_declarations<'a>(
    stages: &'a [(ShaderStage, &'a ShaderInterface)],
    stage: ShaderStage,
    storage: Storage,
) -> impl Iterator<Item = &'a Declaration> {
    stages
        .iter()
        .filter(move |(s, _)| *s == stage)
        .flat_map(move |(_, interface)| interface.declared(storage))
}

/// Links compiled shaders, returning the active interface or the info log.
pub(super) fn link(stages: &[(ShaderStage, &ShaderInterface)]) -> Result<LinkedInterface, String> {
    use ShaderStage::*;

    let present = |stage: ShaderStage| stages.iter().any(|(s, _)| *s == stage);
    let mut log = Vec::new();
    for stage in [Vertex, Geometry, Fragment] {
        let mut shaders = stages.iter().filter(|(s, _)| *s == stage).peekable();
        if shaders.peek().is_some() && !shaders.any(|(_, interface)| interface.has_main) {
            log.push(format!("error: {stage} shader lacks `main'\n"));
        }
    }
    for stage in [Vertex, Fragment] {
        if !present(stage) {
            log.push(format!("error: program lacks a {stage} shader\n"));
        }
    }

    let producer = if present(Geometry) { Geometry } else { Vertex };
    for (from, to) in [(Vertex, Geometry), (producer, Fragment)] {
        if !present(from) || !present(to) {
            continue;
        }
        for input in stage_declarations(stages, to, Storage::In).filter(|d| d.used) {
            match stage_declarations(stages, from, Storage::Out).find(|d| d.name == input.name) {
                None => log.push(format!(
                    "error: {to} shader input `{}' has no matching output in the previous stage\n",
                    input.name
                )),
                Some(output) if normalize_type(&output.ty) != normalize_type(&input.ty) => {
                    log.push(format!(
                        "error: `{}' declared as type `{}' in {from} shader and `{}' in {to} shader\n",
                        input.name, output.ty, input.ty
                    ))
                }
                Some(_) => {}
            }
        }
    }

    let mut declared = HashMap::<&str, &Declaration>::new();
    let mut conflicting = HashSet::new();
    for (_, interface) in stages {
        for uniform in interface.declared(Storage::Uniform) {
            let first = *declared.entry(&uniform.name).or_insert(uniform);
            if normalize_type(&first.ty) != normalize_type(&uniform.ty)
                && conflicting.insert(&uniform.name)
            {
                log.push(format!(
                    "error: uniform `{}' declared as type `{}' and type `{}'\n",
                    uniform.name, first.ty, uniform.ty
                ));
            }
        }
    }
    if !log.is_empty() {
        return Err(log.concat());
    }

    let used = stages
        .iter()
        .flat_map(|(_, interface)| interface.declared(Storage::Uniform))
        .filter(|uniform| uniform.used)
        .map(|uniform| uniform.name.as_str())
        .collect::<HashSet<_>>();
    let mut uniforms = Vec::<ActiveUniform>::new();
    let mut location = 0;
    for (_, interface) in stages {
        for uniform in interface.declared(Storage::Uniform) {
            // Struct uniforms only get locations for their members, which are not tracked here
            if uniform.user_struct
                || !used.contains(uniform.name.as_str())
                || uniforms.iter().any(|u| u.name == uniform.name)
            {
                continue;
            }
            let active = ActiveUniform {
                name: uniform.name.clone(),
                ty: uniform.ty.clone(),
                array_len: uniform.array_len,
                location,
            };
            let Some(next) = active
                .slots()
                .and_then(|slots| location.checked_add(slots))
            else {
                return Err(format!(
                    "error: too many uniform locations, `{}' does not fit\n",
                    uniform.name
                ));
            };
            location = next;
            uniforms.push(active);
        }
    }

    let inputs = stage_declarations(stages, Vertex, Storage::In)
        .filter(|input| input.used)
        .collect::<Vec<_>>();
    let mut taken = inputs
        .iter()
        .filter_map(|input| input.location)
        .collect::<HashSet<_>>();
    let mut next = 0;
    let mut attributes = HashMap::new();
    for input in inputs {
        let location = match input.location {
            Some(location) => location,
            None => {
                while taken.contains(&next) {
                    next += 1;
                }
                taken.insert(next);
                next
            }
        };
        attributes.insert(input.name.clone(), location);
    }

    Ok(LinkedInterface {
        uniforms,
        attributes,
    })
}
