use std::{fmt, fmt::Formatter, num::NonZeroU32};

use num_derive::FromPrimitive;

use crate::{
    backend::Backend,
    bitmap::Bitmap,
    context::{Context, ResourceKind},
    error::{Error, Result},
    uniform::TextureUnit,
};

/// Channel layouts a texture can be created from. Every channel is one unsigned byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            Self::Grayscale => 1,
            Self::GrayscaleAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Bytes needed for a tightly packed `width` by `height` image.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels() as usize
    }

    fn gl_format(self) -> u32 {
        match self {
            Self::Grayscale => gl::RED,
            Self::GrayscaleAlpha => gl::RG,
            Self::Rgb => gl::RGB,
            Self::Rgba => gl::RGBA,
        }
    }

    fn gl_internal_format(self) -> u32 {
        match self {
            Self::Grayscale => gl::R8,
            Self::GrayscaleAlpha => gl::RG8,
            Self::Rgb => gl::RGB8,
            Self::Rgba => gl::RGBA8,
        }
    }

    /// Core profiles dropped luminance formats; single and dual channel data is stored as red
    /// (and green) and swizzled back into luminance when sampled.
    fn swizzle(self) -> Option<[u32; 4]> {
        match self {
            Self::Grayscale => Some([gl::RED, gl::RED, gl::RED, gl::ONE]),
            Self::GrayscaleAlpha => Some([gl::RED, gl::RED, gl::RED, gl::GREEN]),
            Self::Rgb | Self::Rgba => None,
        }
    }
}

/// Anything describing the layout of a pixel buffer.
pub trait AsPixelFormat {
    fn pixel_format(&self) -> Result<PixelFormat>;
}

impl AsPixelFormat for PixelFormat {
    fn pixel_format(&self) -> Result<PixelFormat> {
        Ok(*self)
    }
}

/// Number of 8-bit channels per pixel.
impl AsPixelFormat for u8 {
    fn pixel_format(&self) -> Result<PixelFormat> {
        match self {
            1 => Ok(PixelFormat::Grayscale),
            2 => Ok(PixelFormat::GrayscaleAlpha),
            3 => Ok(PixelFormat::Rgb),
            4 => Ok(PixelFormat::Rgba),
            n => Err(Error::UnsupportedFormat(format!("{n} channels per pixel"))),
        }
    }
}

#[cfg(feature = "img")]
impl AsPixelFormat for image::ColorType {
    fn pixel_format(&self) -> Result<PixelFormat> {
        match self {
            image::ColorType::L8 => Ok(PixelFormat::Grayscale),
            image::ColorType::La8 => Ok(PixelFormat::GrayscaleAlpha),
            image::ColorType::Rgb8 => Ok(PixelFormat::Rgb),
            image::ColorType::Rgba8 => Ok(PixelFormat::Rgba),
            other => Err(Error::UnsupportedFormat(format!("{other:?}"))),
        }
    }
}

pub(crate) fn check_pixel_data(
    width: u32,
    height: u32,
    format: PixelFormat,
    actual: usize,
) -> Result<()> {
    let expected = format.byte_len(width, height);
    if width == 0 || height == 0 || expected != actual {
        return Err(Error::PixelDataSize {
            width,
            height,
            format,
            expected,
            actual,
        });
    }
    Ok(())
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum Filter {
    Nearest = gl::NEAREST,
    #[default]
    Linear = gl::LINEAR,
    NearestMipmapNearest = gl::NEAREST_MIPMAP_NEAREST,
    LinearMipmapNearest = gl::LINEAR_MIPMAP_NEAREST,
    NearestMipmapLinear = gl::NEAREST_MIPMAP_LINEAR,
    LinearMipmapLinear = gl::LINEAR_MIPMAP_LINEAR,
}

impl Filter {
    pub fn is_mipmapped(self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }

    /// Magnification never reads mipmaps, so only the texel filter part applies.
    fn magnification(self) -> Self {
        match self {
            Self::Nearest | Self::NearestMipmapNearest | Self::NearestMipmapLinear => Self::Nearest,
            Self::Linear | Self::LinearMipmapNearest | Self::LinearMipmapLinear => Self::Linear,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, FromPrimitive)]
#[repr(u32)]
pub enum Wrap {
    Repeat = gl::REPEAT,
    MirroredRepeat = gl::MIRRORED_REPEAT,
    #[default]
    ClampToEdge = gl::CLAMP_TO_EDGE,
    ClampToBorder = gl::CLAMP_TO_BORDER,
}

/// Sampling state applied when a texture is created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TextureOptions {
    pub filter: Filter,
    pub wrap: Wrap,
}

impl TextureOptions {
    pub fn new(filter: Filter, wrap: Wrap) -> Self {
        Self { filter, wrap }
    }
}

/// A 2D texture holding 8-bit pixel data.
pub struct Texture<B: Backend> {
    ctx: Context<B>,
    id: NonZeroU32,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl<B: Backend> fmt::Debug for Texture<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id.get())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

impl<B: Backend> Drop for Texture<B> {
    fn drop(&mut self) {
        self.ctx.backend().delete_texture(self.id.get());
        self.ctx.forget_texture(self.id);
        self.ctx.released(ResourceKind::Texture);
        tracing::debug!(texture = self.id.get(), "Deleted texture");
    }
}

impl<B: Backend> Texture<B> {
    /// Uploads `pixels` into a new texture.
    ///
    /// The format and the buffer size are checked before anything is allocated. The texture is
    /// bound to the active unit only while uploading; whatever was bound there before is bound
    /// again on return.
    #[tracing::instrument(skip(ctx, pixels, format), fields(len = pixels.len()))]
    pub fn create(
        ctx: &Context<B>,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: impl AsPixelFormat,
        options: TextureOptions,
    ) -> Result<Self> {
        let format = format.pixel_format()?;
        check_pixel_data(width, height, format, pixels.len())?;

        let backend = ctx.backend();
        let id = ctx.object_name(backend.gen_texture())?;
        ctx.created(ResourceKind::Texture);
        let texture = Self {
            ctx: ctx.clone(),
            id,
            width,
            height,
            format,
        };

        let unit = ctx.active_unit();
        let previous = ctx.bind_texture_2d(unit, Some(id))?;
        let target = gl::TEXTURE_2D;
        backend.tex_parameter(target, gl::TEXTURE_MIN_FILTER, options.filter as _);
        backend.tex_parameter(
            target,
            gl::TEXTURE_MAG_FILTER,
            options.filter.magnification() as _,
        );
        backend.tex_parameter(target, gl::TEXTURE_WRAP_S, options.wrap as _);
        backend.tex_parameter(target, gl::TEXTURE_WRAP_T, options.wrap as _);
        if let Some(swizzle) = format.swizzle() {
            let pnames = [
                gl::TEXTURE_SWIZZLE_R,
                gl::TEXTURE_SWIZZLE_G,
                gl::TEXTURE_SWIZZLE_B,
                gl::TEXTURE_SWIZZLE_A,
            ];
            for (pname, source) in pnames.into_iter().zip(swizzle) {
                backend.tex_parameter(target, pname, source as _);
            }
        }

        // Rows of 1 and 3 channel images are rarely 4-byte aligned
        backend.pixel_store(gl::UNPACK_ALIGNMENT, 1);
        backend.tex_image_2d(
            target,
            format.gl_internal_format() as _,
            width as _,
            height as _,
            format.gl_format(),
            gl::UNSIGNED_BYTE,
            pixels,
        );
        backend.pixel_store(gl::UNPACK_ALIGNMENT, 4);
        if options.filter.is_mipmapped() {
            backend.generate_mipmap(target);
        }
        let uploaded = ctx.guard();
        ctx.bind_texture_2d(unit, previous)?;
        uploaded?;
        tracing::debug!(texture = id.get(), width, height, ?format, "Created texture");
        Ok(texture)
    }

    pub fn from_bitmap(ctx: &Context<B>, bitmap: &Bitmap, options: TextureOptions) -> Result<Self> {
        Self::create(
            ctx,
            bitmap.pixels(),
            bitmap.width(),
            bitmap.height(),
            bitmap.format(),
            options,
        )
    }

    /// Binds the texture to `unit` for subsequent draws. Units past the driver's limit are
    /// refused and leave every binding as it was.
    pub fn bind(&self, unit: TextureUnit) -> Result<()> {
        self.ctx.bind_texture_2d(unit.0, Some(self.id))?;
        Ok(())
    }

    /// Binds the texture to `unit` and returns the value to give the matching sampler uniform.
    pub fn as_uniform(&self, unit: u32) -> Result<TextureUnit> {
        let unit = TextureUnit(unit);
        self.bind(unit)?;
        Ok(unit)
    }

    pub fn id(&self) -> NonZeroU32 {
        self.id
    }

    pub fn original_width(&self) -> u32 {
        self.width
    }

    pub fn original_height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}
