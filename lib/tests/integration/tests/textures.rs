use tinct_gl::{
    Bitmap, Context, Error, Filter, PixelFormat, Texture, TextureOptions, TextureUnit, Wrap,
};

use crate::tests::{ensure_released, IntegrationTest};

fn test_supported_formats() -> eyre::Result<()> {
    let ctx = Context::headless();
    for format in [
        PixelFormat::Grayscale,
        PixelFormat::GrayscaleAlpha,
        PixelFormat::Rgb,
        PixelFormat::Rgba,
    ] {
        let pixels = vec![0x7f; format.byte_len(3, 5)];
        let texture = Texture::create(&ctx, &pixels, 3, 5, format, TextureOptions::default())?;
        eyre::ensure!(texture.original_width() == 3 && texture.original_height() == 5);
        eyre::ensure!(texture.format() == format);

        let info = ctx
            .backend()
            .texture_info(texture.id().get())
            .ok_or_else(|| eyre::eyre!("driver lost texture {}", texture.id()))?;
        eyre::ensure!((info.width, info.height) == (3, 5));
        eyre::ensure!(info.data == pixels, "{format:?} pixels were altered on upload");
    }
    ensure_released(&ctx)
}

fn test_unsupported_formats() -> eyre::Result<()> {
    let ctx = Context::headless();
    for channels in [0u8, 5, 16] {
        let pixels = vec![0; 4 * channels as usize];
        let result = Texture::create(&ctx, &pixels, 2, 2, channels, TextureOptions::default());
        eyre::ensure!(
            matches!(result, Err(Error::UnsupportedFormat(_))),
            "{channels} channels: {result:?}"
        );
        eyre::ensure!(ctx.backend().live_objects().textures == 0);
    }
    ensure_released(&ctx)
}

fn test_binding_is_transient() -> eyre::Result<()> {
    let ctx = Context::headless();
    {
        let first = Texture::create(&ctx, &[255; 4], 1, 1, 4u8, TextureOptions::default())?;
        first.bind(TextureUnit(0))?;
        let second = Texture::create(&ctx, &[0; 3], 1, 1, 3u8, TextureOptions::default())?;
        eyre::ensure!(ctx.bound_texture(0) == Some(first.id()));
        eyre::ensure!(ctx.backend().bound_texture(0) == first.id().get());
        drop(second);
        drop(first);
        eyre::ensure!(ctx.backend().bound_texture(0) == 0);
    }
    ensure_released(&ctx)
}

fn test_bitmap_upload() -> eyre::Result<()> {
    let ctx = Context::headless();
    {
        let image = image::RgbaImage::from_fn(4, 2, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let mut bitmap = Bitmap::from_image(image.into())?;
        bitmap.flip_vertically();
        let options = TextureOptions::new(Filter::LinearMipmapLinear, Wrap::Repeat);
        let texture = Texture::from_bitmap(&ctx, &bitmap, options)?;

        let info = ctx
            .backend()
            .texture_info(texture.id().get())
            .ok_or_else(|| eyre::eyre!("driver lost texture {}", texture.id()))?;
        eyre::ensure!(info.has_mipmaps);
        eyre::ensure!(info.data[..4] == [0, 1, 0, 255], "bottom row must come first");
        eyre::ensure!(texture.format() == PixelFormat::Rgba);
    }
    ensure_released(&ctx)
}

inventory::submit!(IntegrationTest {
    name: "Texture formats",
    test_fn: test_supported_formats,
});

inventory::submit!(IntegrationTest {
    name: "Unsupported texture formats",
    test_fn: test_unsupported_formats,
});

inventory::submit!(IntegrationTest {
    name: "Texture binding is transient",
    test_fn: test_binding_is_transient,
});

inventory::submit!(IntegrationTest {
    name: "Bitmap upload",
    test_fn: test_bitmap_upload,
});
