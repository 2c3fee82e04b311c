use tinct_gl::{
    Bitmap, Context, Filter, PixelFormat, Program, Texture, TextureOptions, Wrap,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const VERTEX_SHADER: &str = r#"
#version 330 core
in vec2 pos;
out vec2 uv;

void main() {
    uv = pos * 0.5 + 0.5;
    gl_Position = vec4(pos, 0, 1);
}"#;

const FRAGMENT_SHADER: &str = r#"
#version 330 core

uniform vec3 color;
uniform sampler2D pattern;
in vec2 uv;
out vec4 out_color;

void main() {
    out_color = vec4(color, 1) * texture(pattern, uv);
}"#;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    install_tracing();
    let ctx = Context::headless();

    let program = Program::from_sources(&ctx, VERTEX_SHADER, FRAGMENT_SHADER, None)?;
    let color = program.uniform_location("color")?;

    let checkerboard = (0..8u32 * 8)
        .map(|i| if (i % 8 + i / 8) % 2 == 0 { 255 } else { 32 })
        .collect::<Vec<u8>>();
    let bitmap = Bitmap::new(8, 8, PixelFormat::Grayscale, checkerboard)?;
    let pattern = Texture::from_bitmap(
        &ctx,
        &bitmap,
        TextureOptions::new(Filter::Nearest, Wrap::Repeat),
    )?;

    let active = program.bound();
    active.set_uniform("pattern", pattern.as_uniform(0)?)?;
    for frame in 0..4 {
        let (s, c) = (frame as f32 * 0.4).sin_cos();
        active.set_uniform_at(color, glam::vec3(s, 0.5, c), false)?;
        tracing::info!(frame, value = ?ctx.backend().uniform_value(program.id().get(), "color"), "Frame");
    }
    drop(active);

    tracing::info!(resources = ?ctx.live_resources(), "Done");
    Ok(())
}

fn install_tracing() {
    let fmt_layer =
        tracing_subscriber::fmt::Layer::default().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();
}
