use tinct_gl::{Context, Headless};

pub mod lifecycle;
pub mod programs;
pub mod textures;

#[derive(Debug)]
pub struct IntegrationTest {
    pub name: &'static str,
    pub test_fn: fn() -> eyre::Result<()>,
}

inventory::collect!(IntegrationTest);

pub const VERTEX: &str = r#"
#version 330 core
in vec2 pos;

void main() {
    gl_Position = vec4(pos, 0, 1);
}"#;

pub const SOLID_COLOR: &str = r#"
#version 330 core

uniform vec4 color;
uniform float unused;
out vec4 out_color;

void main() {
    out_color = color;
}"#;

/// Fails unless both the wrappers and the driver agree that nothing is left alive.
pub fn ensure_released(ctx: &Context<Headless>) -> eyre::Result<()> {
    let tracked = ctx.live_resources();
    let driver = ctx.backend().live_objects();
    eyre::ensure!(tracked.total() == 0, "wrappers still track {tracked:?}");
    eyre::ensure!(driver.total() == 0, "driver still holds {driver:?}");
    eyre::ensure!(
        ctx.backend().stray_deletes() == 0,
        "{} deletes hit names that were already gone",
        ctx.backend().stray_deletes()
    );
    Ok(())
}
