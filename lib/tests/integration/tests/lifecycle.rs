use tinct_gl::{Context, Program, ResourceCounts, Shader, ShaderStage, Texture, TextureOptions};

use crate::tests::{ensure_released, IntegrationTest, SOLID_COLOR, VERTEX};

fn test_create_drop_mix() -> eyre::Result<()> {
    let ctx = Context::headless();
    let vertex = Shader::compile(&ctx, ShaderStage::Vertex, VERTEX)?;
    let fragment = Shader::compile(&ctx, ShaderStage::Fragment, SOLID_COLOR)?;

    let mut programs = Vec::new();
    let mut textures = Vec::new();
    for i in 0..6u8 {
        programs.push(Program::link(&ctx, [&vertex, &fragment])?);
        textures.push(Texture::create(&ctx, &[i; 4], 2, 2, 1u8, TextureOptions::default())?);
        if i % 2 == 1 {
            programs.remove(0);
            textures.pop();
        }
    }
    let expected = ResourceCounts {
        shaders: 2,
        programs: 3,
        textures: 3,
    };
    eyre::ensure!(ctx.live_resources() == expected, "{:?}", ctx.live_resources());
    eyre::ensure!(ctx.backend().live_objects() == expected);

    programs[1].use_program();
    drop(programs);
    eyre::ensure!(ctx.active_program().is_none());

    let shared = vertex.clone();
    drop(vertex);
    eyre::ensure!(ctx.live_resources().shaders == 2, "clones keep the shader alive");
    drop((shared, fragment, textures));
    ensure_released(&ctx)
}

fn test_programs_outlive_their_shaders() -> eyre::Result<()> {
    let ctx = Context::headless();
    let program = {
        let vertex = Shader::compile(&ctx, ShaderStage::Vertex, VERTEX)?;
        let fragment = Shader::compile(&ctx, ShaderStage::Fragment, SOLID_COLOR)?;
        Program::link(&ctx, [&vertex, &fragment])?
    };
    eyre::ensure!(ctx.live_resources().shaders == 0);
    let active = program.bound();
    active.set_uniform("color", [0.25f32; 4])?;
    drop(active);
    eyre::ensure!(!program.is_in_use());
    drop(program);
    ensure_released(&ctx)
}

inventory::submit!(IntegrationTest {
    name: "Create/drop mix releases everything",
    test_fn: test_create_drop_mix,
});

inventory::submit!(IntegrationTest {
    name: "Programs outlive their shaders",
    test_fn: test_programs_outlive_their_shaders,
});
