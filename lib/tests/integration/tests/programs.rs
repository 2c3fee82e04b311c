use tinct_gl::{Context, Error, Program, Shader, ShaderStage, Uniform};

use crate::tests::{ensure_released, IntegrationTest, SOLID_COLOR, VERTEX};

fn test_uniform_lookup() -> eyre::Result<()> {
    let ctx = Context::headless();
    {
        let program = Program::from_sources(&ctx, VERTEX, SOLID_COLOR, None)?;
        let location = program.uniform_location("color")?;
        eyre::ensure!(location.raw() >= 0);
        eyre::ensure!(program.uniform_location("color")? == location);
        for name in ["unused", "missing", ""] {
            eyre::ensure!(
                matches!(program.uniform_location(name), Err(Error::UnknownUniform(ref n)) if n == name),
                "`{name}` should not resolve"
            );
        }
    }
    ensure_released(&ctx)
}

fn test_solid_color() -> eyre::Result<()> {
    let ctx = Context::headless();
    {
        let vertex = Shader::compile(&ctx, ShaderStage::Vertex, VERTEX)?;
        let fragment = Shader::compile(&ctx, ShaderStage::Fragment, SOLID_COLOR)?;
        let program = Program::link(&ctx, [&vertex, &fragment])?;
        eyre::ensure!(ctx.backend().attached_shaders(program.id().get()).is_empty());

        program.use_program();
        program.set_uniform("color", [1f32, 0.0, 0.0, 1.0])?;
        let stored = ctx.backend().uniform_value(program.id().get(), "color");
        eyre::ensure!(
            stored == Some(Uniform::Vec4([1.0, 0.0, 0.0, 1.0])),
            "driver holds {stored:?}"
        );
        program.stop_using()?;
    }
    ensure_released(&ctx)
}

fn test_setters_need_active_program() -> eyre::Result<()> {
    let ctx = Context::headless();
    {
        let program = Program::from_sources(&ctx, VERTEX, SOLID_COLOR, None)?;
        program.use_program();
        program.set_uniform("color", [0f32; 4])?;
        program.stop_using()?;
        eyre::ensure!(ctx.active_program().is_none());
        eyre::ensure!(ctx.backend().current_program() == 0);

        let err = program.set_uniform("color", [1f32; 4]).unwrap_err();
        eyre::ensure!(
            matches!(err, Error::InactiveProgram(id) if id == program.id().get()),
            "unexpected {err:?}"
        );
        eyre::ensure!(matches!(program.stop_using(), Err(Error::InactiveProgram(_))));
    }
    ensure_released(&ctx)
}

fn test_vertex_alone_fails_to_link() -> eyre::Result<()> {
    let ctx = Context::headless();
    {
        let vertex = Shader::compile(&ctx, ShaderStage::Vertex, VERTEX)?;
        match Program::link(&ctx, [&vertex]) {
            Err(Error::Link { info_log }) => {
                eyre::ensure!(!info_log.trim().is_empty(), "link log is empty")
            }
            other => eyre::bail!("expected a link error, got {other:?}"),
        }
        eyre::ensure!(ctx.live_resources().programs == 0);
        eyre::ensure!(ctx.backend().live_objects().programs == 0);
    }
    ensure_released(&ctx)
}

fn test_compile_error_log() -> eyre::Result<()> {
    let ctx = Context::headless();
    let broken = "#version 330 core\nout vec4 c;\nvoid main() { c = vec4(1.0; }";
    match Shader::compile(&ctx, ShaderStage::Fragment, broken) {
        Err(Error::Compile { stage, info_log }) => {
            eyre::ensure!(stage == ShaderStage::Fragment);
            eyre::ensure!(info_log == ctx.backend().last_info_log());
            eyre::ensure!(info_log.contains("error"), "log was {info_log:?}");
        }
        other => eyre::bail!("expected a compile error, got {other:?}"),
    }
    ensure_released(&ctx)
}

inventory::submit!(IntegrationTest {
    name: "Uniform lookup",
    test_fn: test_uniform_lookup,
});

inventory::submit!(IntegrationTest {
    name: "Solid color program",
    test_fn: test_solid_color,
});

inventory::submit!(IntegrationTest {
    name: "Setters need the program in use",
    test_fn: test_setters_need_active_program,
});

inventory::submit!(IntegrationTest {
    name: "Vertex shader alone does not link",
    test_fn: test_vertex_alone_fails_to_link,
});

inventory::submit!(IntegrationTest {
    name: "Compile errors carry the driver log",
    test_fn: test_compile_error_log,
});
