use std::{env, fs::File, io::BufWriter, path::PathBuf};

use gl_generator::{Api, Fallbacks, Profile, Registry, StructGenerator};

fn main() {
    let dest = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut file = BufWriter::new(File::create(dest.join("bindings.rs")).unwrap());

    // 3.3 core is the floor for texture swizzles; KHR_debug feeds driver messages into tracing.
    Registry::new(Api::Gl, (3, 3), Profile::Core, Fallbacks::All, ["GL_KHR_debug"])
        .write_bindings(StructGenerator, &mut file)
        .unwrap();
}
