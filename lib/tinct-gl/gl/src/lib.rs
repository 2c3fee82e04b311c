//! Generated OpenGL 3.3 core bindings, struct-style: every entry point is a method on [`Gl`].

#![allow(clippy::all, non_upper_case_globals, non_snake_case, unused)]

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
