//! Draw rectangles over an image, tag each with a class, and save them to an
//! annotation backend.
//!
//! The annotation core ([`session`], [`surface`], [`flow`], [`store`],
//! [`color`], [`classes`], [`geometry`]) is free of UI and network code. The
//! [`backend`] and [`worker`] modules talk to the HTTP backend off the UI
//! thread, and [`app`] is the eframe front-end.

pub mod app;
pub mod backend;
pub mod classes;
pub mod color;
pub mod config;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod render;
pub mod session;
pub mod store;
pub mod surface;
pub mod worker;

pub use error::{AnnotateError, ErrorKind, Result};
pub use session::AnnotationSession;
