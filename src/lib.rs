pub mod canvas;
pub mod config;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod glyph_atlas;
pub mod painter;
pub mod pipeline;
pub mod producer;
pub mod ramp;
pub mod random;
pub mod renderer;
pub mod subscriptions;
pub mod terminal;
pub mod trail;
pub mod worker;
