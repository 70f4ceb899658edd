//! Text renderers for finished compositions. The core only hands over
//! layers and metadata; each renderer owns its output grammar.

pub mod strudel;

use crate::engines::composition::{Composition, Song};

pub use strudel::StrudelRenderer;

pub trait Renderer {
    fn render_composition(&self, composition: &Composition) -> String;
    fn render_song(&self, song: &Song) -> String;
}
