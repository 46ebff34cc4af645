pub mod compose;
pub mod describe;
pub mod model;
pub mod render;
pub mod styles;
pub mod translate;

pub use compose::compose;
pub use describe::{describe_image, merge_description};
pub use render::render_image;
pub use translate::translate_state;
