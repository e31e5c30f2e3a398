//! Presentation tools and the backends they write to.

pub mod backend;
pub mod extract;
pub mod google;
pub mod tools;

pub use backend::{MemorySlides, SlideSpec, SlideType, SlidesBackend};
pub use google::GoogleSlides;
pub use tools::{slides_registry, SlidesTool};
