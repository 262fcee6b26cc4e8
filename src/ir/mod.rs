//! Typed annotation records and the on-disk formats.
//!
//! # Design Principles
//!
//! 1. **One canonical box**: every convention converts into pixel-space
//!    [`BBoxXYXY`] before it is clamped or repaired, and converts out of it
//!    afterwards.
//!
//! 2. **Type Safety**: newtype ids and coordinate-space markers keep image,
//!    category and annotation ids apart, and pixel boxes apart from
//!    normalized ones.
//!
//! 3. **Permissive Construction**: records may hold malformed boxes. Loading
//!    never repairs; the normalizer and the verifier decide what a bad box
//!    means.
//!
//! # Example
//!
//! ```
//! use cococonv::ir::{Annotation, Category, Image, RawBox, Split};
//!
//! let image = Image::new(1u64, "image.jpg", 640, 480, Split::Train);
//! let category = Category::new(18u64, "dog");
//! let annotation = Annotation::new(
//!     1u64,
//!     image.id,
//!     category.id,
//!     RawBox::Coco { x: 10.0, y: 20.0, w: 90.0, h: 60.0 },
//! );
//! assert_eq!(annotation.bbox.to_corners(image.dims()).xmax, 100.0);
//! ```

mod bbox;
mod convention;
mod ids;
pub mod io_coco_json;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;

pub use bbox::{BBoxXYXY, ImageDims, Normalized, Pixel};
pub use convention::{Convention, RawBox};
pub use ids::{AnnotationId, CategoryId, ImageId};
pub use model::{Annotation, Category, Dataset, Image, Split};
