pub mod gaussian_blur;
pub mod gradient;

pub use gaussian_blur::gaussian_blur_array;
pub use gradient::central_gradients;
