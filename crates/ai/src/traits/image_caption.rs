use image::DynamicImage;

pub type ImageCaptionInput = DynamicImage;
pub type ImageCaptionOutput = String;
