//! Conversions between embedded pictures and standard image buffers.
use std::path::Path;

use image::{DynamicImage, RgbImage, RgbaImage};
use thiserror::Error;

use crate::qbin::{Picture, Pixels, Rgb, Rgba};

#[derive(Debug, Error)]
pub enum PictureImageError {
    #[error("picture dimensions {width}x{height} are not valid image dimensions")]
    Dimensions { width: i64, height: i64 },

    #[error("pixel count {len} does not match {width}x{height}")]
    PixelCount { len: usize, width: i32, height: i32 },

    #[error("error encoding image file")]
    Image(#[from] image::ImageError),
}

impl Picture {
    /// The pixel plane as an image buffer.
    pub fn to_image(&self) -> Result<DynamicImage, PictureImageError> {
        let width = u32::try_from(self.width).map_err(|_| PictureImageError::Dimensions {
            width: self.width as i64,
            height: self.height as i64,
        })?;
        let height = u32::try_from(self.height).map_err(|_| PictureImageError::Dimensions {
            width: self.width as i64,
            height: self.height as i64,
        })?;
        if self.pixels.len() != width as usize * height as usize {
            return Err(PictureImageError::PixelCount {
                len: self.pixels.len(),
                width: self.width,
                height: self.height,
            });
        }

        match &self.pixels {
            Pixels::Rgb(pixels) => {
                let data = pixels.iter().flat_map(|p| [p.r, p.g, p.b]).collect();
                RgbImage::from_raw(width, height, data)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or(PictureImageError::Dimensions {
                        width: width as i64,
                        height: height as i64,
                    })
            }
            Pixels::Rgba(pixels) => {
                let data = pixels.iter().flat_map(|p| [p.r, p.g, p.b, p.a]).collect();
                RgbaImage::from_raw(width, height, data)
                    .map(DynamicImage::ImageRgba8)
                    .ok_or(PictureImageError::Dimensions {
                        width: width as i64,
                        height: height as i64,
                    })
            }
        }
    }

    /// Build a picture record from an image.
    ///
    /// Images with an alpha channel store RGBA pixels and everything else
    /// RGB. Unidentified header bytes are zeroed.
    pub fn from_image(image: &DynamicImage) -> Result<Self, PictureImageError> {
        let width =
            i32::try_from(image.width()).map_err(|_| PictureImageError::Dimensions {
                width: image.width() as i64,
                height: image.height() as i64,
            })?;
        let height =
            i32::try_from(image.height()).map_err(|_| PictureImageError::Dimensions {
                width: image.width() as i64,
                height: image.height() as i64,
            })?;

        let pixels = if image.color().has_alpha() {
            Pixels::Rgba(
                image
                    .to_rgba8()
                    .pixels()
                    .map(|p| Rgba {
                        r: p[0],
                        g: p[1],
                        b: p[2],
                        a: p[3],
                    })
                    .collect(),
            )
        } else {
            Pixels::Rgb(
                image
                    .to_rgb8()
                    .pixels()
                    .map(|p| Rgb {
                        r: p[0],
                        g: p[1],
                        b: p[2],
                    })
                    .collect(),
            )
        };

        Ok(Self {
            unknown0: [0; 2],
            channel_size: 1,
            unknown1: 0,
            unknown2: 0,
            unknown3: 0,
            width,
            height,
            unknown4: [0; 4],
            pixels,
            tail: Vec::new(),
        })
    }

    /// Save the pixel plane as an image file, with the format inferred from
    /// the extension.
    pub fn save_image<P: AsRef<Path>>(&self, path: P) -> Result<(), PictureImageError> {
        self.to_image()?.save(path)?;
        Ok(())
    }
}
